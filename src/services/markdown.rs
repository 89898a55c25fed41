//! Markdown rendering service
//!
//! Converts post bodies to HTML with pulldown-cmark. Raw HTML in the source is
//! escaped and rendered as text, and links or images with a script scheme are
//! neutralised, so editors cannot inject markup into public pages.
//!
//! ```
//! use corpsite::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Hello World\n\nThis is **bold** text.");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

/// Markdown renderer supporting tables, strikethrough, task lists and smart punctuation
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    _private: (),
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options
    }

    /// Render Markdown text to HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let events = self.process_events(parser);

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Plain-text summary of the first paragraphs, cut on a word boundary
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, Self::options()) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak | Event::End(TagEnd::Paragraph) => {
                    text.push(' ')
                }
                _ => {}
            }
            if text.chars().count() > max_chars {
                break;
            }
        }

        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() <= max_chars {
            return text;
        }

        let cut: String = text.chars().take(max_chars).collect();
        let cut = match cut.rfind(' ') {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        };
        format!("{}…", cut.trim_end())
    }

    fn process_events<'a>(&self, parser: Parser<'a>) -> Vec<Event<'a>> {
        let mut events = Vec::new();
        let mut code_lang: Option<String> = None;
        let mut code_content: Option<String> = None;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    code_content = Some(String::new());
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    let code = code_content.take().unwrap_or_default();
                    events.push(Event::Html(code_block(&code, code_lang.take()).into()));
                }
                Event::Text(text) if code_content.is_some() => {
                    if let Some(buf) = code_content.as_mut() {
                        buf.push_str(&text);
                    }
                }
                // Raw HTML is shown as text
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                other => events.push(other),
            }
        }

        events
    }
}

fn code_block(code: &str, lang: Option<String>) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            html_escape(&lang),
            html_escape(code)
        ),
        None => format!("<pre><code>{}</code></pre>\n", html_escape(code)),
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme: String = url
        .trim_start()
        .chars()
        .take_while(|c| *c != ':' && *c != '/' && *c != '?' && *c != '#')
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_lowercase();
    let has_scheme = url.contains(':') && !scheme.is_empty();

    if has_scheme && matches!(scheme.as_str(), "javascript" | "vbscript" | "data") {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Escapes HTML special characters in a string.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str) -> String {
        MarkdownRenderer::new().render(md)
    }

    #[test]
    fn test_render_basic_formatting() {
        let html = render("# Title\n\nSome **bold**, *italic* and ~~gone~~ text.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_render_lists_and_links() {
        let html = render("- one\n- two\n\n1. first\n\n[site](https://example.com)");
        assert!(html.contains("<ul>"));
        assert!(html.contains("<ol>"));
        assert!(html.contains("<a href=\"https://example.com\">site</a>"));
    }

    #[test]
    fn test_render_table() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_code_blocks_are_escaped() {
        let html = render("```rust\nlet x = a < b && c > d;\n```");
        assert!(html.contains("class=\"language-rust\""));
        assert!(html.contains("a &lt; b &amp;&amp; c &gt; d"));

        let html = render("```\n<div>\n```");
        assert!(html.contains("<pre><code>&lt;div&gt;"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render("<script>alert('x')</script>\n\nHello <b>inline</b>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_script_urls_are_neutralised() {
        let html = render("[click](javascript:alert(1)) ![img](data:text/html;base64,xx)");
        assert!(!html.contains("javascript:"));
        assert!(!html.contains("data:text"));
        assert!(html.contains("href=\"#\""));

        let html = render("[ok](/uploads/blog/a.pdf) [mail](mailto:hi@example.com)");
        assert!(html.contains("href=\"/uploads/blog/a.pdf\""));
        assert!(html.contains("href=\"mailto:hi@example.com\""));
    }

    #[test]
    fn test_render_empty_input() {
        assert_eq!(render(""), "");
    }

    #[test]
    fn test_excerpt() {
        let renderer = MarkdownRenderer::new();
        let md = "# Heading\n\nThe quick brown fox jumps over the lazy dog.";

        assert_eq!(
            renderer.excerpt(md, 200),
            "Heading The quick brown fox jumps over the lazy dog."
        );
        assert_eq!(renderer.excerpt(md, 20), "Heading The quick…");
        assert_eq!(renderer.excerpt("", 10), "");
    }
}
