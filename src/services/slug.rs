//! URL slugs

/// Longest slug produced from a title
pub const MAX_SLUG_LEN: usize = 80;

/// Lowercase the text and join word runs with single hyphens.
///
/// Letters and digits are kept (including non-ASCII letters); every other
/// character is a separator.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut len = 0;
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if !c.is_alphanumeric() {
            pending_hyphen = true;
            continue;
        }

        let hyphen = pending_hyphen && len > 0;
        if len + 1 + usize::from(hyphen) > MAX_SLUG_LEN {
            break;
        }
        if hyphen {
            slug.push('-');
            len += 1;
        }
        slug.push(c);
        len += 1;
        pending_hyphen = false;
    }

    slug
}
