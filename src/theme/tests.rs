//! Tests for the theme engine

use super::*;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn standard_vars() -> StandardTemplateVars {
    StandardTemplateVars::new(&SiteConfig::default(), "/")
}

#[test]
fn test_embedded_templates_load() {
    let temp_dir = TempDir::new().unwrap();
    let engine = ThemeEngine::new(&temp_dir.path().join("missing")).unwrap();

    for name in [
        "base.html",
        "home.html",
        "blog.html",
        "blog_post.html",
        "team.html",
        "about.html",
        "testimonials.html",
        "admin.html",
        NOT_FOUND_TEMPLATE,
    ] {
        assert!(engine.has_template(name), "missing template {}", name);
    }
    assert!(engine.overridden_templates().is_empty());
}

#[test]
fn test_render_not_found_page() {
    let temp_dir = TempDir::new().unwrap();
    let engine = ThemeEngine::new(temp_dir.path()).unwrap();

    let mut vars = standard_vars();
    vars.request_path = "/nowhere".to_string();
    let html = engine
        .render_with_standard_vars(NOT_FOUND_TEMPLATE, &TeraContext::new(), &vars)
        .unwrap();
    assert!(html.contains("Corpsite"));
    assert!(html.contains("/nowhere"));
}

#[test]
fn test_override_replaces_embedded_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("404.html"),
        r#"{% extends "base.html" %}{% block content %}<p>Custom missing page</p>{% endblock %}"#,
    )
    .unwrap();

    let engine = ThemeEngine::new(temp_dir.path()).unwrap();
    assert_eq!(engine.overridden_templates(), &["404.html".to_string()]);

    let html = engine
        .render_with_standard_vars(NOT_FOUND_TEMPLATE, &TeraContext::new(), &standard_vars())
        .unwrap();
    assert!(html.contains("Custom missing page"));
    // Layout still comes from the embedded base
    assert!(html.contains("<footer"));
}

#[test]
fn test_reload_picks_up_new_override() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = ThemeEngine::new(temp_dir.path()).unwrap();

    fs::write(temp_dir.path().join("about.html"), "About override").unwrap();
    engine.reload().unwrap();

    let html = engine.render("about.html", &TeraContext::new()).unwrap();
    assert_eq!(html, "About override");
}

#[test]
fn test_broken_override_fails_to_load() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("team.html"), "{% if %}").unwrap();

    assert!(ThemeEngine::new(temp_dir.path()).is_err());
}

#[test]
fn test_render_unknown_template_names_it() {
    let temp_dir = TempDir::new().unwrap();
    let engine = ThemeEngine::new(temp_dir.path()).unwrap();

    let err = engine.render("nope.html", &TeraContext::new()).unwrap_err();
    assert!(err.to_string().contains("nope.html"));
}

#[test]
fn test_blog_post_content_is_not_double_escaped() {
    let temp_dir = TempDir::new().unwrap();
    let engine = ThemeEngine::new(temp_dir.path()).unwrap();

    let post = crate::models::BlogPost::new(
        "Hello <World>".to_string(),
        "hello-world".to_string(),
        "**hi**".to_string(),
        "<p><strong>hi</strong></p>".to_string(),
        1,
        true,
    );
    let mut context = TeraContext::new();
    context.insert("post", &post);

    let html = engine
        .render_with_standard_vars("blog_post.html", &context, &standard_vars())
        .unwrap();
    assert!(html.contains("<p><strong>hi</strong></p>"));
    assert!(html.contains("Hello &lt;World&gt;"));
}

#[test]
fn test_current_user_from_user() {
    let mut user = User::new(
        "Ada".to_string(),
        "ada@example.com".to_string(),
        "hash".to_string(),
        crate::models::UserRole::Editor,
    );
    user.id = 7;

    let vars = standard_vars().with_user(Some(&user));
    let current = vars.current_user.unwrap();
    assert_eq!(current.id, 7);
    assert_eq!(current.role, "editor");
    assert!(current.is_editor);
}
