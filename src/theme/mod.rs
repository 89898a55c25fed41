//! Theme engine
//!
//! Server-side rendering with Tera. The default templates are embedded in the
//! binary; any `*.html` file under the configured theme directory replaces the
//! embedded template with the same relative name.

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::config::SiteConfig;
use crate::models::User;

mod error;

pub use error::ThemeError;

/// Default templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Page rendered for unknown routes
pub const NOT_FOUND_TEMPLATE: &str = "404.html";

/// Theme engine for rendering templates
pub struct ThemeEngine {
    tera: Tera,
    /// Directory searched for template overrides
    override_path: PathBuf,
    /// Template names that came from the override directory
    overridden: Vec<String>,
}

impl ThemeEngine {
    /// Build the engine from the embedded templates plus any overrides in `override_path`.
    ///
    /// A missing override directory is not an error.
    pub fn new(override_path: &Path) -> Result<Self> {
        let mut engine = Self {
            tera: Tera::default(),
            override_path: override_path.to_path_buf(),
            overridden: Vec::new(),
        };
        engine.reload()?;
        Ok(engine)
    }

    /// Re-read the templates, picking up changed overrides
    pub fn reload(&mut self) -> Result<()> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in EmbeddedTemplates::iter() {
            let file = EmbeddedTemplates::get(&name)
                .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| ThemeError::TemplateError(format!("Template {} is not UTF-8", name)))?;
            templates.insert(name.to_string(), content);
        }

        let mut overrides = Vec::new();
        collect_templates_from_dir(&self.override_path, &self.override_path, &mut overrides)?;
        let mut overridden = Vec::with_capacity(overrides.len());
        for (name, content) in overrides {
            tracing::info!("Using template override: {}", name);
            overridden.push(name.clone());
            templates.insert(name, content);
        }

        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(describe_tera_error(&e)))?;

        self.tera = tera;
        self.overridden = overridden;
        Ok(())
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera
            .render(template, context)
            .map_err(|e| {
                ThemeError::TemplateError(format!(
                    "Failed to render '{}': {}",
                    template,
                    describe_tera_error(&e)
                ))
                .into()
            })
    }

    /// Render with the variables every page layout expects
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("site_description", &standard_vars.site_description);
        full_context.insert("contact_email", &standard_vars.contact_email);
        full_context.insert("current_user", &standard_vars.current_user);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        self.render(template, &full_context)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    pub fn overridden_templates(&self) -> &[String] {
        &self.overridden
    }
}

fn describe_tera_error(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    if !current_path.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read template directory: {:?}", current_path))?
    {
        let path = entry?.path();
        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((name, content));
        }
    }
    Ok(())
}

/// Variables available to every template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    pub site_description: String,
    pub contact_email: Option<String>,
    /// Signed-in user, when the request carried a valid access token cookie
    pub current_user: Option<CurrentUser>,
    pub request_path: String,
    /// Current year (for copyright)
    pub year: i32,
}

/// Current user information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub is_editor: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            role: user.role.to_string(),
            is_editor: user.is_editor(),
        }
    }
}

impl StandardTemplateVars {
    pub fn new(site: &SiteConfig, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site.name.clone(),
            site_description: site.description.clone(),
            contact_email: site.contact_email.clone(),
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }
}

#[cfg(test)]
mod tests;
