//! Shared pieces of the content services
//!
//! Error type, field validation, and the partial-update rules used by the
//! blog, team, executive and testimonial services.

/// Error types for content service operations
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// One message per invalid field
    #[error("Validation error: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Accumulates field errors so a request reports all of them at once
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// `field` must contain something other than whitespace, within `max` chars
    pub fn required(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.push(format!("{} is required", field));
        } else {
            self.max_len(field, value, max);
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(format!("{} must be at most {} characters", field, max));
        }
    }

    /// Links must be absolute http(s) URLs or paths under `/uploads/`
    pub fn url(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            if !is_valid_link(value) {
                self.push(format!(
                    "{} must be an http(s) URL or an /uploads/ path",
                    field
                ));
            }
        }
    }

    pub fn rating(&mut self, value: Option<i32>) {
        if let Some(rating) = value {
            if !(1..=5).contains(&rating) {
                self.push("rating must be between 1 and 5");
            }
        }
    }

    pub fn into_result(self) -> Result<(), ContentError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ContentError::Validation(self.0))
        }
    }
}

pub fn is_valid_link(value: &str) -> bool {
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    if let Some(path) = value.strip_prefix("/uploads/") {
        return !path.is_empty() && !path.split('/').any(|seg| seg == "..");
    }
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

/// Trim, and map empty to `None`
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Apply an optional update to a nullable text field: absent keeps the
/// current value, an empty string clears it.
pub fn merge_optional(current: &mut Option<String>, update: Option<String>) {
    if let Some(value) = update {
        *current = normalize_optional(Some(value));
    }
}

pub fn merge_required(current: &mut String, update: Option<String>) {
    if let Some(value) = update {
        *current = value.trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_collects_all() {
        let mut errors = FieldErrors::new();
        errors.required("name", "  ", 100);
        errors.required("position", "x".repeat(101).as_str(), 100);
        errors.url("photo", Some("ftp://example.com/a.png"));
        errors.rating(Some(6));

        match errors.into_result() {
            Err(ContentError::Validation(messages)) => {
                assert_eq!(
                    messages,
                    vec![
                        "name is required",
                        "position must be at most 100 characters",
                        "photo must be an http(s) URL or an /uploads/ path",
                        "rating must be between 1 and 5",
                    ]
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_field_errors_ok() {
        let mut errors = FieldErrors::new();
        errors.required("name", "Ada", 100);
        errors.url("photo", None);
        errors.url("photo", Some(""));
        errors.rating(None);
        errors.rating(Some(1));
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_is_valid_link() {
        assert!(is_valid_link("https://example.com/a.png"));
        assert!(is_valid_link("http://example.com"));
        assert!(is_valid_link("/uploads/team/abc.png"));

        assert!(!is_valid_link("javascript:alert(1)"));
        assert!(!is_valid_link("https://"));
        assert!(!is_valid_link("https:///path"));
        assert!(!is_valid_link("/uploads/"));
        assert!(!is_valid_link("/uploads/../config.yml"));
        assert!(!is_valid_link("/static/a.png"));
        assert!(!is_valid_link("https://exa mple.com"));
    }

    #[test]
    fn test_merge_optional() {
        let mut value = Some("old".to_string());
        merge_optional(&mut value, None);
        assert_eq!(value.as_deref(), Some("old"));

        merge_optional(&mut value, Some("  new ".to_string()));
        assert_eq!(value.as_deref(), Some("new"));

        merge_optional(&mut value, Some(String::new()));
        assert!(value.is_none());
    }
}
