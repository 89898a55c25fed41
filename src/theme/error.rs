//! Theme engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThemeError {
    /// Embedded template missing from the binary
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Template parsing or rendering error
    #[error("Template error: {0}")]
    TemplateError(String),
}
