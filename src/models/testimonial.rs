//! Testimonial model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::team_member::default_active;

/// Client quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: i64,
    pub author_name: String,
    pub author_title: Option<String>,
    pub company: Option<String>,
    pub content: String,
    pub avatar: Option<String>,
    /// 1..=5 when present
    pub rating: Option<i32>,
    pub display_order: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTestimonialInput {
    pub author_name: String,
    #[serde(default)]
    pub author_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub content: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl CreateTestimonialInput {
    pub fn new(author_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author_name: author_name.into(),
            content: content.into(),
            active: true,
            ..Self::default()
        }
    }
}

/// Absent fields are left unchanged; `rating: 0` clears the rating
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTestimonialInput {
    pub author_name: Option<String>,
    pub author_title: Option<String>,
    pub company: Option<String>,
    pub content: Option<String>,
    pub avatar: Option<String>,
    pub rating: Option<i32>,
    pub display_order: Option<i32>,
    pub active: Option<bool>,
}
