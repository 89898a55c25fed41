//! Executive model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::team_member::default_active;

/// Leadership profile shown on the home and about pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Executive {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub display_order: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateExecutiveInput {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl CreateExecutiveInput {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            active: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExecutiveInput {
    pub name: Option<String>,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub display_order: Option<i32>,
    pub active: Option<bool>,
}
