//! Team member model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Team member shown on the team and about pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub linkedin_url: Option<String>,
    /// Ascending sort key
    pub display_order: i32,
    /// Inactive members are hidden from public listings
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a team member
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTeamMemberInput {
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl CreateTeamMemberInput {
    pub fn new(name: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: position.into(),
            active: true,
            ..Self::default()
        }
    }
}

/// Input for updating a team member; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTeamMemberInput {
    pub name: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub linkedin_url: Option<String>,
    pub display_order: Option<i32>,
    pub active: Option<bool>,
}

pub(crate) fn default_active() -> bool {
    true
}
