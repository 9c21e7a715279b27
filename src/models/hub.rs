use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_THEME: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Hub {
    pub id: String,
    pub user_id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub theme: String,
    pub created_at: i64,
}

/// Hub row with the counters shown on the owner's dashboard
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HubSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub hub: Hub,
    #[serde(rename = "linkCount")]
    pub link_count: i64,
    #[serde(rename = "clickCount")]
    pub click_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewHub {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub theme: String,
}

/// Partial update of a hub's own fields. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct HubChanges {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub theme: Option<String>,
}

impl HubChanges {
    /// Apply the changes on top of an existing hub.
    ///
    /// An empty description clears it.
    pub fn apply(&self, hub: &Hub) -> Hub {
        let description = match &self.description {
            Some(d) if d.is_empty() => None,
            Some(d) => Some(d.clone()),
            None => hub.description.clone(),
        };

        Hub {
            id: hub.id.clone(),
            user_id: hub.user_id.clone(),
            slug: self.slug.clone().unwrap_or_else(|| hub.slug.clone()),
            title: self.title.clone().unwrap_or_else(|| hub.title.clone()),
            description,
            theme: self.theme.clone().unwrap_or_else(|| hub.theme.clone()),
            created_at: hub.created_at,
        }
    }
}
