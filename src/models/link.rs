use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::ordering::Positioned;
use crate::rules::DisplayRule;

pub const DEFAULT_ICON: &str = "🔗";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub hub_id: String,
    pub title: String,
    pub url: String,
    pub icon: String,
    pub position: i64,
    pub is_active: bool,
    pub created_at: i64,
}

/// Display rule as persisted: the configuration is kept as a JSON string
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredRule {
    pub id: String,
    pub link_id: String,
    pub rule_type: String,
    pub rule_config: String,
}

impl StoredRule {
    /// Parsed configuration. Malformed JSON decodes as `null`.
    pub fn config(&self) -> Value {
        serde_json::from_str(&self.rule_config).unwrap_or(Value::Null)
    }

    pub fn display_rule(&self) -> DisplayRule {
        DisplayRule::parse(&self.rule_type, &self.config())
    }

    pub fn view(&self) -> RuleView {
        RuleView {
            id: self.id.clone(),
            rule_type: self.rule_type.clone(),
            config: self.config(),
        }
    }
}

/// Rule as returned to the hub owner
#[derive(Debug, Clone, Serialize)]
pub struct RuleView {
    pub id: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub config: Value,
}

#[derive(Debug, Clone)]
pub struct LinkWithRules {
    pub link: Link,
    pub rules: Vec<StoredRule>,
}

impl LinkWithRules {
    pub fn display_rules(&self) -> Vec<DisplayRule> {
        self.rules.iter().map(StoredRule::display_rule).collect()
    }
}

impl Serialize for LinkWithRules {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct View<'a> {
            #[serde(flatten)]
            link: &'a Link,
            rules: Vec<RuleView>,
        }

        View {
            link: &self.link,
            rules: self.rules.iter().map(StoredRule::view).collect(),
        }
        .serialize(serializer)
    }
}

/// Link to be written as part of a hub's link set.
///
/// `id` is only a hint: storage reuses it when it names a link already in the
/// hub, so click history survives an edit of the hub.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub id: Option<String>,
    pub title: String,
    pub url: String,
    pub icon: String,
    pub position: i64,
    pub is_active: bool,
    pub rules: Vec<NewRule>,
}

#[derive(Debug, Clone)]
pub struct NewRule {
    pub rule_type: String,
    pub config: Value,
}

impl Positioned for Link {
    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

impl Positioned for LinkWithRules {
    fn position(&self) -> i64 {
        self.link.position
    }

    fn set_position(&mut self, position: i64) {
        self.link.position = position;
    }
}

impl Positioned for NewLink {
    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}
