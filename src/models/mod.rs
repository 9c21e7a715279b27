pub mod hub;
pub mod link;
pub mod user;

pub use hub::{Hub, HubChanges, HubSummary, NewHub};
pub use link::{Link, LinkWithRules, NewLink, NewRule, RuleView, StoredRule};
pub use user::User;
