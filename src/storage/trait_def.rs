use crate::analytics::{AnalyticsEvent, EventRollup};
use crate::models::{Hub, HubChanges, HubSummary, LinkWithRules, NewHub, NewLink, User};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("already exists")]
    Conflict,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StorageError::Conflict;
            }
        }
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Register a user. Fails with `Conflict` when the email is taken.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> StorageResult<User>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Create a hub and its link set in one transaction.
    /// Fails with `Conflict` when the slug is taken.
    async fn create_hub(
        &self,
        user_id: &str,
        hub: &NewHub,
        links: &[NewLink],
    ) -> StorageResult<Hub>;

    /// Get a hub by id, only if it is owned by `user_id`
    async fn get_owned_hub(&self, hub_id: &str, user_id: &str) -> Result<Option<Hub>>;

    async fn get_hub_by_slug(&self, slug: &str) -> Result<Option<Hub>>;

    /// List hubs with link and click counters, newest first.
    /// `None` lists the hubs of every user.
    async fn list_hubs(&self, user_id: Option<&str>) -> Result<Vec<HubSummary>>;

    /// Update an owned hub. When `links` is given the whole link set (and the
    /// rules of each link) is replaced in the same transaction.
    ///
    /// Fails with `NotFound` when the hub does not exist or is not owned by
    /// `user_id`, and with `Conflict` when the new slug belongs to another hub.
    async fn update_hub(
        &self,
        hub_id: &str,
        user_id: &str,
        changes: &HubChanges,
        links: Option<&[NewLink]>,
    ) -> StorageResult<Hub>;

    /// Delete an owned hub with its links, rules and analytics
    async fn delete_hub(&self, hub_id: &str, user_id: &str) -> Result<bool>;

    /// Links of a hub with their rules, in insertion order.
    /// Callers sort by position.
    async fn list_links(&self, hub_id: &str) -> Result<Vec<LinkWithRules>>;

    /// Persist new positions, given as `(link_id, position)` pairs
    async fn update_link_positions(&self, hub_id: &str, positions: &[(String, i64)])
        -> Result<()>;

    /// Append one analytics event
    async fn insert_event(&self, event: &AnalyticsEvent) -> Result<()>;

    /// Events of a hub at or after `since` (all events when `None`), oldest first
    async fn list_events(&self, hub_id: &str, since: Option<i64>) -> Result<Vec<AnalyticsEvent>>;

    /// Event counts of a hub at or after `since` (all events when `None`),
    /// grouped by event type, link, device and UTC day
    async fn event_rollups(&self, hub_id: &str, since: Option<i64>) -> Result<Vec<EventRollup>>;

    /// Delete events recorded before `before`. Returns the number removed.
    async fn prune_events(&self, before: i64) -> Result<u64>;
}
