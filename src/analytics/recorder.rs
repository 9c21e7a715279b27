//! Append-only event recording

use chrono::Utc;

use crate::analytics::models::{AnalyticsEvent, EventType, NewEvent, UNKNOWN_DEVICE};
use crate::storage::{Storage, StorageError, StorageResult};

/// Record one event for the hub published under `hub_slug`.
///
/// Fails with `NotFound` when no hub has that slug. Visit events never carry a
/// link id; one supplied with a visit is dropped.
pub async fn record_event(
    storage: &dyn Storage,
    hub_slug: &str,
    event: NewEvent,
) -> StorageResult<AnalyticsEvent> {
    let hub = storage
        .get_hub_by_slug(hub_slug)
        .await?
        .ok_or(StorageError::NotFound)?;

    let link_id = match event.event_type {
        EventType::Visit => None,
        EventType::Click => event.link_id.filter(|id| !id.is_empty()),
    };

    let device_type = event
        .device_type
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());

    let occurred_at = event.timestamp.unwrap_or_else(Utc::now).timestamp();

    let stored = AnalyticsEvent {
        id: uuid::Uuid::new_v4().to_string(),
        hub_id: hub.id,
        link_id,
        event_type: event.event_type.as_str().to_string(),
        device_type,
        occurred_at,
    };

    storage.insert_event(&stored).await?;

    Ok(stored)
}
