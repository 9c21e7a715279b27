//! Analytics API handlers

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use super::handlers::{AppState, SuccessResponse};
use crate::analytics::{
    build_export, build_report, record_event, AnalyticsRange, AnalyticsResponse, EventType,
    ExportFormat, NewEvent,
};
use crate::auth::AuthUser;
use crate::models::Hub;
use crate::storage::StorageError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub slug: Option<String>,
    pub link_id: Option<String>,
    pub event_type: Option<String>,
    pub device_type: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQueryParams {
    /// `24h`, `7d` (default), `30d` or `all`
    pub range: Option<String>,
    /// Export only: `csv` (default) or `json`
    pub format: Option<String>,
}

impl AnalyticsQueryParams {
    fn range(&self) -> Result<AnalyticsRange, ApiError> {
        match self.range.as_deref() {
            None | Some("") => Ok(AnalyticsRange::default()),
            Some(r) => r.parse().map_err(ApiError::InvalidInput),
        }
    }

    fn format(&self) -> Result<ExportFormat, ApiError> {
        match self.format.as_deref() {
            None | Some("") | Some("csv") => Ok(ExportFormat::Csv),
            Some("json") => Ok(ExportFormat::Json),
            Some(other) => Err(ApiError::invalid(format!(
                "unknown format '{other}'. Supported values: csv, json"
            ))),
        }
    }
}

async fn owned_hub(state: &AppState, hub_id: &str, user_id: &str) -> Result<Hub, ApiError> {
    state
        .storage
        .get_owned_hub(hub_id, user_id)
        .await?
        .ok_or_else(ApiError::hub_not_found)
}

/// Record a visit or click reported by a hub page
pub async fn track_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrackRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let slug = payload.slug.filter(|s| !s.trim().is_empty());
    let event_type = payload.event_type.filter(|t| !t.trim().is_empty());
    let (Some(slug), Some(event_type)) = (slug, event_type) else {
        return Err(ApiError::invalid("Slug and eventType are required"));
    };
    let event_type: EventType = event_type.parse().map_err(ApiError::InvalidInput)?;

    let event = NewEvent {
        link_id: payload.link_id,
        event_type,
        device_type: payload.device_type,
        timestamp: payload.timestamp,
    };

    match record_event(state.storage.as_ref(), &slug, event).await {
        Ok(_) => Ok(Json(SuccessResponse { success: true })),
        Err(StorageError::NotFound) => Err(ApiError::hub_not_found()),
        Err(e) => Err(e.into()),
    }
}

/// Get the analytics report for one of the caller's hubs
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(hub_id): Path<String>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let range = params.range()?;
    let hub = owned_hub(&state, &hub_id, &user.id).await?;

    let report = build_report(state.storage.as_ref(), &hub.id, range, Utc::now()).await?;

    Ok(Json(AnalyticsResponse::from((range, report))))
}

/// Download the report and raw event log as CSV or JSON
pub async fn export_analytics(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(hub_id): Path<String>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Response, ApiError> {
    let range = params.range()?;
    let format = params.format()?;
    let hub = owned_hub(&state, &hub_id, &user.id).await?;

    let export = build_export(state.storage.as_ref(), &hub, range, Utc::now()).await?;
    let body = export.render(format)?;
    let disposition = format!("attachment; filename=\"{}\"", export.file_name(format));

    tracing::info!(
        hub_id = %hub.id,
        range = %range,
        events = export.events.len(),
        "exported analytics"
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
