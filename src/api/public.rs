//! Public hub page data

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use super::handlers::AppState;
use crate::analytics::{record_event, EventType, NewEvent};
use crate::models::LinkWithRules;
use crate::ordering;
use crate::rules::{should_show, DeviceType, VisitorContext};

#[derive(Debug, Default, Deserialize)]
pub struct PublicQuery {
    /// Device type reported by the client
    pub device: Option<String>,
    /// Viewport width in CSS pixels; takes precedence over `device`
    pub width: Option<u32>,
    /// Also record a visit for this page load
    #[serde(default)]
    pub track: bool,
}

impl PublicQuery {
    /// Device classification at the collection boundary. Anything
    /// unrecognized is treated as desktop.
    pub fn device_type(&self) -> DeviceType {
        if let Some(width) = self.width {
            return DeviceType::from_width(width);
        }
        self.device
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct PublicHub {
    pub title: String,
    pub description: Option<String>,
    pub theme: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct PublicLink {
    pub id: String,
    pub title: String,
    pub url: String,
    pub icon: String,
}

#[derive(Debug, Serialize)]
pub struct PublicHubResponse {
    pub hub: PublicHub,
    pub links: Vec<PublicLink>,
}

/// Active links visible to a visitor in `ctx`, in display order
pub fn visible_links(mut links: Vec<LinkWithRules>, ctx: &VisitorContext) -> Vec<PublicLink> {
    ordering::sort_by_position(&mut links);

    links
        .into_iter()
        .filter(|l| l.link.is_active && should_show(&l.display_rules(), ctx))
        .map(|l| PublicLink {
            id: l.link.id,
            title: l.link.title,
            url: l.link.url,
            icon: l.link.icon,
        })
        .collect()
}

/// Get a hub's public page: active links whose rules pass for this visitor
pub async fn public_hub(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<PublicQuery>,
) -> Result<Json<PublicHubResponse>, ApiError> {
    let hub = state
        .storage
        .get_hub_by_slug(&slug)
        .await?
        .ok_or_else(ApiError::hub_not_found)?;

    let ctx = VisitorContext {
        current_hour: Local::now().hour(),
        device: query.device_type(),
    };

    if query.track {
        // Tracking must never hold up or fail the page
        let storage = Arc::clone(&state.storage);
        let slug = hub.slug.clone();
        let device = ctx.device;
        tokio::spawn(async move {
            let event = NewEvent {
                link_id: None,
                event_type: EventType::Visit,
                device_type: Some(device.to_string()),
                timestamp: None,
            };
            if let Err(e) = record_event(storage.as_ref(), &slug, event).await {
                tracing::warn!(slug = %slug, error = %e, "failed to record visit");
            }
        });
    }

    let links = state.storage.list_links(&hub.id).await?;
    let links = visible_links(links, &ctx);

    Ok(Json(PublicHubResponse {
        hub: PublicHub {
            title: hub.title,
            description: hub.description,
            theme: hub.theme,
            slug: hub.slug,
        },
        links,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Link, StoredRule};

    fn link(id: &str, position: i64, is_active: bool, rules: &[(&str, &str)]) -> LinkWithRules {
        LinkWithRules {
            link: Link {
                id: id.to_string(),
                hub_id: "hub".to_string(),
                title: id.to_uppercase(),
                url: format!("https://example.com/{id}"),
                icon: "🔗".to_string(),
                position,
                is_active,
                created_at: 0,
            },
            rules: rules
                .iter()
                .enumerate()
                .map(|(i, (rule_type, config))| StoredRule {
                    id: format!("{id}-r{i}"),
                    link_id: id.to_string(),
                    rule_type: rule_type.to_string(),
                    rule_config: config.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_visible_links_filters_and_orders() {
        let links = vec![
            link("evening", 2, true, &[("time", r#"{"startHour":18,"endHour":23}"#)]),
            link("always", 0, true, &[]),
            link("hidden", 1, false, &[]),
            link("phones", 3, true, &[("device", r#"{"devices":["mobile"]}"#)]),
        ];

        let ctx = VisitorContext {
            current_hour: 19,
            device: DeviceType::Mobile,
        };
        let ids: Vec<String> = visible_links(links.clone(), &ctx)
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["always", "evening", "phones"]);

        let ctx = VisitorContext {
            current_hour: 9,
            device: DeviceType::Desktop,
        };
        let ids: Vec<String> = visible_links(links, &ctx).into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["always"]);
    }

    #[test]
    fn test_device_from_query() {
        let query = PublicQuery {
            device: Some("mobile".to_string()),
            width: Some(1440),
            track: false,
        };
        assert_eq!(query.device_type(), DeviceType::Desktop);

        let query = PublicQuery {
            device: Some("tablet".to_string()),
            ..Default::default()
        };
        assert_eq!(query.device_type(), DeviceType::Tablet);

        assert_eq!(PublicQuery::default().device_type(), DeviceType::Desktop);
    }
}
