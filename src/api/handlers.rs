use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::models::hub::DEFAULT_THEME;
use crate::models::link::DEFAULT_ICON;
use crate::models::{Hub, HubChanges, HubSummary, LinkWithRules, NewHub, NewLink, NewRule, User};
use crate::ordering::{self, Direction};
use crate::storage::{Storage, StorageError};

/// Longest accepted hub slug
pub const MAX_SLUG_LENGTH: usize = 64;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RuleInput {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInput {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub position: Option<i64>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub rules: Vec<RuleInput>,
}

#[derive(Debug, Deserialize)]
pub struct HubRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub theme: Option<String>,
    pub links: Option<Vec<LinkInput>>,
}

#[derive(Serialize)]
pub struct HubResponse {
    pub hub: Hub,
}

#[derive(Serialize)]
pub struct HubDetailResponse {
    pub hub: Hub,
    pub links: Vec<LinkWithRules>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubListResponse {
    pub hubs: Vec<HubSummary>,
    pub total_clicks: i64,
    pub total_links: i64,
}

#[derive(Debug, Deserialize)]
pub struct MoveLinkRequest {
    pub direction: Direction,
}

#[derive(Serialize)]
pub struct LinksResponse {
    pub links: Vec<LinkWithRules>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.len() > MAX_SLUG_LENGTH {
        return Err(ApiError::invalid(format!(
            "Slug must be at most {MAX_SLUG_LENGTH} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::invalid(
            "Slug may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

/// Validate a submitted link set and give it dense positions.
///
/// A link without a position keeps its place in the submitted list.
fn prepare_links(inputs: Vec<LinkInput>) -> Result<Vec<NewLink>, ApiError> {
    let mut links = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.into_iter().enumerate() {
        let (Some(title), Some(url)) = (non_empty(input.title), non_empty(input.url)) else {
            return Err(ApiError::invalid("Link title and url are required"));
        };

        let mut rules = Vec::with_capacity(input.rules.len());
        for rule in input.rules {
            let rule_type = rule.rule_type.trim().to_string();
            if rule_type.is_empty() {
                return Err(ApiError::invalid("Rule type is required"));
            }
            rules.push(NewRule {
                rule_type,
                config: rule.config,
            });
        }

        links.push(NewLink {
            id: input.id,
            title,
            url,
            icon: non_empty(input.icon).unwrap_or_else(|| DEFAULT_ICON.to_string()),
            position: input.position.unwrap_or(index as i64),
            is_active: input.is_active.unwrap_or(true),
            rules,
        });
    }

    ordering::normalize(&mut links);
    Ok(links)
}

async fn owned_hub(state: &AppState, hub_id: &str, user: &User) -> Result<Hub, ApiError> {
    state
        .storage
        .get_owned_hub(hub_id, &user.id)
        .await?
        .ok_or_else(ApiError::hub_not_found)
}

async fn sorted_links(state: &AppState, hub_id: &str) -> Result<Vec<LinkWithRules>, ApiError> {
    let mut links = state.storage.list_links(hub_id).await?;
    ordering::sort_by_position(&mut links);
    Ok(links)
}

/// Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let (Some(email), Some(password)) = (non_empty(payload.email), payload.password) else {
        return Err(ApiError::invalid("Email and password are required"));
    };
    if password.is_empty() {
        return Err(ApiError::invalid("Email and password are required"));
    }

    let name = non_empty(payload.name);

    match state
        .storage
        .create_user(&email, &hash_password(&password), name.as_deref())
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "registered user");
            Ok(Json(UserResponse { user }))
        }
        Err(StorageError::Conflict) => {
            Err(ApiError::Conflict("Email already registered".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Exchange email and password for the user record whose id is the bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let (Some(email), Some(password)) = (non_empty(payload.email), payload.password) else {
        return Err(ApiError::invalid("Email and password are required"));
    };

    match state.storage.get_user_by_email(&email).await? {
        Some(user) if verify_password(&password, &user.password_hash) => {
            Ok(Json(UserResponse { user }))
        }
        _ => Err(ApiError::InvalidCredentials),
    }
}

/// List the caller's hubs with dashboard counters
pub async fn list_hubs(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<HubListResponse>, ApiError> {
    let hubs = state.storage.list_hubs(Some(&user.id)).await?;
    let total_clicks = hubs.iter().map(|h| h.click_count).sum();
    let total_links = hubs.iter().map(|h| h.link_count).sum();

    Ok(Json(HubListResponse {
        hubs,
        total_clicks,
        total_links,
    }))
}

/// Create a hub together with its links
pub async fn create_hub(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(payload): Json<HubRequest>,
) -> Result<Json<HubResponse>, ApiError> {
    let (Some(title), Some(slug)) = (non_empty(payload.title), non_empty(payload.slug)) else {
        return Err(ApiError::invalid("Title and slug are required"));
    };
    validate_slug(&slug)?;

    let links = prepare_links(payload.links.unwrap_or_default())?;
    let new_hub = NewHub {
        slug,
        title,
        description: non_empty(payload.description),
        theme: non_empty(payload.theme).unwrap_or_else(|| DEFAULT_THEME.to_string()),
    };

    match state.storage.create_hub(&user.id, &new_hub, &links).await {
        Ok(hub) => {
            tracing::info!(hub_id = %hub.id, slug = %hub.slug, links = links.len(), "created hub");
            Ok(Json(HubResponse { hub }))
        }
        Err(StorageError::Conflict) => Err(ApiError::Conflict("Slug already taken".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Get one of the caller's hubs with its links and rules
pub async fn get_hub(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(hub_id): Path<String>,
) -> Result<Json<HubDetailResponse>, ApiError> {
    let hub = owned_hub(&state, &hub_id, &user).await?;
    let links = sorted_links(&state, &hub.id).await?;
    Ok(Json(HubDetailResponse { hub, links }))
}

/// Update a hub. A `links` array replaces the whole link set.
pub async fn update_hub(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(hub_id): Path<String>,
    Json(payload): Json<HubRequest>,
) -> Result<Json<HubResponse>, ApiError> {
    let slug = non_empty(payload.slug);
    if let Some(slug) = &slug {
        validate_slug(slug)?;
    }

    let links = payload.links.map(prepare_links).transpose()?;
    let changes = HubChanges {
        slug,
        title: non_empty(payload.title),
        description: payload.description.map(|d| d.trim().to_string()),
        theme: non_empty(payload.theme),
    };

    match state
        .storage
        .update_hub(&hub_id, &user.id, &changes, links.as_deref())
        .await
    {
        Ok(hub) => {
            tracing::info!(hub_id = %hub.id, replaced_links = links.is_some(), "updated hub");
            Ok(Json(HubResponse { hub }))
        }
        Err(StorageError::NotFound) => Err(ApiError::hub_not_found()),
        Err(StorageError::Conflict) => Err(ApiError::Conflict("Slug already taken".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Delete a hub with its links, rules and analytics
pub async fn delete_hub(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(hub_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if state.storage.delete_hub(&hub_id, &user.id).await? {
        tracing::info!(hub_id = %hub_id, "deleted hub");
        Ok(Json(SuccessResponse { success: true }))
    } else {
        Err(ApiError::hub_not_found())
    }
}

/// Move a link one step up or down and renumber the hub's links
pub async fn move_link(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((hub_id, link_id)): Path<(String, String)>,
    Json(payload): Json<MoveLinkRequest>,
) -> Result<Json<LinksResponse>, ApiError> {
    let hub = owned_hub(&state, &hub_id, &user).await?;
    let mut links = sorted_links(&state, &hub.id).await?;

    let index = links
        .iter()
        .position(|l| l.link.id == link_id)
        .ok_or_else(|| ApiError::NotFound("Link not found".to_string()))?;

    ordering::move_item(&mut links, index, payload.direction);

    let positions: Vec<(String, i64)> = links
        .iter()
        .map(|l| (l.link.id.clone(), l.link.position))
        .collect();
    state
        .storage
        .update_link_positions(&hub.id, &positions)
        .await?;

    Ok(Json(LinksResponse { links }))
}

/// Health check endpoint
pub async fn health_check() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "OK".to_string(),
    })
}
