//! Bearer-token authentication
//!
//! The token is the user's id. The middleware only checks that such a user
//! exists; there is no signature or expiry.

pub mod password;

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::models::User;
use crate::storage::Storage;

/// The authenticated caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

pub struct AuthService {
    storage: Arc<dyn Storage>,
}

impl AuthService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Resolve a bearer token to a user, `None` when no user matches
    pub async fn authenticate(&self, token: &str) -> anyhow::Result<Option<User>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.storage.get_user(token).await
    }
}

/// Query-string fallback for the token, used by browser downloads that
/// cannot set headers
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub authorization: Option<String>,
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
        .filter(|v| !v.is_empty())
}

pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    Query(query): Query<TokenQuery>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers())
        .map(str::to_string)
        .or(query.authorization);

    let Some(token) = token else {
        return ApiError::Unauthorized.into_response();
    };

    match auth_service.authenticate(&token).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
        Ok(None) => ApiError::Unauthorized.into_response(),
        Err(e) => ApiError::Internal(e).into_response(),
    }
}
