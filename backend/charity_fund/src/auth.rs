//! Bearer-token authentication extractors.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::ApiState;
use crate::db;
use crate::errors::AppError;
use crate::models::User;

/// Any registered user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// A user with superuser privileges.
#[derive(Debug, Clone)]
pub struct Superuser(pub User);

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let user = db::user_by_token(&state.pool, token)
            .await?
            .ok_or(AppError::Unauthorized)?;
        debug!("Authenticated user #{}", user.id);
        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for Superuser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            return Err(AppError::Forbidden);
        }
        Ok(Superuser(user))
    }
}
