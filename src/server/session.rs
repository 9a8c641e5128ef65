use super::error::ApiError;
use super::state::ServerState;
use crate::user::user_models::UserRole;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

/// Claims of a verified bearer token. Stateless: role changes take effect
/// on the next login, freezing is checked against the database on writes.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

pub fn extract_bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(HEADER_SESSION_TOKEN_KEY)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

fn extract_session(parts: &Parts, ctx: &ServerState) -> Option<Session> {
    let token = extract_bearer_token(parts)?;
    let claims = match ctx.auth_keys.verify_token(&token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!("Token verification failed: {}", err);
            return None;
        }
    };
    Some(Session {
        user_id: claims.sub,
        username: claims.username,
        role: UserRole::from_str(&claims.role).unwrap_or(UserRole::User),
    })
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session(parts, ctx).ok_or(ApiError::NotAuthenticated)
    }
}

impl axum::extract::OptionalFromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(extract_session(parts, ctx))
    }
}

/// A session with the admin role; anything else is rejected with 403.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

impl FromRequestParts<ServerState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, ctx).await?;
        if !session.is_admin() {
            return Err(ApiError::AdminOnly);
        }
        Ok(AdminSession(session))
    }
}
