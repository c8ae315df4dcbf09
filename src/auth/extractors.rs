use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts, HeaderMap, StatusCode},
};
use tracing::error;

use super::session::SessionRecord;
use crate::state::AppState;

/// Resolves the session cookie into the signed-in user.
pub struct SessionUser(pub SessionRecord);

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_cookie(&parts.headers, &state.config.session.cookie_name)
            .ok_or((StatusCode::UNAUTHORIZED, "not signed in".into()))?;

        match state.sessions.resolve(&token).await {
            Ok(Some(record)) => Ok(SessionUser(record)),
            Ok(None) => Err((StatusCode::UNAUTHORIZED, "not signed in".into())),
            Err(e) => {
                error!(error = %e, "session lookup failed");
                Err((StatusCode::SERVICE_UNAVAILABLE, "try again later".into()))
            }
        }
    }
}

/// Value of cookie `name`, if present and non-empty.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
