use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo_types::UserId;

/// Form body for `POST /register`. Missing fields arrive empty and fail validation.
#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

/// Form body for `POST /login`.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Signed-in user as returned by `GET /profile`.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: UserId,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub session_expires_at: OffsetDateTime,
}
