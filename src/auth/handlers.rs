use axum::{
    extract::State,
    http::{
        header::{RETRY_AFTER, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, ProfileResponse, RegisterForm},
        error::{AuthError, RegisterError},
        extractors::{session_cookie, SessionUser},
    },
    config::SessionConfig,
    state::AppState,
};

const PROFILE_PAGE: &str = "/profile";
const LOGIN_PAGE: &str = "/index.html";
const INVALID_CREDENTIALS_PAGE: &str = "/index.html?error=invalid_credentials";
const SERVER_ERROR_PAGE: &str = "/index.html?error=server_error";
const RETRY_AFTER_SECS: &str = "5";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(profile))
}

#[instrument(skip(state, form))]
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    match state
        .auth
        .register(&form.username, &form.password, &form.email)
        .await
    {
        Ok(_) => (
            StatusCode::CREATED,
            Html("<h2>User registered successfully!</h2>"),
        )
            .into_response(),
        Err(e) => register_failure(&e),
    }
}

fn register_failure(err: &RegisterError) -> Response {
    if err.is_retryable() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(RETRY_AFTER, RETRY_AFTER_SECS)],
            Html("<h2>Service temporarily unavailable</h2>"),
        )
            .into_response();
    }
    match err {
        RegisterError::Validation(v) => (
            StatusCode::BAD_REQUEST,
            Html(format!("<h2>Registration failed</h2><p>{v}</p>")),
        )
            .into_response(),
        RegisterError::UsernameTaken => (
            StatusCode::CONFLICT,
            Html("<h2>Registration failed</h2><p>username is already taken</p>".to_string()),
        )
            .into_response(),
        RegisterError::StorageUnavailable | RegisterError::Internal => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h2>Something went wrong</h2>".to_string()),
        )
            .into_response(),
    }
}

#[instrument(skip(state, form))]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let token = match state.auth.authenticate(&form.username, &form.password).await {
        Ok(t) => t,
        Err(AuthError::InvalidCredentials) => {
            return Redirect::to(INVALID_CREDENTIALS_PAGE).into_response()
        }
        Err(e) => {
            warn!(retryable = e.is_retryable(), "login failed server side");
            return Redirect::to(SERVER_ERROR_PAGE).into_response();
        }
    };

    if let Err(e) = state.sessions.save(&token).await {
        error!(error = %e, user_id = %token.user_id, "persist session failed");
        return Redirect::to(SERVER_ERROR_PAGE).into_response();
    }

    let max_age = (token.expires_at - OffsetDateTime::now_utc())
        .whole_seconds()
        .max(0);
    let cookie = set_cookie(&state.config.session, token.value(), max_age);
    ([(SET_COOKIE, cookie)], Redirect::to(PROFILE_PAGE)).into_response()
}

#[instrument(skip(state, headers))]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cfg = &state.config.session;
    if let Some(token) = session_cookie(&headers, &cfg.cookie_name) {
        if let Err(e) = state.sessions.revoke(&token).await {
            error!(error = %e, "revoke session failed");
            return Redirect::to(SERVER_ERROR_PAGE).into_response();
        }
    }
    ([(SET_COOKIE, set_cookie(cfg, "", 0))], Redirect::to(LOGIN_PAGE)).into_response()
}

#[instrument(skip_all)]
pub async fn profile(SessionUser(session): SessionUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user_id: session.user_id,
        username: session.username,
        session_expires_at: session.expires_at,
    })
}

fn set_cookie(cfg: &SessionConfig, value: &str, max_age: i64) -> String {
    let secure = if cfg.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        cfg.cookie_name, value, max_age, secure
    )
}
