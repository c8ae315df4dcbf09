use std::sync::Arc;

use time::Duration as TimeDuration;
use tracing::{error, info, instrument, warn};

use crate::auth::{
    error::{AuthError, RegisterError, StoreError},
    password::PasswordHashing,
    repo::CredentialStore,
    repo_types::UserId,
    session::SessionToken,
    validation::{has_control, validate_email, validate_password, validate_username},
};

/// Registration and credential verification on top of a [`CredentialStore`].
///
/// Holds no per-request state; one instance is shared by all handlers.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hashing: Arc<PasswordHashing>,
    session_ttl: TimeDuration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hashing: PasswordHashing,
        session_ttl: TimeDuration,
    ) -> Self {
        Self {
            store,
            hashing: Arc::new(hashing),
            session_ttl,
        }
    }

    /// Creates a user. Nothing touches the store until all fields validate.
    #[instrument(skip(self, password, email))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<UserId, RegisterError> {
        let email = email.trim();
        validate_username(username)?;
        validate_password(password)?;
        validate_email(email)?;

        let hashing = Arc::clone(&self.hashing);
        let plain = password.to_owned();
        let hash = match tokio::task::spawn_blocking(move || hashing.hash(&plain)).await {
            Ok(Ok(h)) => h,
            Ok(Err(e)) => {
                error!(error = %e, "password hashing failed");
                return Err(RegisterError::Internal);
            }
            Err(e) => {
                error!(error = %e, "hashing task failed");
                return Err(RegisterError::Internal);
            }
        };

        let user_id = match self.store.insert(username, &hash, email).await {
            Ok(id) => id,
            Err(StoreError::DuplicateUsername) => {
                warn!("username already registered");
                return Err(RegisterError::UsernameTaken);
            }
            Err(e) => {
                error!(error = %e, "insert user failed");
                return Err(e.into());
            }
        };

        info!(user_id = %user_id, "user registered");
        Ok(user_id)
    }

    /// Verifies credentials and issues a session token.
    ///
    /// Unknown usernames and wrong passwords produce the same
    /// [`AuthError::InvalidCredentials`] after the same amount of argon2 work.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, AuthError> {
        // Registered names never contain control characters, and the database
        // rejects NUL outright, so such names skip the lookup as unknown.
        let user = if has_control(username) {
            None
        } else {
            self.store.find_by_username(username).await.map_err(|e| {
                error!(error = %e, "credential lookup failed");
                AuthError::from(e)
            })?
        };

        let hashing = Arc::clone(&self.hashing);
        let plain = password.to_owned();
        let stored = user.as_ref().map(|u| u.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hashing.verify(&plain, &hash),
            None => {
                hashing.verify_dummy(&plain);
                Ok(false)
            }
        })
        .await;

        let matched = match verified {
            Ok(Ok(m)) => m,
            Ok(Err(e)) => {
                error!(error = %e, "stored password hash is unreadable");
                return Err(AuthError::Internal);
            }
            Err(e) => {
                error!(error = %e, "verification task failed");
                return Err(AuthError::Internal);
            }
        };

        let Some(user) = user.filter(|_| matched) else {
            warn!("authentication failed");
            return Err(AuthError::InvalidCredentials);
        };

        let token = SessionToken::issue(user.id, self.session_ttl);
        info!(user_id = %user.id, expires_at = %token.expires_at, "user authenticated");
        Ok(token)
    }
}
