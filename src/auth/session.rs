use std::{fmt, time::Duration};

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use time::{Duration as TimeDuration, OffsetDateTime};

use crate::auth::error::StoreError;
use crate::auth::repo_types::UserId;
use crate::db::timed;

const TOKEN_BYTES: usize = 32;

/// Opaque session credential issued after a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    pub user_id: UserId,
    pub expires_at: OffsetDateTime,
}

impl SessionToken {
    /// 256 random bits, base64url without padding.
    pub fn issue(user_id: UserId, ttl: TimeDuration) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self {
            value: Base64UrlUnpadded::encode_string(&bytes),
            user_id,
            expires_at: OffsetDateTime::now_utc() + ttl,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Only the digest of a token is ever persisted.
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// A live session resolved from a presented token.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub username: String,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `token` and drops the owner's sessions that have already expired.
    async fn save(&self, token: &SessionToken) -> Result<(), StoreError>;

    /// Returns `None` for unknown and expired tokens alike.
    async fn resolve(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;

    async fn revoke(&self, token: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
    timeout: Duration,
}

impl PgSessionStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save(&self, token: &SessionToken) -> Result<(), StoreError> {
        // Expired rows of the same user go in the same statement.
        let query = sqlx::query(
            r#"
            WITH purged AS (
                DELETE FROM sessions
                WHERE user_id = $2 AND expires_at <= NOW()
            )
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(hash_token(token.value()))
        .bind(token.user_id)
        .bind(token.expires_at)
        .execute(&self.db);
        timed(self.timeout, "save_session", query).await?;
        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let query = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT s.user_id, u.username, s.expires_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.db);
        timed(self.timeout, "resolve_session", query).await
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        let query = sqlx::query(r#"DELETE FROM sessions WHERE token_hash = $1"#)
            .bind(hash_token(token))
            .execute(&self.db);
        timed(self.timeout, "revoke_session", query).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_are_unique_and_long() {
        let a = SessionToken::issue(UserId(1), TimeDuration::minutes(30));
        let b = SessionToken::issue(UserId(1), TimeDuration::minutes(30));
        assert_ne!(a.value(), b.value());
        // 32 bytes -> 43 base64url chars
        assert_eq!(a.value().len(), 43);
        assert!(a.value().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn token_bound_to_user_and_expiry() {
        let before = OffsetDateTime::now_utc();
        let t = SessionToken::issue(UserId(7), TimeDuration::minutes(30));
        assert_eq!(t.user_id, UserId(7));
        assert!(t.expires_at > before + TimeDuration::minutes(29));
        assert!(t.expires_at <= OffsetDateTime::now_utc() + TimeDuration::minutes(30));
    }

    #[test]
    fn debug_hides_token_value() {
        let t = SessionToken::issue(UserId(1), TimeDuration::minutes(1));
        assert!(!format!("{t:?}").contains(t.value()));
    }

    #[test]
    fn hash_token_is_stable_sha256() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert_eq!(hash_token("abc").len(), 32);
    }
}
