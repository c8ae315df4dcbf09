use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::error::StoreError;
use crate::auth::repo_types::{User, UserId};
use crate::db::timed;

/// Persistent mapping from username to password hash and profile data.
///
/// Implementations must be safe to share between concurrent requests, and
/// `insert` must be atomic with respect to the username uniqueness check.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        email: &str,
    ) -> Result<UserId, StoreError>;
}

/// `users` table behind a connection pool.
#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
    timeout: Duration,
}

impl PgCredentialStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db);
        timed(self.timeout, "find_by_username", query).await
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        email: &str,
    ) -> Result<UserId, StoreError> {
        let query = sqlx::query_scalar::<_, UserId>(
            r#"
            INSERT INTO users (username, password_hash, email)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .fetch_one(&self.db);
        timed(self.timeout, "insert_user", query).await
    }
}
