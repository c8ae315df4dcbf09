//! In-process stores used by tests in place of Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::error::StoreError;
use crate::auth::repo::CredentialStore;
use crate::auth::repo_types::{User, UserId};
use crate::auth::session::{hash_token, SessionRecord, SessionStore, SessionToken};

#[derive(Default)]
struct Users {
    by_name: HashMap<String, User>,
    next_id: i64,
}

/// Mirrors the `users` table: ids from 1, unique usernames.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<Users>,
    calls: AtomicUsize,
    down: AtomicBool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every following call fail as if the database were unreachable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn stored(&self, username: &str) -> Option<User> {
        self.users.lock().unwrap().by_name.get(username).cloned()
    }

    pub fn username_of(&self, id: UserId) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .by_name
            .values()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.enter()?;
        Ok(self.stored(username))
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        email: &str,
    ) -> Result<UserId, StoreError> {
        self.enter()?;
        let mut users = self.users.lock().unwrap();
        if users.by_name.contains_key(username) {
            return Err(StoreError::DuplicateUsername);
        }
        users.next_id += 1;
        let id = UserId(users.next_id);
        users.by_name.insert(
            username.to_string(),
            User {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                email: email.to_string(),
                created_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(id)
    }
}

/// Session table keyed by token digest. Usernames are looked up in the
/// paired credential store, like the SQL join.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Vec<u8>, (UserId, OffsetDateTime)>>,
    users: std::sync::Arc<MemoryCredentialStore>,
}

impl MemorySessionStore {
    pub fn new(users: std::sync::Arc<MemoryCredentialStore>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            users,
        }
    }

    /// Number of session rows held, live or expired.
    pub fn stored_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, token: &SessionToken) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|_, (user_id, expires_at)| *user_id != token.user_id || *expires_at > now);
        sessions.insert(hash_token(token.value()), (token.user_id, token.expires_at));
        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let found = self.sessions.lock().unwrap().get(&hash_token(token)).copied();
        let Some((user_id, expires_at)) = found else {
            return Ok(None);
        };
        if OffsetDateTime::now_utc() >= expires_at {
            return Ok(None);
        }
        Ok(self.users.username_of(user_id).map(|username| SessionRecord {
            user_id,
            username,
            expires_at,
        }))
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().remove(&hash_token(token));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::Duration as TimeDuration;

    #[tokio::test]
    async fn save_drops_the_owners_expired_sessions() {
        let users = Arc::new(MemoryCredentialStore::new());
        let alice = users.insert("alice", "h", "a@x.com").await.unwrap();
        let bob = users.insert("bob", "h", "b@x.com").await.unwrap();
        let sessions = MemorySessionStore::new(users);

        for _ in 0..50 {
            let dead = SessionToken::issue(alice, TimeDuration::minutes(-1));
            sessions.save(&dead).await.unwrap();
            assert!(sessions.resolve(dead.value()).await.unwrap().is_none());
        }
        let bobs_dead = SessionToken::issue(bob, TimeDuration::minutes(-1));
        sessions.save(&bobs_dead).await.unwrap();
        // only the most recent expired row per user survives until its owner logs in again
        assert_eq!(sessions.stored_sessions(), 2);

        let live = SessionToken::issue(alice, TimeDuration::minutes(30));
        sessions.save(&live).await.unwrap();
        assert_eq!(sessions.stored_sessions(), 2);
        assert_eq!(sessions.resolve(live.value()).await.unwrap().unwrap().user_id, alice);

        let second = SessionToken::issue(alice, TimeDuration::minutes(30));
        sessions.save(&second).await.unwrap();
        assert_eq!(sessions.stored_sessions(), 3);
        assert!(sessions.resolve(live.value()).await.unwrap().is_some());
    }
}
