use std::{net::SocketAddr, time::Duration};

use anyhow::{ensure, Context};
use serde::Deserialize;
use time::Duration as TimeDuration;

/// Thirty days.
pub const MAX_SESSION_TTL_MINUTES: i64 = 30 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl DbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_minutes: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl SessionConfig {
    pub fn ttl(&self) -> TimeDuration {
        TimeDuration::minutes(self.ttl_minutes)
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server: ServerConfig,
    pub db: DbConfig,
    pub session: SessionConfig,
    pub password: PasswordConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let server = ServerConfig {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
        };
        let db = DbConfig {
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            timeout_secs: env_or("DB_TIMEOUT_SECS", 5),
        };
        let session = SessionConfig {
            ttl_minutes: env_or("SESSION_TTL_MINUTES", 30),
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "loginkit_session".into()),
            cookie_secure: env_or("SESSION_COOKIE_SECURE", false),
        };
        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: env_or("ARGON2_PARALLELISM", defaults.parallelism),
        };
        let config = Self {
            database_url,
            server,
            db,
            session,
            password,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let ttl = self.session.ttl_minutes;
        ensure!(
            (1..=MAX_SESSION_TTL_MINUTES).contains(&ttl),
            "SESSION_TTL_MINUTES must be between 1 and {MAX_SESSION_TTL_MINUTES}, got {ttl}"
        );
        ensure!(self.db.timeout_secs > 0, "DB_TIMEOUT_SECS must be positive");
        ensure!(self.db.max_connections > 0, "DB_MAX_CONNECTIONS must be positive");
        self.server.addr()?;
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
