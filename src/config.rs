use std::env;

use crate::auth::TokenConfig;

/// Fallback signing secret for local runs. Anyone reading this source can
/// forge tokens with it; startup logs a warning whenever it is in use.
pub const LOCAL_JWT_SECRET: &str = "kidlearn-local-development-secret";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://kidlearn.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 24 * 60;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once
/// loaded; request handling only sees the `TokenConfig` slice of it.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and secret handling.
    pub env: Env,
    // SQLite connection string, or "memory" for the in-process store.
    pub db_url: String,
    // HS256 signing secret for bearer tokens.
    pub jwt_secret: String,
    // Lifetime of issued tokens.
    pub token_ttl_minutes: i64,
    // Address the HTTP server listens on.
    pub bind_addr: String,
    // Insert demo users and materials into an empty database at startup.
    pub seed_demo_data: bool,
}

/// Env
///
/// Runtime context: developer conveniences in Local, strict secrets and JSON
/// logs in Production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("db_url", &self.db_url)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("bind_addr", &self.bind_addr)
            .field("seed_demo_data", &self.seed_demo_data)
            .finish()
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests: in-memory storage, no seeding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: "memory".to_string(),
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            bind_addr: "127.0.0.1:0".to_string(),
            seed_demo_data: false,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every setting from the environment and fails fast on anything
    /// that would leave production misconfigured.
    ///
    /// # Panics
    /// Panics in Production when `JWT_SECRET` is unset or blank, and in any
    /// environment when `TOKEN_TTL_MINUTES` is not a positive integer.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        // An empty secret would sign with a zero-length HMAC key: treat it as unset.
        let configured_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty());
        let jwt_secret = match env {
            Env::Production => {
                configured_secret.expect("FATAL: JWT_SECRET must be set in production.")
            }
            // Logging is not up yet; main warns via `uses_default_secret`.
            Env::Local => configured_secret.unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
        };

        let token_ttl_minutes = match env::var("TOKEN_TTL_MINUTES") {
            Ok(raw) => match raw.parse::<i64>() {
                Ok(minutes) if minutes > 0 => minutes,
                _ => panic!("FATAL: TOKEN_TTL_MINUTES must be a positive integer, got {raw:?}"),
            },
            Err(_) => DEFAULT_TOKEN_TTL_MINUTES,
        };

        let seed_demo_data = match env::var("SEED_DEMO_DATA") {
            Ok(raw) => matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
            Err(_) => env == Env::Local,
        };

        Self {
            db_url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            env,
            jwt_secret,
            token_ttl_minutes,
            seed_demo_data,
        }
    }

    /// The slice of configuration the Token Service needs.
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.jwt_secret.clone(),
            ttl: chrono::Duration::minutes(self.token_ttl_minutes),
        }
    }

    /// True when `DATABASE_URL` selects the in-process store.
    pub fn uses_memory_store(&self) -> bool {
        self.db_url.eq_ignore_ascii_case("memory")
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == LOCAL_JWT_SECRET
    }
}
