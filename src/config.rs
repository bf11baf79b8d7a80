use secrecy::SecretString;
use std::env;

use crate::rate_limit::{CategoryLimits, RateLimitSettings};

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub jwt_secret: SecretString,
    pub jwt_expiration_hours: i64,
    pub session_ttl_hours: i64,
    pub session_cookie_name: String,
    pub session_cookie_secure: bool,
    pub allowed_origins: Vec<String>,
    /// Path prefixes that skip bearer-token authentication entirely:
    /// the auth endpoints themselves, API docs and health/ops paths.
    pub public_paths: Vec<String>,
    pub rate_limit: RateLimitSettings,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME")
                .unwrap_or_else(|_| "shiken-local".to_string()),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: parse_env("WEB_SERVER_PORT", 8080),
            jwt_secret: SecretString::from(
                env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "dev_secret_key_change_in_production".to_string()),
            ),
            jwt_expiration_hours: parse_env("JWT_EXPIRATION_HOURS", 24),
            session_ttl_hours: parse_env("SESSION_TTL_HOURS", 168),
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "refresh_token".to_string()),
            session_cookie_secure: parse_env("SESSION_COOKIE_SECURE", true),
            allowed_origins: parse_env_list(
                "CORS_ALLOWED_ORIGINS",
                "http://localhost:5173,http://localhost:3000",
            ),
            public_paths: parse_env_list(
                "PUBLIC_PATHS",
                // Logout is deliberately absent: it needs the principal
                // from the bearer token to know whose session to revoke.
                "/api/v1/auth/login,/api/v1/auth/register,/api/v1/auth/refresh,/swagger-ui,/api-docs,/v3/api-docs,/actuator",
            ),
            rate_limit: RateLimitSettings {
                auth: CategoryLimits {
                    enabled: parse_env("RATE_LIMIT_AUTH_ENABLED", true),
                    capacity: parse_env("RATE_LIMIT_AUTH_CAPACITY", 5),
                    refill_tokens: parse_env("RATE_LIMIT_AUTH_REFILL_TOKENS", 5),
                    refill_period_minutes: parse_env("RATE_LIMIT_AUTH_REFILL_PERIOD_MINUTES", 1),
                },
                general: CategoryLimits {
                    enabled: parse_env("RATE_LIMIT_API_ENABLED", true),
                    capacity: parse_env("RATE_LIMIT_API_CAPACITY", 100),
                    refill_tokens: parse_env("RATE_LIMIT_API_REFILL_TOKENS", 100),
                    refill_period_minutes: parse_env("RATE_LIMIT_API_REFILL_PERIOD_MINUTES", 1),
                },
                skip_paths: parse_env_list(
                    "RATE_LIMIT_SKIP_PATHS",
                    "/swagger-ui,/api-docs,/v3/api-docs,/actuator",
                ),
            },
        }
    }

    /// Validate that production-critical configuration is set
    /// Panics if required secrets are using default values
    pub fn validate_for_production(&self) {
        use secrecy::ExposeSecret;

        let jwt_secret = self.jwt_secret.expose_secret();

        if jwt_secret == "dev_secret_key_change_in_production" {
            panic!(
                "FATAL: JWT_SECRET is using default value! Set JWT_SECRET environment variable to a secure random string."
            );
        }

        if jwt_secret.len() < 32 {
            panic!(
                "FATAL: JWT_SECRET is too short ({}). Must be at least 32 characters for security.",
                jwt_secret.len()
            );
        }
    }

    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "shiken-test".to_string(),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            jwt_secret: SecretString::from("test_jwt_secret_key".to_string()),
            jwt_expiration_hours: 1,
            session_ttl_hours: 168,
            session_cookie_name: "refresh_token".to_string(),
            session_cookie_secure: false,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            public_paths: vec![
                "/api/v1/auth/login".to_string(),
                "/api/v1/auth/register".to_string(),
                "/api/v1/auth/refresh".to_string(),
                "/swagger-ui".to_string(),
                "/api-docs".to_string(),
                "/v3/api-docs".to_string(),
                "/actuator".to_string(),
            ],
            rate_limit: RateLimitSettings::test_settings(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_list(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_with_defaults() {
        let config = Config::from_env();

        // Should use env vars if set, or fall back to defaults
        assert!(!config.mongo_conn_string.is_empty());
        assert!(!config.mongo_db_name.is_empty());
        assert!(!config.session_cookie_name.is_empty());
        assert!(config
            .public_paths
            .iter()
            .any(|p| p == "/api/v1/auth/login"));
        // Logout stays behind the gate.
        assert!(!config.public_paths.iter().any(|p| p.contains("logout")));
    }

    #[test]
    fn test_test_config() {
        let config = Config::test_config();

        assert_eq!(config.mongo_conn_string, "mongodb://localhost:27017");
        assert_eq!(config.mongo_db_name, "shiken-test");
        assert_eq!(config.session_cookie_name, "refresh_token");
        assert!(!config.session_cookie_secure);
    }

    #[test]
    fn test_rate_limit_defaults() {
        let config = Config::test_config();

        assert!(config.rate_limit.auth.enabled);
        assert_eq!(config.rate_limit.auth.capacity, 5);
        assert_eq!(config.rate_limit.general.capacity, 100);
        assert_eq!(config.rate_limit.auth.refill_period_minutes, 1);
    }
}
