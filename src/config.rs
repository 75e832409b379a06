use crate::api::middleware::{CorsConfig, IdentityConfig, MiddlewareConfig};

const MIN_API_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub environment: Environment,
    /// Enables the Postgres security-event sink when set
    pub database_url: Option<String>,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
    pub api_keys: Vec<String>,
    /// Believe `X-User-Id`; only behind a proxy that strips it from clients
    pub trust_user_id_header: bool,
    pub allowed_origins: Vec<String>,
    pub csrf_token_ttl_secs: u64,
    pub token_sweep_interval_secs: u64,
    pub max_body_bytes: usize,
    /// Backend origin added to the CSP allow-list
    pub backend_origin: Option<String>,
    pub log_json: bool,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl Config {
    pub fn from_env() -> Self {
        let environment = Environment::parse(
            &std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        );
        let default_max = if environment.is_production() { 100 } else { 1000 };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            environment,
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            rate_limit_window_ms: env_parse("RATE_LIMIT_WINDOW_MS", 15 * 60 * 1000),
            rate_limit_max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", default_max),
            api_keys: env_list("SECURITY_API_KEYS"),
            trust_user_id_header: env_parse("TRUST_USER_ID_HEADER", false),
            allowed_origins: env_list("ALLOWED_ORIGINS"),
            csrf_token_ttl_secs: env_parse("CSRF_TOKEN_TTL_SECS", 3600),
            token_sweep_interval_secs: env_parse("TOKEN_SWEEP_INTERVAL_SECS", 900),
            max_body_bytes: env_parse("MAX_BODY_BYTES", 1024 * 1024),
            backend_origin: std::env::var("SUPABASE_URL").ok().filter(|s| !s.is_empty()),
            log_json: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 5),
            db_acquire_timeout_secs: env_parse("DB_ACQUIRE_TIMEOUT_SECS", 10),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("LISTEN_ADDR cannot be empty".to_string());
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err("DATABASE_URL must start with postgres:// or postgresql://".to_string());
            }
        }

        if self.environment.is_production() {
            if self.database_url.is_none() {
                return Err("DATABASE_URL is required in production".to_string());
            }
            if self.allowed_origins.is_empty() {
                return Err("ALLOWED_ORIGINS is required in production".to_string());
            }
        }

        if self.api_keys.iter().any(|k| k.len() < MIN_API_KEY_LEN) {
            return Err(format!(
                "SECURITY_API_KEYS entries must be at least {} characters",
                MIN_API_KEY_LEN
            ));
        }

        if self.rate_limit_window_ms == 0 || self.rate_limit_max_requests == 0 {
            return Err("RATE_LIMIT_WINDOW_MS and RATE_LIMIT_MAX_REQUESTS must be greater than 0".to_string());
        }
        if self.csrf_token_ttl_secs == 0 {
            return Err("CSRF_TOKEN_TTL_SECS must be greater than 0".to_string());
        }
        if self.token_sweep_interval_secs == 0 {
            return Err("TOKEN_SWEEP_INTERVAL_SECS must be greater than 0".to_string());
        }
        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Pipeline configuration derived from the environment.
    pub fn middleware_config(&self) -> MiddlewareConfig {
        let mut config = if self.environment.is_production() {
            MiddlewareConfig::production(self.allowed_origins.clone())
        } else {
            MiddlewareConfig::development()
        };

        if !self.allowed_origins.is_empty() {
            config.cors = CorsConfig::production(self.allowed_origins.clone());
        }
        if let Some(origin) = &self.backend_origin {
            config.security_headers = config.security_headers.with_backend_origin(origin.clone());
        }

        config.identity =
            IdentityConfig::default().with_trusted_user_id_header(self.trust_user_id_header);
        config.rate_limiting = config
            .rate_limiting
            .with_api_limit(self.rate_limit_window_ms, self.rate_limit_max_requests);
        config.sanitization = config.sanitization.with_max_body_bytes(self.max_body_bytes);
        config.csrf = config
            .csrf
            .with_api_keys(self.api_keys.clone())
            .with_max_body_bytes(self.max_body_bytes);
        config
    }
}
