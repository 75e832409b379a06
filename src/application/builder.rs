use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::api::router::AppState;
use crate::application::{
    csrf_tokens::CsrfTokenService,
    ports::{Clock, RateLimitStore, SecurityEventSink, TokenStore},
    security_events::SecurityEventLogger,
    sweeper::TokenSweeper,
};
use crate::config::Config;
use crate::infrastructure::{
    clock::SystemClock,
    events::{DatabaseSecurityEventSink, TracingSecurityEventSink},
    memory::{InMemoryRateLimitStore, InMemoryTokenStore},
    persistence::PostgresSecurityEventRepository,
};

/// Everything `main` needs to serve: router state plus the background sweeper.
pub struct Application {
    pub state: AppState,
    pub sweeper: Arc<TokenSweeper>,
}

/// Application builder for dependency injection and setup
pub struct ApplicationBuilder {
    config: Config,
    clock: Arc<dyn Clock>,
    pool: Option<sqlx::PgPool>,
    token_store: Option<Arc<dyn TokenStore>>,
    rate_limit_store: Option<Arc<dyn RateLimitStore>>,
}

impl ApplicationBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            pool: None,
            token_store: None,
            rate_limit_store: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the in-process token store, e.g. with a shared one.
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Replace the in-process rate-limit store, e.g. with a shared one.
    pub fn with_rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limit_store = Some(store);
        self
    }

    /// Connect to Postgres with retry and run migrations. A no-op when no
    /// database is configured.
    pub async fn with_database(mut self) -> Result<Self, Box<dyn std::error::Error>> {
        let Some(database_url) = self.config.database_url.clone() else {
            info!("No DATABASE_URL configured, security events go to the log only");
            return Ok(self);
        };

        let mut retries = 3;
        let mut delay = Duration::from_secs(1);
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(self.config.db_max_connections)
                .acquire_timeout(Duration::from_secs(self.config.db_acquire_timeout_secs))
                .connect(&database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) if retries > 0 => {
                    retries -= 1;
                    tracing::warn!(
                        "Database connection failed, retrying in {:?} ({} retries left): {}",
                        delay,
                        retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!("Failed to connect to database after retries: {}", e);
                    return Err(Box::new(e));
                }
            }
        };

        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;

        self.pool = Some(pool);
        Ok(self)
    }

    pub fn build(self) -> Application {
        let sink: Arc<dyn SecurityEventSink> = match &self.pool {
            Some(pool) => Arc::new(DatabaseSecurityEventSink::new(Arc::new(
                PostgresSecurityEventRepository::new(pool.clone()),
            ))),
            None => Arc::new(TracingSecurityEventSink),
        };
        let events = SecurityEventLogger::new(sink);

        let token_store = self
            .token_store
            .unwrap_or_else(|| Arc::new(InMemoryTokenStore::new()));
        let rate_limits = self
            .rate_limit_store
            .unwrap_or_else(|| Arc::new(InMemoryRateLimitStore::new()));

        let ttl = TimeDelta::seconds(i64::try_from(self.config.csrf_token_ttl_secs).unwrap_or(i64::MAX));
        let csrf_tokens = Arc::new(CsrfTokenService::new(
            token_store,
            Arc::clone(&self.clock),
            events.clone(),
            ttl,
        ));

        let sweeper = Arc::new(TokenSweeper::new(
            Arc::clone(&csrf_tokens),
            Arc::clone(&rate_limits),
            Arc::clone(&self.clock),
            Duration::from_secs(self.config.token_sweep_interval_secs),
        ));

        info!("Application layer initialized");

        Application {
            state: AppState {
                config: self.config.middleware_config(),
                clock: self.clock,
                events,
                csrf_tokens,
                rate_limits,
                pool: self.pool,
            },
            sweeper,
        }
    }
}
