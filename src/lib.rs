//! # Backoffice Shield - security request pipeline
//!
//! The request pipeline that fronts the donor-management back office API:
//! security headers, CORS, rate limiting, input sanitization, threat
//! scoring and CSRF validation, plus the stores and sinks they depend on.
//!
//! ## Architecture Layers
//!
//! - **Domain**: tokens, counters, threat assessments, security events
//! - **Application**: token service, event logger, sweeper and ports
//! - **Infrastructure**: in-memory stores, clocks, event sinks, Postgres
//! - **API**: pipeline middleware, pipeline endpoints and router
//!
//! ## Example Usage
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use backoffice_shield::{application::builder::ApplicationBuilder, create_router, Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = ApplicationBuilder::new(Config::from_env())
//!     .with_database()
//!     .await?
//!     .build();
//! let business = Router::new().route("/api/donors", get(|| async { "[]" }));
//! let router = create_router(&app.state, business)?;
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use api::create_router;
pub use api::errors as api_errors;
pub use application::ports;
pub use config::Config;
pub use domain::errors as domain_errors;
pub use domain::{entities, value_objects};
