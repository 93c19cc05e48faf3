#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for backcountry safety assessments.
//!
//! Exposes `GET /api/health` and `GET /api/safety`. The pipeline context
//! (providers, zone layer cache, precipitation cache) is built once at
//! start-up and shared across workers.

mod handlers;

use std::time::Duration as StdDuration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use backcountry_pipeline::{PipelineConfig, PipelineContext};

/// Start-up settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Unparseable values fall
    /// back to the defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut pipeline = PipelineConfig::default();

        if let Some(agent) = lookup("BACKCOUNTRY_USER_AGENT").filter(|a| !a.trim().is_empty()) {
            pipeline.user_agent = agent;
        }
        if let Some(ms) = parsed::<u64>(&lookup, "BACKCOUNTRY_TIMEOUT_MS") {
            pipeline.default_timeout = StdDuration::from_millis(ms);
        }
        if let Some(secs) = parsed::<i64>(&lookup, "BACKCOUNTRY_ZONE_TTL_SECS") {
            pipeline.zone_ttl = chrono::Duration::seconds(secs);
        }
        if let Some(secs) = parsed::<i64>(&lookup, "BACKCOUNTRY_PRECIP_TTL_SECS") {
            pipeline.precipitation_ttl = chrono::Duration::seconds(secs);
        }

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed(&lookup, "PORT").unwrap_or(8080),
            pipeline,
        }
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring invalid {key}={raw:?}, using default");
            None
        }
    }
}

/// Registers the API routes on an app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/safety", web::get().to(handlers::safety)),
    );
}

/// Starts the backcountry risk API server.
///
/// Builds the pipeline context from the embedded service registry and
/// serves until shut down. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Error` if the pipeline context cannot be built, or
/// if the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let config = ServerConfig::from_env();

    log::info!("Building assessment pipeline...");
    let context = PipelineContext::from_registry(&config.pipeline).map_err(std::io::Error::other)?;
    let state = web::Data::new(context);

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
