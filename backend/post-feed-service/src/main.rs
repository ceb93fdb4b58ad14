use actix_middleware::{CorrelationIdMiddleware, JwtAuthMiddleware, JwtValidator};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::io;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use post_feed_service::config::{AuthConfig, LogFormat, StoreConfig};
use post_feed_service::db::{InMemoryStore, PgStore, Store};
use post_feed_service::{configure, AppState, Config};

const DEFAULT_LOG_FILTER: &str = "info,actix_web=info,sqlx=warn";

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// `post-feed-service healthcheck` for container probes
async fn run_healthcheck() -> io::Result<()> {
    let port = std::env::var("APP_PORT").unwrap_or_else(|_| "8082".to_string());
    let url = format!("http://127.0.0.1:{port}/health");

    match reqwest::Client::new().get(&url).send().await {
        Ok(resp) if resp.status().is_success() => Ok(()),
        Ok(resp) => {
            eprintln!("healthcheck HTTP status: {}", resp.status());
            Err(io::Error::new(io::ErrorKind::Other, "healthcheck failed"))
        }
        Err(e) => {
            eprintln!("healthcheck HTTP error: {}", e);
            Err(io::Error::new(io::ErrorKind::Other, "healthcheck error"))
        }
    }
}

async fn build_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config {
        StoreConfig::Postgres(db_config) => {
            let store = PgStore::connect(db_config.clone())
                .await
                .context("Failed to create database pool")?;
            store
                .migrate()
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Connected to PostgreSQL store");
            Ok(Arc::new(store))
        }
        StoreConfig::Memory { seed_path } => {
            let store = match seed_path {
                Some(path) => {
                    let store = InMemoryStore::from_seed_file(path)?;
                    tracing::info!(path = %path.display(), "Loaded in-memory store from seed");
                    store
                }
                None => InMemoryStore::new(),
            };
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(store))
        }
    }
}

fn build_validator(auth: &AuthConfig) -> anyhow::Result<JwtValidator> {
    let validator = match auth {
        AuthConfig::Hs256Secret(secret) => JwtValidator::hs256(secret),
        AuthConfig::Rs256PublicKey(pem) => JwtValidator::rs256_pem(pem),
    };
    validator.context("Failed to initialize JWT validation")
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting post-feed-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(env = %config.app.env, store = ?config.store.kind(), "Configuration loaded");

    let validator = Arc::new(build_validator(&config.auth)?);
    let store = build_store(&config.store).await?;
    let state = web::Data::new(AppState::new(store, &config.feed));

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(JwtAuthMiddleware::new(Arc::clone(&validator)))
            .wrap(CorrelationIdMiddleware)
            .wrap(TracingLogger::default())
            .configure(configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server error")?;

    tracing::info!("post-feed-service stopped");
    Ok(())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    if std::env::args().nth(1).as_deref() == Some("healthcheck") {
        return run_healthcheck().await;
    }

    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        tracing::error!("post-feed-service failed: {:#}", e);
        return Err(io::Error::new(io::ErrorKind::Other, format!("{e:#}")));
    }
    Ok(())
}
