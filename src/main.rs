mod api;
mod clients;
mod clinic;
mod config;
mod dispatcher;
mod gateway;
mod models;
mod store;
mod system;
mod template;

use crate::clients::{setup_db_pool, setup_http_client};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::gateway::ZApiGateway;
use crate::store::PgReminderStore;
use crate::system::SystemClock;

use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Graceful shutdown signal future
async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("Failed to install SIGTERM handler");
    #[cfg(unix)]
    let terminate = term_signal.recv();
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received. Exiting dispatch timer.");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();
}

/// Runs a pass every `interval_ms` until shutdown. Passes run inline, so a
/// slow pass delays the next tick instead of stacking up behind it.
async fn run_dispatch_timer(dispatcher: Arc<Dispatcher>, interval_ms: u64) {
    info!(interval_ms, "Starting reminder dispatch timer...");
    let mut interval = time::interval(Duration::from_millis(interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = dispatcher.run_pass().await {
                    error!("Error during reminder pass: {}", e);
                }
            },
            _ = &mut shutdown => {
                break;
            }
        }
    }
    info!("Dispatch timer shutting down.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let dsn = config
        .sentry_dsn
        .as_deref()
        .map(str::parse::<sentry::types::Dsn>)
        .transpose()?;
    let _sentry = sentry::init(sentry::ClientOptions {
        dsn,
        release: sentry::release_name!(),
        ..Default::default()
    });

    init_tracing();
    info!("Configuration loaded.");

    info!("Connecting to database...");
    let db_pool = setup_db_pool(&config).await?;
    info!("Database connection established.");

    let http_client = setup_http_client(&config)?;
    let timezone = config.timezone()?;

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(PgReminderStore::new(db_pool.clone())),
        Arc::new(ZApiGateway::new(http_client, config.gateway_base_url.clone())),
        Arc::new(SystemClock),
        timezone,
    ));

    if let Some(interval_ms) = config.dispatch_interval_ms {
        tokio::spawn(run_dispatch_timer(dispatcher.clone(), interval_ms));
    }

    let db_data = web::Data::new(db_pool);
    let dispatcher_data = web::Data::from(dispatcher);
    let tz_data = web::Data::new(timezone);

    info!(
        address = %config.bind_address,
        port = config.port,
        "Starting HTTP server..."
    );
    HttpServer::new(move || {
        App::new()
            .app_data(db_data.clone())
            .app_data(dispatcher_data.clone())
            .app_data(tz_data.clone())
            .configure(api::configure)
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await?;

    info!("Server stopped.");
    Ok(())
}
