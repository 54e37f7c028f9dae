//! Outbox relay entry point.

use std::sync::Arc;

use outbox::{NatsPublisher, PostgresOutboxJournal};
use server::config::{Config, LogFormat};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_journal(url: &str) -> PostgresOutboxJournal {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .expect("failed to connect to PostgreSQL");
    let journal = PostgresOutboxJournal::new(pool);
    journal
        .run_migrations()
        .await
        .expect("failed to run migrations");
    tracing::info!("connected to PostgreSQL outbox journal");
    journal
}

#[tokio::main]
async fn main() {
    // 1. Load configuration (.env first, then the process environment)
    let _ = dotenvy::dotenv();
    let config = Config::from_env().expect("invalid configuration");
    let endpoints = config.relay_endpoints().expect("incomplete configuration");

    // 2. Initialize tracing
    init_tracing(&config);

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Open the journal and the broker, then start the poller
    let journal = Arc::new(open_journal(endpoints.database_url).await);
    let publisher = NatsPublisher::connect(endpoints.nats_url)
        .await
        .expect("failed to connect to NATS");
    tracing::info!(nats_url = endpoints.nats_url, "connected to NATS");
    let poller = server::spawn_order_relay(
        journal.clone(),
        Arc::new(publisher),
        config.poller_config(),
    );

    // 5. Build the application
    let state = Arc::new(server::AppState::new(journal).with_poller(poller));
    let app = server::create_app(state.clone(), metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting outbox relay");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Let the in-flight poll cycle finish
    if let Some(poller) = state.take_poller()
        && poller.shutdown().await
    {
        tracing::info!("outbox poller stopped");
    }

    tracing::info!("server shut down gracefully");
}
