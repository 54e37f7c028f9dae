//! Process host for the order outbox relay.
//!
//! Runs the outbox poller against the configured journal and broker, and
//! serves `/health` and `/metrics` for operators. Structured logging comes
//! from `tracing`, metrics from the `metrics` facade with a Prometheus
//! exporter.

pub mod config;
pub mod routes;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Router;
use axum::routing::get;
use domain::OrderEventKind;
use metrics_exporter_prometheus::PrometheusHandle;
use outbox::{MessagePublisher, OutboxJournal, OutboxPoller, PollerConfig, PollerHandle};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub journal: Arc<dyn OutboxJournal>,
    poller: Mutex<Option<PollerHandle>>,
}

impl AppState {
    pub fn new(journal: Arc<dyn OutboxJournal>) -> Self {
        Self {
            journal,
            poller: Mutex::new(None),
        }
    }

    /// Hands ownership of the running poller to the state.
    pub fn with_poller(self, handle: PollerHandle) -> Self {
        *self.lock_poller() = Some(handle);
        self
    }

    /// Whether a poller is attached and its task is still alive.
    pub fn poller_running(&self) -> bool {
        self.lock_poller()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Detaches the poller so it can be shut down.
    pub fn take_poller(&self) -> Option<PollerHandle> {
        self.lock_poller().take()
    }

    fn lock_poller(&self) -> MutexGuard<'_, Option<PollerHandle>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates the Axum application router with the ops endpoints.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(state)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}

/// Starts the outbox poller for order events on its own task.
pub fn spawn_order_relay(
    journal: Arc<dyn OutboxJournal>,
    publisher: Arc<dyn MessagePublisher>,
    config: PollerConfig,
) -> PollerHandle {
    tracing::info!(
        poll_interval = ?config.poll_interval,
        max_attempts = config.retry.max_attempts,
        batch_size = ?config.batch_size,
        "starting outbox poller"
    );
    OutboxPoller::new(journal, publisher, OrderEventKind::router())
        .with_config(config)
        .spawn()
}
