//! Background relay from the outbox journal to the message broker.
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 5s | Delay between poll cycles |
//! | `retry` | 3 attempts, 1s doubling | Per-record publish retries within a cycle |
//! | `publish_timeout` | 5s | Deadline for a single publish attempt |
//! | `batch_size` | unlimited | Max records per cycle |
//! | `max_failed_cycles` | off | Stop fetching a record after this many failed cycles |
//! | `shutdown_timeout` | 10s | Wait for an in-flight cycle before aborting it |

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{
    MessagePublisher, MessageRouter, OutboxJournal, OutboxRecord, PendingQuery, PublishError,
    Result, RetryPolicy,
};

/// Configuration for the [`OutboxPoller`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub publish_timeout: Duration,
    pub batch_size: Option<usize>,
    pub max_failed_cycles: Option<u32>,
    pub shutdown_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            publish_timeout: Duration::from_secs(5),
            batch_size: None,
            max_failed_cycles: None,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl PollerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn with_max_failed_cycles(mut self, cycles: u32) -> Self {
        self.max_failed_cycles = Some(cycles);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    fn pending_query(&self) -> PendingQuery {
        PendingQuery {
            limit: self.batch_size,
            max_attempts: self.max_failed_cycles,
        }
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Records returned by the journal.
    pub fetched: usize,
    /// Records published and marked processed by this poller.
    pub published: usize,
    /// Records left unprocessed for a later cycle.
    pub failed: usize,
    /// Records another poller acknowledged first, or not reached before shutdown.
    pub skipped: usize,
}

enum Delivery {
    Published,
    AlreadyProcessed,
    Failed,
}

/// Polls the outbox journal and publishes pending records to the broker.
pub struct OutboxPoller<J, P> {
    journal: J,
    publisher: P,
    router: MessageRouter,
    config: PollerConfig,
}

impl<J: OutboxJournal, P: MessagePublisher> OutboxPoller<J, P> {
    pub fn new(journal: J, publisher: P, router: MessageRouter) -> Self {
        Self {
            journal,
            publisher,
            router,
            config: PollerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Runs exactly one poll cycle.
    pub async fn poll_once(&self) -> Result<PollReport> {
        self.run_cycle(None).await
    }

    /// Runs poll cycles until `shutdown` turns true or its sender is dropped.
    ///
    /// A failing cycle is logged and the loop carries on with the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval = ?self.config.poll_interval, "outbox poller started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle(Some(&shutdown)).await {
                        metrics::counter!("outbox_poll_errors_total").increment(1);
                        tracing::error!(error = %e, "outbox poll cycle failed");
                    }
                }
            }
        }

        tracing::info!("outbox poller stopped");
    }

    #[tracing::instrument(skip_all)]
    async fn run_cycle(&self, shutdown: Option<&watch::Receiver<bool>>) -> Result<PollReport> {
        let started = Instant::now();
        let records = self
            .journal
            .fetch_unprocessed(self.config.pending_query())
            .await?;

        let mut report = PollReport {
            fetched: records.len(),
            ..PollReport::default()
        };

        for record in &records {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                tracing::info!("shutdown requested, leaving remaining records for later");
                break;
            }
            match self.deliver(record).await {
                Delivery::Published => report.published += 1,
                Delivery::AlreadyProcessed => report.skipped += 1,
                Delivery::Failed => report.failed += 1,
            }
        }
        let handled = report.published + report.failed + report.skipped;
        report.skipped += report.fetched - handled;

        metrics::histogram!("outbox_poll_duration_seconds").record(started.elapsed().as_secs_f64());
        match self.journal.pending_count().await {
            Ok(pending) => metrics::gauge!("outbox_pending_records").set(pending as f64),
            Err(e) => tracing::debug!(error = %e, "could not count pending outbox records"),
        }

        if report.fetched > 0 {
            tracing::info!(
                fetched = report.fetched,
                published = report.published,
                failed = report.failed,
                skipped = report.skipped,
                "outbox poll cycle finished"
            );
        }
        Ok(report)
    }

    async fn deliver(&self, record: &OutboxRecord) -> Delivery {
        let routing_key = self.router.resolve(&record.event_type);
        let payload = match record.payload_bytes() {
            Ok(payload) => payload,
            Err(e) => return self.give_up(record, 0, &e.to_string()).await,
        };

        let policy = self.config.retry;
        let mut attempt = 0;
        let error = loop {
            attempt += 1;
            let err = match self.publish_attempt(routing_key, &payload).await {
                Ok(()) => return self.acknowledge(record, routing_key).await,
                Err(err) => err,
            };
            metrics::counter!("outbox_publish_attempt_failures_total").increment(1);

            match policy.backoff_after(attempt) {
                Some(wait) => {
                    tracing::debug!(
                        record_id = record.id,
                        routing_key,
                        attempt,
                        ?wait,
                        error = %err,
                        "publish failed, retrying"
                    );
                    time::sleep(wait).await;
                }
                None => break err,
            }
        };

        self.give_up(record, attempt, &error.to_string()).await
    }

    async fn publish_attempt(&self, routing_key: &str, payload: &[u8]) -> std::result::Result<(), PublishError> {
        let deadline = self.config.publish_timeout;
        match time::timeout(deadline, self.publisher.publish(routing_key, payload)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(deadline)),
        }
    }

    async fn acknowledge(&self, record: &OutboxRecord, routing_key: &str) -> Delivery {
        match self.journal.mark_processed(record.id).await {
            Ok(true) => {
                metrics::counter!("outbox_published_total", "routing_key" => routing_key.to_string())
                    .increment(1);
                tracing::debug!(record_id = record.id, routing_key, "outbox record published");
                Delivery::Published
            }
            Ok(false) => {
                tracing::debug!(record_id = record.id, "outbox record already processed elsewhere");
                Delivery::AlreadyProcessed
            }
            Err(e) => {
                // The broker has the message; the record stays pending and is sent again.
                tracing::error!(
                    record_id = record.id,
                    error = %e,
                    "published but could not mark outbox record processed"
                );
                Delivery::Failed
            }
        }
    }

    async fn give_up(&self, record: &OutboxRecord, attempts: u32, error: &str) -> Delivery {
        metrics::counter!("outbox_delivery_failures_total").increment(1);
        tracing::warn!(
            record_id = record.id,
            event_type = %record.event_type,
            aggregate_id = %record.aggregate_id,
            attempts,
            error,
            "outbox record not delivered, will retry next cycle"
        );

        match self.journal.record_failure(record.id, error).await {
            Ok(failed_cycles) => {
                if let Some(ceiling) = self.config.max_failed_cycles
                    && i64::from(failed_cycles) >= i64::from(ceiling)
                {
                    tracing::error!(
                        record_id = record.id,
                        failed_cycles,
                        "outbox record reached the failed cycle ceiling and is quarantined"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(record_id = record.id, error = %e, "could not record delivery failure");
            }
        }
        Delivery::Failed
    }
}

impl<J, P> OutboxPoller<J, P>
where
    J: OutboxJournal + 'static,
    P: MessagePublisher + 'static,
{
    /// Moves the poller onto its own task.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown, rx) = watch::channel(false);
        let shutdown_timeout = self.config.shutdown_timeout;
        let task = tokio::spawn(async move { self.run(rx).await });
        PollerHandle {
            shutdown,
            task,
            shutdown_timeout,
        }
    }
}

/// Owner of a spawned poller task.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl PollerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the poller using the configured shutdown timeout.
    pub async fn shutdown(self) -> bool {
        let timeout = self.shutdown_timeout;
        self.shutdown_within(timeout).await
    }

    /// Signals the poller and waits up to `timeout` for the in-flight cycle.
    ///
    /// Returns `true` on a clean stop and `false` if the task had to be
    /// aborted or had panicked.
    pub async fn shutdown_within(mut self, timeout: Duration) -> bool {
        let _ = self.shutdown.send(true);
        match time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "outbox poller task failed");
                false
            }
            Err(_) => {
                tracing::warn!(?timeout, "outbox poller did not stop in time, aborting");
                self.task.abort();
                false
            }
        }
    }
}
