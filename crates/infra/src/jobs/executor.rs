//! Worker pool: one consumer per topic, typed handlers, retry and
//! dead-letter policy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::{PipelineError, PipelineResult};

use super::queue::JobQueue;
use super::types::{Job, Topic};

/// Handler for the jobs of one topic.
///
/// Delivery is at-least-once: `handle` may run more than once for the same
/// job and must converge on the same final state.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    const TOPIC: Topic;

    type Payload: DeserializeOwned + Send + Sync + 'static;

    async fn handle(&self, job: &Job, payload: Self::Payload) -> PipelineResult<()>;

    /// Called once the job will not be delivered again (permanent error or
    /// attempts exhausted), before it is dead-lettered.
    async fn on_terminal_failure(
        &self,
        _job: &Job,
        _payload: Self::Payload,
        _error: &PipelineError,
    ) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> PipelineResult<()>;

    async fn on_terminal_failure(&self, job: &Job, error: &PipelineError);
}

struct Typed<H>(H);

impl<H: JobHandler> Typed<H> {
    fn payload(job: &Job) -> PipelineResult<H::Payload> {
        serde_json::from_value(job.payload.clone())
            .map_err(|e| PipelineError::InvalidPayload(format!("{} payload: {e}", H::TOPIC)))
    }
}

#[async_trait]
impl<H: JobHandler> ErasedHandler for Typed<H> {
    async fn handle(&self, job: &Job) -> PipelineResult<()> {
        let payload = Self::payload(job)?;
        self.0.handle(job, payload).await
    }

    async fn on_terminal_failure(&self, job: &Job, error: &PipelineError) {
        // An undecodable payload names no record to mark failed.
        let Ok(payload) = Self::payload(job) else {
            return;
        };
        if let Err(e) = self.0.on_terminal_failure(job, payload, error).await {
            error!(job_id = %job.id, topic = %job.topic, error = %e, "failed to record terminal failure");
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long an idle consumer sleeps before polling again.
    pub poll_interval: Duration,
    /// Maximum concurrent jobs per topic.
    pub max_concurrent: usize,
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            max_concurrent: 4,
            name: "folio-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    handlers: HashMap<Topic, Arc<dyn ErasedHandler>>,
    stats: Arc<Mutex<WorkerStats>>,
    lease: Duration,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            stats: Arc::new(Mutex::new(WorkerStats::default())),
            lease: Duration::from_secs(300),
        }
    }

    /// Visibility timeout stamped on every claim.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Register the handler for `H::TOPIC`, replacing any earlier one.
    pub fn register<H: JobHandler>(&mut self, handler: H) -> &mut Self {
        self.handlers.insert(H::TOPIC, Arc::new(Typed(handler)));
        self
    }

    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<_> = self.handlers.keys().copied().collect();
        topics.sort();
        topics
    }

    pub fn stats(&self) -> WorkerStats {
        lock_stats(&self.stats).clone()
    }

    fn record(&self, f: impl FnOnce(&mut WorkerStats)) {
        f(&mut lock_stats(&self.stats));
    }

    /// Run one claimed job to an outcome and write that outcome back to the
    /// queue. The handler's error is returned after the queue is updated.
    pub async fn execute(&self, mut job: Job) -> PipelineResult<()> {
        let span = info_span!("job", job_id = %job.id, topic = %job.topic, attempt = job.attempt);
        let started = Utc::now();
        if job.is_redelivery() {
            warn!(parent: &span, "redelivered job, previous worker did not report back");
        }

        let Some(handler) = self.handlers.get(&job.topic).cloned() else {
            let error = PipelineError::InvalidPayload(format!("no handler registered for {}", job.topic));
            warn!(parent: &span, "no handler for job");
            job.mark_failed(error.to_string(), started, true);
            self.queue.dead_letter(job, error.to_string()).await?;
            self.record(|s| {
                s.jobs_processed += 1;
                s.jobs_failed += 1;
                s.jobs_dead_lettered += 1;
            });
            return Err(error);
        };

        self.record(|s| s.current_running += 1);
        let result = handler.handle(&job).instrument(span.clone()).await;
        self.record(|s| {
            s.current_running = s.current_running.saturating_sub(1);
            s.jobs_processed += 1;
        });

        match result {
            Ok(()) => {
                job.mark_completed(started);
                self.queue.update(&job).await?;
                self.record(|s| s.jobs_succeeded += 1);
                debug!(parent: &span, "job completed");
                Ok(())
            }
            Err(error) => {
                job.mark_failed(error.to_string(), started, error.is_permanent());
                if job.is_dead_lettered() {
                    warn!(parent: &span, error = %error, "job failed terminally");
                    handler
                        .on_terminal_failure(&job, &error)
                        .instrument(span.clone())
                        .await;
                    self.queue.dead_letter(job, error.to_string()).await?;
                    self.record(|s| {
                        s.jobs_failed += 1;
                        s.jobs_dead_lettered += 1;
                    });
                } else {
                    warn!(parent: &span, error = %error, run_at = ?job.run_at, "job failed, will retry");
                    self.queue.update(&job).await?;
                    self.record(|s| s.jobs_failed += 1);
                }
                Err(error)
            }
        }
    }

    /// Claim and run every ready job of every registered topic until none is
    /// left. Returns the number of jobs executed.
    pub async fn drain(&self) -> PipelineResult<usize> {
        let mut processed = 0;
        loop {
            let mut progressed = false;
            for topic in self.topics() {
                while let Some(job) = self.queue.claim_next(topic, self.lease).await? {
                    // Outcomes are already written back to the queue.
                    let _ = self.execute(job).await;
                    processed += 1;
                    progressed = true;
                }
            }
            if !progressed {
                return Ok(processed);
            }
        }
    }

    /// Start one consumer task per registered topic.
    pub fn spawn(self, config: WorkerConfig) -> WorkerPoolHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = self.stats.clone();
        let topics = self.topics();
        let pool = Arc::new(self);

        let mut consumers = JoinSet::new();
        for topic in topics {
            consumers.spawn(consume(pool.clone(), topic, config.clone(), shutdown_rx.clone()));
        }

        info!(worker = %config.name, consumers = consumers.len(), "worker pool started");
        WorkerPoolHandle {
            shutdown: shutdown_tx,
            consumers,
            stats,
            started: Instant::now(),
        }
    }
}

fn lock_stats(stats: &Mutex<WorkerStats>) -> std::sync::MutexGuard<'_, WorkerStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn consume(
    pool: Arc<WorkerPool>,
    topic: Topic,
    config: WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let mut in_flight = JoinSet::new();
    debug!(worker = %config.name, topic = %topic, "consumer started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        while in_flight.try_join_next().is_some() {}

        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        let idle = match pool.queue.claim_next(topic, pool.lease).await {
            Ok(Some(job)) => {
                let pool = pool.clone();
                in_flight.spawn(async move {
                    let _permit = permit;
                    let _ = pool.execute(job).await;
                });
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!(worker = %config.name, topic = %topic, error = %e, "failed to claim job");
                true
            }
        };

        if idle {
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    while in_flight.join_next().await.is_some() {}
    debug!(worker = %config.name, topic = %topic, "consumer stopped");
}

/// Handle to control a running worker pool.
pub struct WorkerPoolHandle {
    shutdown: watch::Sender<bool>,
    consumers: JoinSet<()>,
    stats: Arc<Mutex<WorkerStats>>,
    started: Instant,
}

impl WorkerPoolHandle {
    /// Stop claiming new jobs and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        while self.consumers.join_next().await.is_some() {}
        info!("worker pool stopped");
    }

    pub fn stats(&self) -> WorkerStats {
        let mut stats = lock_stats(&self.stats).clone();
        stats.uptime_secs = self.started.elapsed().as_secs();
        stats
    }
}
