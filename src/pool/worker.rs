//! Jobs, workers, and the pool itself.
//!
//! Workers are homogeneous, long-lived tasks: dequeue one job, pass the
//! pool's token bucket and concurrency gate, run the dispatcher, publish the
//! result to the job's sink. Every accepted job yields exactly one result,
//! including jobs canceled by shutdown while still queued.

use crate::base::cancel::JobCtx;
use crate::base::error::NetError;
use crate::dispatch::dispatcher::{DispatchOutcome, DispatchRequest, Dispatcher};
use crate::dispatch::limiter::TokenBucket;
use crate::pool::memory::{MemoryConfig, MemorySupervisor};
use crate::pool::queue::JobQueue;
use crate::pool::stats::{PoolStats, StatsSnapshot};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;

/// Job priority; higher drains first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Index into the queue levels, high first.
    pub(crate) fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// One unit of work moving through the pool.
pub struct Job {
    pub id: u64,
    pub request: DispatchRequest,
    pub priority: Priority,
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
    pub(crate) sink: oneshot::Sender<DispatchOutcome>,
    pub(crate) enqueued_at: Instant,
}

impl Job {
    /// Build a job plus the receiver its single result arrives on. The
    /// returned job's `cancel` token is the caller's handle for canceling
    /// it mid-flight.
    pub fn new(
        request: DispatchRequest,
        priority: Priority,
        deadline: Option<Instant>,
    ) -> (Self, oneshot::Receiver<DispatchOutcome>) {
        let (sink, receiver) = oneshot::channel();
        let job = Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            request,
            priority,
            deadline,
            cancel: CancellationToken::new(),
            sink,
            enqueued_at: Instant::now(),
        };
        (job, receiver)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("url", &self.request.url.as_str())
            .field("priority", &self.priority)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Upper bound on concurrently dispatching jobs; never exceeded.
    pub max_concurrent: usize,
    /// Pool-level token bucket; `None` is unlimited.
    pub requests_per_second: Option<f64>,
    pub memory: Option<MemoryConfig>,
    /// Span of the rolling throughput window.
    pub stats_window: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 1024,
            max_concurrent: 8,
            requests_per_second: None,
            memory: None,
            stats_window: Duration::from_secs(30),
        }
    }
}

struct PoolShared {
    queue: JobQueue,
    stats: PoolStats,
    dispatcher: Arc<Dispatcher>,
    bucket: Option<TokenBucket>,
    gate: Semaphore,
    paused: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<tokio::task::JoinHandle<()>>,
    supervisor: Option<tokio::task::JoinHandle<()>>,
    accepting: AtomicBool,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let shutdown = CancellationToken::new();

        let (paused, supervisor) = match &config.memory {
            Some(memory_config) => {
                let executor = dispatcher.executor().clone();
                let supervisor = MemorySupervisor::new(
                    memory_config.clone(),
                    Arc::new(move || executor.shed_memory()),
                );
                let paused = supervisor.paused_flag();
                (paused, Some(supervisor.spawn(shutdown.clone())))
            }
            None => (Arc::new(AtomicBool::new(false)), None),
        };

        let shared = Arc::new(PoolShared {
            queue: JobQueue::new(config.queue_capacity),
            stats: PoolStats::new(config.stats_window),
            dispatcher,
            bucket: config
                .requests_per_second
                .map(|rate| TokenBucket::new(rate, rate.max(1.0))),
            gate: Semaphore::new(config.max_concurrent),
            paused,
            shutdown,
        });

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                let shared = shared.clone();
                tokio::spawn(worker_loop(worker_id, shared))
            })
            .collect();

        Self { shared, workers, supervisor, accepting: AtomicBool::new(true) }
    }

    /// Accept a job into the queue. On failure the job is not accepted and
    /// no result will be produced for it.
    pub fn submit(&self, job: Job) -> Result<(), NetError> {
        if !self.accepting.load(Ordering::SeqCst) || self.shared.queue.is_closed() {
            return Err(NetError::ConfigurationInvalid("worker pool is shut down".into()));
        }
        if self.shared.paused.load(Ordering::SeqCst) {
            return Err(NetError::MemoryPressure);
        }
        match self.shared.queue.try_push(job) {
            Ok(()) => {
                self.shared.stats.record_submitted();
                Ok(())
            }
            Err(_rejected) => Err(NetError::QueueFull),
        }
    }

    /// Stop accepting submissions, cancel everything still queued, drain
    /// in-flight jobs, then halt the workers.
    pub async fn shutdown(mut self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.shared.queue.close();

        for job in self.shared.queue.drain() {
            let outcome = DispatchOutcome {
                result: Err(NetError::Canceled),
                proxy: None,
                profile: job
                    .request
                    .profile
                    .unwrap_or(self.shared.dispatcher.config().default_profile),
                attempts: 0,
                elapsed: job.enqueued_at.elapsed(),
            };
            self.shared.stats.record_result(false, true, outcome.elapsed);
            let _ = job.sink.send(outcome);
        }

        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }

        self.shared.shutdown.cancel();
        if let Some(supervisor) = self.supervisor.take() {
            let _ = supervisor.await;
        }
        tracing::debug!("worker pool stopped");
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot(self.shared.queue.lens())
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<PoolShared>) {
    tracing::debug!(worker_id, "worker started");
    while let Some(job) = shared.queue.pop().await {
        let ctx = JobCtx::new(job.cancel.clone(), job.deadline);

        // Pool-level rate limit: one token per dispatch, bounded by the
        // job's own deadline.
        if let Some(bucket) = &shared.bucket {
            if let Err(err) = bucket.acquire(&ctx).await {
                publish(&shared, job, err);
                continue;
            }
        }

        let permit = match shared.gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        shared.stats.worker_started();
        let outcome = shared.dispatcher.dispatch(&job.request, &ctx).await;
        shared.stats.worker_finished();
        drop(permit);

        let success = outcome.result.is_ok();
        let canceled = matches!(outcome.result, Err(NetError::Canceled));
        shared.stats.record_result(success, canceled, outcome.elapsed);
        tracing::debug!(worker_id, job_id = job.id, kind = outcome.kind(), "job finished");
        let _ = job.sink.send(outcome);
    }
    tracing::debug!(worker_id, "worker exiting");
}

fn publish(shared: &Arc<PoolShared>, job: Job, err: NetError) {
    let outcome = DispatchOutcome {
        result: Err(err),
        proxy: None,
        profile: job.request.profile.unwrap_or(shared.dispatcher.config().default_profile),
        attempts: 0,
        elapsed: job.enqueued_at.elapsed(),
    };
    let canceled = matches!(outcome.result, Err(NetError::Canceled));
    shared.stats.record_result(false, canceled, outcome.elapsed);
    let _ = job.sink.send(outcome);
}
