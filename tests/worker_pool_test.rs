//! Worker pool invariants: one result per accepted job, the in-flight
//! bound, priority ordering, queue capacity, and shutdown behavior.

use async_trait::async_trait;
use mimicnet::base::error::NetError;
use mimicnet::base::JobCtx;
use mimicnet::cookies::CookieJar;
use mimicnet::dispatch::{DispatchConfig, DispatchRequest, Dispatcher, RequestExecutor};
use mimicnet::emulation::BrowserProfile;
use mimicnet::http::engine::EngineRequest;
use mimicnet::http::orderedheaders::OrderedHeaders;
use mimicnet::http::NormalizedResponse;
use mimicnet::pool::{Job, PoolConfig, Priority, WorkerPool};
use mimicnet::session::SessionMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

struct FakeExecutor {
    delay: Duration,
    current: AtomicU32,
    peak: AtomicU32,
    order: Mutex<Vec<String>>,
}

impl FakeExecutor {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            current: AtomicU32::new(0),
            peak: AtomicU32::new(0),
            order: Mutex::new(Vec::new()),
        })
    }

    fn peak(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }

    fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestExecutor for FakeExecutor {
    async fn execute(
        &self,
        req: &EngineRequest,
        _jar: &CookieJar,
        _profile: &BrowserProfile,
        ctx: &JobCtx,
    ) -> Result<NormalizedResponse, NetError> {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let slept = ctx.sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        slept?;
        self.order.lock().unwrap().push(req.url.path().to_string());

        Ok(NormalizedResponse {
            status: 200,
            headers: OrderedHeaders::new(),
            body: bytes::Bytes::from_static(b"ok"),
            final_url: req.url.clone(),
            chain: vec![req.url.clone()],
            tls: None,
            protocol: "h2",
        })
    }
}

fn dispatcher(executor: Arc<FakeExecutor>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        DispatchConfig { retry_limit: 0, ..Default::default() },
        executor,
        Arc::new(SessionMap::new(None)),
        None,
    ))
}

fn request(path: &str) -> DispatchRequest {
    DispatchRequest::get(Url::parse(&format!("https://jobs.test{path}")).unwrap())
}

#[tokio::test]
async fn every_accepted_job_yields_exactly_one_result() {
    let executor = FakeExecutor::new(Duration::from_millis(5));
    let pool = WorkerPool::new(
        PoolConfig { workers: 4, max_concurrent: 4, ..Default::default() },
        dispatcher(executor),
    );

    let mut receivers = Vec::new();
    for i in 0..20 {
        let priority = match i % 3 {
            0 => Priority::High,
            1 => Priority::Normal,
            _ => Priority::Low,
        };
        let (job, receiver) = Job::new(request(&format!("/{i}")), priority, None);
        pool.submit(job).unwrap();
        receivers.push(receiver);
    }

    for receiver in receivers {
        let outcome = receiver.await.expect("sink dropped without a result");
        assert_eq!(outcome.kind(), "success");
    }

    let stats = pool.stats();
    assert_eq!(stats.submitted, 20);
    assert_eq!(stats.completed, 20);
    assert_eq!(stats.in_flight, 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn in_flight_never_exceeds_max_concurrent() {
    let executor = FakeExecutor::new(Duration::from_millis(30));
    let pool = WorkerPool::new(
        PoolConfig { workers: 8, max_concurrent: 2, ..Default::default() },
        dispatcher(executor.clone()),
    );

    let mut receivers = Vec::new();
    for i in 0..10 {
        let (job, receiver) = Job::new(request(&format!("/{i}")), Priority::Normal, None);
        pool.submit(job).unwrap();
        receivers.push(receiver);
    }
    for receiver in receivers {
        receiver.await.unwrap();
    }

    assert!(executor.peak() <= 2, "peak concurrency was {}", executor.peak());
    pool.shutdown().await;
}

#[tokio::test]
async fn high_priority_jumps_the_queue() {
    let executor = FakeExecutor::new(Duration::from_millis(40));
    let pool = WorkerPool::new(
        PoolConfig { workers: 1, max_concurrent: 1, ..Default::default() },
        dispatcher(executor.clone()),
    );

    // First job occupies the single worker; the rest queue up.
    let (blocker, blocker_rx) = Job::new(request("/blocker"), Priority::Normal, None);
    pool.submit(blocker).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (low, low_rx) = Job::new(request("/low"), Priority::Low, None);
    pool.submit(low).unwrap();
    let (high, high_rx) = Job::new(request("/high"), Priority::High, None);
    pool.submit(high).unwrap();

    blocker_rx.await.unwrap();
    high_rx.await.unwrap();
    low_rx.await.unwrap();

    assert_eq!(executor.order(), vec!["/blocker", "/high", "/low"]);
    pool.shutdown().await;
}

#[tokio::test]
async fn queue_full_rejects_submission() {
    let executor = FakeExecutor::new(Duration::from_millis(100));
    let pool = WorkerPool::new(
        PoolConfig { workers: 1, max_concurrent: 1, queue_capacity: 2, ..Default::default() },
        dispatcher(executor),
    );

    // One in flight plus two queued; the next submission must bounce.
    let mut accepted = 0;
    let mut rejected = false;
    let mut receivers = Vec::new();
    for i in 0..8 {
        let (job, receiver) = Job::new(request(&format!("/{i}")), Priority::Normal, None);
        match pool.submit(job) {
            Ok(()) => {
                accepted += 1;
                receivers.push(receiver);
            }
            Err(NetError::QueueFull) => {
                rejected = true;
                break;
            }
            Err(other) => panic!("unexpected submit error: {other}"),
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    assert!(rejected, "queue never filled after {accepted} accepts");
    for receiver in receivers {
        receiver.await.unwrap();
    }
    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_cancels_queued_jobs_but_finishes_in_flight() {
    let executor = FakeExecutor::new(Duration::from_millis(80));
    let pool = WorkerPool::new(
        PoolConfig { workers: 1, max_concurrent: 1, ..Default::default() },
        dispatcher(executor),
    );

    let (running, running_rx) = Job::new(request("/running"), Priority::Normal, None);
    pool.submit(running).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (queued, queued_rx) = Job::new(request("/queued"), Priority::Normal, None);
    pool.submit(queued).unwrap();

    pool.shutdown().await;

    assert_eq!(running_rx.await.unwrap().kind(), "success");
    assert_eq!(queued_rx.await.unwrap().kind(), "canceled");
}

#[tokio::test]
async fn job_cancel_token_cancels_in_flight_dispatch() {
    let executor = FakeExecutor::new(Duration::from_secs(30));
    let pool = WorkerPool::new(
        PoolConfig { workers: 1, max_concurrent: 1, ..Default::default() },
        dispatcher(executor),
    );

    let (job, receiver) = Job::new(request("/doomed"), Priority::Normal, None);
    let cancel = job.cancel.clone();
    pool.submit(job).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), receiver)
        .await
        .expect("cancellation did not surface promptly")
        .unwrap();
    assert_eq!(outcome.kind(), "canceled");
    pool.shutdown().await;
}
