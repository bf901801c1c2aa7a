//! End-to-end execution of one job.
//!
//! `dispatch` resolves the profile (explicit, randomized, or default) and
//! the session, passes the rate gates, applies the inter-request delay, and
//! runs the retry loop: acquire proxy, execute, classify, feed the proxy
//! pool back, back off. Exactly one outcome comes out, whatever happens
//! inside.

use crate::base::cancel::JobCtx;
use crate::base::error::NetError;
use crate::cookies::jar::CookieJar;
use crate::dispatch::classify::{classify_response, ChallengeConfig};
use crate::dispatch::limiter::{HostLimiter, TokenBucket};
use crate::emulation::{self, BrowserProfile, ProfileId};
use crate::http::engine::{EngineRequest, HttpEngine, ProtocolSelector};
use crate::http::response::NormalizedResponse;
use crate::proxy::pool::{ProxyOutcome, ProxyPool};
use crate::session::SessionMap;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Seam between the dispatcher and the HTTP engine; lets the retry logic be
/// exercised without sockets.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(
        &self,
        req: &EngineRequest,
        jar: &CookieJar,
        profile: &BrowserProfile,
        ctx: &JobCtx,
    ) -> Result<NormalizedResponse, NetError>;

    /// Best-effort memory shedding under pool pressure.
    fn shed_memory(&self) {}
}

#[async_trait]
impl RequestExecutor for HttpEngine {
    async fn execute(
        &self,
        req: &EngineRequest,
        jar: &CookieJar,
        profile: &BrowserProfile,
        ctx: &JobCtx,
    ) -> Result<NormalizedResponse, NetError> {
        HttpEngine::execute(self, req, jar, profile, ctx).await
    }

    fn shed_memory(&self) {
        self.shed_caches();
    }
}

/// Dispatcher policy knobs.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub default_profile: ProfileId,
    /// Pool drawn from when profile randomization is on.
    pub profile_set: Vec<ProfileId>,
    pub randomize_profile: bool,
    /// Additional attempts after the first; 0 means exactly one attempt.
    pub retry_limit: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub randomize_delay: bool,
    /// Global requests-per-second gate; `None` is unlimited.
    pub global_rate: Option<f64>,
    /// Per-host requests-per-second gate; `None` is unlimited.
    pub per_host_rate: Option<f64>,
    pub challenge: ChallengeConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_profile: ProfileId::Chrome,
            profile_set: ProfileId::ALL.to_vec(),
            randomize_profile: false,
            retry_limit: 3,
            backoff_base: Duration::from_millis(400),
            backoff_max: Duration::from_secs(10),
            delay_min: Duration::ZERO,
            delay_max: Duration::ZERO,
            randomize_delay: false,
            global_rate: None,
            per_host_rate: None,
            challenge: ChallengeConfig::default(),
        }
    }
}

/// One job as submitted to the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub url: Url,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub session_tag: Option<String>,
    pub profile: Option<ProfileId>,
    pub selector: ProtocolSelector,
    pub header_mimicry: bool,
    pub strip_sec_headers: bool,
}

impl DispatchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: Vec::new(),
            body: None,
            session_tag: None,
            profile: None,
            selector: ProtocolSelector::Auto,
            header_mimicry: true,
            strip_sec_headers: false,
        }
    }
}

/// What one dispatch produced: the response or final error, plus the
/// context a failure report needs.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub result: Result<NormalizedResponse, NetError>,
    /// Proxy identity in effect on the last attempt.
    pub proxy: Option<String>,
    pub profile: ProfileId,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl DispatchOutcome {
    pub fn kind(&self) -> &'static str {
        match &self.result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        }
    }

    /// Final HTTP status, if the exchange got that far.
    pub fn status(&self) -> Option<u16> {
        match &self.result {
            Ok(resp) => Some(resp.status),
            Err(err) => err.status(),
        }
    }
}

pub struct Dispatcher {
    config: DispatchConfig,
    executor: Arc<dyn RequestExecutor>,
    sessions: Arc<SessionMap>,
    proxies: Option<Arc<ProxyPool>>,
    global_bucket: Option<TokenBucket>,
    host_limiter: Option<HostLimiter>,
}

impl Dispatcher {
    pub fn new(
        config: DispatchConfig,
        executor: Arc<dyn RequestExecutor>,
        sessions: Arc<SessionMap>,
        proxies: Option<Arc<ProxyPool>>,
    ) -> Self {
        let global_bucket =
            config.global_rate.map(|rate| TokenBucket::new(rate, rate.max(1.0)));
        let host_limiter = config.per_host_rate.map(HostLimiter::new);
        Self { config, executor, sessions, proxies, global_bucket, host_limiter }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<dyn RequestExecutor> {
        &self.executor
    }

    pub fn sessions(&self) -> &Arc<SessionMap> {
        &self.sessions
    }

    /// Execute one job to completion, cancellation, or retry exhaustion.
    pub async fn dispatch(&self, req: &DispatchRequest, ctx: &JobCtx) -> DispatchOutcome {
        let started = Instant::now();
        let profile_id = self.resolve_profile(req);
        let profile = emulation::lookup(profile_id);

        let outcome = |result: Result<NormalizedResponse, NetError>,
                       proxy: Option<String>,
                       attempts: u32,
                       elapsed: Duration| DispatchOutcome {
            result,
            proxy,
            profile: profile_id,
            attempts,
            elapsed,
        };

        // Serialize dispatches per session for the whole duration, so the
        // jar update and any pin rewrite are atomic on the tag.
        let session = req.session_tag.as_deref().map(|tag| self.sessions.resolve(tag));
        let _serialized = match &session {
            Some(session) => Some(session.acquire_dispatch().await),
            None => None,
        };

        // Rate gates come before the delay and count against the deadline.
        if let Some(bucket) = &self.global_bucket {
            if let Err(err) = bucket.acquire(ctx).await {
                return outcome(Err(err), None, 0, started.elapsed());
            }
        }
        if let Some(limiter) = &self.host_limiter {
            let host = req.url.host_str().unwrap_or_default();
            if let Err(err) = limiter.acquire(host, ctx).await {
                return outcome(Err(err), None, 0, started.elapsed());
            }
        }

        let delay = self.draw_delay();
        if !delay.is_zero() {
            if let Err(err) = ctx.sleep(delay).await {
                return outcome(Err(err), None, 0, started.elapsed());
            }
        }

        let scratch_jar;
        let jar: &CookieJar = match &session {
            Some(session) => &session.jar,
            None => {
                // Sessionless jobs still need cookie continuity across the
                // redirect chain of a single dispatch.
                scratch_jar = CookieJar::new();
                &scratch_jar
            }
        };

        let mut proxy_key: Option<String> = None;
        for attempt in 0..=self.config.retry_limit {
            let attempts = attempt + 1;
            if let Err(err) = ctx.check() {
                return outcome(Err(err), proxy_key, attempt, started.elapsed());
            }

            let proxy = self.proxies.as_ref().and_then(|pool| pool.acquire(session.as_deref()));
            proxy_key = proxy.as_ref().map(|p| p.key());

            let engine_req = EngineRequest {
                url: req.url.clone(),
                method: req.method.clone(),
                overrides: req.headers.clone(),
                body: req.body.clone(),
                selector: req.selector,
                proxy,
                header_mimicry: req.header_mimicry,
                strip_sec_headers: req.strip_sec_headers,
            };

            let attempt_started = Instant::now();
            let classified = match self.executor.execute(&engine_req, jar, profile, ctx).await {
                Ok(resp) => match classify_response(&resp, &self.config.challenge) {
                    None => Ok(resp),
                    Some(err) => Err(err),
                },
                Err(err) => Err(err),
            };

            match classified {
                Ok(resp) => {
                    if let (Some(pool), Some(key)) = (&self.proxies, &proxy_key) {
                        pool.release(
                            key,
                            ProxyOutcome::Success { latency: attempt_started.elapsed() },
                        );
                    }
                    return outcome(Ok(resp), proxy_key, attempts, started.elapsed());
                }
                Err(err) => {
                    if let (Some(pool), Some(key)) = (&self.proxies, &proxy_key) {
                        if let Some(penalty) = err.proxy_penalty() {
                            pool.release(key, ProxyOutcome::from_penalty(penalty, err.to_string()));
                        }
                    }
                    tracing::debug!(url = %req.url, attempt, error = %err, "attempt failed");

                    if !err.is_retryable() || attempt == self.config.retry_limit {
                        return outcome(Err(err), proxy_key, attempts, started.elapsed());
                    }
                    if let Err(sleep_err) = ctx.sleep(self.backoff_for(attempt)).await {
                        // Deadline or cancel cut the backoff short; that is
                        // the job's final result.
                        return outcome(Err(sleep_err), proxy_key, attempts, started.elapsed());
                    }
                }
            }
        }

        unreachable!("retry loop always returns");
    }

    fn resolve_profile(&self, req: &DispatchRequest) -> ProfileId {
        if let Some(id) = req.profile {
            return id;
        }
        if self.config.randomize_profile && !self.config.profile_set.is_empty() {
            let idx = rand::thread_rng().gen_range(0..self.config.profile_set.len());
            return self.config.profile_set[idx];
        }
        self.config.default_profile
    }

    fn draw_delay(&self) -> Duration {
        let min = self.config.delay_min;
        let max = self.config.delay_max;
        if self.config.randomize_delay && max > min {
            let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
            Duration::from_secs_f64(secs)
        } else {
            min
        }
    }

    /// Exponential base-2 backoff from `backoff_base`, capped at
    /// `backoff_max`, plus uniform jitter in [0, backoff_base].
    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base;
        let exp = base.saturating_mul(1u32 << attempt.min(16));
        let capped = exp.min(self.config.backoff_max);
        let jitter = Duration::from_secs_f64(
            rand::thread_rng().gen_range(0.0..=base.as_secs_f64().max(f64::EPSILON)),
        );
        capped + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::error::TransportCause;
    use crate::http::orderedheaders::OrderedHeaders;
    use crate::proxy::pool::{ProxyPoolConfig, ProxyState, RotationPolicy};
    use crate::socket::proxy::ProxyEndpoint;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    struct ScriptedExecutor {
        script: Mutex<VecDeque<Result<NormalizedResponse, NetError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedExecutor {
        fn new(script: Vec<Result<NormalizedResponse, NetError>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script.into()), calls: Mutex::new(0) })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl RequestExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            _req: &EngineRequest,
            _jar: &CookieJar,
            _profile: &BrowserProfile,
            _ctx: &JobCtx,
        ) -> Result<NormalizedResponse, NetError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(NetError::ConfigurationInvalid("script exhausted".into())))
        }
    }

    fn ok_response(status: u16, body: &str) -> NormalizedResponse {
        let url = Url::parse("https://example.test/").unwrap();
        NormalizedResponse {
            status,
            headers: OrderedHeaders::new(),
            body: Bytes::from(body.to_string()),
            final_url: url.clone(),
            chain: vec![url],
            tls: None,
            protocol: "h2",
        }
    }

    fn dispatcher_with(
        executor: Arc<ScriptedExecutor>,
        config: DispatchConfig,
        proxies: Option<Arc<ProxyPool>>,
    ) -> Dispatcher {
        Dispatcher::new(config, executor, Arc::new(SessionMap::new(None)), proxies)
    }

    fn fast_config(retries: u32) -> DispatchConfig {
        DispatchConfig {
            retry_limit: retries,
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let executor = ScriptedExecutor::new(vec![Err(NetError::TimedOut)]);
        let dispatcher = dispatcher_with(executor.clone(), fast_config(0), None);

        let out = dispatcher
            .dispatch(&DispatchRequest::get(Url::parse("https://a.test/").unwrap()), &JobCtx::unbounded())
            .await;
        assert_eq!(executor.calls(), 1);
        assert_eq!(out.attempts, 1);
        assert_eq!(out.kind(), "timed_out");
    }

    #[tokio::test]
    async fn retryable_error_then_success() {
        let executor = ScriptedExecutor::new(vec![
            Err(NetError::ProxyUnreachable("refused".into())),
            Ok(ok_response(200, "ok")),
        ]);
        let dispatcher = dispatcher_with(executor.clone(), fast_config(3), None);

        let out = dispatcher
            .dispatch(&DispatchRequest::get(Url::parse("https://a.test/").unwrap()), &JobCtx::unbounded())
            .await;
        assert_eq!(out.kind(), "success");
        assert_eq!(out.attempts, 2);
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn fatal_error_not_retried() {
        let executor = ScriptedExecutor::new(vec![Err(NetError::RedirectLoop("https://a.test/".into()))]);
        let dispatcher = dispatcher_with(executor.clone(), fast_config(5), None);

        let out = dispatcher
            .dispatch(&DispatchRequest::get(Url::parse("https://a.test/").unwrap()), &JobCtx::unbounded())
            .await;
        assert_eq!(executor.calls(), 1);
        assert_eq!(out.kind(), "redirect_loop");
    }

    #[tokio::test]
    async fn challenge_reclassified_and_proxy_hard_failed() {
        // A 200 whose body carries the marker: transport succeeded, but the
        // identity was flagged. The single proxy takes hard failures and
        // stays in rotation because per-request selection ignores state.
        let executor = ScriptedExecutor::new(vec![
            Ok(ok_response(200, "Verify you are human")),
            Ok(ok_response(200, "Verify you are human")),
            Ok(ok_response(200, "Verify you are human")),
        ]);
        let pool = Arc::new(ProxyPool::new(
            ProxyPoolConfig {
                policy: RotationPolicy::PerRequest,
                max_failures: 1,
                ..Default::default()
            },
            vec![ProxyEndpoint::parse("http://q.test:8080").unwrap()],
        ));
        let dispatcher = dispatcher_with(executor.clone(), fast_config(2), Some(pool.clone()));

        let out = dispatcher
            .dispatch(&DispatchRequest::get(Url::parse("https://a.test/").unwrap()), &JobCtx::unbounded())
            .await;

        assert_eq!(out.kind(), "challenge_detected");
        assert_eq!(out.status(), Some(200));
        assert_eq!(out.proxy.as_deref(), Some("http://q.test:8080"));
        assert_eq!(out.attempts, 3);
        assert_eq!(pool.state_of("http://q.test:8080"), Some(ProxyState::Failed));
    }

    #[tokio::test]
    async fn proxy_released_success_on_ok() {
        let executor = ScriptedExecutor::new(vec![Ok(ok_response(200, "ok"))]);
        let pool = Arc::new(ProxyPool::new(
            ProxyPoolConfig::default(),
            vec![ProxyEndpoint::parse("http://p.test:8080").unwrap()],
        ));
        let dispatcher = dispatcher_with(executor, fast_config(0), Some(pool.clone()));

        let out = dispatcher
            .dispatch(&DispatchRequest::get(Url::parse("https://a.test/").unwrap()), &JobCtx::unbounded())
            .await;
        assert_eq!(out.kind(), "success");
        let record = &pool.records()[0];
        assert_eq!(record.successes, 1);
        assert!(record.last_latency.is_some());
    }

    #[tokio::test]
    async fn deadline_cuts_backoff_short() {
        // First attempt fails fast; the configured backoff far exceeds the
        // deadline, so the sleep is cut and the job ends as timed_out.
        let executor = ScriptedExecutor::new(vec![
            Err(NetError::TransportFailure(TransportCause::Io("reset".into()))),
            Ok(ok_response(200, "never reached")),
        ]);
        let config = DispatchConfig {
            retry_limit: 2,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(5),
            ..Default::default()
        };
        let dispatcher = dispatcher_with(executor.clone(), config, None);

        let ctx = JobCtx::new(
            CancellationToken::new(),
            Some(Instant::now() + Duration::from_millis(200)),
        );
        let started = Instant::now();
        let out = dispatcher
            .dispatch(&DispatchRequest::get(Url::parse("https://a.test/").unwrap()), &ctx)
            .await;

        assert_eq!(out.kind(), "timed_out");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_produces_canceled_outcome() {
        let executor = ScriptedExecutor::new(vec![
            Err(NetError::TransportFailure(TransportCause::Io("reset".into()))),
        ]);
        let config = DispatchConfig {
            retry_limit: 2,
            backoff_base: Duration::from_secs(30),
            backoff_max: Duration::from_secs(30),
            ..Default::default()
        };
        let dispatcher = Arc::new(dispatcher_with(executor, config, None));

        let token = CancellationToken::new();
        let ctx = JobCtx::new(token.clone(), None);
        let handle = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(&DispatchRequest::get(Url::parse("https://a.test/").unwrap()), &ctx)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        let out = handle.await.unwrap();
        assert_eq!(out.kind(), "canceled");
    }

    #[tokio::test]
    async fn explicit_profile_wins_over_default() {
        let executor = ScriptedExecutor::new(vec![Ok(ok_response(200, "ok"))]);
        let dispatcher = dispatcher_with(executor, fast_config(0), None);

        let mut req = DispatchRequest::get(Url::parse("https://a.test/").unwrap());
        req.profile = Some(ProfileId::Safari);
        let out = dispatcher.dispatch(&req, &JobCtx::unbounded()).await;
        assert_eq!(out.profile, ProfileId::Safari);
    }

    #[tokio::test]
    async fn session_dispatches_are_serialized() {
        struct SlowExecutor {
            concurrent: Arc<Mutex<(u32, u32)>>, // (current, peak)
        }

        #[async_trait]
        impl RequestExecutor for SlowExecutor {
            async fn execute(
                &self,
                _req: &EngineRequest,
                _jar: &CookieJar,
                _profile: &BrowserProfile,
                _ctx: &JobCtx,
            ) -> Result<NormalizedResponse, NetError> {
                {
                    let mut state = self.concurrent.lock().unwrap();
                    state.0 += 1;
                    state.1 = state.1.max(state.0);
                }
                tokio::time::sleep(Duration::from_millis(30)).await;
                self.concurrent.lock().unwrap().0 -= 1;
                Ok(ok_response(200, "ok"))
            }
        }

        let concurrent = Arc::new(Mutex::new((0, 0)));
        let executor = Arc::new(SlowExecutor { concurrent: concurrent.clone() });
        let dispatcher = Arc::new(Dispatcher::new(
            fast_config(0),
            executor,
            Arc::new(SessionMap::new(None)),
            None,
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                let mut req = DispatchRequest::get(Url::parse("https://a.test/").unwrap());
                req.session_tag = Some("tag".into());
                dispatcher.dispatch(&req, &JobCtx::unbounded()).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().kind(), "success");
        }
        assert_eq!(concurrent.lock().unwrap().1, 1);
    }
}
