//! The proxy pool and its per-proxy health state machine.
//!
//! State transitions:
//! - hard failure: consecutive failures since the last success reaching
//!   `max_failures` moves Active/Degraded to Failed;
//! - success: resets the consecutive counter; latency above the degraded
//!   threshold moves Active to Degraded, below it moves Degraded back to
//!   Active; a success moves Failed back to Active;
//! - manual disable/enable: Disabled, and back to Active with counters
//!   reset.
//!
//! Health-aware selection never returns a Failed proxy; a probe success is
//! its only way back into rotation.

use crate::base::error::ProxyPenalty;
use crate::session::Session;
use crate::socket::proxy::ProxyEndpoint;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Active,
    Degraded,
    Failed,
    Disabled,
}

/// Selection policy, fixed at pool construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPolicy {
    /// Advance an index on every acquire; state is ignored.
    #[default]
    PerRequest,
    /// Keep returning the current proxy until a hard failure advances it.
    StickyUntilError,
    /// Prefer Active proxies by lowest observed latency (least recently
    /// used on ties); fall back to Degraded; never return Failed.
    HealthAware,
}

/// Feedback for one completed use of a proxy.
#[derive(Debug, Clone)]
pub enum ProxyOutcome {
    Success { latency: Duration },
    TransientFailure { error: String },
    HardFailure { error: String },
}

impl ProxyOutcome {
    /// Build feedback from the dispatcher's error classification.
    pub fn from_penalty(penalty: ProxyPenalty, error: String) -> Self {
        match penalty {
            ProxyPenalty::Hard => ProxyOutcome::HardFailure { error },
            ProxyPenalty::Transient => ProxyOutcome::TransientFailure { error },
        }
    }
}

/// One proxy plus everything observed about it.
#[derive(Debug, Clone)]
pub struct ProxyRecord {
    pub endpoint: ProxyEndpoint,
    pub state: ProxyState,
    pub last_check: Option<Instant>,
    pub last_latency: Option<Duration>,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub region: Option<String>,
    last_used: Option<Instant>,
}

impl ProxyRecord {
    fn new(endpoint: ProxyEndpoint) -> Self {
        Self {
            endpoint,
            state: ProxyState::Active,
            last_check: None,
            last_latency: None,
            successes: 0,
            failures: 0,
            consecutive_failures: 0,
            last_error: None,
            region: None,
            last_used: None,
        }
    }

    pub fn key(&self) -> String {
        self.endpoint.key()
    }
}

#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    pub policy: RotationPolicy,
    /// Consecutive hard failures that move a proxy to Failed.
    pub max_failures: u32,
    /// Latency above this marks a proxy Degraded; below it recovers.
    pub degraded_latency_threshold: Duration,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub probe_url: String,
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self {
            policy: RotationPolicy::PerRequest,
            max_failures: 3,
            degraded_latency_threshold: Duration::from_millis(1500),
            probe_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            probe_url: "http://www.gstatic.com/generate_204".to_string(),
        }
    }
}

/// Aggregate pool metrics; a point-in-time copy.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMetrics {
    pub total: usize,
    pub active: usize,
    pub degraded: usize,
    pub failed: usize,
    pub disabled: usize,
    pub successes: u64,
    pub failures: u64,
    pub average_latency: Option<Duration>,
    /// successes / (successes + failures), if anything completed yet.
    pub success_ratio: Option<f64>,
}

/// Owner of the proxy set. Internally synchronized; every operation is a
/// short critical section so `acquire` never blocks on probe I/O.
pub struct ProxyPool {
    records: Mutex<Vec<ProxyRecord>>,
    rr_index: AtomicUsize,
    sticky_index: AtomicUsize,
    config: ProxyPoolConfig,
}

impl ProxyPool {
    pub fn new(config: ProxyPoolConfig, endpoints: Vec<ProxyEndpoint>) -> Self {
        Self {
            records: Mutex::new(endpoints.into_iter().map(ProxyRecord::new).collect()),
            rr_index: AtomicUsize::new(0),
            sticky_index: AtomicUsize::new(0),
            config,
        }
    }

    pub fn config(&self) -> &ProxyPoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("proxy pool lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a proxy at runtime.
    pub fn add(&self, endpoint: ProxyEndpoint) {
        let mut records = self.records.lock().expect("proxy pool lock poisoned");
        if !records.iter().any(|r| r.key() == endpoint.key()) {
            records.push(ProxyRecord::new(endpoint));
        }
    }

    /// Remove a proxy; returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut records = self.records.lock().expect("proxy pool lock poisoned");
        let before = records.len();
        records.retain(|r| r.key() != key);
        records.len() != before
    }

    /// Manually disable or re-enable a proxy. Re-enabling resets counters.
    pub fn set_disabled(&self, key: &str, disabled: bool) {
        let mut records = self.records.lock().expect("proxy pool lock poisoned");
        if let Some(record) = records.iter_mut().find(|r| r.key() == key) {
            if disabled {
                record.state = ProxyState::Disabled;
            } else {
                record.state = ProxyState::Active;
                record.consecutive_failures = 0;
                record.successes = 0;
                record.failures = 0;
                record.last_error = None;
            }
        }
    }

    /// Select a proxy per the pool policy, or `None` when the pool is empty
    /// or nothing is eligible. A session's pin wins while the pinned proxy
    /// is neither Failed nor Disabled; otherwise a fresh choice is made and
    /// the pin rewritten.
    pub fn acquire(&self, session: Option<&Session>) -> Option<ProxyEndpoint> {
        let mut records = self.records.lock().expect("proxy pool lock poisoned");
        if records.is_empty() {
            return None;
        }

        if let Some(session) = session {
            if let Some(pin) = session.pinned_proxy() {
                if let Some(record) = records.iter_mut().find(|r| r.key() == pin) {
                    if !matches!(record.state, ProxyState::Failed | ProxyState::Disabled) {
                        record.last_used = Some(Instant::now());
                        return Some(record.endpoint.clone());
                    }
                }
                tracing::debug!(tag = session.tag(), pin, "pinned proxy unusable, re-pinning");
            }
            let chosen = self.select(&mut records)?;
            session.set_pinned_proxy(Some(chosen.key()));
            return Some(chosen);
        }

        self.select(&mut records)
    }

    fn select(&self, records: &mut [ProxyRecord]) -> Option<ProxyEndpoint> {
        let chosen = match self.config.policy {
            RotationPolicy::PerRequest => {
                let idx = self.rr_index.fetch_add(1, Ordering::SeqCst) % records.len();
                Some(idx)
            }
            RotationPolicy::StickyUntilError => {
                let idx = self.sticky_index.load(Ordering::SeqCst) % records.len();
                Some(idx)
            }
            RotationPolicy::HealthAware => {
                let candidate = |states: &[ProxyState]| {
                    records
                        .iter()
                        .enumerate()
                        .filter(|(_, r)| states.contains(&r.state))
                        .min_by_key(|(_, r)| {
                            // Least-recently-used breaks latency ties, so the
                            // longer the idle time the better.
                            let idle =
                                r.last_used.map(|at| at.elapsed()).unwrap_or(Duration::MAX);
                            (r.last_latency.unwrap_or(Duration::MAX), std::cmp::Reverse(idle))
                        })
                        .map(|(idx, _)| idx)
                };
                candidate(&[ProxyState::Active]).or_else(|| candidate(&[ProxyState::Degraded]))
            }
        }?;

        let record = &mut records[chosen];
        record.last_used = Some(Instant::now());
        Some(record.endpoint.clone())
    }

    /// Feed back the outcome of one use (or one probe) of a proxy.
    pub fn release(&self, key: &str, outcome: ProxyOutcome) {
        let mut records = self.records.lock().expect("proxy pool lock poisoned");
        let Some(record) = records.iter_mut().find(|r| r.key() == key) else {
            return;
        };

        record.last_check = Some(Instant::now());
        match outcome {
            ProxyOutcome::Success { latency } => {
                record.successes += 1;
                record.consecutive_failures = 0;
                record.last_latency = Some(latency);
                record.last_error = None;
                match record.state {
                    ProxyState::Failed => record.state = ProxyState::Active,
                    ProxyState::Disabled => {}
                    _ => {}
                }
                if record.state == ProxyState::Active
                    && latency > self.config.degraded_latency_threshold
                {
                    record.state = ProxyState::Degraded;
                } else if record.state == ProxyState::Degraded
                    && latency <= self.config.degraded_latency_threshold
                {
                    record.state = ProxyState::Active;
                }
            }
            ProxyOutcome::TransientFailure { error } => {
                record.failures += 1;
                record.last_error = Some(error);
            }
            ProxyOutcome::HardFailure { error } => {
                record.failures += 1;
                record.consecutive_failures += 1;
                record.last_error = Some(error);
                if record.consecutive_failures >= self.config.max_failures
                    && matches!(record.state, ProxyState::Active | ProxyState::Degraded)
                {
                    tracing::warn!(proxy = key, failures = record.consecutive_failures, "proxy marked failed");
                    record.state = ProxyState::Failed;
                }
                if self.config.policy == RotationPolicy::StickyUntilError {
                    // Advance off the broken proxy for subsequent acquires.
                    self.sticky_index.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    /// Endpoints to probe, regardless of state: a probe is how a Failed
    /// proxy earns its way back.
    pub fn probe_targets(&self) -> Vec<ProxyEndpoint> {
        self.records
            .lock()
            .expect("proxy pool lock poisoned")
            .iter()
            .filter(|r| r.state != ProxyState::Disabled)
            .map(|r| r.endpoint.clone())
            .collect()
    }

    /// Point-in-time copies of every record.
    pub fn records(&self) -> Vec<ProxyRecord> {
        self.records.lock().expect("proxy pool lock poisoned").clone()
    }

    pub fn state_of(&self, key: &str) -> Option<ProxyState> {
        self.records
            .lock()
            .expect("proxy pool lock poisoned")
            .iter()
            .find(|r| r.key() == key)
            .map(|r| r.state)
    }

    /// Aggregate metrics snapshot.
    pub fn snapshot(&self) -> PoolMetrics {
        let records = self.records.lock().expect("proxy pool lock poisoned");
        let count = |state: ProxyState| records.iter().filter(|r| r.state == state).count();

        let latencies: Vec<Duration> = records.iter().filter_map(|r| r.last_latency).collect();
        let average_latency = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<Duration>() / latencies.len() as u32)
        };

        let successes: u64 = records.iter().map(|r| r.successes).sum();
        let failures: u64 = records.iter().map(|r| r.failures).sum();
        let success_ratio = if successes + failures > 0 {
            Some(successes as f64 / (successes + failures) as f64)
        } else {
            None
        };

        PoolMetrics {
            total: records.len(),
            active: count(ProxyState::Active),
            degraded: count(ProxyState::Degraded),
            failed: count(ProxyState::Failed),
            disabled: count(ProxyState::Disabled),
            successes,
            failures,
            average_latency,
            success_ratio,
        }
    }
}
