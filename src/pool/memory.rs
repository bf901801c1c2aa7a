//! Memory supervision.
//!
//! Samples process RSS on a fixed cadence. Above the soft limit, new
//! submissions are refused (`MemoryPressure`) and the engine is asked to
//! shed its idle-connection caches; admission resumes once usage drops
//! below the limit minus the hysteresis margin. Workers keep draining
//! in-flight jobs throughout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub soft_limit_bytes: u64,
    /// Admission resumes below `soft_limit_bytes - hysteresis_bytes`.
    pub hysteresis_bytes: u64,
    pub sample_interval: Duration,
}

impl MemoryConfig {
    pub fn with_limit_mb(limit_mb: u64) -> Self {
        let soft_limit_bytes = limit_mb * 1024 * 1024;
        Self {
            soft_limit_bytes,
            hysteresis_bytes: soft_limit_bytes / 10,
            sample_interval: Duration::from_secs(2),
        }
    }
}

/// Resident set size of this process, if the platform exposes it.
pub fn rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * 4096)
}

pub struct MemorySupervisor {
    config: MemoryConfig,
    paused: Arc<AtomicBool>,
    shed: Arc<dyn Fn() + Send + Sync>,
}

impl MemorySupervisor {
    pub fn new(config: MemoryConfig, shed: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self { config, paused: Arc::new(AtomicBool::new(false)), shed }
    }

    /// Flag the pool's admission gate checks.
    pub fn paused_flag(&self) -> Arc<AtomicBool> {
        self.paused.clone()
    }

    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.sample_interval) => {}
                }
                let Some(rss) = rss_bytes() else { continue };
                self.observe(rss);
            }
        })
    }

    /// One sampling step; factored out so tests can drive it directly.
    pub fn observe(&self, rss: u64) {
        let paused = self.paused.load(Ordering::SeqCst);
        if !paused && rss > self.config.soft_limit_bytes {
            tracing::warn!(
                rss_mb = rss / (1024 * 1024),
                limit_mb = self.config.soft_limit_bytes / (1024 * 1024),
                "memory soft limit exceeded, pausing admission"
            );
            self.paused.store(true, Ordering::SeqCst);
            (self.shed)();
        } else if paused
            && rss < self.config.soft_limit_bytes.saturating_sub(self.config.hysteresis_bytes)
        {
            tracing::info!(rss_mb = rss / (1024 * 1024), "memory recovered, resuming admission");
            self.paused.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn pause_and_resume_with_hysteresis() {
        let shed_calls = Arc::new(AtomicU32::new(0));
        let shed = {
            let calls = shed_calls.clone();
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }) as Arc<dyn Fn() + Send + Sync>
        };
        let config = MemoryConfig {
            soft_limit_bytes: 1000,
            hysteresis_bytes: 200,
            sample_interval: Duration::from_secs(1),
        };
        let supervisor = MemorySupervisor::new(config, shed);
        let paused = supervisor.paused_flag();

        supervisor.observe(900);
        assert!(!paused.load(Ordering::SeqCst));

        supervisor.observe(1100);
        assert!(paused.load(Ordering::SeqCst));
        assert_eq!(shed_calls.load(Ordering::SeqCst), 1);

        // Still inside the hysteresis band: stays paused.
        supervisor.observe(900);
        assert!(paused.load(Ordering::SeqCst));

        supervisor.observe(700);
        assert!(!paused.load(Ordering::SeqCst));
    }

    #[test]
    fn rss_reads_on_linux() {
        if cfg!(target_os = "linux") {
            assert!(rss_bytes().unwrap() > 0);
        }
    }
}
