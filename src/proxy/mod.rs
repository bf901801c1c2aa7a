//! Proxy pool: ownership of upstream proxies, their health state, and the
//! rotation policy. Background probing lives in [`prober`].

pub mod pool;
pub mod prober;

pub use pool::{
    PoolMetrics, ProxyOutcome, ProxyPool, ProxyPoolConfig, ProxyRecord, ProxyState, RotationPolicy,
};
pub use prober::Prober;
