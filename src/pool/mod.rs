//! Worker pool: bounded concurrent dispatch with strict priority ordering,
//! pool-level rate limiting, aggregate metrics, and a memory supervisor.

pub mod memory;
pub mod queue;
pub mod stats;
pub mod worker;

pub use memory::{MemoryConfig, MemorySupervisor};
pub use queue::JobQueue;
pub use stats::{PoolStats, StatsSnapshot};
pub use worker::{Job, PoolConfig, Priority, WorkerPool};
