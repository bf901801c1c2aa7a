//! Request dispatch: retries, rate gates, session binding, proxy feedback,
//! and outcome classification for one job.

pub mod classify;
pub mod dispatcher;
pub mod limiter;

pub use classify::ChallengeConfig;
pub use dispatcher::{
    DispatchConfig, DispatchOutcome, DispatchRequest, Dispatcher, RequestExecutor,
};
pub use limiter::{HostLimiter, TokenBucket};
