//! Core types shared by every layer: the error vocabulary the dispatcher
//! switches on, and the cancellation context threaded through each job.

pub mod cancel;
pub mod error;

pub use cancel::JobCtx;
pub use error::{NetError, ProxyPenalty, TransportCause};
