//! HTTP engine: wire-accurate request emission over HTTP/1.1 and HTTP/2.
//!
//! - [`orderedheaders`]: header list preserving order and exact casing
//! - [`h1`]: hand-written HTTP/1.1 request writer and response reader
//! - [`connection`]: H1/H2 streams, fingerprinted H2 handshake, idle cache
//! - [`engine`]: the request executor (header policy, cookies, redirects)
//! - [`decode`]: transparent gzip/deflate/brotli response decoding

pub mod connection;
pub mod decode;
pub mod engine;
pub mod h1;
pub mod orderedheaders;
pub mod response;

pub use engine::{EngineConfig, EngineRequest, HttpEngine, ProtocolSelector};
pub use orderedheaders::OrderedHeaders;
pub use response::NormalizedResponse;
