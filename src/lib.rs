//! # mimicnet
//!
//! A browser-faithful HTTPS request engine. `mimicnet` performs requests
//! that are indistinguishable at the TLS and HTTP layers from those of real
//! consumer browsers, through a pool of health-checked upstream proxies.
//!
//! ## What it does
//!
//! - **ClientHello shaping**: each browser profile carries a full
//!   ClientHello spec (cipher order, extension order, extension payloads);
//!   the dialer emits it byte-faithfully through BoringSSL, and a
//!   deterministic encoder pins the bytes in golden tests.
//! - **Wire-accurate headers**: the profile's default header set goes out in
//!   its registered order with its exact casing, on HTTP/1.1 and HTTP/2.
//! - **Proxy health**: per-proxy state machine (Active, Degraded, Failed,
//!   Disabled) fed by request outcomes and background probes, with
//!   round-robin, sticky, and health-aware rotation.
//! - **Dispatch discipline**: retries with jittered exponential backoff,
//!   global and per-host token buckets, per-session serialization, sticky
//!   proxy pinning, cooperative cancellation at every suspension point.
//! - **Bounded concurrency**: a priority worker pool with a token-bucket
//!   rate limit, aggregate metrics, and a memory supervisor.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use mimicnet::base::JobCtx;
//! use mimicnet::cookies::CookieJar;
//! use mimicnet::emulation::{lookup, ProfileId};
//! use mimicnet::http::{EngineConfig, EngineRequest, HttpEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = HttpEngine::new(EngineConfig::default());
//!     let jar = CookieJar::new();
//!     let req = EngineRequest::get("https://example.com".parse().unwrap());
//!     let resp = engine
//!         .execute(&req, &jar, lookup(ProfileId::Chrome), &JobCtx::unbounded())
//!         .await
//!         .unwrap();
//!     println!("{} via {}", resp.status, resp.protocol);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - error vocabulary and cancellation context
//! - [`emulation`] - browser profile registry
//! - [`socket`] - TCP/proxy tunneling and the TLS dialer
//! - [`http`] - HTTP/1.1 and HTTP/2 engine with ordered headers
//! - [`cookies`] - cookie jar and persistence
//! - [`session`] - per-tag sessions with proxy pinning
//! - [`proxy`] - proxy pool, health states, background probing
//! - [`dispatch`] - retries, rate limits, classification
//! - [`pool`] - priority worker pool
//! - [`cli`] - command-line front end

pub mod base;
pub mod cli;
pub mod cookies;
pub mod dispatch;
pub mod emulation;
pub mod http;
pub mod pool;
pub mod proxy;
pub mod session;
pub mod socket;
