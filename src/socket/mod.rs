//! Transport layer: TCP/proxy tunneling and the fingerprint-faithful TLS
//! dialer.
//!
//! The dial path is: open a TCP connection (directly or through an HTTP,
//! HTTPS, or SOCKS5 proxy), then run a TLS handshake whose ClientHello is
//! computed from the browser profile's [`tls::hello::ClientHelloSpec`].

pub mod connect;
pub mod proxy;
pub mod stream;
pub mod tls;

pub use proxy::{ProxyEndpoint, ProxyScheme};
pub use stream::{BoxedSocket, StreamSocket};
pub use tls::{TlsDialer, TlsInfo};
