//! Fingerprint-faithful TLS dialer.
//!
//! [`TlsDialer::dial`] opens a TCP connection (optionally tunneled through a
//! proxy), runs a TLS handshake whose ClientHello is computed from the
//! supplied [`hello::ClientHelloSpec`], and returns the stream together with
//! the negotiated ALPN protocol and session details.

pub mod hello;

use crate::base::cancel::JobCtx;
use crate::base::error::NetError;
use crate::socket::connect;
use crate::socket::proxy::ProxyEndpoint;
use crate::socket::stream::BoxedSocket;
use boring::ssl::{SslConnector, SslMethod};
use hello::{AlpnProtocol, ClientHelloSpec};
use std::net::IpAddr;
use std::time::Duration;
use tokio_boring::SslStream;

/// Details of an established TLS session, surfaced on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsInfo {
    pub version: String,
    pub cipher: String,
    pub alpn: String,
}

/// A dialed TLS connection plus the negotiated application protocol.
pub struct DialedTls {
    pub stream: SslStream<BoxedSocket>,
    pub alpn: AlpnProtocol,
    pub info: TlsInfo,
}

/// Dials TLS connections shaped by a browser profile's ClientHello spec.
#[derive(Debug, Clone)]
pub struct TlsDialer {
    io_timeout: Duration,
}

impl TlsDialer {
    pub fn new(io_timeout: Duration) -> Self {
        Self { io_timeout }
    }

    /// Advertised ALPN: the intersection of the profile's list with the
    /// requested set, in the profile's order.
    pub fn alpn_intersection(
        profile_alpn: &[AlpnProtocol],
        requested: &[AlpnProtocol],
    ) -> Vec<AlpnProtocol> {
        profile_alpn
            .iter()
            .filter(|p| requested.contains(p))
            .copied()
            .collect()
    }

    /// Establish a connection to `host:port` and handshake with the
    /// profile's exact ClientHello, advertising `alpn`.
    pub async fn dial(
        &self,
        host: &str,
        port: u16,
        spec: &ClientHelloSpec,
        alpn: &[AlpnProtocol],
        proxy: Option<&ProxyEndpoint>,
        ctx: &JobCtx,
    ) -> Result<DialedTls, NetError> {
        let socket = connect::open_tunnel(host, port, proxy, ctx, self.io_timeout).await?;

        let mut builder = SslConnector::builder(SslMethod::tls())
            .map_err(|e| NetError::TlsHandshakeFailed(format!("connector: {e}")))?;
        spec.apply_to_connector(&mut builder, alpn)?;
        let connector = builder.build();
        let mut config = connector
            .configure()
            .map_err(|e| NetError::TlsHandshakeFailed(format!("configure: {e}")))?;

        // SNI carries the literal host, and never an IP address.
        if host.parse::<IpAddr>().is_ok() {
            config.set_use_server_name_indication(false);
            config.set_verify_hostname(false);
        }

        let host_owned = host.to_string();
        let stream = ctx
            .run(self.io_timeout, async move {
                tokio_boring::connect(config, &host_owned, socket)
                    .await
                    .map_err(|e| NetError::TlsHandshakeFailed(format!("{e:?}")))
            })
            .await?;

        let negotiated = match stream.ssl().selected_alpn_protocol() {
            Some(wire) => AlpnProtocol::from_wire(wire).ok_or_else(|| {
                NetError::TlsHandshakeFailed(format!(
                    "server selected unknown ALPN {:?}",
                    String::from_utf8_lossy(wire)
                ))
            })?,
            // No selection: fall back to HTTP/1.1 when it was on offer.
            None if alpn.contains(&AlpnProtocol::HTTP1) => AlpnProtocol::HTTP1,
            None => {
                return Err(NetError::TlsHandshakeFailed(
                    "server negotiated no ALPN protocol".into(),
                ))
            }
        };

        let info = TlsInfo {
            version: stream.ssl().version_str().to_string(),
            cipher: stream
                .ssl()
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            alpn: negotiated.as_str().to_string(),
        };

        tracing::debug!(
            host,
            alpn = info.alpn.as_str(),
            version = info.version.as_str(),
            "tls handshake complete"
        );

        Ok(DialedTls { stream, alpn: negotiated, info })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_preserves_profile_order() {
        let profile = [AlpnProtocol::HTTP2, AlpnProtocol::HTTP1];
        let narrowed = TlsDialer::alpn_intersection(&profile, &[AlpnProtocol::HTTP1]);
        assert_eq!(narrowed, vec![AlpnProtocol::HTTP1]);

        let both =
            TlsDialer::alpn_intersection(&profile, &[AlpnProtocol::HTTP1, AlpnProtocol::HTTP2]);
        assert_eq!(both, vec![AlpnProtocol::HTTP2, AlpnProtocol::HTTP1]);
    }

    #[test]
    fn intersection_empty_when_disjoint() {
        let narrowed = TlsDialer::alpn_intersection(&[AlpnProtocol::HTTP2], &[AlpnProtocol::HTTP1]);
        assert!(narrowed.is_empty());
    }
}
