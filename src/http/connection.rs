//! Protocol streams over dialed sockets, and the idle-connection cache.
//!
//! HTTP/1.1 runs over the hand-written codec in [`crate::http::h1`]. HTTP/2
//! runs over the forked `http2` crate so the initial SETTINGS frame carries
//! the profile's parameter values in the profile's order.

use crate::base::cancel::JobCtx;
use crate::base::error::{NetError, TransportCause};
use crate::emulation::H2Profile;
use crate::http::h1;
use crate::http::orderedheaders::OrderedHeaders;
use crate::socket::stream::BoxedSocket;
use crate::socket::tls::TlsInfo;
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::poll_fn;
use http::Method;
use http2::client;
use std::time::{Duration, Instant};

fn h2_error(stage: &str, err: impl std::fmt::Display) -> NetError {
    NetError::TransportFailure(TransportCause::Io(format!("h2 {stage}: {err}")))
}

/// Response as it comes off a protocol stream, before normalization.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: OrderedHeaders,
    pub body: Vec<u8>,
    /// Whether the connection survives this exchange.
    pub reusable: bool,
}

/// An HTTP/1.1 connection owning its socket.
pub struct H1Connection {
    socket: BoxedSocket,
    pub tls: Option<TlsInfo>,
}

impl H1Connection {
    pub fn new(socket: BoxedSocket, tls: Option<TlsInfo>) -> Self {
        Self { socket, tls }
    }

    pub async fn round_trip(
        &mut self,
        method: &Method,
        target: &str,
        headers: &OrderedHeaders,
        body: Option<&[u8]>,
        max_body: usize,
        ctx: &JobCtx,
        io_timeout: Duration,
    ) -> Result<RawResponse, NetError> {
        h1::write_request(&mut self.socket, method, target, headers, body, ctx, io_timeout)
            .await?;
        let resp = h1::read_response(
            &mut self.socket,
            method == Method::HEAD,
            max_body,
            ctx,
            io_timeout,
        )
        .await?;
        Ok(RawResponse {
            status: resp.status,
            headers: resp.headers,
            body: resp.body,
            reusable: resp.keep_alive,
        })
    }
}

/// A multiplexed HTTP/2 session; clones share the connection.
#[derive(Clone)]
pub struct H2Connection {
    sender: client::SendRequest<Bytes>,
    pub tls: Option<TlsInfo>,
}

impl H2Connection {
    /// Handshake over a dialed socket, writing the profile's SETTINGS
    /// fingerprint, and spawn the connection driver.
    pub async fn handshake(
        socket: BoxedSocket,
        h2: &H2Profile,
        ctx: &JobCtx,
        io_timeout: Duration,
        tls: Option<TlsInfo>,
    ) -> Result<Self, NetError> {
        let io = socket;

        let mut builder = client::Builder::new();
        builder.initial_window_size(h2.initial_window_size);
        builder.initial_connection_window_size(h2.initial_conn_window_size);
        if let Some(size) = h2.max_frame_size {
            builder.max_frame_size(size);
        }
        if let Some(streams) = h2.max_concurrent_streams {
            builder.max_concurrent_streams(streams);
        }
        if let Some(size) = h2.max_header_list_size {
            builder.max_header_list_size(size);
        }
        if let Some(size) = h2.header_table_size {
            builder.header_table_size(size);
        }
        if let Some(push) = h2.enable_push {
            builder.enable_push(push);
        }
        if let Some(order) = &h2.settings_order {
            builder.settings_order(order.clone());
        }

        let (sender, conn) = ctx
            .run(io_timeout, async {
                builder.handshake::<_, Bytes>(io).await.map_err(|e| h2_error("handshake", e))
            })
            .await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "h2 connection closed");
            }
        });

        Ok(Self { sender, tls })
    }

    pub async fn round_trip(
        &mut self,
        req: http::Request<()>,
        body: Option<Bytes>,
        max_body: usize,
    ) -> Result<RawResponse, NetError> {
        let sender = self.sender.clone();
        let mut ready = sender.ready().await.map_err(|e| h2_error("ready", e))?;

        let end_of_stream = body.is_none();
        let (response, mut send_stream) = ready
            .send_request(req, end_of_stream)
            .map_err(|e| h2_error("send_request", e))?;
        if let Some(bytes) = body {
            send_stream.send_data(bytes, true).map_err(|e| h2_error("send_data", e))?;
        }

        let resp = response.await.map_err(|e| h2_error("response", e))?;
        let (parts, mut recv) = resp.into_parts();

        let mut headers = OrderedHeaders::new();
        for (name, value) in &parts.headers {
            headers.append(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        }

        let mut body_bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = poll_fn(|cx| recv.poll_data(cx)).await {
            let chunk = chunk.map_err(|e| h2_error("body", e))?;
            if body_bytes.len() + chunk.len() > max_body {
                return Err(NetError::ResponseTooLarge { limit: max_body });
            }
            let released = chunk.len();
            body_bytes.extend_from_slice(&chunk);
            let _ = recv.flow_control().release_capacity(released);
        }

        Ok(RawResponse {
            status: parts.status.as_u16(),
            headers,
            body: body_bytes,
            reusable: true,
        })
    }
}

/// Idle-connection cache keyed by (scheme, authority, proxy, profile).
///
/// H1 connections are parked after a clean keep-alive exchange and reused
/// until the idle timeout; H2 sessions are shared while the driver lives.
/// Fingerprint isolation comes from the key: sockets dialed under one
/// profile or proxy are never reused for another.
pub struct ConnectionCache {
    h1: DashMap<String, Vec<(H1Connection, Instant)>>,
    h2: DashMap<String, H2Connection>,
    max_idle_per_key: usize,
    idle_timeout: Duration,
}

impl ConnectionCache {
    pub fn new(max_idle_per_key: usize, idle_timeout: Duration) -> Self {
        Self { h1: DashMap::new(), h2: DashMap::new(), max_idle_per_key, idle_timeout }
    }

    pub fn checkout_h1(&self, key: &str) -> Option<H1Connection> {
        let mut entry = self.h1.get_mut(key)?;
        let now = Instant::now();
        entry.retain(|(_, since)| now.duration_since(*since) < self.idle_timeout);
        entry.pop().map(|(conn, _)| conn)
    }

    pub fn store_h1(&self, key: String, conn: H1Connection) {
        let mut entry = self.h1.entry(key).or_default();
        if entry.len() < self.max_idle_per_key {
            entry.push((conn, Instant::now()));
        }
    }

    pub fn get_h2(&self, key: &str) -> Option<H2Connection> {
        self.h2.get(key).map(|conn| conn.clone())
    }

    pub fn store_h2(&self, key: String, conn: H2Connection) {
        self.h2.insert(key, conn);
    }

    pub fn remove_h2(&self, key: &str) {
        self.h2.remove(key);
    }

    /// Drop everything; called by the memory supervisor under pressure.
    pub fn clear(&self) {
        self.h1.clear();
        self.h2.clear();
    }

    pub fn idle_count(&self) -> usize {
        self.h1.iter().map(|e| e.value().len()).sum::<usize>() + self.h2.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn socket_pair() -> BoxedSocket {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let _server = listener.accept().await.unwrap();
        BoxedSocket::new(client)
    }

    #[tokio::test]
    async fn h1_cache_checkout_returns_stored() {
        let cache = ConnectionCache::new(4, Duration::from_secs(60));
        assert!(cache.checkout_h1("k").is_none());

        cache.store_h1("k".into(), H1Connection::new(socket_pair().await, None));
        assert!(cache.checkout_h1("k").is_some());
        assert!(cache.checkout_h1("k").is_none());
    }

    #[tokio::test]
    async fn h1_cache_respects_capacity() {
        let cache = ConnectionCache::new(1, Duration::from_secs(60));
        cache.store_h1("k".into(), H1Connection::new(socket_pair().await, None));
        cache.store_h1("k".into(), H1Connection::new(socket_pair().await, None));
        assert_eq!(cache.idle_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn h1_cache_expires_idle_connections() {
        let cache = ConnectionCache::new(4, Duration::from_millis(100));
        cache.store_h1("k".into(), H1Connection::new(socket_pair().await, None));
        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(cache.checkout_h1("k").is_none());
    }
}
