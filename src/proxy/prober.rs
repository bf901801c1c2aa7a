//! Background health probing.
//!
//! The prober issues a small GET to the configured probe URL through each
//! registered proxy on a fixed interval. Results feed the pool's state
//! machine exactly like dispatcher feedback; a successful probe is the only
//! path from Failed back to Active. Probe I/O happens outside the pool's
//! lock, so `acquire` never waits on it.

use crate::base::cancel::JobCtx;
use crate::base::error::NetError;
use crate::http::h1;
use crate::http::orderedheaders::OrderedHeaders;
use crate::proxy::pool::{ProxyOutcome, ProxyPool};
use crate::socket::connect;
use crate::socket::proxy::ProxyEndpoint;
use crate::socket::stream::BoxedSocket;
use boring::ssl::{SslConnector, SslMethod};
use http::Method;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

pub struct Prober {
    pool: Arc<ProxyPool>,
}

impl Prober {
    pub fn new(pool: Arc<ProxyPool>) -> Self {
        Self { pool }
    }

    /// Run the probe loop until `shutdown` fires.
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let interval = self.pool.config().probe_interval;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                self.probe_all().await;
            }
            tracing::debug!("prober stopped");
        })
    }

    /// One health pass over every non-disabled proxy.
    pub async fn probe_all(&self) {
        let config = self.pool.config().clone();
        let Ok(url) = Url::parse(&config.probe_url) else {
            tracing::warn!(url = config.probe_url, "invalid probe url, skipping pass");
            return;
        };

        for endpoint in self.pool.probe_targets() {
            let key = endpoint.key();
            let started = Instant::now();
            let outcome = match probe_one(&endpoint, &url, config.probe_timeout).await {
                Ok(()) => ProxyOutcome::Success { latency: started.elapsed() },
                Err(e) => {
                    tracing::debug!(proxy = key, error = %e, "probe failed");
                    ProxyOutcome::HardFailure { error: e.to_string() }
                }
            };
            self.pool.release(&key, outcome);
        }
    }
}

/// GET the probe URL through `proxy`; any 2xx/3xx counts as healthy.
async fn probe_one(
    proxy: &ProxyEndpoint,
    url: &Url,
    timeout: std::time::Duration,
) -> Result<(), NetError> {
    let ctx = JobCtx::new(CancellationToken::new(), Some(Instant::now() + timeout));
    let host = url
        .host_str()
        .ok_or_else(|| NetError::ConfigurationInvalid("probe url has no host".into()))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| NetError::ConfigurationInvalid("probe url has no port".into()))?;

    let socket = connect::open_tunnel(&host, port, Some(proxy), &ctx, timeout).await?;

    // A probe checks reachability, not fingerprints; a stock TLS client
    // keeps it cheap.
    let mut socket = if url.scheme() == "https" {
        let connector = SslConnector::builder(SslMethod::tls())
            .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?
            .build();
        let config = connector
            .configure()
            .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;
        let stream = ctx
            .run(timeout, async {
                tokio_boring::connect(config, &host, socket)
                    .await
                    .map_err(|e| NetError::TlsHandshakeFailed(format!("{e:?}")))
            })
            .await?;
        BoxedSocket::new(stream)
    } else {
        socket
    };

    let mut headers = OrderedHeaders::new();
    headers.set("Host", &host)?;
    headers.set("Connection", "close")?;

    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    h1::write_request(&mut socket, &Method::GET, &target, &headers, None, &ctx, timeout).await?;
    let resp = h1::read_response(&mut socket, false, 64 * 1024, &ctx, timeout).await?;

    if resp.status < 400 {
        Ok(())
    } else {
        Err(NetError::ProxyUnreachable(format!("probe returned status {}", resp.status)))
    }
}
