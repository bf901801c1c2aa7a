//! Normalized response surfaced to the dispatcher and callers.

use crate::http::orderedheaders::OrderedHeaders;
use crate::socket::tls::TlsInfo;
use bytes::Bytes;
use url::Url;

/// The outcome of one [`crate::http::engine::HttpEngine::execute`] call:
/// the final hop's status, headers (order and repeats preserved), decoded
/// body, and session details.
#[derive(Debug)]
pub struct NormalizedResponse {
    pub status: u16,
    pub headers: OrderedHeaders,
    pub body: Bytes,
    /// URL of the last hop after redirects.
    pub final_url: Url,
    /// Every URL visited in the redirect chain, the final one included.
    pub chain: Vec<Url>,
    /// TLS session details; `None` for plain-http exchanges.
    pub tls: Option<TlsInfo>,
    /// Application protocol of the final hop (`h2` or `http/1.1`).
    pub protocol: &'static str,
}

impl NormalizedResponse {
    /// First value of `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body as lossy UTF-8; challenge classification and text output both
    /// tolerate invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}
