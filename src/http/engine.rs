//! The HTTP engine: one wire-accurate exchange per call.
//!
//! `execute` owns the header policy (profile defaults in registered order,
//! overrides substituted in place, jar-order Cookie header, profile-cased
//! names on HTTP/1.1), the cookie merge after every hop, and the redirect
//! chain. Protocol selection maps to the ALPN set handed to the dialer.

use crate::base::cancel::JobCtx;
use crate::base::error::{NetError, TransportCause};
use crate::cookies::jar::CookieJar;
use crate::emulation::BrowserProfile;
use crate::http::connection::{ConnectionCache, H1Connection, H2Connection, RawResponse};
use crate::http::decode::decode_body;
use crate::http::orderedheaders::OrderedHeaders;
use crate::http::response::NormalizedResponse;
use crate::socket::connect;
use crate::socket::proxy::ProxyEndpoint;
use crate::socket::stream::BoxedSocket;
use crate::socket::tls::hello::AlpnProtocol;
use crate::socket::tls::{TlsDialer, TlsInfo};
use bytes::Bytes;
use http::{Method, Version};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Which application protocol the caller wants; maps to the ALPN set the
/// dialer advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolSelector {
    ForceHttp1,
    ForceHttp2,
    #[default]
    Auto,
}

impl ProtocolSelector {
    pub fn requested(self) -> &'static [AlpnProtocol] {
        match self {
            ProtocolSelector::ForceHttp1 => &[AlpnProtocol::HTTP1],
            ProtocolSelector::ForceHttp2 => &[AlpnProtocol::HTTP2],
            ProtocolSelector::Auto => &[AlpnProtocol::HTTP2, AlpnProtocol::HTTP1],
        }
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub follow_redirects: bool,
    pub max_redirects: u32,
    /// Ceiling on the (decoded) response body.
    pub max_response_bytes: usize,
    /// Budget for one full HTTP round trip (one hop).
    pub round_trip_timeout: Duration,
    /// Budget for each individual I/O operation inside a hop.
    pub io_timeout: Duration,
    pub max_idle_per_key: usize,
    pub idle_timeout: Duration,
    pub decode_body: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            max_redirects: 10,
            max_response_bytes: 10 * 1024 * 1024,
            round_trip_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(10),
            max_idle_per_key: 6,
            idle_timeout: Duration::from_secs(90),
            decode_body: true,
        }
    }
}

/// One request as the dispatcher hands it to the engine.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub url: Url,
    pub method: Method,
    /// Per-request header overrides; each replaces the profile default of
    /// the same name in place.
    pub overrides: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub selector: ProtocolSelector,
    pub proxy: Option<ProxyEndpoint>,
    /// When false, only a bare header set goes out instead of the profile's
    /// full default block.
    pub header_mimicry: bool,
    /// Drop the `Sec-*` and `sec-ch-*` defaults from the emitted set.
    pub strip_sec_headers: bool,
}

impl EngineRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            overrides: Vec::new(),
            body: None,
            selector: ProtocolSelector::Auto,
            proxy: None,
            header_mimicry: true,
            strip_sec_headers: false,
        }
    }
}

struct Hop {
    raw: RawResponse,
    tls: Option<TlsInfo>,
    protocol: &'static str,
}

pub struct HttpEngine {
    dialer: TlsDialer,
    cache: ConnectionCache,
    config: EngineConfig,
}

impl HttpEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            dialer: TlsDialer::new(config.io_timeout),
            cache: ConnectionCache::new(config.max_idle_per_key, config.idle_timeout),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drop idle connections; the memory supervisor calls this under
    /// pressure.
    pub fn shed_caches(&self) {
        self.cache.clear();
    }

    /// Perform one HTTP exchange, following redirects per configuration.
    pub async fn execute(
        &self,
        req: &EngineRequest,
        jar: &CookieJar,
        profile: &BrowserProfile,
        ctx: &JobCtx,
    ) -> Result<NormalizedResponse, NetError> {
        let mut url = req.url.clone();
        let mut method = req.method.clone();
        let mut body = req.body.clone();
        let mut overrides = req.overrides.clone();
        let mut referer: Option<String> = None;
        let mut visited: HashSet<String> = HashSet::from([url.to_string()]);
        let mut chain = vec![url.clone()];
        let mut hops = 0u32;

        loop {
            ctx.check()?;

            let hop = self
                .round_trip(&url, &method, &overrides, body.as_deref(), referer.as_deref(), req, jar, profile, ctx)
                .await?;

            // Merge every Set-Cookie before deciding anything else; redirect
            // hops contribute cookies too.
            for line in hop.raw.headers.get_all("set-cookie") {
                jar.store_response_cookie(&url, line);
            }

            let status = hop.raw.status;
            let location = hop.raw.headers.get("location").map(str::to_string);
            let follow = self.config.follow_redirects
                && self.config.max_redirects > 0
                && (300..400).contains(&status)
                && location.is_some();

            if follow {
                if hops >= self.config.max_redirects {
                    return Err(NetError::TransportFailure(TransportCause::TooManyRedirects));
                }
                let next = url
                    .join(location.as_deref().unwrap_or_default())
                    .map_err(|e| NetError::TransportFailure(TransportCause::BadFraming(format!("location: {e}"))))?;
                if !visited.insert(next.to_string()) {
                    return Err(NetError::RedirectLoop(next.to_string()));
                }

                let new_method = redirect_method(&method, status);
                if new_method == Method::GET && method != Method::GET {
                    body = None;
                    overrides.retain(|(name, _)| {
                        !name.eq_ignore_ascii_case("content-type")
                            && !name.eq_ignore_ascii_case("content-length")
                    });
                }
                method = new_method;

                // Credentials never cross origins.
                let mut next = next;
                if url.origin() != next.origin() {
                    overrides.retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
                    let _ = next.set_username("");
                    let _ = next.set_password(None);
                }

                referer = Some(referer_value(&url));
                tracing::debug!(from = %url, to = %next, status, "following redirect");
                url = next;
                chain.push(url.clone());
                hops += 1;
                continue;
            }

            let mut out_body = hop.raw.body;
            if self.config.decode_body {
                if let Some(encoding) = hop.raw.headers.get("content-encoding") {
                    out_body = decode_body(encoding, &out_body, self.config.max_response_bytes)?;
                }
            }

            return Ok(NormalizedResponse {
                status,
                headers: hop.raw.headers,
                body: Bytes::from(out_body),
                final_url: url,
                chain,
                tls: hop.tls,
                protocol: hop.protocol,
            });
        }
    }

    /// One hop: resolve a connection (cache or fresh dial), emit the
    /// request, read the response. Bounded by the round-trip timeout.
    #[allow(clippy::too_many_arguments)]
    async fn round_trip(
        &self,
        url: &Url,
        method: &Method,
        overrides: &[(String, String)],
        body: Option<&[u8]>,
        referer: Option<&str>,
        req: &EngineRequest,
        jar: &CookieJar,
        profile: &BrowserProfile,
        ctx: &JobCtx,
    ) -> Result<Hop, NetError> {
        ctx.run(self.config.round_trip_timeout, async {
            let host = url
                .host_str()
                .ok_or_else(|| NetError::ConfigurationInvalid(format!("no host in {url}")))?
                .to_string();
            let port = url
                .port_or_known_default()
                .ok_or_else(|| NetError::ConfigurationInvalid(format!("no port in {url}")))?;
            let authority = authority_string(url);
            let cookie = jar.header_for_url(url);
            let is_tls = match url.scheme() {
                "https" => true,
                "http" => false,
                other => {
                    return Err(NetError::ConfigurationInvalid(format!("unsupported scheme {other:?}")))
                }
            };

            let policy = HeaderPolicy {
                mimicry: req.header_mimicry,
                strip_sec_headers: req.strip_sec_headers,
            };
            let proxy_key = req.proxy.as_ref().map(|p| p.key()).unwrap_or_default();
            let key = format!("{}|{}|{}|{}", url.scheme(), authority, proxy_key, profile.id);

            if !is_tls {
                // Plain-http targets always speak HTTP/1.1.
                let headers = build_headers(
                    profile, false, &authority, overrides, cookie.as_deref(), referer, body, policy,
                )?;
                let target = request_target(url);

                if let Some(mut conn) = self.cache.checkout_h1(&key) {
                    match conn
                        .round_trip(method, &target, &headers, body, self.config.max_response_bytes, ctx, self.config.io_timeout)
                        .await
                    {
                        Ok(raw) => {
                            let reusable = raw.reusable;
                            if reusable {
                                self.cache.store_h1(key, conn);
                            }
                            return Ok(Hop { raw, tls: None, protocol: "http/1.1" });
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "idle connection failed, redialing");
                        }
                    }
                }

                let socket = connect::open_tunnel(&host, port, req.proxy.as_ref(), ctx, self.config.io_timeout).await?;
                let mut conn = H1Connection::new(socket, None);
                let raw = conn
                    .round_trip(method, &target, &headers, body, self.config.max_response_bytes, ctx, self.config.io_timeout)
                    .await?;
                if raw.reusable {
                    self.cache.store_h1(key, conn);
                }
                return Ok(Hop { raw, tls: None, protocol: "http/1.1" });
            }

            let alpn = TlsDialer::alpn_intersection(&profile.alpn, req.selector.requested());
            if alpn.is_empty() {
                return Err(NetError::ConfigurationInvalid(format!(
                    "profile {} offers none of the requested protocols",
                    profile.id
                )));
            }

            // Multiplex on a live H2 session when one exists.
            if alpn.contains(&AlpnProtocol::HTTP2) {
                if let Some(mut conn) = self.cache.get_h2(&key) {
                    let headers = build_headers(profile, true, &authority, overrides, cookie.as_deref(), referer, body, policy)?;
                    let h2_req = build_h2_request(method, url, &headers)?;
                    match conn.round_trip(h2_req, body.map(Bytes::copy_from_slice), self.config.max_response_bytes).await {
                        Ok(raw) => {
                            return Ok(Hop { raw, tls: conn.tls.clone(), protocol: "h2" });
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "cached h2 session failed, redialing");
                            self.cache.remove_h2(&key);
                        }
                    }
                }
            } else if let Some(mut conn) = self.cache.checkout_h1(&key) {
                let headers = build_headers(profile, false, &authority, overrides, cookie.as_deref(), referer, body, policy)?;
                let target = request_target(url);
                match conn
                    .round_trip(method, &target, &headers, body, self.config.max_response_bytes, ctx, self.config.io_timeout)
                    .await
                {
                    Ok(raw) => {
                        let tls = conn.tls.clone();
                        if raw.reusable {
                            self.cache.store_h1(key, conn);
                        }
                        return Ok(Hop { raw, tls, protocol: "http/1.1" });
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "idle tls connection failed, redialing");
                    }
                }
            }

            // Fresh dial with the profile's exact ClientHello.
            let dialed = self
                .dialer
                .dial(&host, port, &profile.hello, &alpn, req.proxy.as_ref(), ctx)
                .await?;
            let tls_info = Some(dialed.info.clone());

            if dialed.alpn == AlpnProtocol::HTTP2 {
                let mut conn = H2Connection::handshake(
                    BoxedSocket::new(dialed.stream),
                    &profile.h2,
                    ctx,
                    self.config.io_timeout,
                    tls_info.clone(),
                )
                .await?;
                self.cache.store_h2(key, conn.clone());

                let headers = build_headers(profile, true, &authority, overrides, cookie.as_deref(), referer, body, policy)?;
                let h2_req = build_h2_request(method, url, &headers)?;
                let raw = conn
                    .round_trip(h2_req, body.map(Bytes::copy_from_slice), self.config.max_response_bytes)
                    .await?;
                Ok(Hop { raw, tls: tls_info, protocol: "h2" })
            } else {
                let headers = build_headers(profile, false, &authority, overrides, cookie.as_deref(), referer, body, policy)?;
                let target = request_target(url);
                let mut conn = H1Connection::new(BoxedSocket::new(dialed.stream), tls_info.clone());
                let raw = conn
                    .round_trip(method, &target, &headers, body, self.config.max_response_bytes, ctx, self.config.io_timeout)
                    .await?;
                if raw.reusable {
                    self.cache.store_h1(key, conn);
                }
                Ok(Hop { raw, tls: tls_info, protocol: "http/1.1" })
            }
        })
        .await
    }
}

/// Header-policy inputs that stay fixed across the hops of one exchange.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPolicy {
    pub mimicry: bool,
    pub strip_sec_headers: bool,
}

/// Assemble the outgoing header block per the profile's policy.
///
/// Order: the profile defaults in registered order (with the authority in
/// the `Host` slot on HTTP/1.1), overrides replacing matching defaults in
/// place, then Referer, Content-Length, and Cookie appended for entries no
/// default covers.
pub fn build_headers(
    profile: &BrowserProfile,
    is_h2: bool,
    authority: &str,
    overrides: &[(String, String)],
    cookie: Option<&str>,
    referer: Option<&str>,
    body: Option<&[u8]>,
    policy: HeaderPolicy,
) -> Result<OrderedHeaders, NetError> {
    let mut headers = if policy.mimicry {
        OrderedHeaders::from_defaults(&profile.headers)
    } else {
        // Bare set: enough to be a valid request, nothing more.
        OrderedHeaders::from_defaults(&[
            ("Host", ""),
            ("User-Agent", profile.user_agent),
            ("Accept", "*/*"),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("Connection", "keep-alive"),
        ])
    };

    if policy.strip_sec_headers {
        let sec_names: Vec<String> = headers
            .iter()
            .filter(|(name, _)| {
                let lower = name.to_ascii_lowercase();
                lower.starts_with("sec-")
            })
            .map(|(name, _)| name.to_string())
            .collect();
        for name in sec_names {
            headers.remove(&name);
        }
    }

    if is_h2 {
        // :authority replaces Host, and connection-management headers are
        // forbidden on HTTP/2.
        headers.remove("host");
        headers.remove("connection");
    } else {
        headers.set("Host", authority)?;
    }

    if let Some(referer) = referer {
        headers.set("Referer", referer)?;
    }

    for (name, value) in overrides {
        headers.set(name, value)?;
    }

    if let Some(body) = body {
        if headers.get("content-length").is_none() {
            headers.set("Content-Length", &body.len().to_string())?;
        }
    }

    if let Some(cookie) = cookie {
        headers.set("Cookie", cookie)?;
    }

    Ok(headers)
}

fn build_h2_request(
    method: &Method,
    url: &Url,
    headers: &OrderedHeaders,
) -> Result<http::Request<()>, NetError> {
    let mut req = http::Request::builder()
        .method(method.clone())
        .uri(url.as_str())
        .version(Version::HTTP_2)
        .body(())
        .map_err(|e| NetError::ConfigurationInvalid(format!("request build: {e}")))?;
    *req.headers_mut() = headers.to_header_map()?;
    Ok(req)
}

/// Origin-form request target: path plus query.
fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Host header / :authority value; the port appears only when nonstandard.
pub fn authority_string(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match (url.port(), url.scheme()) {
        (Some(port), "https") if port != 443 => format!("{host}:{port}"),
        (Some(port), "http") if port != 80 => format!("{host}:{port}"),
        _ => host.to_string(),
    }
}

/// Method after a redirect: 307/308 keep the method, 301/302/303 become GET
/// (HEAD stays HEAD) and the body is dropped.
fn redirect_method(method: &Method, status: u16) -> Method {
    match status {
        307 | 308 => method.clone(),
        301 | 302 | 303 if *method == Method::HEAD => Method::HEAD,
        301 | 302 | 303 => Method::GET,
        _ => method.clone(),
    }
}

/// Referer omits credentials and fragments.
fn referer_value(url: &Url) -> String {
    let mut clean = url.clone();
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    clean.set_fragment(None);
    clean.to_string()
}
