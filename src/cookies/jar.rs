//! Per-session cookie jar.
//!
//! The jar preserves insertion order, which is what the `Cookie` header
//! serialization follows for a host. A `Set-Cookie` replaces the prior entry
//! with the same (name, domain, path) in place; `Max-Age=0` or a past
//! `Expires` deletes it instead. Reads take a shared lock, merges an
//! exclusive one, so concurrent dispatches on the same session never observe
//! a partially applied update.

use std::sync::RwLock;
use time::OffsetDateTime;
use url::Url;

/// Cookie `SameSite` attribute; absent means `Lax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

/// One cookie at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    /// Registered domain, without a leading dot.
    pub domain: String,
    pub path: String,
    /// `None` marks a session cookie.
    pub expires: Option<OffsetDateTime>,
    pub secure: bool,
    pub http_only: bool,
    /// Set when the cookie carried no `Domain` attribute: exact-host match
    /// only.
    pub host_only: bool,
    pub same_site: SameSite,
}

impl StoredCookie {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn matches_url(&self, url: &Url, now: OffsetDateTime) -> bool {
        let host = url.host_str().unwrap_or_default();
        domain_matches(&self.domain, host, self.host_only)
            && path_matches(&self.path, url.path())
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired(now)
    }
}

#[derive(Default)]
pub struct CookieJar {
    // Insertion order is observable in the Cookie header; a flat list keeps
    // it exact.
    store: RwLock<Vec<StoredCookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one `Set-Cookie` line from a response at `url` and merge it.
    pub fn store_response_cookie(&self, url: &Url, line: &str) {
        let Ok(parsed) = cookie::Cookie::parse(line) else {
            tracing::debug!(line, "unparseable Set-Cookie, dropped");
            return;
        };
        let request_host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        let (domain, host_only) = match parsed.domain() {
            Some(domain) => {
                let domain = domain.trim_start_matches('.').to_ascii_lowercase();
                // A Domain attribute that doesn't cover the request host is
                // an attempt to set a cookie for someone else.
                if !domain_matches(&domain, &request_host, false) {
                    tracing::debug!(line, %domain, "Set-Cookie domain mismatch, dropped");
                    return;
                }
                (domain, false)
            }
            None => (request_host.clone(), true),
        };

        let path = match parsed.path() {
            Some(path) if path.starts_with('/') => path.to_string(),
            _ => default_path(url.path()),
        };

        let now = OffsetDateTime::now_utc();
        let (expires, delete) = match parsed.max_age() {
            Some(max_age) if max_age.is_zero() || max_age.is_negative() => (None, true),
            Some(max_age) => (Some(now + max_age), false),
            None => match parsed.expires().and_then(|e| e.datetime()) {
                Some(at) if at <= now => (None, true),
                Some(at) => (Some(at), false),
                None => (None, false),
            },
        };

        let same_site = match parsed.same_site() {
            Some(cookie::SameSite::Strict) => SameSite::Strict,
            Some(cookie::SameSite::None) => SameSite::None,
            // Unspecified is treated as Lax.
            _ => SameSite::Lax,
        };

        let mut store = self.store.write().expect("cookie jar lock poisoned");
        let existing = store
            .iter()
            .position(|c| c.name == parsed.name() && c.domain == domain && c.path == path);

        if delete {
            if let Some(idx) = existing {
                store.remove(idx);
            }
            return;
        }

        let cookie = StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path,
            expires,
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            host_only,
            same_site,
        };

        match existing {
            // Replace in place: the cookie keeps its slot in the insertion
            // order.
            Some(idx) => store[idx] = cookie,
            None => store.push(cookie),
        }
    }

    /// Cookies applicable to `url`, in jar insertion order.
    pub fn cookies_for_url(&self, url: &Url) -> Vec<StoredCookie> {
        let now = OffsetDateTime::now_utc();
        let store = self.store.read().expect("cookie jar lock poisoned");
        store.iter().filter(|c| c.matches_url(url, now)).cloned().collect()
    }

    /// The `Cookie` header value for `url`, or `None` when nothing matches.
    pub fn header_for_url(&self, url: &Url) -> Option<String> {
        let cookies = self.cookies_for_url(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Point-in-time copy of every stored cookie.
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        self.store.read().expect("cookie jar lock poisoned").clone()
    }

    /// Replace the jar contents; used when loading a cookie file.
    pub fn replace_all(&self, cookies: Vec<StoredCookie>) {
        *self.store.write().expect("cookie jar lock poisoned") = cookies;
    }

    pub fn clear(&self) {
        self.store.write().expect("cookie jar lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.store.read().expect("cookie jar lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// RFC 6265 domain matching.
fn domain_matches(cookie_domain: &str, request_host: &str, host_only: bool) -> bool {
    if host_only {
        return cookie_domain.eq_ignore_ascii_case(request_host);
    }
    if request_host.eq_ignore_ascii_case(cookie_domain) {
        return true;
    }
    if request_host.len() > cookie_domain.len() {
        let suffix = &request_host[request_host.len() - cookie_domain.len()..];
        if suffix.eq_ignore_ascii_case(cookie_domain) {
            let boundary = request_host.len() - cookie_domain.len() - 1;
            return request_host.as_bytes().get(boundary) == Some(&b'.');
        }
    }
    false
}

/// RFC 6265 path matching.
fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    if request_path.starts_with(cookie_path) {
        if cookie_path.ends_with('/') {
            return true;
        }
        return request_path.as_bytes().get(cookie_path.len()) == Some(&b'/');
    }
    false
}

/// RFC 6265 default-path: the request path's directory.
fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}
