//! Sessions: per-tag cookie jar and proxy pinning.
//!
//! The map is sharded (`DashMap`) so unrelated tags never contend; each
//! session's own state sits behind its locks. A session also carries the
//! dispatch mutex the dispatcher holds for the duration of one request, so
//! cookie updates and pinned-proxy decisions compose in order on a tag.

use crate::cookies::jar::CookieJar;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub struct Session {
    tag: String,
    pub jar: CookieJar,
    pinned_proxy: Mutex<Option<String>>,
    created_at: Instant,
    dispatch_lock: tokio::sync::Mutex<()>,
}

impl Session {
    fn new(tag: String) -> Self {
        Self {
            tag,
            jar: CookieJar::new(),
            pinned_proxy: Mutex::new(None),
            created_at: Instant::now(),
            dispatch_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Identity of the proxy this session is pinned to, if any.
    pub fn pinned_proxy(&self) -> Option<String> {
        self.pinned_proxy.lock().expect("session pin lock poisoned").clone()
    }

    pub fn set_pinned_proxy(&self, proxy: Option<String>) {
        *self.pinned_proxy.lock().expect("session pin lock poisoned") = proxy;
    }

    /// Serialize dispatches on this session. Held across the whole dispatch
    /// so jar updates are atomic with respect to other requests on the tag.
    pub async fn acquire_dispatch(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.dispatch_lock.lock().await
    }
}

/// Owner of all sessions, keyed by tag.
pub struct SessionMap {
    sessions: DashMap<String, Arc<Session>>,
    ttl: Option<Duration>,
}

impl SessionMap {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { sessions: DashMap::new(), ttl }
    }

    /// Session for `tag`, created on first use. An expired session is
    /// replaced by a fresh one under the same tag.
    pub fn resolve(&self, tag: &str) -> Arc<Session> {
        if let Some(ttl) = self.ttl {
            if let Some(existing) = self.sessions.get(tag) {
                if existing.age() > ttl {
                    drop(existing);
                    let fresh = Arc::new(Session::new(tag.to_string()));
                    self.sessions.insert(tag.to_string(), fresh.clone());
                    return fresh;
                }
            }
        }
        self.sessions
            .entry(tag.to_string())
            .or_insert_with(|| Arc::new(Session::new(tag.to_string())))
            .clone()
    }

    /// Explicitly destroy a session.
    pub fn close(&self, tag: &str) {
        self.sessions.remove(tag);
    }

    /// Drop every session past its TTL.
    pub fn prune_expired(&self) {
        if let Some(ttl) = self.ttl {
            self.sessions.retain(|_, session| session.age() <= ttl);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_creates_once() {
        let map = SessionMap::new(None);
        let a = map.resolve("alpha");
        let b = map.resolve("alpha");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn close_destroys() {
        let map = SessionMap::new(None);
        let first = map.resolve("alpha");
        map.close("alpha");
        let second = map.resolve("alpha");
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn pin_round_trip() {
        let map = SessionMap::new(None);
        let session = map.resolve("alpha");
        assert_eq!(session.pinned_proxy(), None);
        session.set_pinned_proxy(Some("http://p.test:80".into()));
        assert_eq!(session.pinned_proxy(), Some("http://p.test:80".into()));
    }

    #[tokio::test]
    async fn dispatch_lock_serializes() {
        let map = SessionMap::new(None);
        let session = map.resolve("alpha");
        let guard = session.acquire_dispatch().await;
        assert!(session.dispatch_lock.try_lock().is_err());
        drop(guard);
        assert!(session.dispatch_lock.try_lock().is_ok());
    }

    #[test]
    fn expired_session_is_replaced() {
        let map = SessionMap::new(Some(Duration::ZERO));
        let first = map.resolve("alpha");
        std::thread::sleep(Duration::from_millis(5));
        let second = map.resolve("alpha");
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
