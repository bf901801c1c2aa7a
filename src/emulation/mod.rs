//! Browser profile registry.
//!
//! A [`BrowserProfile`] bundles everything observable about a browser
//! identity: the TLS ClientHello spec, the default ALPN list, the ordered
//! default header set with its exact wire casing, and the HTTP/2 SETTINGS
//! fingerprint. Profiles are compiled-in and immutable; a browser version
//! bump is a new profile function, never a mutation of a registered one.

pub mod profiles;

use crate::base::error::NetError;
use crate::socket::tls::hello::{AlpnProtocol, ClientHelloSpec};
use http2::frame::SettingsOrder;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Browser identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileId {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

impl ProfileId {
    pub const ALL: [ProfileId; 4] =
        [ProfileId::Chrome, ProfileId::Firefox, ProfileId::Safari, ProfileId::Edge];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileId::Chrome => "chrome",
            ProfileId::Firefox => "firefox",
            ProfileId::Safari => "safari",
            ProfileId::Edge => "edge",
        }
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileId {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" => Ok(ProfileId::Chrome),
            "firefox" => Ok(ProfileId::Firefox),
            "safari" => Ok(ProfileId::Safari),
            "edge" => Ok(ProfileId::Edge),
            other => Err(NetError::UnknownProfile(other.to_string())),
        }
    }
}

/// HTTP/2 SETTINGS fingerprint carried by a profile.
///
/// Anti-bot systems fingerprint the initial SETTINGS frame at two levels:
/// the parameter values and the order they are written in.
#[derive(Debug, Clone)]
pub struct H2Profile {
    pub header_table_size: Option<u32>,
    pub enable_push: Option<bool>,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: u32,
    pub initial_conn_window_size: u32,
    pub max_frame_size: Option<u32>,
    pub max_header_list_size: Option<u32>,
    pub settings_order: Option<SettingsOrder>,
}

/// An immutable browser identity: ClientHello, ALPN, headers, HTTP/2 shape.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub id: ProfileId,
    pub hello: ClientHelloSpec,
    /// Default advertised ALPN list, in the profile's order.
    pub alpn: Vec<AlpnProtocol>,
    /// Ordered default headers with exact wire casing. The entry named
    /// `Host` with an empty value marks where the authority goes on HTTP/1.1.
    pub headers: Vec<(&'static str, &'static str)>,
    pub user_agent: &'static str,
    pub h2: H2Profile,
}

static REGISTRY: Lazy<HashMap<ProfileId, BrowserProfile>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(ProfileId::Chrome, profiles::chrome::profile());
    map.insert(ProfileId::Firefox, profiles::firefox::profile());
    map.insert(ProfileId::Safari, profiles::safari::profile());
    map.insert(ProfileId::Edge, profiles::edge::profile());
    map
});

/// Look up a registered profile. Total over [`ProfileId`].
pub fn lookup(id: ProfileId) -> &'static BrowserProfile {
    REGISTRY.get(&id).expect("all profile ids are registered at startup")
}

/// Look up a profile by name; fails with [`NetError::UnknownProfile`] for
/// names outside the registered set.
pub fn lookup_name(name: &str) -> Result<&'static BrowserProfile, NetError> {
    let id: ProfileId = name.parse()?;
    Ok(lookup(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_total_over_ids() {
        for id in ProfileId::ALL {
            let profile = lookup(id);
            assert_eq!(profile.id, id);
            assert!(!profile.hello.cipher_suites.is_empty());
            assert!(!profile.headers.is_empty());
        }
    }

    #[test]
    fn lookup_name_rejects_unknown() {
        assert!(matches!(lookup_name("netscape"), Err(NetError::UnknownProfile(_))));
        assert!(lookup_name("chrome").is_ok());
        assert!(lookup_name("Firefox").is_ok());
    }

    #[test]
    fn every_profile_has_host_slot() {
        for id in ProfileId::ALL {
            let profile = lookup(id);
            assert!(
                profile.headers.iter().any(|(name, value)| *name == "Host" && value.is_empty()),
                "{id} profile is missing its Host placeholder"
            );
        }
    }

    #[test]
    fn user_agent_matches_header_entry() {
        for id in ProfileId::ALL {
            let profile = lookup(id);
            let ua = profile
                .headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
                .map(|(_, value)| *value);
            assert_eq!(ua, Some(profile.user_agent));
        }
    }

    #[test]
    fn profiles_advertise_h2_and_h1() {
        for id in ProfileId::ALL {
            let profile = lookup(id);
            assert_eq!(profile.alpn, vec![AlpnProtocol::HTTP2, AlpnProtocol::HTTP1]);
        }
    }
}
