//! A header list that preserves insertion order and exact name casing.
//!
//! Both are observable on the wire for HTTP/1.1, so the standard
//! `http::HeaderMap` (which lowercases names) cannot carry them. Lookups and
//! replacement are case-insensitive; the stored casing wins when a value is
//! replaced in place.

use crate::base::error::{NetError, TransportCause};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedHeaders {
    entries: Vec<(String, String)>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'^' | b'`' | b'|' | b'~'))
}

fn valid_value(value: &str) -> bool {
    !value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0)
}

impl OrderedHeaders {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Seed from a profile's default list, in its registered order. The
    /// defaults are compiled-in and already valid.
    pub fn from_defaults(defaults: &[(&str, &str)]) -> Self {
        Self {
            entries: defaults.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
        }
    }

    /// Replace the value of an existing header in place (the stored name
    /// casing is kept), or append when absent.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        if !valid_name(name) || !valid_value(value) {
            return Err(NetError::ConfigurationInvalid(format!("invalid header {name:?}")));
        }
        match self.entries.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Append unconditionally; used for repeated response headers.
    pub fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// First value under `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values under `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowercased `http::HeaderMap` for the HTTP/2 path, which hands casing
    /// to HPACK anyway. Order of first insertion is preserved; repeats keep
    /// their relative order.
    pub fn to_header_map(&self) -> Result<HeaderMap, NetError> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let n: HeaderName = name
                .parse()
                .map_err(|_| NetError::TransportFailure(TransportCause::BadFraming(format!("header name {name:?}"))))?;
            let v: HeaderValue = value
                .parse()
                .map_err(|_| NetError::TransportFailure(TransportCause::BadFraming(format!("header value for {name:?}"))))?;
            map.append(n, v);
        }
        Ok(map)
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for OrderedHeaders {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place_keeping_position_and_casing() {
        let mut headers = OrderedHeaders::from_defaults(&[
            ("Host", "a.test"),
            ("User-Agent", "default"),
            ("Accept", "*/*"),
        ]);
        headers.set("user-agent", "override").unwrap();

        let entries: Vec<_> = headers.iter().collect();
        assert_eq!(entries[1], ("User-Agent", "override"));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn set_appends_new_names() {
        let mut headers = OrderedHeaders::from_defaults(&[("Host", "a.test")]);
        headers.set("X-Extra", "1").unwrap();
        let entries: Vec<_> = headers.iter().collect();
        assert_eq!(entries[1], ("X-Extra", "1"));
    }

    #[test]
    fn get_is_case_insensitive() {
        let mut headers = OrderedHeaders::new();
        headers.set("DNT", "1").unwrap();
        assert_eq!(headers.get("dnt"), Some("1"));
        assert_eq!(headers.get("Dnt"), Some("1"));
    }

    #[test]
    fn append_allows_repeats() {
        let mut headers = OrderedHeaders::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("Set-Cookie", "b=2");
        let values: Vec<_> = headers.get_all("set-cookie").collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
    }

    #[test]
    fn rejects_crlf_injection() {
        let mut headers = OrderedHeaders::new();
        assert!(headers.set("X-Bad", "value\r\nInjected: 1").is_err());
        assert!(headers.set("Bad Name", "v").is_err());
    }

    #[test]
    fn header_map_preserves_order() {
        let headers = OrderedHeaders::from_defaults(&[
            ("Host", "a.test"),
            ("Accept", "*/*"),
            ("DNT", "1"),
        ]);
        let map = headers.to_header_map().unwrap();
        let names: Vec<_> = map.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["host", "accept", "dnt"]);
    }
}
