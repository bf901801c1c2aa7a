//! Session cookie storage: RFC 6265 matching, atomic merge semantics, and
//! the tab-separated persistence format.

pub mod jar;
pub mod persistence;

pub use jar::{CookieJar, SameSite, StoredCookie};
