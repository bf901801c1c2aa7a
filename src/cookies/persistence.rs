//! Cookie file persistence.
//!
//! One cookie per line, fields tab-separated in Netscape order:
//! domain, include-subdomains flag, path, secure flag, expires epoch,
//! name, value. Session cookies persist with epoch 0. `#` lines and blank
//! lines are skipped on load; unparseable lines are dropped with a warning
//! rather than failing the whole file.

use crate::base::error::NetError;
use crate::cookies::jar::{SameSite, StoredCookie};
use std::path::Path;
use time::OffsetDateTime;

const HEADER: &str = "# HTTP cookie file";

pub fn load_cookies(path: &Path) -> Result<Vec<StoredCookie>, NetError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| NetError::ConfigurationInvalid(format!("cookie file {}: {e}", path.display())))?;

    let mut cookies = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some(cookie) => cookies.push(cookie),
            None => {
                tracing::warn!(file = %path.display(), line = lineno + 1, "skipping malformed cookie line");
            }
        }
    }
    Ok(cookies)
}

pub fn save_cookies(path: &Path, cookies: &[StoredCookie]) -> Result<(), NetError> {
    let mut out = String::with_capacity(cookies.len() * 64 + HEADER.len() + 1);
    out.push_str(HEADER);
    out.push('\n');
    for cookie in cookies {
        let epoch = cookie.expires.map(|at| at.unix_timestamp()).unwrap_or(0);
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            cookie.domain,
            flag(!cookie.host_only),
            cookie.path,
            flag(cookie.secure),
            epoch,
            cookie.name,
            cookie.value,
        ));
    }
    std::fs::write(path, out)
        .map_err(|e| NetError::ConfigurationInvalid(format!("cookie file {}: {e}", path.display())))
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn parse_line(line: &str) -> Option<StoredCookie> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 7 {
        return None;
    }
    let include_subdomains = fields[1].eq_ignore_ascii_case("TRUE");
    let secure = fields[3].eq_ignore_ascii_case("TRUE");
    let epoch: i64 = fields[4].parse().ok()?;
    let expires = if epoch == 0 {
        None
    } else {
        OffsetDateTime::from_unix_timestamp(epoch).ok()
    };

    Some(StoredCookie {
        name: fields[5].to_string(),
        value: fields[6].to_string(),
        domain: fields[0].trim_start_matches('.').to_ascii_lowercase(),
        path: fields[2].to_string(),
        expires,
        secure,
        http_only: false,
        host_only: !include_subdomains,
        same_site: SameSite::Lax,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::jar::CookieJar;
    use url::Url;

    fn sample() -> Vec<StoredCookie> {
        vec![
            StoredCookie {
                name: "sid".into(),
                value: "abc123".into(),
                domain: "a.test".into(),
                path: "/".into(),
                expires: OffsetDateTime::from_unix_timestamp(4102444800).ok(),
                secure: true,
                http_only: false,
                host_only: true,
                same_site: SameSite::Lax,
            },
            StoredCookie {
                name: "lang".into(),
                value: "en".into(),
                domain: "a.test".into(),
                path: "/docs".into(),
                expires: None,
                secure: false,
                http_only: false,
                host_only: false,
                same_site: SameSite::Lax,
            },
        ]
    }

    #[test]
    fn round_trip_preserves_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");

        let original = sample();
        save_cookies(&path, &original).unwrap();
        let loaded = load_cookies(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn reloaded_jar_accepts_same_set_cookie_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        let u = Url::parse("https://a.test/").unwrap();

        let jar = CookieJar::new();
        jar.store_response_cookie(&u, "sid=1; Max-Age=600");
        jar.store_response_cookie(&u, "lang=en");
        save_cookies(&path, &jar.snapshot()).unwrap();

        let reloaded = CookieJar::new();
        reloaded.replace_all(load_cookies(&path).unwrap());
        reloaded.store_response_cookie(&u, "sid=2; Max-Age=600");

        let fresh = CookieJar::new();
        fresh.store_response_cookie(&u, "sid=1; Max-Age=600");
        fresh.store_response_cookie(&u, "lang=en");
        fresh.store_response_cookie(&u, "sid=2; Max-Age=600");

        let strip = |mut cookies: Vec<StoredCookie>| {
            for c in &mut cookies {
                c.expires = None; // timestamps differ between the two runs
            }
            cookies
        };
        assert_eq!(strip(reloaded.snapshot()), strip(fresh.snapshot()));
    }

    #[test]
    fn comments_and_blanks_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, "# comment\n\na.test\tFALSE\t/\tFALSE\t0\tk\tv\nnot a cookie\n")
            .unwrap();

        let loaded = load_cookies(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "k");
    }
}
