//! File-based input loaders.

use crate::base::error::NetError;
use crate::socket::proxy::ProxyEndpoint;
use std::path::Path;
use url::Url;

pub fn parse_url(raw: &str) -> Result<Url, NetError> {
    let url = Url::parse(raw)
        .map_err(|e| NetError::ConfigurationInvalid(format!("url {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NetError::ConfigurationInvalid(format!("unsupported url scheme {other:?}"))),
    }
}

/// One URL per line; blank lines and `#` comments are skipped.
pub fn load_urls_file(path: &Path) -> Result<Vec<Url>, NetError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| NetError::ConfigurationInvalid(format!("urls file {}: {e}", path.display())))?;
    let mut urls = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        urls.push(parse_url(line)?);
    }
    if urls.is_empty() {
        return Err(NetError::ConfigurationInvalid(format!(
            "urls file {} contains no urls",
            path.display()
        )));
    }
    Ok(urls)
}

/// One proxy URL per line, optional `user:pass@` userinfo, `#` comments.
pub fn load_proxies_file(path: &Path) -> Result<Vec<ProxyEndpoint>, NetError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        NetError::ConfigurationInvalid(format!("proxy file {}: {e}", path.display()))
    })?;
    let mut proxies = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        proxies.push(ProxyEndpoint::parse(line)?);
    }
    Ok(proxies)
}

/// `@path` reads the file; anything else is the literal value.
pub fn load_inline_or_file(spec: &str) -> Result<Vec<u8>, NetError> {
    match spec.strip_prefix('@') {
        Some(path) => std::fs::read(path)
            .map_err(|e| NetError::ConfigurationInvalid(format!("file {path:?}: {e}"))),
        None => Ok(spec.as_bytes().to_vec()),
    }
}

/// A UTF-8 JSON object mapping string to string, inline or `@file`.
pub fn load_header_map(spec: &str) -> Result<Vec<(String, String)>, NetError> {
    let raw = load_inline_or_file(spec)?;
    let value: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|e| NetError::ConfigurationInvalid(format!("headers json: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| NetError::ConfigurationInvalid("headers json must be an object".into()))?;

    let mut pairs = Vec::with_capacity(object.len());
    for (name, value) in object {
        let value = value.as_str().ok_or_else(|| {
            NetError::ConfigurationInvalid(format!("header {name:?} must map to a string"))
        })?;
        pairs.push((name.clone(), value.to_string()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn urls_file_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "https://a.test/").unwrap();
        writeln!(file, "https://b.test/path").unwrap();

        let urls = load_urls_file(file.path()).unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].as_str(), "https://a.test/");
    }

    #[test]
    fn urls_round_trip_ignoring_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://a.test/\n# note\nhttps://b.test/").unwrap();
        let first = load_urls_file(file.path()).unwrap();

        // Serialize back without comments and reload.
        let mut second_file = tempfile::NamedTempFile::new().unwrap();
        for url in &first {
            writeln!(second_file, "{url}").unwrap();
        }
        let second = load_urls_file(second_file.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn proxies_file_parses_userinfo() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http://user:pw@p.test:8080").unwrap();
        writeln!(file, "socks5://s.test:1080").unwrap();

        let proxies = load_proxies_file(file.path()).unwrap();
        assert_eq!(proxies.len(), 2);
        assert!(proxies[0].basic_auth_header().is_some());
    }

    #[test]
    fn bad_proxy_scheme_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ftp://p.test:21").unwrap();
        assert!(load_proxies_file(file.path()).is_err());
    }

    #[test]
    fn header_map_inline_and_invalid() {
        let pairs = load_header_map(r#"{"X-Token":"abc","Accept":"text/html"}"#).unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(load_header_map(r#"["not","an","object"]"#).is_err());
        assert!(load_header_map(r#"{"n":42}"#).is_err());
    }

    #[test]
    fn at_prefix_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"k\":\"v\"}}").unwrap();
        let spec = format!("@{}", file.path().display());
        let raw = load_inline_or_file(&spec).unwrap();
        assert_eq!(raw, b"{\"k\":\"v\"}");
    }
}
