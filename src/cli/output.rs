//! Result printing in text or JSON form.

use crate::dispatch::dispatcher::DispatchOutcome;
use url::Url;

pub struct Printer {
    json: bool,
    show_headers: bool,
    results: Vec<serde_json::Value>,
}

impl Printer {
    pub fn new(json: bool, show_headers: bool) -> Self {
        Self { json, show_headers, results: Vec::new() }
    }

    pub fn print(&mut self, url: &Url, outcome: &DispatchOutcome) {
        if self.json {
            self.results.push(self.to_json(url, outcome));
            return;
        }

        match &outcome.result {
            Ok(resp) => {
                println!(
                    "{} {} {} ({}, {} bytes, {} attempt(s), {:?})",
                    url,
                    resp.status,
                    resp.protocol,
                    outcome.profile,
                    resp.body.len(),
                    outcome.attempts,
                    outcome.elapsed,
                );
                if self.show_headers {
                    for (name, value) in resp.headers.iter() {
                        println!("  {name}: {value}");
                    }
                }
                if let Some(tls) = &resp.tls {
                    println!("  tls: {} {} alpn={}", tls.version, tls.cipher, tls.alpn);
                }
            }
            Err(err) => {
                let status = outcome
                    .status()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let proxy = outcome.proxy.as_deref().unwrap_or("-");
                println!(
                    "{} FAILED kind={} status={} proxy={} attempts={} ({err})",
                    url,
                    err.kind(),
                    status,
                    proxy,
                    outcome.attempts,
                );
            }
        }
    }

    fn to_json(&self, url: &Url, outcome: &DispatchOutcome) -> serde_json::Value {
        match &outcome.result {
            Ok(resp) => {
                let headers: Vec<serde_json::Value> = if self.show_headers {
                    resp.headers
                        .iter()
                        .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
                        .collect()
                } else {
                    Vec::new()
                };
                serde_json::json!({
                    "url": url.as_str(),
                    "kind": "success",
                    "status": resp.status,
                    "protocol": resp.protocol,
                    "final_url": resp.final_url.as_str(),
                    "profile": outcome.profile.as_str(),
                    "proxy": outcome.proxy,
                    "attempts": outcome.attempts,
                    "elapsed_ms": outcome.elapsed.as_millis() as u64,
                    "body_bytes": resp.body.len(),
                    "headers": headers,
                    "tls": resp.tls.as_ref().map(|tls| serde_json::json!({
                        "version": tls.version,
                        "cipher": tls.cipher,
                        "alpn": tls.alpn,
                    })),
                })
            }
            Err(err) => serde_json::json!({
                "url": url.as_str(),
                "kind": err.kind(),
                "error": err.to_string(),
                "status": outcome.status(),
                "profile": outcome.profile.as_str(),
                "proxy": outcome.proxy,
                "attempts": outcome.attempts,
                "elapsed_ms": outcome.elapsed.as_millis() as u64,
            }),
        }
    }

    /// Emit the collected JSON document, if JSON mode is on.
    pub fn finish(&mut self) {
        if self.json {
            let doc = serde_json::json!({ "results": std::mem::take(&mut self.results) });
            println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".into()));
        }
    }
}
