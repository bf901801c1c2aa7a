//! Outcome classification: turning a completed exchange into the error the
//! retry loop switches on.
//!
//! Challenge detection is heuristic and operator-tunable: substring markers
//! scanned in the body, and a set of hosts whose appearance anywhere in the
//! redirect chain marks the response as a challenge interstitial. A marker
//! can false-positive on a benign page quoting the text, which is why the
//! set is configuration, not policy.

use crate::base::error::{NetError, TransportCause};
use crate::http::response::NormalizedResponse;

#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    /// Body substrings that mark a bot-challenge page.
    pub body_markers: Vec<String>,
    /// Hosts whose appearance in the redirect chain marks a challenge.
    pub challenge_hosts: Vec<String>,
    /// How much of the body to scan for markers.
    pub max_scan_bytes: usize,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            body_markers: vec![
                "Verify you are human".to_string(),
                "Checking your browser".to_string(),
                "cf-challenge".to_string(),
            ],
            challenge_hosts: Vec::new(),
            max_scan_bytes: 256 * 1024,
        }
    }
}

/// Decide whether a completed exchange is really a failure.
///
/// - a challenge marker or challenge-host redirect wins over everything,
///   whatever the status code: the identity was flagged even though the
///   transport succeeded;
/// - 429 and 5xx are retryable transport-level failures;
/// - everything else (2xx, 3xx returned as-is, other 4xx) is a final
///   success.
pub fn classify_response(
    response: &NormalizedResponse,
    config: &ChallengeConfig,
) -> Option<NetError> {
    if let Some(marker) = challenge_marker(response, config) {
        return Some(NetError::ChallengeDetected { status: response.status, marker });
    }

    match response.status {
        429 => Some(NetError::TransportFailure(TransportCause::Status(429))),
        code if code >= 500 => Some(NetError::TransportFailure(TransportCause::Status(code))),
        _ => None,
    }
}

fn challenge_marker(response: &NormalizedResponse, config: &ChallengeConfig) -> Option<String> {
    if !config.challenge_hosts.is_empty() {
        for hop in &response.chain {
            if let Some(host) = hop.host_str() {
                if config.challenge_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
                    return Some(host.to_string());
                }
            }
        }
    }

    if config.body_markers.is_empty() {
        return None;
    }
    let scan = &response.body[..response.body.len().min(config.max_scan_bytes)];
    let text = String::from_utf8_lossy(scan);
    config.body_markers.iter().find(|marker| text.contains(marker.as_str())).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::orderedheaders::OrderedHeaders;
    use bytes::Bytes;
    use url::Url;

    fn response(status: u16, body: &str, chain: &[&str]) -> NormalizedResponse {
        let chain: Vec<Url> = chain.iter().map(|u| Url::parse(u).unwrap()).collect();
        NormalizedResponse {
            status,
            headers: OrderedHeaders::new(),
            body: Bytes::from(body.to_string()),
            final_url: chain.last().cloned().unwrap_or_else(|| Url::parse("https://a.test/").unwrap()),
            chain,
            tls: None,
            protocol: "h2",
        }
    }

    #[test]
    fn plain_success_passes() {
        let resp = response(200, "<html>welcome</html>", &["https://a.test/"]);
        assert!(classify_response(&resp, &ChallengeConfig::default()).is_none());
    }

    #[test]
    fn marker_in_200_body_is_challenge() {
        let resp = response(200, "<p>Verify you are human</p>", &["https://a.test/"]);
        let err = classify_response(&resp, &ChallengeConfig::default()).unwrap();
        assert!(matches!(err, NetError::ChallengeDetected { status: 200, .. }));
    }

    #[test]
    fn marker_in_403_body_is_challenge() {
        let resp = response(403, "Checking your browser before accessing", &["https://a.test/"]);
        let err = classify_response(&resp, &ChallengeConfig::default()).unwrap();
        assert!(matches!(err, NetError::ChallengeDetected { status: 403, .. }));
    }

    #[test]
    fn challenge_host_in_chain_detected() {
        let config = ChallengeConfig {
            challenge_hosts: vec!["challenge.guard.test".into()],
            ..Default::default()
        };
        let resp = response(
            200,
            "ok",
            &["https://a.test/", "https://challenge.guard.test/gate", "https://a.test/done"],
        );
        let err = classify_response(&resp, &config).unwrap();
        assert!(matches!(err, NetError::ChallengeDetected { .. }));
    }

    #[test]
    fn retryable_statuses() {
        let config = ChallengeConfig::default();
        assert!(matches!(
            classify_response(&response(429, "", &["https://a.test/"]), &config),
            Some(NetError::TransportFailure(TransportCause::Status(429)))
        ));
        assert!(matches!(
            classify_response(&response(503, "", &["https://a.test/"]), &config),
            Some(NetError::TransportFailure(TransportCause::Status(503)))
        ));
    }

    #[test]
    fn ordinary_4xx_is_final_success() {
        let config = ChallengeConfig::default();
        assert!(classify_response(&response(404, "not found", &["https://a.test/"]), &config).is_none());
        assert!(classify_response(&response(403, "forbidden", &["https://a.test/"]), &config).is_none());
    }

    #[test]
    fn marker_beyond_scan_window_ignored() {
        let config = ChallengeConfig { max_scan_bytes: 8, ..Default::default() };
        let resp = response(200, "xxxxxxxxVerify you are human", &["https://a.test/"]);
        assert!(classify_response(&resp, &config).is_none());
    }
}
