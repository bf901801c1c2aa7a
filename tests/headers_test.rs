//! Wire-level header emission: order, casing, Host placement, and in-place
//! overrides, asserted against raw captured request bytes.

mod common;

use mimicnet::base::JobCtx;
use mimicnet::cookies::CookieJar;
use mimicnet::emulation::{lookup, ProfileId};
use mimicnet::http::engine::{EngineConfig, EngineRequest, HttpEngine};

fn header_lines(head: &str) -> Vec<String> {
    head.split("\r\n")
        .skip(1)
        .take_while(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

async fn capture(profile: ProfileId, overrides: Vec<(String, String)>) -> (String, String) {
    let server = common::spawn_server(vec![common::response(200, "", "ok")]).await;
    let engine = HttpEngine::new(EngineConfig::default());

    let mut req = EngineRequest::get(server.url("/"));
    req.overrides = overrides;
    let resp = engine
        .execute(&req, &CookieJar::new(), lookup(profile), &JobCtx::unbounded())
        .await
        .unwrap();
    assert_eq!(resp.status, 200);

    let head = server.requests().remove(0);
    let authority = server.addr.to_string();
    (head, authority)
}

#[tokio::test]
async fn firefox_host_is_first_and_dnt_present() {
    let (head, authority) = capture(ProfileId::Firefox, Vec::new()).await;
    let lines = header_lines(&head);

    assert!(head.starts_with("GET / HTTP/1.1\r\n"));
    // Host immediately follows the request line for Firefox.
    assert_eq!(lines[0], format!("Host: {authority}"));
    assert_eq!(lines[1], format!("User-Agent: {}", lookup(ProfileId::Firefox).user_agent));
    assert!(lines.contains(&"DNT: 1".to_string()));
}

#[tokio::test]
async fn chrome_host_follows_connection_and_casing_is_exact() {
    let (head, authority) = capture(ProfileId::Chrome, Vec::new()).await;
    let lines = header_lines(&head);

    assert_eq!(lines[0], "Connection: keep-alive");
    assert_eq!(lines[1], format!("Host: {authority}"));
    // Client-hint names go out lowercase, Sec-Fetch-* capitalized.
    assert!(lines.iter().any(|l| l.starts_with("sec-ch-ua: ")));
    assert!(lines.iter().any(|l| l.starts_with("Sec-Fetch-Site: ")));
    assert!(!head.contains("Sec-Ch-Ua:"));
}

#[tokio::test]
async fn full_default_order_is_preserved() {
    let (head, _) = capture(ProfileId::Chrome, Vec::new()).await;
    let lines = header_lines(&head);
    let profile = lookup(ProfileId::Chrome);

    let emitted_names: Vec<&str> =
        lines.iter().map(|line| line.split(':').next().unwrap()).collect();
    let expected_names: Vec<&str> = profile.headers.iter().map(|(name, _)| *name).collect();

    // The profile's registered list forms an exact prefix of what went out.
    assert_eq!(&emitted_names[..expected_names.len()], expected_names.as_slice());
}

#[tokio::test]
async fn override_replaces_default_in_place() {
    let overrides = vec![("user-agent".to_string(), "custom-agent/9".to_string())];
    let (head, _) = capture(ProfileId::Chrome, overrides).await;
    let lines = header_lines(&head);

    let profile = lookup(ProfileId::Chrome);
    let ua_slot = profile
        .headers
        .iter()
        .position(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
        .unwrap();
    // Same slot, profile casing, overridden value.
    assert_eq!(lines[ua_slot], "User-Agent: custom-agent/9");
}

#[tokio::test]
async fn new_override_appends_after_defaults() {
    let overrides = vec![("X-Job-Id".to_string(), "42".to_string())];
    let (head, _) = capture(ProfileId::Firefox, overrides).await;
    let lines = header_lines(&head);

    let default_count = lookup(ProfileId::Firefox).headers.len();
    assert_eq!(lines[default_count], "X-Job-Id: 42");
}

#[tokio::test]
async fn cookie_header_follows_jar_insertion_order() {
    let server = common::spawn_server(vec![
        common::response(200, "Set-Cookie: first=1\r\nSet-Cookie: second=2\r\n", "ok"),
        common::response(200, "", "ok"),
    ])
    .await;
    let engine = HttpEngine::new(EngineConfig::default());
    let jar = CookieJar::new();
    let profile = lookup(ProfileId::Chrome);

    let req = EngineRequest::get(server.url("/"));
    engine.execute(&req, &jar, profile, &JobCtx::unbounded()).await.unwrap();
    engine.execute(&req, &jar, profile, &JobCtx::unbounded()).await.unwrap();

    let second = &server.requests()[1];
    assert!(second.contains("Cookie: first=1; second=2\r\n"));
}

#[tokio::test]
async fn bare_header_set_without_mimicry() {
    let server = common::spawn_server(vec![common::response(200, "", "ok")]).await;
    let engine = HttpEngine::new(EngineConfig::default());

    let mut req = EngineRequest::get(server.url("/"));
    req.header_mimicry = false;
    engine
        .execute(&req, &CookieJar::new(), lookup(ProfileId::Chrome), &JobCtx::unbounded())
        .await
        .unwrap();

    let head = server.requests().remove(0);
    assert!(!head.contains("sec-ch-ua"));
    assert!(!head.contains("Upgrade-Insecure-Requests"));
    assert!(head.contains("User-Agent: "));
}

#[tokio::test]
async fn sec_headers_stripped_on_request() {
    let server = common::spawn_server(vec![common::response(200, "", "ok")]).await;
    let engine = HttpEngine::new(EngineConfig::default());

    let mut req = EngineRequest::get(server.url("/"));
    req.strip_sec_headers = true;
    engine
        .execute(&req, &CookieJar::new(), lookup(ProfileId::Chrome), &JobCtx::unbounded())
        .await
        .unwrap();

    let head = server.requests().remove(0);
    assert!(!head.contains("Sec-Fetch-"));
    assert!(!head.contains("sec-ch-ua"));
    assert!(head.contains("User-Agent: "));
}
