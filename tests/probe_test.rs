// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Vendor Probe Integration Tests
 * HTTP prober behavior against mock gateway endpoints
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gateprobe::errors::{ErrorCategory, ProbeError};
use gateprobe::probes::{HttpProber, Prober, VendorKind, MAX_BODY_PREFIX};
use gateprobe::types::Credential;

fn prober(vendor: VendorKind) -> HttpProber {
    HttpProber::new(vendor, Duration::from_secs(2), 8, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn fortinet_marker_in_body_is_a_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remote/login"))
        .and(body_string_contains("username=admin"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><script>var fgt_lang = 'en';</script></html>",
        ))
        .mount(&server)
        .await;

    let cred = Credential::new(server.uri(), "admin", "admin");
    let verdict = prober(VendorKind::Fortinet).probe(&cred).await.unwrap();

    assert!(verdict.success);
    assert_eq!(verdict.status_code, 200);
}

#[tokio::test]
async fn fortinet_login_page_without_markers_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remote/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>Invalid credentials</html>"),
        )
        .mount(&server)
        .await;

    let cred = Credential::new(server.uri(), "admin", "wrong");
    let verdict = prober(VendorKind::Fortinet).probe(&cred).await.unwrap();

    assert!(!verdict.success);
}

#[tokio::test]
async fn fortinet_redirect_to_portal_is_a_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remote/login"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/sslvpn/portal.html"),
        )
        .mount(&server)
        .await;

    let cred = Credential::new(server.uri(), "admin", "admin");
    let verdict = prober(VendorKind::Fortinet).probe(&cred).await.unwrap();

    assert!(verdict.success, "redirect to portal must classify as success");
    assert_eq!(verdict.status_code, 302);
}

#[tokio::test]
async fn fortinet_redirect_back_to_login_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remote/login"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/remote/login?err=1"),
        )
        .mount(&server)
        .await;

    let cred = Credential::new(server.uri(), "admin", "wrong");
    let verdict = prober(VendorKind::Fortinet).probe(&cred).await.unwrap();

    assert!(!verdict.success);
}

#[tokio::test]
async fn globalprotect_portal_marker_is_a_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/global-protect/login.esp"))
        .and(body_string_contains("action=getsoftware"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>GlobalProtect Portal</html>"),
        )
        .mount(&server)
        .await;

    let cred = Credential::new(server.uri(), "admin", "admin");
    let verdict = prober(VendorKind::GlobalProtect).probe(&cred).await.unwrap();

    assert!(verdict.success);
}

#[tokio::test]
async fn sonicwall_sends_domain_from_password_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth.html"))
        .and(body_string_contains("password=secret"))
        .and(body_string_contains("domain=CORP"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>NetExtender portal</html>"),
        )
        .mount(&server)
        .await;

    let cred = Credential::new(server.uri(), "admin", "secret;CORP");
    let verdict = prober(VendorKind::SonicWall).probe(&cred).await.unwrap();

    assert!(verdict.success);
}

#[tokio::test]
async fn http_429_is_reported_without_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remote/login"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let cred = Credential::new(server.uri(), "admin", "admin");
    let verdict = prober(VendorKind::Fortinet).probe(&cred).await.unwrap();

    assert!(!verdict.success);
    assert_eq!(verdict.status_code, 429);
}

#[tokio::test]
async fn body_read_is_capped() {
    // Marker planted past the cap must stay invisible to classification.
    let mut body = "x".repeat(MAX_BODY_PREFIX + 100);
    body.push_str("fgt_lang");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remote/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let cred = Credential::new(server.uri(), "admin", "admin");
    let verdict = prober(VendorKind::Fortinet).probe(&cred).await.unwrap();

    assert!(!verdict.success);
    assert_eq!(verdict.body_prefix.len(), MAX_BODY_PREFIX);
}

#[tokio::test]
async fn refused_connection_classifies_offline() {
    // Bind then drop a listener so the port is closed but was recently valid.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let cred = Credential::new(format!("http://127.0.0.1:{}", port), "admin", "admin");
    let err = prober(VendorKind::Fortinet).probe(&cred).await.unwrap_err();

    assert!(matches!(err, ProbeError::Connect { .. }));
    let category = ErrorCategory::classify(&err, Duration::from_millis(5), Duration::from_secs(2));
    assert_eq!(category, ErrorCategory::Offline);
}
