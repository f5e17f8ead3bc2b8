// Session establishment against a mock ZoneMinder server.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zonelink_api::{TransportConfig, TriggerClient, ZmClient};
use zonelink_core::ZmSession;

fn client_for(server: &MockServer) -> ZmClient {
    ZmClient::new(
        server.uri().parse().unwrap(),
        None,
        &TransportConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn establish_probes_the_frame_daemon_capability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/configs/view/ZM_OPT_FRAME_SERVER.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "config": { "Config": { "Name": "ZM_OPT_FRAME_SERVER", "Value": "1" } }
        })))
        .mount(&server)
        .await;

    let session = ZmSession::establish(client_for(&server), TriggerClient::new("127.0.0.1:1"))
        .await
        .unwrap();

    assert!(session.is_connected());
    assert!(session.frame_daemon_enabled());
}

#[tokio::test]
async fn establish_survives_a_missing_capability_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/configs/view/ZM_OPT_FRAME_SERVER.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let session = ZmSession::establish(client_for(&server), TriggerClient::new("127.0.0.1:1"))
        .await
        .unwrap();

    // Capability read failures degrade to "no frame daemon".
    assert!(!session.frame_daemon_enabled());
}

#[tokio::test]
async fn connectivity_flag_follows_the_bridge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/configs/view/ZM_OPT_FRAME_SERVER.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "config": { "Config": { "Name": "ZM_OPT_FRAME_SERVER", "Value": "0" } }
        })))
        .mount(&server)
        .await;

    let session = ZmSession::establish(client_for(&server), TriggerClient::new("127.0.0.1:1"))
        .await
        .unwrap();
    assert!(session.is_connected());

    session.mark_disconnected();
    assert!(!session.is_connected());
    session.mark_connected();
    assert!(session.is_connected());
}
