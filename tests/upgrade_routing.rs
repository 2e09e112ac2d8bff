//! Integration tests for routing WebSocket upgrades to vhosts.

mod common;

use common::server::VHOST;
use common::{TestClient, TestServer};
use slbroker::VhostOptions;
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest};

/// Status of a refused upgrade, or `None` if it was accepted.
async fn refused_status(request: tungstenite::handshake::client::Request) -> Option<u16> {
    match tokio_tungstenite::connect_async(request).await {
        Ok(_) => None,
        Err(tungstenite::Error::Http(response)) => Some(response.status().as_u16()),
        Err(e) => panic!("unexpected handshake error: {e}"),
    }
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let server = TestServer::spawn().await.unwrap();
    let request = server.url("/nowhere").into_client_request().unwrap();
    assert_eq!(refused_status(request).await, Some(404));
}

#[tokio::test]
async fn test_stopped_vhost_is_unavailable() {
    let server = TestServer::spawn().await.unwrap();
    server.vhost().stop();

    let request = server.url(VHOST).into_client_request().unwrap();
    assert_eq!(refused_status(request).await, Some(503));
    assert_eq!(server.vhost().connection_count(), 0);
}

#[tokio::test]
async fn test_deleted_vhost_is_not_found() {
    let server = TestServer::spawn().await.unwrap();
    server.broker().delete_vhost(VHOST).unwrap();

    let request = server.url(VHOST).into_client_request().unwrap();
    assert_eq!(refused_status(request).await, Some(404));
}

#[tokio::test]
async fn test_vhosts_are_isolated() {
    let server = TestServer::spawn().await.unwrap();
    let other = server.broker().add_vhost("/other").unwrap();

    let mut client = TestClient::connect(&server.url("/other")).await.unwrap();
    client
        .send(serde_json::json!({"auth": {"user": "admin", "secret": "pw"}}))
        .await
        .unwrap();
    assert_eq!(client.recv().await.unwrap()["__error"]["status"], 402);

    assert_eq!(other.connection_count(), 1);
    assert_eq!(server.vhost().connection_count(), 0);
}

#[tokio::test]
async fn test_origin_allow_list() {
    let server = TestServer::spawn_with(
        VhostOptions::default(),
        vec!["https://app.example".to_string()],
    )
    .await
    .unwrap();

    let mut allowed = server.url(VHOST).into_client_request().unwrap();
    allowed
        .headers_mut()
        .insert("Origin", "https://app.example".parse().unwrap());
    assert_eq!(refused_status(allowed).await, None);

    let mut denied = server.url(VHOST).into_client_request().unwrap();
    denied
        .headers_mut()
        .insert("Origin", "https://evil.example".parse().unwrap());
    assert_eq!(refused_status(denied).await, Some(403));

    let missing = server.url(VHOST).into_client_request().unwrap();
    assert_eq!(refused_status(missing).await, Some(403));
}
