use pretty_assertions::assert_eq;
use serde_json::json;
use signage_player::api::{ApiClient, DisplaySource};
use signage_player::error::PlayerError;
use signage_player::model::{MediaKind, Orientation, Transition};
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap()
}

fn lobby() -> serde_json::Value {
    json!({
        "display": {
            "id": "d1",
            "name": "Lobby",
            "orientation": "PORTRAIT",
            "width": 1080,
            "height": 1920,
            "playlist": {
                "id": "p1",
                "name": "Main",
                "items": [
                    {
                        "id": "i1", "duration": 10, "transition": "fade", "order": 0,
                        "content": { "id": "c1", "name": "Welcome", "url": "/uploads/welcome.png", "type": "IMAGE" }
                    },
                    {
                        "id": "i2", "duration": 15.5, "transition": "cut", "order": 1,
                        "content": { "id": "c2", "name": "Promo", "url": "https://cdn.example.com/promo.mp4", "type": "VIDEO" }
                    }
                ]
            }
        }
    })
}

#[tokio::test]
async fn fetches_display_for_device_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/displays/player/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lobby()))
        .expect(1)
        .mount(&server)
        .await;

    let display = client(&server).fetch_display("abc123").await.unwrap();

    assert_eq!(display.name, "Lobby");
    assert_eq!(display.orientation, Orientation::Portrait);
    assert_eq!(display.width, Some(1080));
    let items = display.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].content.kind, MediaKind::Image);
    assert_eq!(items[0].dwell(), Some(Duration::from_secs(10)));
    assert_eq!(items[1].transition, Transition::Cut);
    assert_eq!(items[1].dwell(), Some(Duration::from_millis(15_500)));
}

#[tokio::test]
async fn display_without_playlist_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/displays/player/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "display": { "id": "d1", "name": "Lobby", "playlist": null }
        })))
        .mount(&server)
        .await;

    let display = client(&server).fetch_display("abc123").await.unwrap();
    assert!(display.items().is_empty());
}

#[tokio::test]
async fn not_found_names_the_device_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/displays/player/abc123"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Display not found" })),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_display("abc123").await.unwrap_err();

    assert!(matches!(err, PlayerError::NotFound { .. }));
    assert!(err.to_string().contains("abc123"));
}

#[tokio::test]
async fn server_error_uses_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "database offline" })),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_display("abc123").await.unwrap_err();

    assert_eq!(
        err,
        PlayerError::Server {
            status: 500,
            message: "database offline".into()
        }
    );
}

#[tokio::test]
async fn server_error_without_body_uses_reason() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).fetch_display("abc123").await.unwrap_err();

    assert_eq!(
        err,
        PlayerError::Server {
            status: 503,
            message: "Service Unavailable".into()
        }
    );
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_display("abc123").await.unwrap_err();
    assert!(matches!(err, PlayerError::Malformed(_)));
}

#[tokio::test]
async fn zero_duration_is_rejected() {
    let server = MockServer::start().await;
    let mut body = lobby();
    body["display"]["playlist"]["items"][1]["duration"] = json!(0);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let err = client(&server).fetch_display("abc123").await.unwrap_err();

    let PlayerError::Malformed(message) = err else {
        panic!("expected malformed, got {:?}", err);
    };
    assert!(message.contains("i2"));
}

#[tokio::test]
async fn heartbeat_posts_device_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/displays/heartbeat"))
        .and(body_json(json!({ "deviceKey": "abc123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).heartbeat("abc123").await.unwrap();
}

#[tokio::test]
async fn heartbeat_ignores_response_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/displays/heartbeat"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client(&server).heartbeat("unknown").await.is_ok());
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ApiClient::new(format!("http://127.0.0.1:{}", port), Duration::from_secs(2)).unwrap();

    let err = client.fetch_display("abc123").await.unwrap_err();
    assert!(matches!(err, PlayerError::Unreachable(_)));

    assert!(client.heartbeat("abc123").await.is_err());
}

#[tokio::test]
async fn slow_server_times_out_as_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lobby()).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let client = ApiClient::new(server.uri(), Duration::from_millis(200)).unwrap();

    let err = client.fetch_display("abc123").await.unwrap_err();
    assert!(matches!(err, PlayerError::Unreachable(_)));
}
