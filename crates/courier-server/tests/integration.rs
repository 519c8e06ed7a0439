//! End-to-end tests over real WebSocket connections.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;

use courier_auth::StaticResolver;
use courier_core::UserIdentity;
use courier_core::ids::UserId;
use courier_server::config::ServerConfig;
use courier_server::events::handlers::register_builtin;
use courier_server::events::registry::EventRegistry;
use courier_server::server::CourierServer;
use courier_store::{Database, UserRepo};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn identity(id: &str, name: &str) -> UserIdentity {
    UserIdentity {
        id: UserId::from(id),
        name: name.into(),
        email: format!("{name}@example.com").to_lowercase(),
        profile_pic: String::new(),
    }
}

/// Boot a test server with three known users and return its base URLs.
async fn boot_server() -> (String, String, CourierServer) {
    boot_server_with(ServerConfig::default()).await
}

async fn boot_server_with(config: ServerConfig) -> (String, String, CourierServer) {
    let db = Database::in_memory().unwrap();
    let users = UserRepo::new(db.clone());
    let roster = [
        ("tok-ann", identity("u-ann", "Ann")),
        ("tok-bob", identity("u-bob", "Bob")),
        ("tok-cara", identity("u-cara", "Cara")),
    ];
    let mut resolver = StaticResolver::new();
    for (token, user) in roster {
        users.insert(&user).unwrap();
        resolver = resolver.with_identity(token, user);
    }

    let mut registry = EventRegistry::new();
    register_builtin(&mut registry);

    let server = CourierServer::new(
        config, // default port 0 = auto-assign
        db,
        Arc::new(resolver),
        registry,
        PrometheusBuilder::new().build_recorder().handle(),
    );
    let (addr, _handle) = server.listen().await.unwrap();

    (format!("ws://{addr}"), format!("http://{addr}"), server)
}

async fn connect(ws_base: &str, token: &str) -> WsStream {
    let (stream, _) = connect_async(format!("{ws_base}/ws?token={token}"))
        .await
        .expect("connection should be accepted");
    stream
}

/// Next text frame as JSON (skipping control frames).
async fn next_event(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("transport error");
        if let tungstenite::Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read events until one matching `predicate` arrives.
async fn wait_for(ws: &mut WsStream, mut predicate: impl FnMut(&Value) -> bool) -> Value {
    loop {
        let event = next_event(ws).await;
        if predicate(&event) {
            return event;
        }
    }
}

/// Read events until a named one arrives.
async fn wait_for_event(ws: &mut WsStream, name: &str) -> Value {
    wait_for(ws, |e| e["event"] == name).await
}

async fn send_event(ws: &mut WsStream, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    ws.send(tungstenite::Message::Text(frame.into()))
        .await
        .unwrap();
}

fn online_ids(event: &Value) -> Vec<String> {
    event["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn bad_token_is_refused_with_401() {
    let (ws_base, _http, _server) = boot_server().await;

    let err = connect_async(format!("{ws_base}/ws?token=tok-nobody"))
        .await
        .unwrap_err();
    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 401),
        other => panic!("expected HTTP 401 refusal, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_token_is_refused_with_401() {
    let (ws_base, _http, _server) = boot_server().await;

    let err = connect_async(format!("{ws_base}/ws")).await.unwrap_err();
    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 401),
        other => panic!("expected HTTP 401 refusal, got {other:?}"),
    }
}

#[tokio::test]
async fn connecting_broadcasts_the_online_snapshot() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let event = wait_for_event(&mut ann, "onlineUser").await;
    assert_eq!(online_ids(&event), vec!["u-ann"]);

    let mut bob = connect(&ws_base, "tok-bob").await;
    let event = wait_for_event(&mut bob, "onlineUser").await;
    assert_eq!(online_ids(&event), vec!["u-ann", "u-bob"]);

    // Ann's open session sees the updated snapshot too.
    let event = wait_for(&mut ann, |e| {
        e["event"] == "onlineUser" && online_ids(e).contains(&"u-bob".to_owned())
    })
    .await;
    assert_eq!(online_ids(&event), vec!["u-ann", "u-bob"]);
}

#[tokio::test]
async fn sending_a_message_fans_out_to_both_rooms() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let mut bob = connect(&ws_base, "tok-bob").await;
    let _ = wait_for(&mut ann, |e| {
        e["event"] == "onlineUser" && online_ids(e).len() == 2
    })
    .await;
    let _ = wait_for_event(&mut bob, "onlineUser").await;

    send_event(
        &mut ann,
        "new-message",
        json!({"sender": "u-ann", "receiver": "u-bob", "text": "hi"}),
    )
    .await;

    for ws in [&mut ann, &mut bob] {
        let history = wait_for_event(ws, "message").await;
        let messages = history["data"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["text"], "hi");
        assert_eq!(messages[0]["msgByUserId"], "u-ann");

        let conversation = wait_for_event(ws, "conversation").await;
        let summaries = conversation["data"].as_array().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0]["unseenMsg"], 1);
        assert_eq!(summaries[0]["lastMsg"]["text"], "hi");
    }
}

#[tokio::test]
async fn disconnect_drops_the_user_from_presence() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let mut bob = connect(&ws_base, "tok-bob").await;
    let _ = wait_for(&mut ann, |e| {
        e["event"] == "onlineUser" && online_ids(e).len() == 2
    })
    .await;

    bob.close(None).await.unwrap();

    let event = wait_for(&mut ann, |e| {
        e["event"] == "onlineUser" && !online_ids(e).contains(&"u-bob".to_owned())
    })
    .await;
    assert_eq!(online_ids(&event), vec!["u-ann"]);
}

#[tokio::test]
async fn silent_client_is_dropped_from_presence_after_pong_timeout() {
    let config = ServerConfig {
        heartbeat_interval_secs: 1,
        heartbeat_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let (ws_base, _http, server) = boot_server_with(config).await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let _ = wait_for_event(&mut ann, "onlineUser").await;
    let mut bob = connect(&ws_base, "tok-bob").await;
    let _ = wait_for_event(&mut bob, "onlineUser").await;

    // Ann goes silent: her stream stays open but is never polled again, so
    // the client library never answers the server's pings. Bob keeps
    // reading (and therefore ponging) and watches for the leave broadcast.
    let event = wait_for(&mut bob, |e| {
        e["event"] == "onlineUser" && !online_ids(e).contains(&"u-ann".to_owned())
    })
    .await;
    assert_eq!(online_ids(&event), vec!["u-bob"]);
    assert!(!server.presence().is_online(&UserId::from("u-ann")));
    drop(ann);
}

#[tokio::test]
async fn message_page_for_a_stranger_is_profile_plus_empty_history() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let _ = wait_for_event(&mut ann, "onlineUser").await;

    send_event(&mut ann, "message-page", json!("u-cara")).await;

    let profile = wait_for_event(&mut ann, "message-user").await;
    assert_eq!(profile["data"]["_id"], "u-cara");
    assert_eq!(profile["data"]["name"], "Cara");
    assert_eq!(profile["data"]["online"], false);

    let history = wait_for_event(&mut ann, "message").await;
    assert_eq!(history["data"], json!([]));
}

#[tokio::test]
async fn message_page_reports_online_targets() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let mut _cara = connect(&ws_base, "tok-cara").await;
    let _ = wait_for(&mut ann, |e| {
        e["event"] == "onlineUser" && online_ids(e).len() == 2
    })
    .await;

    send_event(&mut ann, "message-page", json!("u-cara")).await;

    let profile = wait_for_event(&mut ann, "message-user").await;
    assert_eq!(profile["data"]["online"], true);
}

#[tokio::test]
async fn empty_message_is_dropped_without_any_broadcast() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let _ = wait_for_event(&mut ann, "onlineUser").await;

    send_event(
        &mut ann,
        "new-message",
        json!({"sender": "u-ann", "receiver": "u-bob", "text": "", "imageUrl": "", "videoUrl": ""}),
    )
    .await;

    // A real send afterwards yields a one-element history: the empty one
    // was neither persisted nor broadcast.
    send_event(
        &mut ann,
        "new-message",
        json!({"sender": "u-ann", "receiver": "u-bob", "text": "real"}),
    )
    .await;

    let history = wait_for_event(&mut ann, "message").await;
    let messages = history["data"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "real");
}

#[tokio::test]
async fn sidebar_lists_the_callers_conversations() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let _ = wait_for_event(&mut ann, "onlineUser").await;

    send_event(
        &mut ann,
        "new-message",
        json!({"sender": "u-ann", "receiver": "u-bob", "text": "hello"}),
    )
    .await;
    let _ = wait_for_event(&mut ann, "conversation").await;

    send_event(&mut ann, "sidebar", json!("u-ann")).await;

    let conversation = wait_for_event(&mut ann, "conversation").await;
    let summaries = conversation["data"].as_array().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["lastMsg"]["text"], "hello");
    assert_eq!(summaries[0]["sender"]["name"], "Ann");
    assert_eq!(summaries[0]["receiver"]["name"], "Bob");
}

#[tokio::test]
async fn second_tab_receives_the_same_fanout() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut tab1 = connect(&ws_base, "tok-ann").await;
    let mut tab2 = connect(&ws_base, "tok-ann").await;
    let _ = wait_for_event(&mut tab1, "onlineUser").await;
    let _ = wait_for_event(&mut tab2, "onlineUser").await;

    send_event(
        &mut tab1,
        "new-message",
        json!({"sender": "u-ann", "receiver": "u-bob", "text": "from tab one"}),
    )
    .await;

    for tab in [&mut tab1, &mut tab2] {
        let history = wait_for_event(tab, "message").await;
        assert_eq!(history["data"][0]["text"], "from tab one");
    }
}

#[tokio::test]
async fn closing_one_tab_keeps_the_user_online() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut tab1 = connect(&ws_base, "tok-ann").await;
    let tab2 = connect(&ws_base, "tok-ann").await;
    let mut bob = connect(&ws_base, "tok-bob").await;
    let _ = wait_for(&mut bob, |e| {
        e["event"] == "onlineUser" && online_ids(e).len() == 2
    })
    .await;

    drop(tab2);

    // The leave broadcast still lists Ann: one of her tabs remains open.
    let event = wait_for_event(&mut bob, "onlineUser").await;
    assert!(online_ids(&event).contains(&"u-ann".to_owned()));
    let _ = tab1.close(None).await;
}

#[tokio::test]
async fn malformed_frames_get_an_error_event() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let _ = wait_for_event(&mut ann, "onlineUser").await;

    ann.send(tungstenite::Message::Text("not json".into()))
        .await
        .unwrap();

    let error = wait_for_event(&mut ann, "error").await;
    assert!(error["data"]["message"].as_str().unwrap().contains("invalid"));
}

#[tokio::test]
async fn unknown_events_are_ignored() {
    let (ws_base, _http, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let _ = wait_for_event(&mut ann, "onlineUser").await;

    send_event(&mut ann, "mark-read", json!({"conversationId": "c1"})).await;

    // The connection stays healthy and silent: the next real event works.
    send_event(&mut ann, "sidebar", json!("u-ann")).await;
    let conversation = wait_for_event(&mut ann, "conversation").await;
    assert_eq!(conversation["data"], json!([]));
}

#[tokio::test]
async fn health_reflects_live_connections() {
    let (ws_base, http_base, _server) = boot_server().await;

    let mut ann = connect(&ws_base, "tok-ann").await;
    let _ = wait_for_event(&mut ann, "onlineUser").await;

    let resp: Value = reqwest::get(format!("{http_base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["status"], "ok");
    assert_eq!(resp["connections"], 1);
    assert_eq!(resp["online_users"], 1);
}
