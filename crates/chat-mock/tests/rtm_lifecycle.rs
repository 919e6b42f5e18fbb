//! RTM session lifecycle: idempotent creation, teardown, routing, and
//! failure semantics over real websockets.

mod common;

use chat_mock::{ChatMock, MockConfig, MockError};
use common::wait_for;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

fn config() -> MockConfig {
    MockConfig {
        rtm_port: 0,
        http_port: 0,
        log_level: None,
    }
}

#[tokio::test]
async fn stop_server_releases_transport_and_add_token_recreates() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;

    let addr = mock.rtm.add_token("alpha").await?;
    let (mut ws, _) = connect_async(addr.as_str()).await?;
    wait_for("peer to attach", || mock.rtm.peer_count("alpha") == 1).await;

    mock.rtm.stop_server("alpha").await?;
    assert_eq!(mock.rtm.session_count(), 0);

    // The server closed the connection; drain until the stream ends.
    while let Some(frame) = ws.next().await {
        if frame.is_err() {
            break;
        }
    }

    // CLOSED -> a fresh add_token re-creates the session from scratch.
    let addr = mock.rtm.add_token("alpha").await?;
    let (_ws, _) = connect_async(addr.as_str()).await?;
    wait_for("reconnected peer", || mock.rtm.peer_count("alpha") == 1).await;

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn connect_with_unregistered_token_is_rejected() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;
    let addr = mock.rtm.add_token("known").await?;

    let bogus = addr.replace("known", "unknown");
    assert!(connect_async(bogus.as_str()).await.is_err());

    // The registered token still connects fine.
    assert!(connect_async(addr.as_str()).await.is_ok());

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn broadcast_reaches_every_peer() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;
    let addr = mock.rtm.add_token("multi").await?;

    let (mut first, _) = connect_async(addr.as_str()).await?;
    let (mut second, _) = connect_async(addr.as_str()).await?;
    wait_for("two peers", || mock.rtm.peer_count("multi") == 2).await;

    let delivered = mock
        .rtm
        .broadcast("multi", &json!({"text": "all hands"}))
        .await?;
    assert_eq!(delivered, 2);

    for ws in [&mut first, &mut second] {
        let frame = ws.next().await.expect("broadcast frame")?;
        assert!(frame.to_text()?.contains("all hands"));
    }

    // A single send only reaches the first connected peer.
    mock.rtm.send("multi", &json!({"text": "just you"})).await?;
    let frame = first.next().await.expect("targeted frame")?;
    assert!(frame.to_text()?.contains("just you"));

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn broadcast_to_peerless_session_delivers_zero() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;
    mock.rtm.add_token("quiet").await?;

    assert_eq!(mock.rtm.broadcast("quiet", &json!({})).await?, 0);

    // A targeted send to the same session is undeliverable, not silent.
    let err = mock.rtm.send("quiet", &json!({})).await.unwrap_err();
    assert!(matches!(err, MockError::Undeliverable(_)));

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn malformed_inbound_message_is_recorded_raw() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;
    let addr = mock.rtm.add_token("raw").await?;
    let (mut ws, _) = connect_async(addr.as_str()).await?;

    ws.send(Message::Text("definitely not json".to_string())).await?;
    wait_for("raw payload recorded", || !mock.rtm.calls().is_empty()).await;

    let calls = mock.rtm.calls();
    assert_eq!(calls[0].raw, "definitely not json");
    assert!(calls[0].message.is_none());
    assert_eq!(calls[0].token, "raw");

    // The session survived the malformed payload.
    ws.send(Message::Text(json!({"ok": 1}).to_string())).await?;
    wait_for("second message recorded", || mock.rtm.calls().len() == 2).await;
    assert!(mock.rtm.calls()[1].message.is_some());

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn start_server_is_a_fire_and_forget_alias() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;

    mock.rtm.start_server("bootstrap").await?;
    assert_eq!(mock.rtm.session_count(), 1);

    let addr = mock.rtm.add_token("bootstrap").await?;
    assert!(addr.ends_with("/bootstrap"));
    assert_eq!(mock.rtm.session_count(), 1);

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn rtm_reset_clears_calls_but_keeps_sessions() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;
    let addr = mock.rtm.add_token("sticky").await?;
    let (mut ws, _) = connect_async(addr.as_str()).await?;

    ws.send(Message::Text(json!({"n": 1}).to_string())).await?;
    wait_for("message recorded", || !mock.rtm.calls().is_empty()).await;

    mock.rtm.reset();
    assert!(mock.rtm.calls().is_empty());
    assert_eq!(mock.rtm.session_count(), 1);

    // Socket still live after reset.
    wait_for("peer still attached", || mock.rtm.peer_count("sticky") == 1).await;
    mock.rtm.send("sticky", &json!({"n": 2})).await?;
    let frame = ws.next().await.expect("frame")?;
    assert!(frame.to_text()?.contains("\"n\":2"));

    mock.shutdown().await?;
    Ok(())
}
