//! Client-role interceptors: simulated inbound deliveries to a bot under
//! test and the two-hop response_url flow.

mod common;

use chat_mock::{CallType, ChatMock, MockConfig, ResponseOverride};
use common::{spawn_bot, wait_for};
use serde_json::{json, Value};

fn config() -> MockConfig {
    MockConfig {
        rtm_port: 0,
        http_port: 0,
        log_level: None,
    }
}

#[tokio::test]
async fn slash_command_round_trip_records_both_hops() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;
    let bot = spawn_bot("immediate ok", Some("GO CUBS")).await;

    mock.slash_commands
        .send(
            &format!("http://{bot}/command"),
            json!({"command": "/cubs", "text": "hello"}),
        )
        .await;

    wait_for("both hops to be recorded", || {
        mock.slash_commands.calls().len() == 2
    })
    .await;

    let calls = mock.slash_commands.calls();
    let immediate = calls
        .iter()
        .find(|call| call.call_type == Some(CallType::Response))
        .expect("immediate hop");
    // The bot's reply was not JSON; the raw string is kept.
    assert_eq!(immediate.params, json!("immediate ok"));
    assert_eq!(immediate.status_code, Some(200));

    let deferred = calls
        .iter()
        .find(|call| call.call_type == Some(CallType::ResponseUrl))
        .expect("deferred hop");
    assert_eq!(deferred.params["text"], "GO CUBS");
    assert!(deferred.url.contains("/slash-commands/"));

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn failed_delivery_is_absorbed_and_records_nothing() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;

    // Nothing listens on port 1; the send must neither error nor record.
    mock.slash_commands
        .send("http://127.0.0.1:1/unreachable", json!({"text": "x"}))
        .await;

    assert!(mock.slash_commands.calls().is_empty());
    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn event_delivered_to_the_mocks_own_hooks_endpoint() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;
    let target = format!("{}/services/T0/B0/X", mock.incoming_webhooks.base_url());

    mock.events
        .send(&target, json!({"event": {"type": "app_mention"}}))
        .await;

    // The server side saw the structured JSON body.
    let hooks = mock.incoming_webhooks.calls();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0].params["event"]["type"], "app_mention");

    // The client side recorded the plain acknowledgement.
    let events = mock.events.calls();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].params, json!("OK"));
    assert_eq!(events[0].status_code, Some(200));
    assert!(events[0].call_type.is_none());

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn outgoing_webhook_parses_json_reply() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;
    let bot = spawn_bot(r#"{"text":"bot says hi"}"#, None).await;

    mock.outgoing_webhooks
        .send(&format!("http://{bot}/hook"), json!({"text": "trigger"}))
        .await;

    let calls = mock.outgoing_webhooks.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].params["text"], "bot says hi");
    assert_eq!(calls[0].status_code, Some(200));

    mock.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn interactive_button_callback_is_served_from_registry() -> anyhow::Result<()> {
    let mock = ChatMock::start(config()).await?;

    mock.interactive_buttons.add_response(ResponseOverride {
        body: Some(json!({"text": "updated message"})),
        ..Default::default()
    });

    let bot = spawn_bot("ack", None).await;
    mock.interactive_buttons
        .send(&format!("http://{bot}/action"), json!({"callback_id": "btn_1"}))
        .await;
    assert_eq!(mock.interactive_buttons.calls().len(), 1);

    // Simulate the bot calling back later on the generated response_url
    // (the first generated callback address is number 1).
    let callback = format!("{}/interactive-buttons/1", mock.http_origin());
    let reply: Value = reqwest::Client::new()
        .post(&callback)
        .form(&[("payload", "{}")])
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(reply["text"], "updated message");

    let calls = mock.interactive_buttons.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].call_type, Some(CallType::ResponseUrl));
    assert_eq!(calls[1].params["payload"], "{}");

    mock.shutdown().await?;
    Ok(())
}
