//! Facade queries, mutations and lifecycle against the scripted backend.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::StreamExt;

use chatbridge::entity::{ChannelKind, CommandData, MessageDraft};
use chatbridge::events::PipelineState;
use chatbridge::runtime::CallStyle;
use chatbridge::{ErrorKind, Snowflake};

use crate::support::{
    fake_message, full_bridge, ScriptedClient, GUILD_ID, TEXT_CHANNEL_ID, USER_ID,
};

#[tokio::test]
async fn queries_translate_native_objects() {
    let (bridge, _) = full_bridge(CallStyle::Blocking).await;

    let guilds = bridge.guilds().await.expect("guilds resolve");
    assert_eq!(guilds.len(), 1);
    let channels = bridge.channels(&guilds[0]).await.expect("channels resolve");
    let kinds: Vec<ChannelKind> = channels.iter().map(|c| c.kind).collect();
    // The scripted backend cannot represent forums.
    assert_eq!(kinds, vec![ChannelKind::Text, ChannelKind::Unknown]);

    let roles = bridge.roles(&guilds[0]).await.expect("roles resolve");
    assert_eq!(roles[0].name, "admin");

    let user = bridge
        .user(USER_ID)
        .await
        .expect("query succeeds")
        .expect("user exists");
    assert_eq!(user.name, "alice");
}

#[tokio::test]
async fn missing_entities_resolve_to_none() {
    let (bridge, _) = full_bridge(CallStyle::Future).await;
    assert!(bridge
        .guild(Snowflake(404))
        .await
        .expect("query succeeds")
        .is_none());
    assert!(bridge
        .channel(Snowflake(404))
        .await
        .expect("query succeeds")
        .is_none());
}

#[tokio::test]
async fn messages_can_be_sent_edited_and_deleted() {
    let (bridge, _) = full_bridge(CallStyle::Stream).await;
    let channel = bridge
        .channel(TEXT_CHANNEL_ID)
        .await
        .expect("query succeeds")
        .expect("channel exists");

    let sent = bridge
        .send_message(&channel, &MessageDraft::text("draft"))
        .await
        .expect("sent");
    assert_eq!(sent.channel_id, TEXT_CHANNEL_ID);

    let edited = bridge
        .edit_message(&sent, &MessageDraft::text("final"))
        .await
        .expect("edited");
    assert_eq!(edited, sent);
    assert_eq!(edited.content, "final");

    bridge.delete_message(&edited).await.expect("deleted");
    bridge.delete_channel(&channel).await.expect("deleted");
}

#[tokio::test]
async fn commands_round_trip_through_the_sub_interface() {
    let (bridge, _) = full_bridge(CallStyle::Suspend).await;
    let data = vec![
        CommandData::new("ping", "Check latency").expect("valid command"),
        CommandData::new("roll", "Roll a die").expect("valid command"),
    ];

    let registered = bridge
        .set_global_commands(&data)
        .await
        .expect("commands registered");
    let names: Vec<&str> = registered.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["ping", "roll"]);

    let guild = bridge
        .guild(GUILD_ID)
        .await
        .expect("query succeeds")
        .expect("guild exists");
    assert!(bridge
        .guild_commands(&guild)
        .await
        .expect("guild commands listed")
        .is_empty());
}

#[tokio::test]
async fn history_streams_newest_first_up_to_the_limit() {
    let (bridge, state) = full_bridge(CallStyle::Future).await;
    *state.history.lock() = vec![
        fake_message(203, "third"),
        fake_message(202, "second"),
        fake_message(201, "first"),
    ];
    let channel = bridge
        .channel(TEXT_CHANNEL_ID)
        .await
        .expect("query succeeds")
        .expect("channel exists");

    let contents: Vec<String> = bridge
        .message_history(&channel, 2)
        .map(|message| message.expect("message").content)
        .collect()
        .await;

    assert_eq!(contents, vec!["third", "second"]);
}

#[tokio::test]
async fn extension_exposes_the_native_client() {
    let (bridge, state) = full_bridge(CallStyle::Future).await;

    let client = bridge
        .extension::<ScriptedClient>()
        .expect("scripted client behind the facade");

    assert!(Arc::ptr_eq(&client.state, &state));
    assert!(bridge.extension::<String>().is_none());
}

#[tokio::test]
async fn shutdown_makes_entities_stale_and_closes_the_session() {
    let (bridge, state) = full_bridge(CallStyle::Future).await;
    let channel = bridge
        .channel(TEXT_CHANNEL_ID)
        .await
        .expect("query succeeds")
        .expect("channel exists");

    bridge.shutdown().await.expect("shutdown succeeds");

    assert_eq!(bridge.state(), PipelineState::Closed);
    let err = bridge
        .send_message(&channel, &MessageDraft::text("late"))
        .await
        .expect_err("stale channel");
    assert_eq!(err.kind(), ErrorKind::Stale);
    let err = bridge.guilds().await.expect_err("closed session");
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(
        bridge.native(&channel).expect_err("stale").kind(),
        ErrorKind::Stale
    );

    bridge.shutdown().await.expect("second shutdown is a no-op");
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelling_an_operation_suppresses_its_continuations() {
    let (bridge, state) = full_bridge(CallStyle::Future).await;
    state.set_delay(std::time::Duration::from_millis(30));
    let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let pending = bridge.guilds();
    let flag = Arc::clone(&ran);
    pending.on_complete(move |_| flag.store(true, Ordering::SeqCst));
    assert!(pending.cancel());

    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(pending.await.expect_err("cancelled").kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn operation_timeout_applies_to_facade_calls() {
    let state = crate::support::ScriptedState::new(CallStyle::Future);
    let registry = chatbridge::BackendRegistry::from_factories(vec![
        crate::support::ScriptedFactory::new("slowpoke", 1, Arc::clone(&state)).into_arc(),
    ])
    .expect("registry should build");
    let descriptor = registry.descriptors()[0].clone();
    let config = chatbridge::ConnectionConfig::new(crate::support::unique_credential())
        .with_timeout(std::time::Duration::from_millis(30));
    let bridge = registry
        .instantiate(&descriptor, &config)
        .await
        .expect("handshake is fast");

    state.set_delay(std::time::Duration::from_secs(5));
    let err = bridge.guilds().await.expect_err("query is slow");

    assert_eq!(err.kind(), ErrorKind::Timeout);
}
