//! End-to-end behaviour against the in-memory loopback platform.

use futures::StreamExt;

use chatbridge::backend::ConnectionConfig;
use chatbridge::backends::{LoopbackClient, LoopbackFactory, LoopbackPlatform};
use chatbridge::capability::Capability;
use chatbridge::entity::{Channel, ChannelKind, Field, MessageDraft};
use chatbridge::events::{EventKind, EventPayload, PipelineState};
use chatbridge::{BackendRegistry, Bridge, Credential, ErrorKind};

use crate::support::unique_credential;

async fn loopback(platform: &LoopbackPlatform) -> Bridge {
    let registry =
        BackendRegistry::from_factories(vec![std::sync::Arc::new(LoopbackFactory::new(platform.clone()))])
            .expect("registry should build");
    let descriptor = registry.descriptors()[0].clone();
    registry
        .instantiate(&descriptor, &ConnectionConfig::new(unique_credential()))
        .await
        .expect("loopback connects")
}

async fn channel_named(bridge: &Bridge, name: &str) -> Channel {
    let guilds = bridge.guilds().await.expect("guilds resolve");
    let channels = bridge.channels(&guilds[0]).await.expect("channels resolve");
    channels
        .into_iter()
        .find(|c| c.name.known().cloned().flatten().as_deref() == Some(name))
        .expect("channel exists")
}

#[tokio::test]
async fn empty_token_is_refused_at_connect() {
    let registry = BackendRegistry::from_factories(vec![std::sync::Arc::new(LoopbackFactory::new(
        LoopbackPlatform::demo(),
    ))])
    .expect("registry should build");
    let descriptor = registry.descriptors()[0].clone();

    let err = registry
        .instantiate(&descriptor, &ConnectionConfig::new(Credential::new("")))
        .await
        .expect_err("missing token");

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("non-empty token"));
}

#[tokio::test]
async fn demo_platform_is_visible_through_the_facade() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;

    let guilds = bridge.guilds().await.expect("guilds resolve");
    assert_eq!(guilds.len(), 1);
    assert_eq!(guilds[0].name, "Loopback Guild");
    assert_eq!(guilds[0].owner_id, Field::Known(platform.bot_id()));

    let channels = bridge.channels(&guilds[0]).await.expect("channels resolve");
    let kinds: Vec<ChannelKind> = channels.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![ChannelKind::Text, ChannelKind::Voice, ChannelKind::Unknown]
    );

    let roles = bridge.roles(&guilds[0]).await.expect("roles resolve");
    assert_eq!(roles[0].name, "moderator");
    assert_eq!(roles[0].color, Field::Unsupported);

    assert!(bridge.supports(Capability::ThreadedChannels));
    assert!(bridge.supports(Capability::MessageHistory));
    assert!(!bridge.supports(Capability::Voice));
}

#[tokio::test]
async fn sent_messages_come_back_as_events() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;
    let general = channel_named(&bridge, "general").await;
    let mut events = bridge
        .listen(EventKind::MessageReceived)
        .expect("listen succeeds");

    let sent = bridge
        .send_message(&general, &MessageDraft::text("ping"))
        .await
        .expect("sent");

    let event = events.next().await.expect("event delivered");
    let EventPayload::Message(message) = event.payload else {
        panic!("expected a message payload");
    };
    assert_eq!(message, sent);
    assert_eq!(message.content, "ping");
    assert_eq!(message.author.bot, Field::Known(true));
    assert!(platform.messages(general.id).contains(&"ping".to_owned()));
}

#[tokio::test]
async fn messages_from_other_users_are_delivered() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;
    let general = channel_named(&bridge, "general").await;
    let mut events = bridge
        .listen(EventKind::MessageReceived)
        .expect("listen succeeds");

    let bob = platform.add_user("bob");
    platform
        .post_message(general.id, bob, "hi bot")
        .expect("posted");

    let event = events.next().await.expect("event delivered");
    assert_eq!(event.sequence, 1);
    assert!(event.summary().contains("bob"));
}

#[tokio::test]
async fn edits_and_deletions_are_reflected() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;
    let general = channel_named(&bridge, "general").await;

    let sent = bridge
        .send_message(&general, &MessageDraft::text("typo"))
        .await
        .expect("sent");
    let edited = bridge
        .edit_message(&sent, &MessageDraft::text("fixed"))
        .await
        .expect("edited");
    assert!(edited.edited_at.known().is_some_and(Option::is_some));
    assert!(platform.messages(general.id).contains(&"fixed".to_owned()));

    bridge.delete_message(&edited).await.expect("deleted");
    assert!(!platform.messages(general.id).contains(&"fixed".to_owned()));

    let err = bridge
        .delete_message(&edited)
        .await
        .expect_err("already gone");
    assert_eq!(err.kind(), ErrorKind::Backend);
}

#[tokio::test]
async fn threads_only_start_under_text_channels() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;
    let general = channel_named(&bridge, "general").await;
    let lounge = channel_named(&bridge, "lounge").await;

    let thread = bridge
        .create_thread(&general, "side topic")
        .await
        .expect("thread created");
    assert_eq!(thread.kind, ChannelKind::PublicThread);
    assert_eq!(thread.parent_id, Field::Known(Some(general.id)));

    let err = bridge
        .create_thread(&lounge, "nope")
        .await
        .expect_err("voice channels hold no threads");
    assert_eq!(err.kind(), ErrorKind::Backend);
}

#[tokio::test]
async fn history_is_newest_first() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;
    let general = channel_named(&bridge, "general").await;
    for text in ["one", "two", "three"] {
        bridge
            .send_message(&general, &MessageDraft::text(text))
            .await
            .expect("sent");
    }

    let contents: Vec<String> = bridge
        .message_history(&general, 2)
        .map(|message| message.expect("message").content)
        .collect()
        .await;

    assert_eq!(contents, vec!["three", "two"]);
}

#[tokio::test]
async fn deleting_a_channel_emits_a_deletion() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;
    let general = channel_named(&bridge, "general").await;
    let mut events = bridge
        .listen(EventKind::ChannelDeleted)
        .expect("listen succeeds");

    bridge.delete_channel(&general).await.expect("deleted");

    let event = events.next().await.expect("event delivered");
    let EventPayload::Deleted(deletion) = event.payload else {
        panic!("expected a deletion payload");
    };
    assert_eq!(deletion.id, general.id);
    assert!(bridge
        .channel(general.id)
        .await
        .expect("query succeeds")
        .is_none());
}

#[tokio::test]
async fn unsupported_voice_is_refused() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;
    let lounge = channel_named(&bridge, "lounge").await;

    let err = bridge.join_voice(&lounge).await.expect_err("no voice");
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
}

#[tokio::test]
async fn platform_disconnect_closes_the_bridge() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;

    platform.disconnect("maintenance");

    assert_eq!(bridge.state(), PipelineState::Closed);
    assert_eq!(
        bridge.guilds().await.expect_err("closed").kind(),
        ErrorKind::Connection
    );
}

#[tokio::test]
async fn shutdown_detaches_every_listener() {
    let platform = LoopbackPlatform::demo();
    let bridge = loopback(&platform).await;
    assert!(platform.listener_count() > 0);

    bridge.shutdown().await.expect("shutdown succeeds");

    assert_eq!(platform.listener_count(), 0);
    let client = bridge
        .extension::<LoopbackClient>()
        .expect("loopback client");
    assert_eq!(client.platform().bot_id(), platform.bot_id());
}
