//! Capability inspection and gating.

use std::sync::Arc;

use chatbridge::capability::{inspect, Capability, CapabilitySet};
use chatbridge::entity::MessageDraft;
use chatbridge::events::EventKind;
use chatbridge::runtime::CallStyle;
use chatbridge::ErrorKind;
use futures::StreamExt;

use crate::support::{bare_bridge, full_bridge, ScriptedFactory, ScriptedState};

#[test]
fn inspection_reflects_exposed_sub_interfaces() {
    let state = ScriptedState::new(CallStyle::Future);
    let client = ScriptedFactory::new("partial", 1, state)
        .with_capabilities([Capability::Voice, Capability::MessageHistory])
        .client();

    let set = inspect(&client);

    assert_eq!(
        set,
        CapabilitySet::from([Capability::Voice, Capability::MessageHistory])
    );
}

#[test]
fn capability_names_are_stable() {
    let names: Vec<&str> = Capability::ALL.iter().map(|c| c.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "voice",
            "threaded_channels",
            "slash_commands",
            "component_interactions",
            "message_history"
        ]
    );
}

#[tokio::test]
async fn bridge_capabilities_come_from_the_client() {
    let (bridge, _state) = full_bridge(CallStyle::Future).await;
    for capability in Capability::ALL {
        assert!(bridge.supports(capability), "{capability} should be supported");
        assert!(bridge.require(capability).is_ok());
    }
}

#[tokio::test]
async fn gated_operation_fails_without_touching_the_backend() {
    let (bridge, state) = bare_bridge(CallStyle::Future).await;
    let guild = bridge
        .guild(crate::support::GUILD_ID)
        .await
        .expect("query succeeds")
        .expect("guild exists");
    let channels = bridge.channels(&guild).await.expect("channels resolve");
    let before = state.calls();

    let err = bridge
        .create_thread(&channels[0], "side topic")
        .await
        .expect_err("threads are unsupported");
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);

    let err = bridge
        .join_voice(&channels[0])
        .await
        .expect_err("voice is unsupported");
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);

    let err = bridge
        .global_commands()
        .await
        .expect_err("commands are unsupported");
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);

    let mut history = bridge.message_history(&channels[0], 10);
    let first = history.next().await.expect("one error item");
    assert_eq!(
        first.expect_err("history is unsupported").kind(),
        ErrorKind::UnsupportedCapability
    );
    assert!(history.next().await.is_none());

    assert_eq!(state.calls(), before, "backend must not be called");
}

#[tokio::test]
async fn require_names_backend_and_capability() {
    let (bridge, _state) = bare_bridge(CallStyle::Blocking).await;
    let err = bridge
        .require(Capability::SlashCommands)
        .expect_err("slash commands are unsupported");
    let message = err.to_string();
    assert!(message.contains("bare"));
    assert!(message.contains("slash_commands"));
}

#[tokio::test]
async fn interaction_events_need_their_capability() {
    let (bridge, _state) = bare_bridge(CallStyle::Future).await;

    let err = bridge
        .subscribe(EventKind::CommandInvoked, |_| Ok(()))
        .expect_err("command events are gated");
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
    let err = bridge
        .listen(EventKind::ComponentUsed)
        .expect_err("component events are gated");
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);

    assert!(bridge.subscribe(EventKind::MessageReceived, |_| Ok(())).is_ok());
}

#[tokio::test]
async fn declared_capabilities_do_not_override_inspection() {
    // The factory declares voice but its client exposes nothing.
    struct Overclaiming(ScriptedFactory);

    impl chatbridge::backend::BackendFactory for Overclaiming {
        fn info(&self) -> chatbridge::backend::BackendInfo {
            self.0.info()
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::from([Capability::Voice])
        }
        fn connect(
            &self,
            config: &chatbridge::backend::ConnectionConfig,
        ) -> chatbridge::runtime::NativeCall<Arc<dyn chatbridge::backend::BackendClient>> {
            self.0.connect(config)
        }
    }

    let state = ScriptedState::new(CallStyle::Future);
    let registry = chatbridge::BackendRegistry::from_factories(vec![Arc::new(Overclaiming(
        ScriptedFactory::new("overclaiming", 1, state),
    ))])
    .expect("registry should build");
    let descriptor = registry.descriptors()[0].clone();
    let bridge = registry
        .instantiate(
            &descriptor,
            &chatbridge::backend::ConnectionConfig::new(crate::support::unique_credential()),
        )
        .await
        .expect("connects");

    assert!(descriptor.capabilities().contains(&Capability::Voice));
    assert!(!bridge.supports(Capability::Voice));
}

#[tokio::test]
async fn supported_features_reach_the_backend() {
    let (bridge, state) = full_bridge(CallStyle::Future).await;
    let channel = bridge
        .channel(crate::support::TEXT_CHANNEL_ID)
        .await
        .expect("query succeeds")
        .expect("channel exists");

    let thread = bridge
        .create_thread(&channel, "side topic")
        .await
        .expect("thread created");
    assert!(thread.kind.is_thread());

    bridge.join_voice(&channel).await.expect("voice joined");
    let commands = bridge.global_commands().await.expect("commands listed");
    assert_eq!(commands[0].name, "ping");

    let sent = bridge
        .send_message(&channel, &MessageDraft::text("hi"))
        .await
        .expect("sent");
    assert_eq!(sent.content, "hi");
    assert!(state.calls() >= 5);
}
