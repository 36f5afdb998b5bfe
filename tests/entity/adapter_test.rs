//! Entity translation, identity and staleness.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chatbridge::backend::NativeGuild;
use chatbridge::entity::{
    Canonical, Channel, ChannelKind, EntityKind, Field, Guild, Message, ObjectAdapter, Role,
    SessionTable, Snowflake,
};
use chatbridge::runtime::CallStyle;
use chatbridge::{BridgeError, ErrorKind};

use crate::support::{
    fake_channel, fake_guild, fake_message, full_bridge, FakeGuild, FakeRole, GUILD_ID, MESSAGE_ID,
    TEXT_CHANNEL_ID,
};

fn adapter(kinds: impl IntoIterator<Item = ChannelKind>) -> ObjectAdapter {
    ObjectAdapter::new(SessionTable::new(), kinds.into_iter().collect())
}

#[test]
fn wrap_then_unwrap_returns_the_same_native_object() {
    let adapter = adapter(ChannelKind::ALL);
    let native = fake_guild();

    let guild: Guild = adapter.wrap::<Guild>(Arc::clone(&native));
    let back = adapter.unwrap(&guild).expect("live entity unwraps");

    assert!(Arc::ptr_eq(&native, &back));
    assert_eq!(guild.id, GUILD_ID);
    assert_eq!(guild.name, "Scripted Guild");
    assert_eq!(guild.member_count, Field::Known(3));
    assert_eq!(guild.owner_id, Field::Unsupported);
}

#[test]
fn rewrapping_the_same_id_keeps_each_native_object() {
    let adapter = adapter(ChannelKind::ALL);
    let original = fake_guild();
    let renamed: Arc<dyn NativeGuild> = Arc::new(FakeGuild {
        id: GUILD_ID,
        name: "Renamed".to_owned(),
    });

    let first = adapter.wrap::<Guild>(Arc::clone(&original));
    let second = adapter.wrap::<Guild>(Arc::clone(&renamed));

    assert_eq!(first, second);
    let first_native = adapter.unwrap(&first).expect("still live");
    let second_native = adapter.unwrap(&second).expect("still live");
    assert!(Arc::ptr_eq(&first_native, &original));
    assert!(Arc::ptr_eq(&second_native, &renamed));
    assert_eq!(first_native.name(), "Scripted Guild");
}

#[test]
fn equal_entities_hash_alike_across_wraps() {
    let adapter = adapter(ChannelKind::ALL);

    let set: HashSet<Guild> = [
        adapter.wrap::<Guild>(fake_guild()),
        adapter.wrap::<Guild>(fake_guild()),
    ]
    .into_iter()
    .collect();

    assert_eq!(set.len(), 1);
}

#[test]
fn dropped_entities_free_their_slots() {
    let adapter = adapter(ChannelKind::ALL);

    for id in 0..10_000_u64 {
        let channel = adapter.wrap::<Channel>(fake_channel(Snowflake(id), ChannelKind::Text));
        assert!(channel.handle().is_live());
    }

    assert!(adapter.table().is_empty());
}

#[test]
fn a_slot_lives_as_long_as_any_clone_of_its_entity() {
    let adapter = adapter(ChannelKind::ALL);
    let native = fake_guild();
    let guild = adapter.wrap::<Guild>(Arc::clone(&native));
    let copy = guild.clone();

    drop(guild);
    assert_eq!(adapter.table().len(), 1);
    let back = adapter.unwrap(&copy).expect("clone keeps the slot");
    assert!(Arc::ptr_eq(&back, &native));

    drop(copy);
    assert!(adapter.table().is_empty());
}

#[test]
fn a_message_holds_its_author_slot() {
    let adapter = adapter(ChannelKind::ALL);

    let message = adapter.wrap::<Message>(fake_message(MESSAGE_ID.get(), "hi"));
    assert_eq!(adapter.table().len(), 2);
    assert!(adapter.unwrap(&message.author).is_ok());

    drop(message);
    assert!(adapter.table().is_empty());
}

#[test]
fn closing_the_table_makes_every_entity_stale() {
    let adapter = adapter(ChannelKind::ALL);
    let guild = adapter.wrap::<Guild>(fake_guild());
    let channel = adapter.wrap::<Channel>(fake_channel(TEXT_CHANNEL_ID, ChannelKind::Text));
    assert!(guild.handle().is_live());

    let released = adapter.table().close();

    assert_eq!(released, 2);
    assert!(!guild.handle().is_live());
    let err = adapter.unwrap(&channel).expect_err("closed session");
    assert!(matches!(
        err,
        BridgeError::Stale {
            kind: EntityKind::Channel,
            ..
        }
    ));
    assert_eq!(adapter.table().close(), 0);
}

#[test]
fn entities_wrapped_after_close_are_born_stale() {
    let adapter = adapter(ChannelKind::ALL);
    adapter.table().close();

    let guild = adapter.wrap::<Guild>(fake_guild());

    assert!(!guild.handle().is_live());
    assert_eq!(
        adapter.unwrap(&guild).expect_err("stale").kind(),
        ErrorKind::Stale
    );
}

#[test]
fn entities_of_another_session_are_rejected() {
    let ours = adapter(ChannelKind::ALL);
    let theirs = adapter(ChannelKind::ALL);
    let foreign = theirs.wrap::<Guild>(fake_guild());

    let err = ours.unwrap(&foreign).expect_err("foreign entity");

    match err {
        BridgeError::SessionMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, ours.session());
            assert_eq!(found, theirs.session());
        }
        other => panic!("expected a session mismatch, got {other:?}"),
    }
}

#[test]
fn unsupported_channel_kinds_become_unknown() {
    let adapter = adapter(BTreeSet::from([ChannelKind::Text]));

    let text = adapter.wrap::<Channel>(fake_channel(TEXT_CHANNEL_ID, ChannelKind::Text));
    let forum = adapter.wrap::<Channel>(fake_channel(Snowflake(99), ChannelKind::Forum));

    assert_eq!(text.kind, ChannelKind::Text);
    assert_eq!(forum.kind, ChannelKind::Unknown);
    assert_eq!(forum.name.known().cloned().flatten().as_deref(), Some("channel-99"));
}

#[test]
fn optional_fields_report_support_explicitly() {
    let adapter = adapter(ChannelKind::ALL);
    let role = adapter.wrap::<Role>(Arc::new(FakeRole {
        id: Snowflake(60),
    }));

    assert_eq!(role.color, Field::Known(0x00ff_8800));
    assert!(!role.mentionable.is_supported());
    assert_eq!(role.position.known(), None);
}

#[tokio::test]
async fn entities_from_two_bridges_are_equal_but_not_interchangeable() {
    let (first, _) = full_bridge(CallStyle::Future).await;
    let (second, _) = full_bridge(CallStyle::Future).await;

    let a = first
        .guild(GUILD_ID)
        .await
        .expect("query succeeds")
        .expect("guild exists");
    let b = second
        .guild(GUILD_ID)
        .await
        .expect("query succeeds")
        .expect("guild exists");
    assert_eq!(a, b);

    let err = second.channels(&a).await.expect_err("entity of another bridge");
    assert_eq!(err.kind(), ErrorKind::Stale);
    assert!(matches!(err, BridgeError::SessionMismatch { .. }));
}

#[tokio::test]
async fn native_escape_hatch_reaches_the_concrete_type() {
    let (bridge, _) = full_bridge(CallStyle::Blocking).await;
    let guild = bridge
        .guild(GUILD_ID)
        .await
        .expect("query succeeds")
        .expect("guild exists");

    let native = bridge.native(&guild).expect("live entity");
    let concrete = native
        .as_any()
        .downcast_ref::<FakeGuild>()
        .expect("scripted guild");

    assert_eq!(concrete.name, "Scripted Guild");
}
