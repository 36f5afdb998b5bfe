//! Discovery, selection, instantiation and adoption.

use std::sync::Arc;
use std::time::Duration;

use chatbridge::backend::ConnectionConfig;
use chatbridge::backends::{LoopbackClient, LoopbackPlatform, LOOPBACK_ID};
use chatbridge::runtime::CallStyle;
use chatbridge::{AdoptMode, BackendRegistry, BackendSelection, BridgeConfig, BridgeError, ErrorKind};

use crate::support::{unique_credential, ScriptedFactory, ScriptedState};

fn three_backends() -> BackendRegistry {
    let state = ScriptedState::new(CallStyle::Future);
    BackendRegistry::from_factories(vec![
        ScriptedFactory::new("alpha", 1, Arc::clone(&state)).into_arc(),
        ScriptedFactory::new("gamma", 5, Arc::clone(&state)).into_arc(),
        ScriptedFactory::new("beta", 5, state).into_arc(),
    ])
    .expect("registry should build")
}

#[test]
fn discover_finds_the_linked_loopback_backend() {
    let registry = BackendRegistry::discover().expect("discovery should succeed");
    let loopback = registry.get(LOOPBACK_ID).expect("loopback is registered");
    assert_eq!(loopback.priority, 0);
    assert!(!loopback.capabilities().is_empty());
}

#[test]
fn descriptors_are_ordered_by_priority_then_id() {
    let registry = three_backends();
    let ids: Vec<&str> = registry.descriptors().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["beta", "gamma", "alpha"]);
    assert_eq!(registry.len(), 3);
}

#[test]
fn auto_selection_picks_highest_priority_lowest_id() {
    let registry = three_backends();
    let selected = registry
        .select(&BackendSelection::Auto)
        .expect("auto should select");
    assert_eq!(selected.id, "beta");
}

#[test]
fn explicit_selection_ignores_priority() {
    let registry = three_backends();
    let selected = registry
        .select(&BackendSelection::Explicit("alpha".to_owned()))
        .expect("alpha exists");
    assert_eq!(selected.id, "alpha");
}

#[test]
fn explicit_selection_of_unknown_backend_is_not_found() {
    let registry = three_backends();
    let err = registry
        .select(&BackendSelection::Explicit("delta".to_owned()))
        .expect_err("delta does not exist");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("delta"));
}

#[test]
fn empty_registry_selects_nothing() {
    let registry = BackendRegistry::from_factories(Vec::new()).expect("empty registry is valid");
    assert!(registry.is_empty());
    let err = registry
        .select(&BackendSelection::Auto)
        .expect_err("nothing to select");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn duplicate_identifiers_are_rejected_with_both_candidates() {
    let state = ScriptedState::new(CallStyle::Future);
    let result = BackendRegistry::from_factories(vec![
        ScriptedFactory::new("twin", 1, Arc::clone(&state))
            .named("First Twin")
            .into_arc(),
        ScriptedFactory::new("twin", 2, state).named("Second Twin").into_arc(),
    ]);
    match result {
        Err(BridgeError::ConflictingBackend { id, candidates }) => {
            assert_eq!(id, "twin");
            assert!(candidates.contains(&"First Twin".to_owned()));
            assert!(candidates.contains(&"Second Twin".to_owned()));
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[test]
fn selection_parses_auto_and_identifiers() {
    assert_eq!("auto".parse::<BackendSelection>().ok(), Some(BackendSelection::Auto));
    assert_eq!("".parse::<BackendSelection>().ok(), Some(BackendSelection::Auto));
    assert_eq!(
        "loopback".parse::<BackendSelection>().ok(),
        Some(BackendSelection::Explicit("loopback".to_owned()))
    );
    assert_eq!(BackendSelection::Auto.to_string(), "auto");
}

#[tokio::test]
async fn instantiate_connects_and_reports_listening() {
    let state = ScriptedState::new(CallStyle::Future);
    let registry =
        BackendRegistry::from_factories(vec![ScriptedFactory::new("alpha", 1, state).into_arc()])
            .expect("registry should build");
    let descriptor = registry.get("alpha").expect("alpha exists").clone();

    let bridge = registry
        .instantiate(&descriptor, &ConnectionConfig::new(unique_credential()))
        .await
        .expect("should connect");

    assert_eq!(bridge.backend_id(), "alpha");
    assert_eq!(bridge.state(), chatbridge::events::PipelineState::Listening);
}

#[tokio::test]
async fn failed_handshake_is_a_connection_error_with_native_cause() {
    let state = ScriptedState::new(CallStyle::Future);
    let registry = BackendRegistry::from_factories(vec![ScriptedFactory::new("alpha", 1, state)
        .failing_connect("gateway refused")
        .into_arc()])
    .expect("registry should build");
    let descriptor = registry.get("alpha").expect("alpha exists").clone();

    let err = registry
        .instantiate(&descriptor, &ConnectionConfig::new(unique_credential()))
        .await
        .expect_err("handshake fails");

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(
        err.native().map(ToString::to_string).as_deref(),
        Some("gateway refused")
    );
}

#[tokio::test]
async fn handshake_timeout_is_a_connection_error() {
    let state = ScriptedState::new(CallStyle::Future);
    let registry = BackendRegistry::from_factories(vec![ScriptedFactory::new("slow", 1, state)
        .slow_connect(Duration::from_secs(5))
        .into_arc()])
    .expect("registry should build");
    let descriptor = registry.get("slow").expect("slow exists").clone();
    let config =
        ConnectionConfig::new(unique_credential()).with_timeout(Duration::from_millis(20));

    let err = registry
        .instantiate(&descriptor, &config)
        .await
        .expect_err("handshake times out");

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn a_credential_backs_only_one_live_facade() {
    let state = ScriptedState::new(CallStyle::Future);
    let registry =
        BackendRegistry::from_factories(vec![ScriptedFactory::new("alpha", 1, state).into_arc()])
            .expect("registry should build");
    let descriptor = registry.get("alpha").expect("alpha exists").clone();
    let config = ConnectionConfig::new(unique_credential());

    let first = registry
        .instantiate(&descriptor, &config)
        .await
        .expect("first session connects");
    let err = registry
        .instantiate(&descriptor, &config)
        .await
        .expect_err("second session is refused");
    assert!(matches!(err, BridgeError::CredentialInUse { .. }));
    assert_eq!(err.kind(), ErrorKind::Connection);

    first.shutdown().await.expect("shutdown succeeds");
    let second = registry
        .instantiate(&descriptor, &config)
        .await
        .expect("credential is free after shutdown");
    second.shutdown().await.expect("shutdown succeeds");
}

#[tokio::test]
async fn failed_connect_releases_the_credential() {
    let state = ScriptedState::new(CallStyle::Future);
    let registry = BackendRegistry::from_factories(vec![
        ScriptedFactory::new("broken", 2, Arc::clone(&state))
            .failing_connect("nope")
            .into_arc(),
        ScriptedFactory::new("working", 1, state).into_arc(),
    ])
    .expect("registry should build");
    let config = ConnectionConfig::new(unique_credential());

    let broken = registry.get("broken").expect("broken exists").clone();
    assert!(registry.instantiate(&broken, &config).await.is_err());

    let working = registry.get("working").expect("working exists").clone();
    let bridge = registry
        .instantiate(&working, &config)
        .await
        .expect("lease was released by the failed attempt");
    assert_eq!(bridge.backend_id(), "working");
}

#[tokio::test]
async fn connect_uses_the_configured_selection() {
    let registry = three_backends();
    let mut config = BridgeConfig::default();
    config.bridge.backend = BackendSelection::Explicit("gamma".to_owned());
    config.connection.token = Some(unique_credential().expose().to_owned());

    let bridge = registry.connect(&config).await.expect("gamma connects");
    assert_eq!(bridge.backend_id(), "gamma");
}

#[tokio::test]
async fn adopt_wraps_a_live_loopback_client() {
    let registry = BackendRegistry::discover().expect("discovery should succeed");
    let client = Arc::new(LoopbackClient::new(LoopbackPlatform::demo()));

    let bridge = registry
        .adopt(client, AdoptMode::Exact)
        .expect("loopback adopts its own client");

    assert_eq!(bridge.backend_id(), LOOPBACK_ID);
    let guilds = bridge.guilds().await.expect("guilds resolve");
    assert_eq!(guilds.len(), 1);
}

#[tokio::test]
async fn adopt_of_unknown_object_is_not_found() {
    let registry = BackendRegistry::discover().expect("discovery should succeed");
    let err = registry
        .adopt(Arc::new(42_u32), AdoptMode::Any)
        .expect_err("nobody adopts a number");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn exact_adoption_rejects_ambiguous_claims() {
    let state = ScriptedState::new(CallStyle::Future);
    let first = ScriptedFactory::new("one", 2, Arc::clone(&state));
    let client = Arc::new(first.client());
    let registry = BackendRegistry::from_factories(vec![
        first.into_arc(),
        ScriptedFactory::new("two", 1, state).into_arc(),
    ])
    .expect("registry should build");

    let err = registry
        .adopt(Arc::clone(&client) as Arc<dyn std::any::Any + Send + Sync>, AdoptMode::Exact)
        .expect_err("two backends recognize the client");
    assert_eq!(err.kind(), ErrorKind::ConflictingBackend);

    let bridge = registry
        .adopt(client, AdoptMode::Any)
        .expect("first eligible backend wins");
    assert_eq!(bridge.backend_id(), "one");
}
