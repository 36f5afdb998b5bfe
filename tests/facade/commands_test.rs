//! Slash command declarations, autocomplete and followups through the facade.

use futures::StreamExt;

use chatbridge::backend::NativeEvent;
use chatbridge::entity::{
    ChoiceValue, CommandData, CommandOptionData, Interaction, InteractionKind,
    InteractionResponse, Locale, OptionChoice, OptionKind, OptionValue,
};
use chatbridge::events::{EventKind, EventPayload};
use chatbridge::runtime::CallStyle;
use chatbridge::{Bridge, BridgeError, ErrorKind};

use crate::support::{bare_bridge, fake_interaction, full_bridge, ScriptedState};

async fn next_interaction(
    bridge: &Bridge,
    state: &ScriptedState,
    kind: EventKind,
    event: NativeEvent,
) -> Interaction {
    let mut stream = bridge.listen(kind).expect("slash commands supported");
    state.emit(event);
    let event = stream.next().await.expect("event delivered");
    let EventPayload::Interaction(interaction) = event.payload else {
        panic!("expected an interaction payload");
    };
    interaction
}

fn response(content: &str) -> InteractionResponse {
    InteractionResponse {
        content: content.to_owned(),
        ephemeral: false,
    }
}

#[tokio::test]
async fn validated_command_trees_register() {
    let (bridge, _) = full_bridge(CallStyle::Future).await;
    let region = CommandOptionData::new("region", "Where to look", OptionKind::String)
        .expect("valid option")
        .autocomplete()
        .expect("string options autocomplete");
    let search = CommandOptionData::new("search", "Search servers", OptionKind::SubCommand)
        .expect("valid subcommand")
        .with_option(region)
        .expect("value option under subcommand");
    let data = CommandData::new("servers", "Server tools")
        .expect("valid command")
        .with_description_localizations([(Locale::German, "Serverwerkzeuge")])
        .expect("valid localization")
        .with_option(search)
        .expect("subcommand under command");

    let registered = bridge
        .set_global_commands(&[data])
        .await
        .expect("commands registered");
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].name, "servers");
}

#[test]
fn invalid_command_data_maps_to_invalid_input() {
    let err = CommandData::new("Servers", "Server tools").expect_err("uppercase name");
    assert_eq!(BridgeError::from(err).kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn autocomplete_events_expose_the_focused_argument() {
    let (bridge, state) = full_bridge(CallStyle::Future).await;
    let interaction = next_interaction(
        &bridge,
        &state,
        EventKind::AutocompleteRequested,
        NativeEvent::AutocompleteRequested(fake_interaction(InteractionKind::Autocomplete)),
    )
    .await;

    assert_eq!(interaction.kind, InteractionKind::Autocomplete);
    let focused = interaction.focused_argument().expect("one argument is focused");
    assert_eq!(focused.name, "region");
    assert_eq!(focused.value, OptionValue::String("we".to_owned()));
}

#[tokio::test]
async fn suggestions_are_forwarded_to_the_backend() {
    let (bridge, state) = full_bridge(CallStyle::Blocking).await;
    let interaction = next_interaction(
        &bridge,
        &state,
        EventKind::AutocompleteRequested,
        NativeEvent::AutocompleteRequested(fake_interaction(InteractionKind::Autocomplete)),
    )
    .await;

    let choices = vec![
        OptionChoice::new("Western Europe", "eu-west").expect("choice"),
        OptionChoice::new("Western US", "us-west").expect("choice"),
    ];
    bridge
        .suggest_choices(&interaction, &choices)
        .await
        .expect("suggestions accepted");

    let sent = state.suggestions.lock().clone();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].value(), &ChoiceValue::String("eu-west".to_owned()));
}

#[tokio::test]
async fn suggestions_are_checked_before_the_backend_is_called() {
    let (bridge, state) = full_bridge(CallStyle::Future).await;
    let interaction = next_interaction(
        &bridge,
        &state,
        EventKind::AutocompleteRequested,
        NativeEvent::AutocompleteRequested(fake_interaction(InteractionKind::Autocomplete)),
    )
    .await;
    let calls = state.calls();

    let too_many: Vec<OptionChoice> = (0..30)
        .map(|n| OptionChoice::new(format!("choice {n}"), format!("v{n}")).expect("choice"))
        .collect();
    let err = bridge
        .suggest_choices(&interaction, &too_many)
        .await
        .expect_err("too many suggestions");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mixed = vec![
        OptionChoice::new("one", 1_i64).expect("choice"),
        OptionChoice::new("two", "2").expect("choice"),
    ];
    let err = bridge
        .suggest_choices(&interaction, &mixed)
        .await
        .expect_err("mixed value types");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(state.calls(), calls);
}

#[tokio::test]
async fn suggestions_require_an_autocomplete_interaction() {
    let (bridge, state) = full_bridge(CallStyle::Future).await;
    let interaction = next_interaction(
        &bridge,
        &state,
        EventKind::CommandInvoked,
        NativeEvent::CommandInvoked(fake_interaction(InteractionKind::Command)),
    )
    .await;

    let err = bridge
        .suggest_choices(&interaction, &[])
        .await
        .expect_err("not an autocomplete request");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn followups_can_be_sent_and_edited() {
    let (bridge, state) = full_bridge(CallStyle::Suspend).await;
    let interaction = next_interaction(
        &bridge,
        &state,
        EventKind::CommandInvoked,
        NativeEvent::CommandInvoked(fake_interaction(InteractionKind::Command)),
    )
    .await;

    bridge
        .respond(&interaction, &response("working on it"))
        .await
        .expect("initial response");
    let followup = bridge
        .followup(&interaction, &response("done"))
        .await
        .expect("followup sent");
    assert_eq!(followup.content, "done");

    let edited = bridge
        .edit_followup(&interaction, &followup, &response("done, 3 results"))
        .await
        .expect("followup edited");
    assert_eq!(edited, followup);
    assert_eq!(edited.content, "done, 3 results");
    assert_eq!(
        *state.followups.lock(),
        vec!["done".to_owned(), "done, 3 results".to_owned()]
    );
}

#[tokio::test]
async fn autocomplete_needs_slash_command_support() {
    let (bridge, _) = bare_bridge(CallStyle::Future).await;
    let err = bridge
        .listen(EventKind::AutocompleteRequested)
        .expect_err("no slash commands");
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
}
