//! Per-backend feature support.
//!
//! A backend's capability set is derived by inspecting which optional
//! sub-interfaces its client exposes. It is computed once, right after the
//! backend connects, and never changes for the life of the session.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::BackendClient;

/// A named binary feature a backend either supports or does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Joining and leaving voice channels.
    Voice,
    /// Creating threads under a parent channel.
    ThreadedChannels,
    /// Registering slash commands and receiving their invocations.
    SlashCommands,
    /// Receiving and acknowledging message component interactions.
    ComponentInteractions,
    /// Streaming a channel's message history.
    MessageHistory,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 5] = [
        Capability::Voice,
        Capability::ThreadedChannels,
        Capability::SlashCommands,
        Capability::ComponentInteractions,
        Capability::MessageHistory,
    ];

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::ThreadedChannels => "threaded_channels",
            Self::SlashCommands => "slash_commands",
            Self::ComponentInteractions => "component_interactions",
            Self::MessageHistory => "message_history",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of capabilities.
pub type CapabilitySet = BTreeSet<Capability>;

/// Derive the capability set of a connected client from the sub-interfaces
/// it exposes. Never talks to the remote service.
pub fn inspect(client: &dyn BackendClient) -> CapabilitySet {
    let mut set = CapabilitySet::new();
    if client.voice().is_some() {
        set.insert(Capability::Voice);
    }
    if client.threads().is_some() {
        set.insert(Capability::ThreadedChannels);
    }
    if client.commands().is_some() {
        set.insert(Capability::SlashCommands);
    }
    if client.components().is_some() {
        set.insert(Capability::ComponentInteractions);
    }
    if client.history().is_some() {
        set.insert(Capability::MessageHistory);
    }
    set
}
