//! Connection parameters handed to a backend factory.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Secret used to authenticate with the platform.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for backends to authenticate with.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Non-reversible fingerprint used to detect duplicate sessions
    /// without retaining the token.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

/// Gateway feature flag requested at connection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Guild create/update/delete and channel/role lifecycle.
    Guilds,
    /// Guild member updates.
    GuildMembers,
    /// Messages in guild channels.
    GuildMessages,
    /// Direct messages.
    DirectMessages,
    /// Access to message content.
    MessageContent,
    /// Voice state updates.
    GuildVoiceStates,
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "guilds" => Ok(Self::Guilds),
            "guild_members" => Ok(Self::GuildMembers),
            "guild_messages" => Ok(Self::GuildMessages),
            "direct_messages" => Ok(Self::DirectMessages),
            "message_content" => Ok(Self::MessageContent),
            "guild_voice_states" => Ok(Self::GuildVoiceStates),
            other => Err(format!("unknown intent '{other}'")),
        }
    }
}

/// Default intents when none are configured.
pub fn default_intents() -> BTreeSet<Intent> {
    BTreeSet::from([Intent::Guilds, Intent::GuildMessages, Intent::DirectMessages])
}

/// Default capacity of the subscriber diagnostic channel.
pub const DEFAULT_DIAGNOSTIC_BUFFER: usize = 64;

/// Everything a backend needs to open a session.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Authentication secret.
    pub credential: Credential,
    /// Requested gateway intents.
    pub intents: BTreeSet<Intent>,
    /// Per-operation timeout applied by the normalizer, including the handshake.
    pub operation_timeout: Option<Duration>,
    /// Capacity of the subscriber diagnostic channel.
    pub diagnostic_buffer: usize,
}

impl ConnectionConfig {
    /// Config with default intents and no timeout.
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            intents: default_intents(),
            operation_timeout: None,
            diagnostic_buffer: DEFAULT_DIAGNOSTIC_BUFFER,
        }
    }

    /// Set the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Replace the requested intents.
    pub fn with_intents(mut self, intents: impl IntoIterator<Item = Intent>) -> Self {
        self.intents = intents.into_iter().collect();
        self
    }
}
