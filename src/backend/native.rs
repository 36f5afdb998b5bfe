//! Translation hooks a backend implements on its native entity types.
//!
//! Required methods cover the fields every backend can supply. Optional
//! fields default to [`Field::Unsupported`] so a backend that lacks them
//! reports the absence explicitly.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::entity::{ChannelKind, CommandArgument, Field, InteractionKind, Snowflake};

/// Native guild object.
pub trait NativeGuild: fmt::Debug + Send + Sync + 'static {
    /// Platform identifier.
    fn id(&self) -> Snowflake;
    /// Guild name.
    fn name(&self) -> String;
    /// Owner's user identifier.
    fn owner_id(&self) -> Field<Snowflake> {
        Field::Unsupported
    }
    /// Approximate member count.
    fn member_count(&self) -> Field<u64> {
        Field::Unsupported
    }
    /// Access the concrete native type.
    fn as_any(&self) -> &dyn Any;
}

/// Native channel object.
pub trait NativeChannel: fmt::Debug + Send + Sync + 'static {
    /// Platform identifier.
    fn id(&self) -> Snowflake;
    /// Channel kind as the backend understands it.
    fn kind(&self) -> ChannelKind;
    /// Channel name.
    fn name(&self) -> Field<Option<String>> {
        Field::Unsupported
    }
    /// Owning guild.
    fn guild_id(&self) -> Field<Option<Snowflake>> {
        Field::Unsupported
    }
    /// Parent category or thread parent.
    fn parent_id(&self) -> Field<Option<Snowflake>> {
        Field::Unsupported
    }
    /// Channel topic.
    fn topic(&self) -> Field<Option<String>> {
        Field::Unsupported
    }
    /// Access the concrete native type.
    fn as_any(&self) -> &dyn Any;
}

/// Native user object.
pub trait NativeUser: fmt::Debug + Send + Sync + 'static {
    /// Platform identifier.
    fn id(&self) -> Snowflake;
    /// Unique username.
    fn name(&self) -> String;
    /// Display name.
    fn display_name(&self) -> Field<Option<String>> {
        Field::Unsupported
    }
    /// Whether the account is a bot.
    fn bot(&self) -> Field<bool> {
        Field::Unsupported
    }
    /// Access the concrete native type.
    fn as_any(&self) -> &dyn Any;
}

/// Native message object.
pub trait NativeMessage: fmt::Debug + Send + Sync + 'static {
    /// Platform identifier.
    fn id(&self) -> Snowflake;
    /// Channel the message was posted in.
    fn channel_id(&self) -> Snowflake;
    /// Message author.
    fn author(&self) -> Arc<dyn NativeUser>;
    /// Text content.
    fn content(&self) -> String;
    /// Creation time.
    fn created_at(&self) -> Field<DateTime<Utc>> {
        Field::Unsupported
    }
    /// Last edit time.
    fn edited_at(&self) -> Field<Option<DateTime<Utc>>> {
        Field::Unsupported
    }
    /// Access the concrete native type.
    fn as_any(&self) -> &dyn Any;
}

/// Native role object.
pub trait NativeRole: fmt::Debug + Send + Sync + 'static {
    /// Platform identifier.
    fn id(&self) -> Snowflake;
    /// Role name.
    fn name(&self) -> String;
    /// Owning guild.
    fn guild_id(&self) -> Field<Snowflake> {
        Field::Unsupported
    }
    /// RGB colour.
    fn color(&self) -> Field<u32> {
        Field::Unsupported
    }
    /// Sort position.
    fn position(&self) -> Field<i64> {
        Field::Unsupported
    }
    /// Whether the role is mentionable.
    fn mentionable(&self) -> Field<bool> {
        Field::Unsupported
    }
    /// Access the concrete native type.
    fn as_any(&self) -> &dyn Any;
}

/// Native application command object.
pub trait NativeCommand: fmt::Debug + Send + Sync + 'static {
    /// Platform identifier.
    fn id(&self) -> Snowflake;
    /// Command name.
    fn name(&self) -> String;
    /// Command description.
    fn description(&self) -> Field<String> {
        Field::Unsupported
    }
    /// Guild scope.
    fn guild_id(&self) -> Field<Option<Snowflake>> {
        Field::Unsupported
    }
    /// Access the concrete native type.
    fn as_any(&self) -> &dyn Any;
}

/// Native interaction object.
pub trait NativeInteraction: fmt::Debug + Send + Sync + 'static {
    /// Platform identifier.
    fn id(&self) -> Snowflake;
    /// Interaction kind.
    fn kind(&self) -> InteractionKind;
    /// User who triggered it.
    fn user(&self) -> Arc<dyn NativeUser>;
    /// Channel it happened in.
    fn channel_id(&self) -> Field<Snowflake> {
        Field::Unsupported
    }
    /// Invoked command name.
    fn command_name(&self) -> Field<String> {
        Field::Unsupported
    }
    /// Component custom id.
    fn custom_id(&self) -> Field<String> {
        Field::Unsupported
    }
    /// Supplied command arguments.
    fn arguments(&self) -> Field<Vec<CommandArgument>> {
        Field::Unsupported
    }
    /// Access the concrete native type.
    fn as_any(&self) -> &dyn Any;
}
