//! Error taxonomy shared by every bridge layer.
//!
//! Registry and capability errors are returned synchronously. Per-operation
//! errors travel through the failure channel of a [`Deferred`](crate::runtime::Deferred).

use std::time::Duration;

use crate::capability::Capability;
use crate::entity::{CommandDataError, EntityKind, SessionId};

/// Error produced by a backend's native client, preserved verbatim.
pub type NativeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias for bridge results.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Coarse classification of a [`BridgeError`], used to pick a recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend session could not be established or was lost.
    Connection,
    /// Two backends claimed the same identifier (or the same native client).
    ConflictingBackend,
    /// No backend matched the selection criteria.
    NotFound,
    /// The selected backend cannot perform the operation.
    UnsupportedCapability,
    /// The entity belongs to a session that is gone or is not this one.
    Stale,
    /// The backend tried and failed.
    Backend,
    /// The deferred result was cancelled before it resolved.
    Cancelled,
    /// The operation exceeded the configured timeout.
    Timeout,
    /// The operation is not valid in the current lifecycle state.
    InvalidState,
    /// The caller supplied data the platform would reject.
    InvalidInput,
}

/// Errors surfaced by the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Backend failed to establish or maintain its session.
    #[error("backend '{backend}' connection failed: {reason}")]
    Connection {
        /// Backend identifier.
        backend: String,
        /// Human-readable reason.
        reason: String,
        /// Native error, when the backend produced one.
        #[source]
        source: Option<NativeError>,
    },

    /// Another live facade already holds this credential.
    #[error("credential is already in use by a live '{backend}' session")]
    CredentialInUse {
        /// Backend identifier of the live session.
        backend: String,
    },

    /// More than one backend claims the same identifier or native client.
    #[error("conflicting backends for '{id}': {candidates:?}")]
    ConflictingBackend {
        /// Identifier or description of the contested object.
        id: String,
        /// Names of the competing backends.
        candidates: Vec<String>,
    },

    /// No backend matched the selection criteria.
    #[error("no backend found for '{criteria}'")]
    NotFound {
        /// Selection criteria as given by the caller.
        criteria: String,
    },

    /// The selected backend does not support the capability.
    #[error("backend '{backend}' does not support {capability}")]
    UnsupportedCapability {
        /// Backend identifier.
        backend: String,
        /// Missing capability.
        capability: Capability,
    },

    /// The entity's owning session has been torn down.
    #[error("{kind} {id} belongs to a closed session")]
    Stale {
        /// Entity kind.
        kind: EntityKind,
        /// Entity identifier.
        id: String,
    },

    /// The entity was produced by a different facade session.
    #[error("{kind} {id} belongs to session {found}, not {expected}")]
    SessionMismatch {
        /// Entity kind.
        kind: EntityKind,
        /// Entity identifier.
        id: String,
        /// Session of the facade the entity was passed to.
        expected: SessionId,
        /// Session the entity was produced by.
        found: SessionId,
    },

    /// The native call failed for a backend-specific reason.
    #[error("backend '{backend}' call failed: {source}")]
    Backend {
        /// Backend identifier.
        backend: String,
        /// Native error.
        #[source]
        source: NativeError,
    },

    /// The deferred result was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation did not complete within the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The requested transition is not valid in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Command data violates the platform's limits.
    #[error("invalid command data: {0}")]
    InvalidCommand(#[from] CommandDataError),
}

impl BridgeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } | Self::CredentialInUse { .. } => ErrorKind::Connection,
            Self::ConflictingBackend { .. } => ErrorKind::ConflictingBackend,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedCapability { .. } => ErrorKind::UnsupportedCapability,
            Self::Stale { .. } | Self::SessionMismatch { .. } => ErrorKind::Stale,
            Self::Backend { .. } => ErrorKind::Backend,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidCommand(_) => ErrorKind::InvalidInput,
        }
    }

    /// Wrap a native error raised by `backend`.
    pub fn backend(backend: impl Into<String>, source: NativeError) -> Self {
        Self::Backend {
            backend: backend.into(),
            source,
        }
    }

    /// Returns the preserved native error, if this is a backend failure.
    pub fn native(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Backend { source, .. } => Some(source.as_ref()),
            Self::Connection {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Re-classify a failure that happened while connecting.
    pub(crate) fn into_connection(self, backend: &str) -> Self {
        match self {
            Self::Backend { source, .. } => Self::Connection {
                backend: backend.to_owned(),
                reason: source.to_string(),
                source: Some(source),
            },
            Self::Timeout(after) => Self::Connection {
                backend: backend.to_owned(),
                reason: format!("handshake timed out after {after:?}"),
                source: None,
            },
            Self::Cancelled => Self::Connection {
                backend: backend.to_owned(),
                reason: "handshake cancelled".to_owned(),
                source: None,
            },
            other => other,
        }
    }
}
