//! Backend discovery, selection and instantiation.
//!
//! Backends register at link time with [`inventory::submit!`] and a
//! [`BackendRegistration`]. Discovery never connects anything; only
//! [`BackendRegistry::instantiate`] talks to the remote service.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::connection::DEFAULT_DIAGNOSTIC_BUFFER;
use crate::backend::{BackendFactory, BackendInfo, ConnectionConfig};
use crate::capability::CapabilitySet;
use crate::config::BridgeConfig;
use crate::entity::{ChannelKind, ObjectAdapter, SessionTable};
use crate::error::BridgeError;
use crate::events::EventPipeline;
use crate::facade::Bridge;
use crate::runtime::Normalizer;

mod lease;

pub use lease::CredentialLease;

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Link-time registration of a backend factory.
///
/// ```ignore
/// inventory::submit!(BackendRegistration::new(my_backend_factory));
/// ```
pub struct BackendRegistration {
    factory: fn() -> Arc<dyn BackendFactory>,
}

impl BackendRegistration {
    /// Register the factory returned by `factory`.
    pub const fn new(factory: fn() -> Arc<dyn BackendFactory>) -> Self {
        Self { factory }
    }
}

inventory::collect!(BackendRegistration);

/// One available backend. Immutable once discovered.
#[derive(Clone)]
pub struct BackendDescriptor {
    /// Stable identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Rank for automatic selection.
    pub priority: i32,
    factory: Arc<dyn BackendFactory>,
}

impl BackendDescriptor {
    fn new(factory: Arc<dyn BackendFactory>) -> Self {
        let BackendInfo { id, name, priority } = factory.info();
        Self {
            id,
            name,
            priority,
            factory,
        }
    }

    /// Capabilities the backend declares.
    pub fn capabilities(&self) -> CapabilitySet {
        self.factory.capabilities()
    }

    /// Channel kinds the backend can represent.
    pub fn supported_channel_kinds(&self) -> BTreeSet<ChannelKind> {
        self.factory.supported_channel_kinds()
    }

    /// The backend's entry point.
    pub fn factory(&self) -> &Arc<dyn BackendFactory> {
        &self.factory
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Selection criteria
// ---------------------------------------------------------------------------

/// Which backend to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackendSelection {
    /// Highest priority, ties broken by identifier.
    #[default]
    Auto,
    /// A specific backend identifier.
    Explicit(String),
}

impl From<String> for BackendSelection {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::Explicit(trimmed.to_owned())
        }
    }
}

impl From<BackendSelection> for String {
    fn from(value: BackendSelection) -> Self {
        value.to_string()
    }
}

impl FromStr for BackendSelection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl fmt::Display for BackendSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Explicit(id) => f.write_str(id),
        }
    }
}

/// How [`BackendRegistry::adopt`] resolves several eligible backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AdoptMode {
    /// First eligible backend in selection order.
    #[default]
    Any,
    /// Exactly one backend must be eligible.
    Exact,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered set of available backends.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    descriptors: Vec<BackendDescriptor>,
}

impl BackendRegistry {
    /// Enumerate every backend registered with the process.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConflictingBackend`] if two backends declare the
    /// same identifier.
    pub fn discover() -> Result<Self, BridgeError> {
        let mut factories = Vec::new();
        for registration in inventory::iter::<BackendRegistration> {
            factories.push((registration.factory)());
        }
        Self::from_factories(factories)
    }

    /// Build a registry from an explicit list of factories.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConflictingBackend`] if two factories declare the
    /// same identifier.
    pub fn from_factories(factories: Vec<Arc<dyn BackendFactory>>) -> Result<Self, BridgeError> {
        let mut by_id: BTreeMap<String, Vec<BackendDescriptor>> = BTreeMap::new();
        for factory in factories {
            let descriptor = BackendDescriptor::new(factory);
            by_id.entry(descriptor.id.clone()).or_default().push(descriptor);
        }

        if let Some((id, claimants)) = by_id.iter().find(|(_, claimants)| claimants.len() > 1) {
            return Err(BridgeError::ConflictingBackend {
                id: id.clone(),
                candidates: claimants.iter().map(|d| d.name.clone()).collect(),
            });
        }

        let mut descriptors: Vec<BackendDescriptor> = by_id.into_values().flatten().collect();
        descriptors.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        debug!(
            backends = ?descriptors.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            "backends discovered"
        );
        Ok(Self { descriptors })
    }

    /// Descriptors in selection order.
    pub fn descriptors(&self) -> &[BackendDescriptor] {
        &self.descriptors
    }

    /// Number of discovered backends.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether nothing was discovered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptor with identifier `id`.
    pub fn get(&self, id: &str) -> Option<&BackendDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// Pick a backend.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] when no backend matches, including
    /// when none was discovered at all.
    pub fn select(&self, selection: &BackendSelection) -> Result<&BackendDescriptor, BridgeError> {
        let found = match selection {
            BackendSelection::Auto => self.descriptors.first(),
            BackendSelection::Explicit(id) => self.get(id),
        };
        found.ok_or_else(|| BridgeError::NotFound {
            criteria: selection.to_string(),
        })
    }

    /// Connect `descriptor` and build its facade.
    ///
    /// # Errors
    ///
    /// Returns a connection-kind error when the credential is already leased,
    /// the handshake fails or times out. Nothing is retried.
    pub async fn instantiate(
        &self,
        descriptor: &BackendDescriptor,
        config: &ConnectionConfig,
    ) -> Result<Bridge, BridgeError> {
        let lease = CredentialLease::acquire(&config.credential, &descriptor.id)?;
        let normalizer = Normalizer::current(descriptor.id.as_str(), config.operation_timeout)?;
        let (adapter, pipeline) = session_parts(descriptor, &normalizer, config.diagnostic_buffer);
        pipeline.begin_connect()?;

        info!(backend = %descriptor.id, "connecting");
        let connected = normalizer
            .normalize(descriptor.factory.connect(config), Ok)
            .await;
        let client = match connected {
            Ok(client) => client,
            Err(error) => {
                pipeline.shutdown();
                let error = error.into_connection(&descriptor.id);
                warn!(backend = %descriptor.id, error = %error, "connection failed");
                return Err(error);
            }
        };

        Bridge::assemble(
            descriptor.clone(),
            client,
            adapter,
            normalizer,
            pipeline,
            Some(lease),
        )
    }

    /// Select and connect the backend named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] or any error of [`Self::instantiate`].
    pub async fn connect(&self, config: &BridgeConfig) -> Result<Bridge, BridgeError> {
        let descriptor = self.select(&config.selection())?;
        self.instantiate(descriptor, &config.connection_config()).await
    }

    /// Wrap an already-connected native client.
    ///
    /// No credential lease is taken; the caller owns the native session.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotFound`] if no backend recognizes `native`,
    /// [`BridgeError::ConflictingBackend`] if several do under
    /// [`AdoptMode::Exact`], and [`BridgeError::InvalidState`] outside a Tokio
    /// runtime.
    pub fn adopt(
        &self,
        native: Arc<dyn Any + Send + Sync>,
        mode: AdoptMode,
    ) -> Result<Bridge, BridgeError> {
        let eligible: Vec<&BackendDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| d.factory.can_adopt(native.as_ref()))
            .collect();

        let descriptor = match (eligible.as_slice(), mode) {
            ([], _) => {
                return Err(BridgeError::NotFound {
                    criteria: "backend able to adopt the native client".to_owned(),
                })
            }
            ([only], _) | ([only, ..], AdoptMode::Any) => *only,
            (several, AdoptMode::Exact) => {
                return Err(BridgeError::ConflictingBackend {
                    id: "adopted native client".to_owned(),
                    candidates: several.iter().map(|d| d.name.clone()).collect(),
                })
            }
        };

        let client = descriptor
            .factory
            .adopt(native)
            .map_err(|source| BridgeError::backend(descriptor.id.as_str(), source))?;
        let normalizer = Normalizer::current(descriptor.id.as_str(), None)?;
        let (adapter, pipeline) = session_parts(descriptor, &normalizer, DEFAULT_DIAGNOSTIC_BUFFER);
        pipeline.begin_connect()?;
        info!(backend = %descriptor.id, "adopted native client");
        Bridge::assemble(descriptor.clone(), client, adapter, normalizer, pipeline, None)
    }
}

fn session_parts(
    descriptor: &BackendDescriptor,
    normalizer: &Normalizer,
    diagnostic_buffer: usize,
) -> (ObjectAdapter, Arc<EventPipeline>) {
    let adapter = ObjectAdapter::new(SessionTable::new(), descriptor.supported_channel_kinds());
    let pipeline = EventPipeline::new(
        descriptor.id.as_str(),
        adapter.clone(),
        normalizer.runtime().clone(),
        diagnostic_buffer,
    );
    (adapter, pipeline)
}
