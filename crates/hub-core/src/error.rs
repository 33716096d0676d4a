//! Failure taxonomy for the hub.
//!
//! Nothing in this crate panics on a remote failure. Every public operation
//! returns one of these values so a caller can degrade instead of crash.

use crate::value::VariantType;
use thiserror::Error;

/// Startup-time problems. Fatal for the hub they concern, reported to the
/// operator rather than to a remote caller.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("hub '{name}' has no endpoint url")]
    MissingUrl { name: String },

    #[error("hub name must not be empty")]
    EmptyName,

    #[error("hub '{name}': {field} must be a positive number of milliseconds")]
    InvalidTimeout { name: String, field: &'static str },

    #[error("duplicate hub name '{0}'")]
    DuplicateName(String),

    #[error("sensor '{sensor}' references unknown hub '{hub}'")]
    UnknownHub { sensor: String, hub: String },

    #[error("hub '{name}': client options rejected: {source}")]
    InvalidOptions {
        name: String,
        #[source]
        source: ClientError,
    },

    #[error("failed to load hub file: {0}")]
    Load(String),
}

/// Failures reported by the underlying protocol client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("session is not connected")]
    NotConnected,

    #[error("node {0} does not exist")]
    NodeNotFound(String),

    #[error("invalid node id '{0}'")]
    InvalidNodeId(String),

    #[error("server returned bad status {0}")]
    BadStatus(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid client option: {0}")]
    InvalidOption(String),
}

/// A caller-supplied value that cannot be expressed as the node's type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoercionError {
    #[error("cannot write {value} as {target}")]
    Incompatible { value: String, target: VariantType },

    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: VariantType },

    #[error("node has no writable type ({0})")]
    UnsupportedTarget(VariantType),
}

/// Why a write did not reach the server.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WriteError {
    #[error("could not fetch current node type: {0}")]
    TypeLookup(#[source] ClientError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("server rejected write: {0}")]
    Rejected(#[source] ClientError),
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("hub '{0}' not found")]
    HubNotFound(String),

    #[error("hub '{0}' has not been set up")]
    NotSetUp(String),

    #[error("{hub}: connection error: {source}")]
    Connection {
        hub: String,
        #[source]
        source: ClientError,
    },

    #[error("{hub}: channel close error: {source}")]
    Teardown {
        hub: String,
        #[source]
        source: ClientError,
    },

    #[error("{hub}: read of {node_id} failed: {source}")]
    Read {
        hub: String,
        node_id: String,
        #[source]
        source: ClientError,
    },

    #[error("{hub}: writing {value} to {node_id} failed: {source}")]
    Write {
        hub: String,
        node_id: String,
        value: String,
        #[source]
        source: WriteError,
    },
}

impl HubError {
    /// Hub the failure belongs to, when there is one.
    pub fn hub(&self) -> Option<&str> {
        match self {
            Self::Configuration(_) => None,
            Self::HubNotFound(hub) | Self::NotSetUp(hub) => Some(hub),
            Self::Connection { hub, .. }
            | Self::Teardown { hub, .. }
            | Self::Read { hub, .. }
            | Self::Write { hub, .. } => Some(hub),
        }
    }
}
