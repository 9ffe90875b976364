//! Error types for host calls and binding dispatch.

use thiserror::Error;

use crate::id::{EntityId, StorageKind};

/// Errors reported by a [`ScriptBridge`](crate::bridge::ScriptBridge)
/// implementation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// `namespace::method` is not defined in the host's script runtime.
    #[error("cannot resolve script method {namespace}::{method}")]
    UnresolvedMethod {
        /// Namespace the call was addressed to.
        namespace: String,
        /// Method name.
        method: String,
    },
    /// A free script function is not defined.
    #[error("cannot resolve script function {name}")]
    UnresolvedFunction {
        /// Function name.
        name: String,
    },
    /// The object handle does not refer to a live object.
    #[error("object {object} does not exist")]
    UnknownObject {
        /// The stale or invalid handle.
        object: EntityId,
    },
    /// Any other host-side failure.
    #[error("host call failed: {detail}")]
    Host {
        /// Human-readable description from the host.
        detail: String,
    },
}

/// Errors from routing a call through a
/// [`RewindableBinding`](crate::binding::RewindableBinding).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindingError {
    /// No binding is registered under this namespace.
    #[error("no rewindable binding registered for namespace {namespace}")]
    UnknownNamespace {
        /// The namespace that was looked up.
        namespace: String,
    },
    /// The binding stores a different value type than the caller asked for.
    #[error("binding {namespace} stores {found:?}, not {expected:?}")]
    StorageMismatch {
        /// Binding namespace.
        namespace: String,
        /// Storage kind requested by the caller.
        expected: StorageKind,
        /// Storage kind the binding was registered with.
        found: StorageKind,
    },
    /// The underlying script call failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
