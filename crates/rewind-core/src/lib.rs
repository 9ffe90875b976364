//! Core types and traits for the rewind engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the snapshot model shared by the replay codec and the engine:
//! entity IDs, [`Frame`], rewindable bindings and their registry, and the
//! collaborator traits the host game implements.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod binding;
pub mod bridge;
pub mod error;
pub mod frame;
pub mod id;
pub mod registry;
pub mod scene;
pub mod value;

pub use binding::{BindingContext, RewindableBinding};
pub use bridge::ScriptBridge;
pub use error::{BindingError, BridgeError};
pub use frame::{
    BindingStates, CheckpointState, Frame, MpState, PowerupTimers, RewindableState, TeleportState,
};
pub use id::{BindingKind, EntityId, GameFlavor, StorageKind};
pub use registry::BindingRegistry;
pub use scene::{ItemKind, SceneHost, SceneNode, ShapeKind};
pub use value::{format_float, parse_leading_float, parse_leading_int, StateValue};
