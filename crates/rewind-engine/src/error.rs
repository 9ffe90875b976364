//! Engine-level error types.

use rewind_core::{BindingError, BridgeError};
use rewind_replay::ReplayError;
use thiserror::Error;

use crate::config::ConfigError;

/// A captured mission list ran out while applying it to the live tree.
///
/// The live mission has more objects of some kind than the frame was
/// captured with; the frame belongs to a different mission or the tree
/// changed since capture.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MissionError {
    /// `list` ran out at `index` while objects of its kind remained.
    #[error("mission state desync: {list} has no entry {index}")]
    Desync {
        /// Name of the exhausted list.
        list: &'static str,
        /// Position in the list that was missing.
        index: usize,
    },
}

/// Errors returned by the rewind engine.
#[derive(Debug, Error)]
pub enum RewindError {
    /// Replay file could not be read or written.
    #[error(transparent)]
    Replay(#[from] ReplayError),
    /// Captured mission state does not fit the live mission.
    #[error(transparent)]
    Mission(#[from] MissionError),
    /// A host script call failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// A rewindable binding call failed.
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A well-known scene object is missing.
    #[error("scene object '{name}' not found")]
    MissingObject {
        /// Name that was looked up.
        name: String,
    },
    /// The background worker thread could not be started.
    #[error("cannot spawn worker thread: {detail}")]
    WorkerSpawn {
        /// Underlying OS error.
        detail: String,
    },
    /// The background worker exited and no longer accepts tasks.
    #[error("background worker has shut down")]
    WorkerGone,
}
