//! Rewind: rewind, replay, and ghost playback for marble games.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! rewind sub-crates. For most games, adding `rewind` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use rewind::prelude::*;
//!
//! let mut store = RewindManager::new(GameFlavor::Mbp);
//! for (ms, delta) in [(0, 16), (16, 16), (32, 16)] {
//!     store.push_frame(Frame::with_clock(ms, delta));
//! }
//!
//! let newest = store.pop_frame(false).unwrap();
//! assert_eq!(newest.ms, 32);
//! assert_eq!(store.frame_count(), 2);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `rewind-core` | Frames, bindings, host traits |
//! | [`replay`] | `rewind-replay` | Replay file reading, writing, and analysis |
//! | [`engine`] | `rewind-engine` | Frame store, interpolation, live sessions |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Frame model, rewindable bindings, and host traits (`rewind-core`).
///
/// A game implements [`types::ScriptBridge`] and [`types::SceneHost`] to
/// expose its script runtime and mission tree.
pub use rewind_core as types;

/// Replay file format (`rewind-replay`).
///
/// Write frame lists with [`replay::ReplayWriter`], read them back with
/// [`replay::ReplayReader`], and summarize files with [`replay::analyze`].
pub use rewind_replay as replay;

/// Frame store and playback (`rewind-engine`).
///
/// [`engine::RewindSession`] is what a game drives each tick;
/// [`engine::RewindManager`] is the frame store underneath it.
pub use rewind_engine as engine;

/// Common imports for typical rewind usage.
///
/// ```rust
/// use rewind::prelude::*;
/// ```
pub mod prelude {
    // Frame model
    pub use rewind_core::{
        BindingStates, CheckpointState, Frame, GameFlavor, MpState, RewindableState,
        TeleportState,
    };

    // Bindings
    pub use rewind_core::{BindingKind, BindingRegistry, RewindableBinding, StorageKind};

    // Host traits
    pub use rewind_core::{EntityId, SceneHost, ScriptBridge};

    // Errors
    pub use rewind_core::{BindingError, BridgeError};
    pub use rewind_engine::{ConfigError, MissionError, RewindError};
    pub use rewind_replay::ReplayError;

    // Replay files
    pub use rewind_replay::{ReplayInfo, ReplayReader, ReplayWriter};

    // Engine
    pub use rewind_engine::{
        PlaybackDirection, RewindConfig, RewindManager, RewindSession, Worker,
    };
}
