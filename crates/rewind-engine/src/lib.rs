//! Rewind engine: frame store, interpolation, and live-game capture.
//!
//! [`RewindSession`] is the entry point a game drives each tick. It
//! captures frames from the host through [`SceneHost`](rewind_core::SceneHost),
//! keeps them in a [`RewindManager`], and applies stored or interpolated
//! frames back onto the host to rewind, replay, or move a ghost marble.
//!
//! # Architecture
//!
//! - [`manager`]: the frame store and its time-indexed queries
//! - [`interpolate`]: blending two frames at a ratio
//! - [`mission`]: walking the mission tree for per-object state
//! - [`capture`]: whole-frame capture and apply against the host
//! - [`worker`]: the background thread for saves and analysis
//! - [`session`]: the facade tying these together

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod capture;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod manager;
pub mod mission;
pub mod session;
pub mod worker;

pub use capture::{apply_frame, apply_ghost, call_on_rewind, capture_frame};
pub use config::{ConfigError, PlaybackDirection, RewindConfig};
pub use error::{MissionError, RewindError};
pub use interpolate::{interpolate_frame, InterpolationPolicy};
pub use manager::RewindManager;
pub use mission::{
    apply_mission_state, capture_mission_state, walk_mission, MissionState, StateCursor,
};
pub use session::{AnalysisCallback, RewindSession};
pub use worker::{Task, Worker};
