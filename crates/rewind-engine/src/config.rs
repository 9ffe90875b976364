//! Session configuration, validation, and error types.
//!
//! [`RewindConfig`] holds the settings a game previously kept in
//! `$pref::Rewind::*` console variables. [`validate()`](RewindConfig::validate)
//! checks them once when a session is built and again on every setter.

use std::path::PathBuf;

use rewind_core::GameFlavor;
use rewind_replay::LEGACY_UNCOMPRESSED_LIMIT;
use thiserror::Error;

// ── PlaybackDirection ──────────────────────────────────────────────

/// Which way frames are being consumed.
///
/// Interpolation of looping platforms and game-phase timers depends on
/// whether the older frame is the first or the second operand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackDirection {
    /// Live rewind: the second operand is older than the first.
    #[default]
    Rewind,
    /// Replay playback: the second operand is newer than the first.
    Replay,
}

// ── RewindConfig ───────────────────────────────────────────────────

/// Default location of the rolling replay file.
pub const DEFAULT_REPLAY_PATH: &str = "./marble/client/replays/testReplay.rwx";

/// Mission name used before one is set.
pub const DEFAULT_REPLAY_MISSION: &str = "none";

/// Settings for a [`RewindSession`](crate::session::RewindSession).
#[derive(Clone, Debug, PartialEq)]
pub struct RewindConfig {
    /// Game build. Selects the file version written and the MBP-only
    /// fields. Default: [`GameFlavor::Mbp`].
    pub game: GameFlavor,
    /// Where [`clear_frames(true)`](crate::session::RewindSession::clear_frames)
    /// saves to.
    pub replay_path: PathBuf,
    /// Mission name written into saved replays.
    pub replay_mission: String,
    /// Live rewind speed multiplier. Default: 1.0.
    pub time_scale: f64,
    /// Consume frames by elapsed time even at normal speed.
    pub sync_speed: bool,
    /// Frame order for interpolation. Default: [`PlaybackDirection::Rewind`].
    pub direction: PlaybackDirection,
    /// Inflate cap for replay files that do not record their size.
    /// Default: 50 MiB.
    pub max_legacy_uncompressed: usize,
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            game: GameFlavor::default(),
            replay_path: PathBuf::from(DEFAULT_REPLAY_PATH),
            replay_mission: DEFAULT_REPLAY_MISSION.to_string(),
            time_scale: 1.0,
            sync_speed: false,
            direction: PlaybackDirection::default(),
            max_legacy_uncompressed: LEGACY_UNCOMPRESSED_LIMIT,
        }
    }
}

impl RewindConfig {
    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_time_scale(self.time_scale)?;
        if self.max_legacy_uncompressed == 0 {
            return Err(ConfigError::ZeroLegacyLimit);
        }
        Ok(())
    }

    /// True if live rewind should consume frames by scaled elapsed time
    /// instead of popping one per tick.
    pub fn scaled_rewind(&self) -> bool {
        self.sync_speed || self.time_scale != 1.0
    }
}

pub(crate) fn validate_time_scale(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidTimeScale { value });
    }
    Ok(())
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`RewindConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// `time_scale` is NaN, infinite, zero, or negative.
    #[error("time scale must be finite and positive, got {value}")]
    InvalidTimeScale {
        /// The invalid value.
        value: f64,
    },
    /// `max_legacy_uncompressed` is zero.
    #[error("legacy inflate limit must be nonzero")]
    ZeroLegacyLimit,
}
