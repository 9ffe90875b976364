//! The per-tick snapshot model.
//!
//! A [`Frame`] holds everything needed to put the game back at one moment:
//! marble kinematics, HUD/game-state scalars, per-object mission lists,
//! and the values of every registered rewindable binding.
//!
//! The mission lists (`mp_states`, `gem_states`, …) are parallel to the
//! deterministic pre-order walk of the mission tree: entry `i` of a list
//! belongs to the `i`-th object of that kind in walk order.

use glam::DVec3;
use smallvec::SmallVec;

/// State of one moving platform.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MpState {
    /// Current position along the path, in path milliseconds.
    pub path_position: f32,
    /// Target position, or one of the loop sentinels.
    pub target_position: f32,
}

impl MpState {
    /// Target sentinel: loop forward forever.
    pub const LOOP_FORWARD: f32 = -1.0;
    /// Target sentinel: loop backward forever.
    pub const LOOP_BACKWARD: f32 = -2.0;

    /// Build a platform state.
    pub fn new(path_position: f32, target_position: f32) -> Self {
        Self {
            path_position,
            target_position,
        }
    }

    /// True if the target is a loop sentinel, making the path position
    /// periodic in the path's total time.
    pub fn is_looping(&self) -> bool {
        self.target_position == Self::LOOP_FORWARD || self.target_position == Self::LOOP_BACKWARD
    }
}

/// Pending teleport (MBP only).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TeleportState {
    /// Milliseconds until the teleport fires; zero or less means none.
    pub delay: i32,
    /// Name of the destination object.
    pub destination: String,
    /// Incremented each time a teleport completes.
    pub counter: i32,
}

/// Last reached checkpoint (MBP only). Never persisted to replay files.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckpointState {
    /// Checkpoint object name.
    pub object: String,
    /// Gem count at the checkpoint.
    pub gem_count: i32,
    /// Encoded gem visibility at the checkpoint.
    pub gem_states: String,
    /// Powerup held at the checkpoint.
    pub powerup: i32,
    /// Gravity direction at the checkpoint.
    pub gravity: String,
    /// Incremented on each respawn.
    pub respawn_counter: i32,
    /// Respawn offset vector as text.
    pub respawn_offset: String,
}

/// One captured value of a rewindable binding, tagged with its namespace.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RewindableState<T> {
    /// Namespace of the binding that produced the value.
    pub namespace: String,
    /// The captured value.
    pub value: T,
}

impl<T> RewindableState<T> {
    /// Build a tagged state.
    pub fn new(namespace: impl Into<String>, value: T) -> Self {
        Self {
            namespace: namespace.into(),
            value,
        }
    }
}

/// Four typed lists of binding states, one per storage kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingStates {
    /// Integer bindings.
    pub ints: Vec<RewindableState<i32>>,
    /// Float bindings.
    pub floats: Vec<RewindableState<f32>>,
    /// Boolean bindings.
    pub bools: Vec<RewindableState<bool>>,
    /// String bindings.
    pub strings: Vec<RewindableState<String>>,
}

impl BindingStates {
    /// Total number of states across all four lists.
    pub fn len(&self) -> usize {
        self.ints.len() + self.floats.len() + self.bools.len() + self.strings.len()
    }

    /// True if all four lists are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Countdown timers of the active super-bounce, shock-absorber, and
/// gyrocopter powerups.
pub type PowerupTimers = SmallVec<[i32; 3]>;

/// One snapshot of reconstructable game state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    /// Running total of `delta_ms`, assigned when a replay is loaded.
    /// Authoritative ordering key for playback.
    pub elapsed_time: i32,
    /// In-session clock; may stall while a time bonus is active.
    pub ms: i32,
    /// Milliseconds covered by this frame.
    pub delta_ms: i32,
    /// Marble position.
    pub position: DVec3,
    /// Marble linear velocity.
    pub velocity: DVec3,
    /// Marble angular velocity.
    pub spin: DVec3,
    /// Held powerup id.
    pub powerup: i32,
    /// Remaining time-bonus milliseconds.
    pub timebonus: i32,
    /// Moving platforms.
    pub mp_states: Vec<MpState>,
    /// Gems collected so far.
    pub gemcount: i32,
    /// Gem hidden flags.
    pub gem_states: Vec<i32>,
    /// Time-travel pickup hidden flags.
    pub tt_states: Vec<i32>,
    /// Powerup respawn timers.
    pub powerup_states: Vec<i32>,
    /// Game state-machine phase ("Start", "Ready", "Set", "Go", "Play", …).
    pub gamestate: String,
    /// Explosive (land mine) reset timers.
    pub lm_states: Vec<i32>,
    /// Milliseconds until the next game phase.
    pub nextstatetime: i32,
    /// Active powerup countdowns.
    pub active_powerup_states: PowerupTimers,
    /// Gravity direction as text.
    pub gravity_dir: String,
    /// Trapdoor animation directions.
    pub trapdoor_dirs: Vec<i32>,
    /// Trapdoor open timers.
    pub trapdoor_open: Vec<i32>,
    /// Trapdoor close timers.
    pub trapdoor_close: Vec<i32>,
    /// Trapdoor animation positions.
    pub trapdoor_pos: Vec<f32>,
    /// Pending teleport (MBP).
    pub teleport: TeleportState,
    /// Checkpoint (MBP, not persisted).
    pub checkpoint: CheckpointState,
    /// Easter egg hidden flag (MBP).
    pub egg_state: bool,
    /// Values of variable bindings, in registry order.
    pub variable_states: BindingStates,
    /// Values of scene-object bindings, in mission walk order.
    pub object_states: BindingStates,
}

impl Frame {
    /// A frame with only its clocks set.
    pub fn with_clock(ms: i32, delta_ms: i32) -> Self {
        Self {
            ms,
            delta_ms,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_sentinels() {
        assert!(MpState::new(0.0, MpState::LOOP_FORWARD).is_looping());
        assert!(MpState::new(0.0, MpState::LOOP_BACKWARD).is_looping());
        assert!(!MpState::new(0.0, 500.0).is_looping());
        assert!(!MpState::new(0.0, -3.0).is_looping());
    }

    #[test]
    fn binding_states_len() {
        let mut s = BindingStates::default();
        assert!(s.is_empty());
        s.ints.push(RewindableState::new("a", 1));
        s.bools.push(RewindableState::new("b", true));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn with_clock_sets_only_clocks() {
        let f = Frame::with_clock(120, 16);
        assert_eq!(f.ms, 120);
        assert_eq!(f.delta_ms, 16);
        assert_eq!(f.elapsed_time, 0);
        assert!(f.mp_states.is_empty());
    }
}
