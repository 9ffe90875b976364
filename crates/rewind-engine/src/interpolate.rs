//! Blending two frames into an in-between frame.
//!
//! [`interpolate_frame`] is the only place frame fields are combined.
//! Continuous quantities are lerped, discrete ones are taken from one
//! side, and a few fields follow game-specific rules:
//!
//! - the clock stalls while both frames have a time bonus running
//! - marble kinematics snap across a teleport or respawn (MBP)
//! - looping platforms interpolate the short way around their path
//! - the countdown before `Play` accounts for the phase it belongs to
//!
//! `one` and `two` are the frames at ratio 0 and 1. Which of them is
//! older depends on [`PlaybackDirection`].

use rewind_core::{
    BindingContext, BindingStates, Frame, GameFlavor, MpState, PowerupTimers, RewindableState,
    StateValue, TeleportState,
};

use crate::config::PlaybackDirection;

/// Context the frame blend needs besides the two frames.
#[derive(Clone, Copy, Debug)]
pub struct InterpolationPolicy<'a> {
    /// Enables the MBP teleport, checkpoint, and egg rules.
    pub flavor: GameFlavor,
    /// Order of the operands.
    pub direction: PlaybackDirection,
    /// Total path time of each moving platform, in walk order. `None`
    /// until the mission has been walked; platforms are then dropped.
    pub path_durations: Option<&'a [f64]>,
}

impl<'a> InterpolationPolicy<'a> {
    /// A policy with no platform durations.
    pub fn new(flavor: GameFlavor, direction: PlaybackDirection) -> Self {
        Self {
            flavor,
            direction,
            path_durations: None,
        }
    }

    /// Attach platform durations.
    pub fn with_path_durations(mut self, durations: &'a [f64]) -> Self {
        self.path_durations = Some(durations);
        self
    }
}

// ── Scalar blends ──────────────────────────────────────────────────

/// Exact float lerp: equal endpoints and ratios 0 and 1 return an
/// endpoint unchanged.
pub fn lerp_f64(a: f64, b: f64, ratio: f64) -> f64 {
    if a == b {
        a
    } else if ratio == 1.0 {
        b
    } else {
        a + (b - a) * ratio
    }
}

/// Integer lerp truncating toward zero.
pub fn lerp_i32(a: i32, b: i32, ratio: f64) -> i32 {
    let (a, b) = (f64::from(a), f64::from(b));
    (a + (b - a) * ratio) as i32
}

fn lerp_f32(a: f32, b: f32, ratio: f64) -> f32 {
    lerp_f64(f64::from(a), f64::from(b), ratio) as f32
}

fn pick<T: Clone>(a: &T, b: &T, ratio: f64) -> T {
    if ratio > 0.5 {
        b.clone()
    } else {
        a.clone()
    }
}

fn lerp_ints(a: &[i32], b: &[i32], ratio: f64) -> Vec<i32> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| lerp_i32(x, y, ratio))
        .collect()
}

fn lerp_floats(a: &[f32], b: &[f32], ratio: f64) -> Vec<f32> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| lerp_f32(x, y, ratio))
        .collect()
}

// ── Moving platforms ───────────────────────────────────────────────

/// Blend one platform's state.
///
/// For looping targets the path position is periodic in `total`; when
/// the two positions straddle the wrap point in the direction of travel,
/// the blend goes through the wrap instead of back across the path.
pub fn interpolate_mp_state(
    one: MpState,
    two: MpState,
    total: f64,
    ratio: f64,
    direction: PlaybackDirection,
) -> MpState {
    let target = pick(&one.target_position, &two.target_position, ratio);
    let (a, b) = (one.path_position, two.path_position);
    let proposed = lerp_f32(a, b, ratio);
    let t = total as f32;
    let r = ratio as f32;

    let forward_wrap = || a + (b - a + t) * r;
    let backward_wrap = || t + a + (b - a - t) * r;

    let forward = target == MpState::LOOP_FORWARD;
    let backward = target == MpState::LOOP_BACKWARD;
    let wrapped = if t <= 0.0 {
        None
    } else {
        match direction {
            PlaybackDirection::Replay if forward && b < a => Some(forward_wrap()),
            PlaybackDirection::Replay if backward && a < b => Some(backward_wrap()),
            PlaybackDirection::Rewind if forward && a < b => Some(backward_wrap()),
            PlaybackDirection::Rewind if backward && b < a => Some(forward_wrap()),
            _ => None,
        }
    };

    let path_position = match wrapped {
        Some(mut p) => {
            while p > t {
                p -= t;
            }
            if !(0.0..t).contains(&p) {
                p = p.rem_euclid(t);
            }
            p
        }
        None => proposed,
    };
    MpState::new(path_position, target)
}

fn interpolate_mp_states(
    one: &[MpState],
    two: &[MpState],
    durations: &[f64],
    ratio: f64,
    direction: PlaybackDirection,
) -> Vec<MpState> {
    durations
        .iter()
        .zip(one.iter().zip(two))
        .map(|(&total, (&a, &b))| interpolate_mp_state(a, b, total, ratio, direction))
        .collect()
}

// ── Game-phase timer ───────────────────────────────────────────────

/// Offset between the countdown of `older` and that of the phase after it.
fn phase_offset(older: &str, newer: &str) -> Option<f64> {
    match (older, newer) {
        ("Start", "Ready") => Some(500.0),
        ("Ready", "Set") | ("Set", "Go") => Some(1500.0),
        ("Go", "Play") => Some(2000.0),
        _ => None,
    }
}

/// Blend `nextstatetime` across a phase change.
///
/// During rewind `two` is the older frame. When it is one phase behind
/// `one`, `one`'s countdown is shifted into `two`'s phase before lerping,
/// and shifted back while the result is still in `one`'s half.
pub fn interpolate_next_state_time(
    one: &Frame,
    two: &Frame,
    ratio: f64,
    direction: PlaybackDirection,
) -> i32 {
    let (a, b) = (f64::from(one.nextstatetime), f64::from(two.nextstatetime));
    let offset = match direction {
        PlaybackDirection::Rewind => phase_offset(&two.gamestate, &one.gamestate),
        PlaybackDirection::Replay => None,
    };
    let value = match offset {
        Some(off) => {
            let v = a + off + (b - a - off) * ratio;
            if ratio < 0.5 {
                v - off
            } else {
                v
            }
        }
        None => a + (b - a) * ratio,
    };
    value.floor() as i32
}

// ── MBP teleport ───────────────────────────────────────────────────

fn interpolate_teleport(one: &TeleportState, two: &TeleportState, ratio: f64) -> TeleportState {
    let delay = if one.counter != two.counter {
        pick(&one.delay, &two.delay, ratio)
    } else {
        lerp_i32(one.delay, two.delay, ratio)
    };
    let destination = if delay > 0 {
        if one.destination.is_empty() {
            two.destination.clone()
        } else {
            one.destination.clone()
        }
    } else {
        String::new()
    };
    TeleportState {
        delay,
        destination,
        counter: pick(&one.counter, &two.counter, ratio),
    }
}

/// True if the marble jumped between the two frames (MBP only).
pub fn is_discontinuous(one: &Frame, two: &Frame) -> bool {
    one.teleport.counter != two.teleport.counter
        || one.checkpoint.respawn_counter != two.checkpoint.respawn_counter
}

// ── Bindings ───────────────────────────────────────────────────────

fn interpolate_states<T: StateValue>(
    one: &[RewindableState<T>],
    two: &[RewindableState<T>],
    ratio: f64,
    delta: f64,
    ctx: &mut BindingContext<'_>,
) -> Vec<RewindableState<T>> {
    one.iter()
        .zip(two)
        .map(|(a, b)| ctx.interpolate(a, b, ratio, delta))
        .collect()
}

fn interpolate_binding_states(
    one: &BindingStates,
    two: &BindingStates,
    ratio: f64,
    delta: f64,
    ctx: &mut BindingContext<'_>,
) -> BindingStates {
    BindingStates {
        ints: interpolate_states(&one.ints, &two.ints, ratio, delta, ctx),
        floats: interpolate_states(&one.floats, &two.floats, ratio, delta, ctx),
        bools: interpolate_states(&one.bools, &two.bools, ratio, delta, ctx),
        strings: interpolate_states(&one.strings, &two.strings, ratio, delta, ctx),
    }
}

// ── Frame blend ────────────────────────────────────────────────────

/// Blend `one` (ratio 0) and `two` (ratio 1) into a new frame covering
/// `delta` milliseconds.
pub fn interpolate_frame(
    one: &Frame,
    two: &Frame,
    ratio: f64,
    delta: f64,
    policy: &InterpolationPolicy<'_>,
    ctx: &mut BindingContext<'_>,
) -> Frame {
    let platinum = policy.flavor.is_platinum();

    let ms = if one.timebonus > 0 && two.timebonus > 0 {
        one.ms.min(two.ms)
    } else {
        lerp_i32(one.ms, two.ms, ratio)
    };

    let (position, velocity, spin) = if platinum && is_discontinuous(one, two) {
        (
            pick(&one.position, &two.position, ratio),
            pick(&one.velocity, &two.velocity, ratio),
            pick(&one.spin, &two.spin, ratio),
        )
    } else {
        let lerp3 = |a: glam::DVec3, b: glam::DVec3| {
            glam::DVec3::new(
                lerp_f64(a.x, b.x, ratio),
                lerp_f64(a.y, b.y, ratio),
                lerp_f64(a.z, b.z, ratio),
            )
        };
        (
            lerp3(one.position, two.position),
            lerp3(one.velocity, two.velocity),
            lerp3(one.spin, two.spin),
        )
    };

    let timebonus = if one.tt_states != two.tt_states {
        two.timebonus
    } else {
        lerp_i32(one.timebonus, two.timebonus, ratio)
    };

    let mp_states = match policy.path_durations {
        Some(durations) => interpolate_mp_states(
            &one.mp_states,
            &two.mp_states,
            durations,
            ratio,
            policy.direction,
        ),
        None => Vec::new(),
    };

    let (teleport, checkpoint, egg_state) = if platinum {
        (
            interpolate_teleport(&one.teleport, &two.teleport, ratio),
            pick(&one.checkpoint, &two.checkpoint, ratio),
            pick(&one.egg_state, &two.egg_state, ratio),
        )
    } else {
        Default::default()
    };

    Frame {
        elapsed_time: lerp_i32(one.elapsed_time, two.elapsed_time, ratio),
        ms,
        delta_ms: delta as i32,
        position,
        velocity,
        spin,
        powerup: two.powerup,
        timebonus,
        mp_states,
        gemcount: two.gemcount,
        gem_states: two.gem_states.clone(),
        tt_states: two.tt_states.clone(),
        powerup_states: lerp_ints(&one.powerup_states, &two.powerup_states, ratio),
        gamestate: two.gamestate.clone(),
        lm_states: lerp_ints(&one.lm_states, &two.lm_states, ratio),
        nextstatetime: interpolate_next_state_time(one, two, ratio, policy.direction),
        active_powerup_states: PowerupTimers::from_vec(lerp_ints(
            &one.active_powerup_states,
            &two.active_powerup_states,
            ratio,
        )),
        gravity_dir: two.gravity_dir.clone(),
        trapdoor_dirs: two.trapdoor_dirs.clone(),
        trapdoor_open: lerp_ints(&one.trapdoor_open, &two.trapdoor_open, ratio),
        trapdoor_close: lerp_ints(&one.trapdoor_close, &two.trapdoor_close, ratio),
        trapdoor_pos: lerp_floats(&one.trapdoor_pos, &two.trapdoor_pos, ratio),
        teleport,
        checkpoint,
        egg_state,
        variable_states: interpolate_binding_states(
            &one.variable_states,
            &two.variable_states,
            ratio,
            delta,
            ctx,
        ),
        object_states: interpolate_binding_states(
            &one.object_states,
            &two.object_states,
            ratio,
            delta,
            ctx,
        ),
    }
}
