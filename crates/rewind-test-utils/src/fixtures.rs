//! Reusable frames and mission trees.
//!
//! - [`sample_frame`]: a frame with every persisted field populated.
//! - [`clocked_frames`]: frames with only clocks set, for query tests.
//! - [`level`]: a [`MockScene`] holding one object of each mission kind
//!   plus the connection, marbles, and HUD objects capture reads.

use glam::DVec3;
use rewind_core::{
    BindingStates, EntityId, Frame, MpState, PowerupTimers, RewindableState, TeleportState,
};

use crate::{MockObject, MockScene};

/// A frame with every persisted field set to a distinct value.
///
/// Floats are chosen to survive the six-decimal text encoding of old
/// formats. The checkpoint is left default because it is never persisted.
pub fn sample_frame(ms: i32, delta_ms: i32) -> Frame {
    let k = ms as f64;
    Frame {
        elapsed_time: 0,
        ms,
        delta_ms,
        position: DVec3::new(1.5 + k, -2.25, 10.0),
        velocity: DVec3::new(0.5, 0.0, -9.75),
        spin: DVec3::new(0.0, 3.0, 0.125),
        powerup: 4,
        timebonus: 0,
        mp_states: vec![MpState::new(250.5, 1000.0), MpState::new(0.0, MpState::LOOP_FORWARD)],
        gemcount: 2,
        gem_states: vec![1, 1, 0],
        tt_states: vec![0],
        powerup_states: vec![0, 3500],
        gamestate: "Play".into(),
        lm_states: vec![0, 12000],
        nextstatetime: 0,
        active_powerup_states: PowerupTimers::from_slice(&[0, 1500, 0]),
        gravity_dir: "1 0 0 0 -1 0 0 0 -1".into(),
        trapdoor_dirs: vec![1],
        trapdoor_open: vec![0],
        trapdoor_close: vec![200],
        trapdoor_pos: vec![0.5],
        teleport: TeleportState {
            delay: 0,
            destination: String::new(),
            counter: 3,
        },
        checkpoint: Default::default(),
        egg_state: true,
        variable_states: BindingStates {
            ints: vec![RewindableState::new("Score", 10)],
            floats: vec![RewindableState::new("Fuel", 0.75)],
            bools: vec![RewindableState::new("DoorOpen", true)],
            strings: vec![RewindableState::new("Message", "hello".to_string())],
        },
        object_states: BindingStates {
            ints: vec![RewindableState::new("Switch", 1)],
            ..BindingStates::default()
        },
    }
}

/// Frames with only `ms` and `delta_ms` set, oldest first.
pub fn clocked_frames(clocks: &[(i32, i32)]) -> Vec<Frame> {
    clocks
        .iter()
        .map(|&(ms, delta)| Frame::with_clock(ms, delta))
        .collect()
}

/// Frames with the given `elapsed_time` values and matching `ms`.
///
/// Each frame's `delta_ms` is the gap to its predecessor (the first gets
/// its own value).
pub fn elapsed_frames(elapsed: &[i32]) -> Vec<Frame> {
    let mut prev = 0;
    elapsed
        .iter()
        .map(|&e| {
            let mut f = Frame::with_clock(e, e - prev);
            f.elapsed_time = e;
            prev = e;
            f
        })
        .collect()
}

/// Handles into the objects built by [`level`].
#[derive(Clone, Copy, Debug)]
pub struct Level {
    pub mission_group: EntityId,
    pub connection: EntityId,
    pub player: EntityId,
    pub client_marble: EntityId,
    pub ghost_marble: EntityId,
    pub play_gui: EntityId,
    pub platform: EntityId,
    pub gems: [EntityId; 2],
    pub time_travel: EntityId,
    pub powerup: EntityId,
    pub egg: EntityId,
    pub mine: EntityId,
    pub trapdoor: EntityId,
    pub switch: EntityId,
}

/// Total time of the platform path in [`level`].
pub const PLATFORM_PATH_TIME: f64 = 3000.0;

/// Build a scene shaped like a small mission.
///
/// Walk order of `MissionGroup`: platform, then a nested group holding
/// both gems, then time travel, powerup, egg, mine, trapdoor, and a
/// `Switch` static shape.
pub fn level() -> (MockScene, Level) {
    let mut s = MockScene::new();

    let mission_group = s.add_group(None, "MissionGroup");
    let platform = s.add_platform(mission_group, PLATFORM_PATH_TIME);
    let gem_group = s.add_group(Some(mission_group), "Gems");
    let gems = [s.add_gem(gem_group), s.add_gem(gem_group)];
    let time_travel = s.add_time_travel(mission_group);
    let powerup = s.add_powerup(mission_group, "SuperJumpItem");
    let egg = s.add_egg(mission_group);
    let mine = s.add_mine(mission_group);
    let trapdoor = s.add_trapdoor(mission_group);
    let switch = s.add_shape(mission_group, "Switch", "SwitchClass");

    let player = s.add(
        None,
        MockObject {
            class: "Marble".into(),
            ..MockObject::default()
        },
    );
    let client_marble = s.add(
        None,
        MockObject {
            class: "Marble".into(),
            ..MockObject::default()
        },
    );
    let ghost_marble = s.add_named("GhostMarble", "StaticShape");
    let connection = s.add_named("LocalClientConnection", "GameConnection");
    s.object_mut(connection)
        .fields
        .insert("player".into(), player.to_string());
    let play_gui = s.add_named("PlayGui", "GuiControl");
    s.object_mut(play_gui)
        .fields
        .insert("timeDelta".into(), "16".into());

    s.bridge
        .set_function_result("ClientMarble", client_marble.to_string());

    (
        s,
        Level {
            mission_group,
            connection,
            player,
            client_marble,
            ghost_marble,
            play_gui,
            platform,
            gems,
            time_travel,
            powerup,
            egg,
            mine,
            trapdoor,
            switch,
        },
    )
}
