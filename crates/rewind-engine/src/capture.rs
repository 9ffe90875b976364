//! Reading a [`Frame`] out of the live game and pushing one back in.
//!
//! Everything here talks to the host through [`SceneHost`]. Well-known
//! objects are looked up by name on every call; the host may recreate
//! them between missions.

use glam::{DQuat, DVec3};
use rewind_core::{
    parse_leading_float, parse_leading_int, BindingRegistry, BridgeError, CheckpointState,
    EntityId, Frame, GameFlavor, SceneHost, TeleportState,
};

use crate::error::RewindError;
use crate::mission::{
    apply_mission_state, capture_binding, capture_mission_state, walk_mission, BindingCursors,
    MissionState,
};

/// Root of the mission tree.
pub const MISSION_GROUP: &str = "MissionGroup";
/// The local client's connection.
pub const CLIENT_CONNECTION: &str = "LocalClientConnection";
/// HUD object holding the clocks.
pub const PLAY_GUI: &str = "PlayGui";
/// Marble driven by [`apply_ghost`].
pub const GHOST_MARBLE: &str = "GhostMarble";
/// Script function returning the client-side marble.
pub const CLIENT_MARBLE_FN: &str = "ClientMarble";

/// Script namespaces of the three timed powerups, in
/// [`Frame::active_powerup_states`] order.
const TIMED_POWERUPS: [&str; 3] = ["SuperBounceItem", "ShockAbsorberItem", "HelicopterItem"];
/// Player fields holding the timed powerup countdowns.
const TIMED_POWERUP_FIELDS: [&str; 3] =
    ["SuperBounceActive", "ShockAbsorberActive", "GyrocopterActive"];

pub(crate) fn require<H: SceneHost + ?Sized>(
    host: &H,
    name: &str,
) -> Result<EntityId, RewindError> {
    host.find_object(name)
        .ok_or_else(|| RewindError::MissingObject { name: name.into() })
}

fn player<H: SceneHost + ?Sized>(host: &H, connection: EntityId) -> Option<EntityId> {
    host.find_object(&host.field(connection, "player"))
}

fn client_marble<H: SceneHost>(host: &mut H) -> Result<EntityId, RewindError> {
    let name = host.call_function(CLIENT_MARBLE_FN, &[])?;
    host.find_object(&name).ok_or_else(|| RewindError::MissingObject {
        name: CLIENT_MARBLE_FN.into(),
    })
}

fn int_field<H: SceneHost + ?Sized>(host: &H, obj: EntityId, name: &str) -> i32 {
    parse_leading_int(&host.field(obj, name))
}

fn int_var<H: SceneHost + ?Sized>(host: &H, name: &str) -> i32 {
    parse_leading_int(&host.variable(name))
}

fn logged(what: &str, result: Result<String, BridgeError>) {
    if let Err(e) = result {
        log::error!("{what} failed: {e}");
    }
}

/// Milliseconds the host advanced in its last tick.
pub fn host_time_delta<H: SceneHost + ?Sized>(host: &H) -> Result<f64, RewindError> {
    let gui = require(host, PLAY_GUI)?;
    Ok(f64::from(int_field(host, gui, "timeDelta")))
}

// ── Capture ────────────────────────────────────────────────────────

fn capture_checkpoint<H: SceneHost + ?Sized>(host: &H, player: EntityId) -> CheckpointState {
    CheckpointState {
        object: host.field(player, "checkPoint"),
        gem_count: int_field(host, player, "checkPointGemCount"),
        gem_states: host.field(player, "checkPointGemStates"),
        powerup: int_field(host, player, "checkPointPowerup"),
        gravity: host.field(player, "checkPointGravity"),
        respawn_counter: int_var(host, "$respawnCounter"),
        respawn_offset: host.field(player, "checkPointRespawnOffset"),
    }
}

/// Snapshot the live game into a new frame covering `delta_ms`.
pub fn capture_frame<H: SceneHost>(
    host: &mut H,
    registry: &BindingRegistry,
    flavor: GameFlavor,
    delta_ms: i32,
) -> Result<Frame, RewindError> {
    let connection = require(host, CLIENT_CONNECTION)?;
    let root = require(host, MISSION_GROUP)?;
    let gui = require(host, PLAY_GUI)?;
    let player = player(host, connection);
    let marble = client_marble(host)?;

    let powerup = match player {
        Some(p) => {
            let held = host.call_method(p, "getPowerup", &[])?;
            host.find_object(&held).map_or(0, |id| id.0 as i32)
        }
        None => 0,
    };

    let (position, _) = host.transform(marble);
    let mut frame = Frame {
        elapsed_time: int_field(host, gui, "totalTime"),
        ms: int_field(host, gui, "elapsedTime"),
        delta_ms,
        position,
        velocity: host.velocity(marble),
        spin: host.angular_velocity(marble),
        powerup,
        timebonus: parse_leading_float(&host.field(gui, "bonusTime")) as i32,
        gemcount: int_field(host, connection, "gemCount"),
        gamestate: host.variable("$Game::State"),
        nextstatetime: int_var(host, "$Game::NextStateTime"),
        gravity_dir: host.variable("$Game::GravityDir"),
        ..Frame::default()
    };
    frame.active_powerup_states = match player {
        Some(p) => TIMED_POWERUP_FIELDS
            .iter()
            .map(|f| int_field(host, p, f))
            .collect(),
        None => [0; 3].into_iter().collect(),
    };

    let mission = capture_mission_state(host, root, registry, flavor);
    mission.write_into(&mut frame);

    if flavor.is_platinum() {
        frame.teleport = TeleportState {
            delay: int_var(host, "$teleportTimer"),
            destination: host.variable("$teleportDestination"),
            counter: int_var(host, "$teleportCounter"),
        };
        if let Some(p) = player {
            frame.checkpoint = capture_checkpoint(host, p);
        }
    }

    for binding in registry.variables() {
        capture_binding(host, binding, None, &mut frame.variable_states);
    }
    log::debug!("captured frame at {} ms", frame.ms);
    Ok(frame)
}

// ── Apply ──────────────────────────────────────────────────────────

fn apply_checkpoint<H: SceneHost>(host: &mut H, player: EntityId, cp: &CheckpointState) {
    host.set_field(player, "checkPoint", &cp.object);
    host.set_field(player, "checkPointGemCount", &cp.gem_count.to_string());
    host.set_field(player, "checkPointGemStates", &cp.gem_states);
    host.set_field(player, "checkPointPowerup", &cp.powerup.to_string());
    host.set_field(player, "checkPointGravity", &cp.gravity);
    host.set_variable("$respawnCounter", &cp.respawn_counter.to_string());
    host.set_field(player, "checkPointRespawnOffset", &cp.respawn_offset);
}

/// Put the live game back at `frame`.
///
/// The marble keeps its rotation. Mission objects are restored against
/// a fresh capture of the live tree, so unchanged objects are not
/// touched. A [`MissionError`](crate::error::MissionError) stops the
/// apply where the lists ran out; everything before it stays applied.
pub fn apply_frame<H: SceneHost>(
    host: &mut H,
    registry: &BindingRegistry,
    flavor: GameFlavor,
    frame: &Frame,
) -> Result<(), RewindError> {
    let connection = require(host, CLIENT_CONNECTION)?;
    let root = require(host, MISSION_GROUP)?;
    let gui = require(host, PLAY_GUI)?;
    let player = player(host, connection);

    host.set_field(connection, "isOOB", "0");
    if let Some(p) = player {
        logged("setOOB", host.call_method(p, "setOOB", &["0"]));
    }
    let respawn = int_field(host, connection, "respawnSchedule");
    if respawn != 0 {
        host.cancel_event(respawn);
    }

    host.set_variable("$Rewind::TimeBonus", &frame.timebonus.to_string());
    logged("setTime", host.call_method(gui, "setTime", &[&frame.ms.to_string()]));
    host.set_field(gui, "totalTime", &frame.elapsed_time.to_string());

    let marble = client_marble(host)?;
    let (_, rotation) = host.transform(marble);
    let velocity = if parse_leading_int(&host.variable("$Replay::Paused")) != 0 {
        DVec3::ZERO
    } else {
        frame.velocity
    };
    host.set_transform(marble, frame.position, rotation);
    host.set_velocity(marble, velocity);
    host.set_angular_velocity(marble, frame.spin);
    if let Some(p) = player {
        host.set_transform(p, frame.position, rotation);
        host.set_velocity(p, velocity);
        host.set_angular_velocity(p, frame.spin);
    }

    let state = MissionState::from_frame(frame);
    if flavor.is_platinum() {
        let tp = &frame.teleport;
        if tp.delay > 0 {
            let delay = tp.delay.to_string();
            logged(
                "ManualTeleport",
                host.call_function("ManualTeleport", &[&delay, &tp.destination]),
            );
        } else {
            logged("CancelTeleport", host.call_function("CancelTeleport", &[]));
        }
        if let Some(p) = player {
            apply_checkpoint(host, p, &frame.checkpoint);
        }
    }

    let timers = match frame.active_powerup_states.as_slice() {
        [a, b, c] => [*a, *b, *c],
        _ => [0; 3],
    };
    if let Some(p) = player {
        let id = p.to_string();
        for (ns, t) in TIMED_POWERUPS.iter().zip(timers) {
            let t = t.to_string();
            logged("CustomOnUse", host.call_namespaced(ns, "CustomOnUse", &[&id, &t]));
        }
    }

    host.set_variable("$Game::GravityDir", &frame.gravity_dir);
    host.set_variable("$Game::NextStateTime", &frame.nextstatetime.to_string());
    let gems = frame.gemcount.to_string();
    host.set_field(connection, "gemCount", &gems);
    logged(
        "setRewindGameState",
        host.call_function("setRewindGameState", &[&frame.gamestate]),
    );
    logged("setGemCount", host.call_method(gui, "setGemCount", &[&gems]));
    logged(
        "setGravityDirection",
        host.call_function("setGravityDirection", &[&frame.gravity_dir]),
    );

    let prev = capture_mission_state(host, root, registry, flavor);
    apply_mission_state(host, root, registry, flavor, &state, &prev)?;

    let mut vars = BindingCursors::variables(&frame.variable_states);
    for binding in registry.variables() {
        vars.restore(host, binding, None)?;
    }

    if let Some(p) = player {
        logged(
            "setPowerup",
            host.call_method(p, "setPowerup", &[&frame.powerup.to_string()]),
        );
    }
    log::debug!("applied frame at {} ms", frame.ms);
    Ok(())
}

/// Move the ghost marble to `frame`, rolling it by the frame's spin over
/// one host tick.
pub fn apply_ghost<H: SceneHost>(host: &mut H, frame: &Frame) -> Result<(), RewindError> {
    let ghost = require(host, GHOST_MARBLE)?;
    let time_delta = host_time_delta(host)?;
    let (_, rotation) = host.transform(ghost);
    let speed = frame.spin.length();
    let rotation = if speed > 0.0 {
        let roll = DQuat::from_axis_angle(frame.spin / speed, -(speed * time_delta * 0.001));
        (rotation * roll).normalize()
    } else {
        rotation
    };
    host.set_transform(ghost, frame.position, rotation);
    Ok(())
}

/// Fire `onRewind` on every variable binding, then on every scene-object
/// binding attached to an object in the mission tree.
pub fn call_on_rewind<H: SceneHost>(
    host: &mut H,
    registry: &BindingRegistry,
    flavor: GameFlavor,
) -> Result<(), RewindError> {
    for binding in registry.variables() {
        if let Err(e) = binding.on_rewind(host, None) {
            log::error!("onRewind for {} failed: {e}", binding.namespace());
        }
    }
    let root = require(host, MISSION_GROUP)?;
    for (obj, node) in walk_mission(host, root, flavor) {
        if !node.is_rewindable() {
            continue;
        }
        let datablock = host.datablock_name(obj);
        for binding in registry.matching(&datablock) {
            if let Err(e) = binding.on_rewind(host, Some(obj)) {
                log::error!("onRewind for {} on {obj} failed: {e}", binding.namespace());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::{BindingKind, RewindableBinding, RewindableState, ScriptBridge, StorageKind};
    use rewind_test_utils::fixtures::{level, sample_frame};
    use rewind_test_utils::{CallTarget, MockScene};

    fn registry() -> BindingRegistry {
        let mut r = BindingRegistry::new();
        r.register(RewindableBinding::new(
            "Score",
            BindingKind::Variable,
            StorageKind::Int,
        ));
        r.register(RewindableBinding::new(
            "Switch",
            BindingKind::SceneObject,
            StorageKind::Int,
        ));
        r
    }

    // ── Capture ────────────────────────────────────────────────

    #[test]
    fn capture_reads_clocks_marble_and_bindings() {
        let (mut scene, l) = level();
        {
            let gui = scene.object_mut(l.play_gui);
            gui.fields.insert("totalTime".into(), "5000".into());
            gui.fields.insert("elapsedTime".into(), "4800".into());
            gui.fields.insert("bonusTime".into(), "1500.7".into());
        }
        {
            let m = scene.object_mut(l.client_marble);
            m.position = DVec3::new(1.0, 2.0, 3.0);
            m.velocity = DVec3::new(0.0, 0.0, -4.0);
            m.spin = DVec3::new(0.5, 0.0, 0.0);
        }
        scene
            .object_mut(l.player)
            .fields
            .insert("powerup".into(), l.powerup.to_string());
        scene
            .object_mut(l.player)
            .fields
            .insert("ShockAbsorberActive".into(), "2200".into());
        scene.set_variable("$Game::State", "Play");
        scene.set_variable("$teleportCounter", "2");
        scene.bridge.set_global_state("Score", "12");

        let f = capture_frame(&mut scene, &registry(), GameFlavor::Mbp, 16).unwrap();
        assert_eq!((f.elapsed_time, f.ms, f.delta_ms), (5000, 4800, 16));
        assert_eq!(f.timebonus, 1500);
        assert_eq!(f.position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(f.velocity.z, -4.0);
        assert_eq!(f.powerup, l.powerup.0 as i32);
        assert_eq!(f.active_powerup_states.as_slice(), &[0, 2200, 0]);
        assert_eq!(f.gamestate, "Play");
        assert_eq!(f.teleport.counter, 2);
        assert_eq!(f.gem_states, vec![0, 0]);
        assert_eq!(f.variable_states.ints, vec![RewindableState::new("Score", 12)]);
        assert_eq!(f.object_states.ints.len(), 1);
    }

    #[test]
    fn capture_without_player_uses_zeros() {
        let (mut scene, l) = level();
        scene.object_mut(l.connection).fields.remove("player");
        let f = capture_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, 16).unwrap();
        assert_eq!(f.powerup, 0);
        assert_eq!(f.active_powerup_states.as_slice(), &[0, 0, 0]);
    }

    #[test]
    fn missing_mission_group_is_reported() {
        let mut scene = MockScene::new();
        scene.add_named(CLIENT_CONNECTION, "GameConnection");
        let err = capture_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, 16);
        assert!(matches!(err, Err(RewindError::MissingObject { name }) if name == MISSION_GROUP));
    }

    // ── Apply ──────────────────────────────────────────────────

    #[test]
    fn apply_then_capture_restores_frame_state() {
        let (mut scene, l) = level();
        let reg = registry();
        let mut frame = capture_frame(&mut scene, &reg, GameFlavor::Mbp, 16).unwrap();
        frame.ms = 7000;
        frame.position = DVec3::new(9.0, 8.0, 7.0);
        frame.gemcount = 1;
        frame.gem_states = vec![1, 0];
        frame.powerup = l.powerup.0 as i32;
        frame.variable_states.ints = vec![RewindableState::new("Score", 40)];

        apply_frame(&mut scene, &reg, GameFlavor::Mbp, &frame).unwrap();

        assert_eq!(scene.object(l.client_marble).position, frame.position);
        assert_eq!(scene.object(l.player).position, frame.position);
        assert_eq!(scene.object(l.play_gui).fields["elapsedTime"], "7000");
        assert_eq!(scene.object(l.play_gui).fields["gemCount"], "1");
        assert_eq!(scene.object(l.connection).fields["gemCount"], "1");
        assert!(scene.object(l.gems[0]).hidden);
        assert_eq!(scene.bridge.global_state("Score"), Some("40"));

        let again = capture_frame(&mut scene, &reg, GameFlavor::Mbp, 16).unwrap();
        assert_eq!(again.ms, 7000);
        assert_eq!(again.gem_states, frame.gem_states);
        assert_eq!(again.powerup, frame.powerup);
        assert_eq!(again.variable_states, frame.variable_states);
    }

    #[test]
    fn paused_replay_zeroes_velocity() {
        let (mut scene, l) = level();
        scene.set_variable("$Replay::Paused", "1");
        let mut frame = capture_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, 16).unwrap();
        frame.velocity = DVec3::new(3.0, 0.0, 0.0);
        apply_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, &frame).unwrap();
        assert_eq!(scene.object(l.client_marble).velocity, DVec3::ZERO);
    }

    #[test]
    fn timed_powerups_fall_back_to_zeros() {
        let (mut scene, l) = level();
        let mut frame = capture_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, 16).unwrap();
        frame.active_powerup_states = [5, 6].into_iter().collect();
        apply_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, &frame).unwrap();
        let calls = scene.bridge.namespaced_calls("HelicopterItem", "CustomOnUse");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec![l.player.to_string(), "0".to_string()]);
    }

    #[test]
    fn teleport_is_replayed_or_cancelled() {
        let (mut scene, _) = level();
        let mut frame = capture_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, 16).unwrap();
        frame.teleport = TeleportState {
            delay: 300,
            destination: "Pad2".into(),
            counter: 0,
        };
        apply_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, &frame).unwrap();
        assert_eq!(scene.bridge.calls_named("ManualTeleport")[0].args, vec!["300", "Pad2"]);

        frame.teleport.delay = 0;
        apply_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbp, &frame).unwrap();
        assert_eq!(scene.bridge.calls_named("CancelTeleport").len(), 1);
    }

    #[test]
    fn gold_skips_platinum_extras() {
        let (mut scene, _) = level();
        let frame = capture_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbg, 16).unwrap();
        assert_eq!(frame.teleport, TeleportState::default());
        apply_frame(&mut scene, &BindingRegistry::new(), GameFlavor::Mbg, &frame).unwrap();
        assert!(scene.bridge.calls_named("CancelTeleport").is_empty());
    }

    #[test]
    fn desync_stops_before_variables() {
        let (mut scene, _) = level();
        let reg = registry();
        let mut frame = sample_frame(100, 16);
        frame.gem_states.clear();
        let err = apply_frame(&mut scene, &reg, GameFlavor::Mbp, &frame);
        assert!(matches!(err, Err(RewindError::Mission(_))));
        assert!(scene.bridge.namespaced_calls("Score", "setState").is_empty());
    }

    // ── Ghost and events ───────────────────────────────────────

    #[test]
    fn ghost_rolls_about_spin_axis() {
        let (mut scene, l) = level();
        let mut frame = Frame::with_clock(0, 16);
        frame.position = DVec3::new(4.0, 0.0, 0.0);
        frame.spin = DVec3::new(0.0, 0.0, 10.0);
        apply_ghost(&mut scene, &frame).unwrap();

        let g = scene.object(l.ghost_marble);
        assert_eq!(g.position, frame.position);
        let (axis, angle) = g.rotation.to_axis_angle();
        assert!((angle - 0.16).abs() < 1e-6);
        assert!((axis - DVec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn ghost_without_spin_keeps_rotation() {
        let (mut scene, l) = level();
        apply_ghost(&mut scene, &Frame::with_clock(0, 16)).unwrap();
        assert_eq!(scene.object(l.ghost_marble).rotation, DQuat::IDENTITY);
    }

    #[test]
    fn on_rewind_reaches_variables_and_objects() {
        let (mut scene, l) = level();
        call_on_rewind(&mut scene, &registry(), GameFlavor::Mbp).unwrap();
        assert_eq!(scene.bridge.namespaced_calls("Score", "onRewind")[0].args, Vec::<String>::new());
        let calls = scene.bridge.namespaced_calls("Switch", "onRewind");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec![l.switch.to_string()]);
        assert_eq!(calls[0].target, CallTarget::Namespace("Switch".into()));
    }

    #[test]
    fn time_delta_comes_from_the_hud() {
        let (scene, _) = level();
        assert_eq!(host_time_delta(&scene).unwrap(), 16.0);
    }
}
