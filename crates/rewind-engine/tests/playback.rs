//! End-to-end playback: files written by the store come back through it,
//! and a live session restores a mission it captured.

use std::path::{Path, PathBuf};

use glam::DVec3;
use rewind_core::{BindingContext, BindingRegistry, Frame, GameFlavor};
use rewind_engine::{RewindConfig, RewindManager, RewindSession, Worker};
use rewind_replay::ReplayWriter;
use rewind_test_utils::fixtures::{clocked_frames, elapsed_frames, level, sample_frame, Level};
use rewind_test_utils::{MockBridge, MockScene};

fn write(dir: &Path, name: &str, frames: &[Frame]) -> PathBuf {
    let path = dir.join(name);
    ReplayWriter::new(GameFlavor::Mbp, "Level1")
        .save(&path, frames)
        .unwrap();
    path
}

// ── Store persistence ───────────────────────────────────────────

#[test]
fn saved_frames_load_back_with_elapsed_times() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.rrec");
    let frames = vec![
        sample_frame(16, 16),
        sample_frame(32, 16),
        sample_frame(40, 8),
    ];

    let mut m = RewindManager::new(GameFlavor::Mbp);
    for f in frames.clone() {
        m.push_frame(f);
    }
    m.save(&path).unwrap();
    assert_eq!(m.frame_count(), 0);

    m.load(&path, false).unwrap();
    let expected: Vec<Frame> = frames
        .into_iter()
        .zip([16, 32, 40])
        .map(|(mut f, elapsed)| {
            f.elapsed_time = elapsed;
            f
        })
        .collect();
    assert_eq!(m.frames(), expected.as_slice());
}

#[test]
fn saving_an_empty_store_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.rrec");
    let mut m = RewindManager::new(GameFlavor::Mbg);
    m.save(&path).unwrap();
    assert!(!path.exists());
}

#[test]
fn load_drops_negative_deltas_and_orders_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "neg.rrec",
        &clocked_frames(&[(0, 10), (10, 10), (5, -5), (30, 20)]),
    );

    let mut m = RewindManager::new(GameFlavor::Mbp);
    let mission = m.load(&path, false).unwrap();
    assert_eq!(mission, "Level1");

    let clocks: Vec<_> = m.frames().iter().map(|f| (f.ms, f.elapsed_time)).collect();
    assert_eq!(clocks, vec![(0, 10), (10, 20), (30, 40)]);
}

#[test]
fn ghost_load_skips_repeated_clock_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "ghost.rrec",
        &clocked_frames(&[(0, 16), (16, 16), (16, 16), (32, 16)]),
    );

    let mut m = RewindManager::new(GameFlavor::Mbp);
    m.load(&path, true).unwrap();
    let ms: Vec<_> = m.frames().iter().map(|f| f.ms).collect();
    assert_eq!(ms, vec![0, 16, 32]);
}

#[test]
fn back_to_back_background_saves_write_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let (a, b) = (dir.path().join("a.rrec"), dir.path().join("b.rrec"));
    let mut worker = Worker::new().unwrap();
    let mut m = RewindManager::new(GameFlavor::Mbp);

    for f in clocked_frames(&[(0, 16), (16, 16)]) {
        m.push_frame(f);
    }
    m.set_replay_path(&a);
    m.clear(true, &mut worker).unwrap();

    for f in clocked_frames(&[(0, 16), (16, 16), (32, 16)]) {
        m.push_frame(f);
    }
    m.set_replay_path(&b);
    m.clear(true, &mut worker).unwrap();
    worker.wait_idle();

    m.load(&a, false).unwrap();
    assert_eq!(m.frame_count(), 2);
    m.load(&b, false).unwrap();
    assert_eq!(m.frame_count(), 3);
}

// ── Time queries ────────────────────────────────────────────────

#[test]
fn elapsed_query_between_frames_blends_halfway() {
    let registry = BindingRegistry::new();
    let mut bridge = MockBridge::new();
    let mut ctx = BindingContext::new(&registry, &mut bridge);

    let mut m = RewindManager::new(GameFlavor::Mbp);
    for f in elapsed_frames(&[0, 100, 250, 400, 600]) {
        m.push_frame(f);
    }

    let f = m.frame_at_elapsed_ms(325.0, &mut ctx).unwrap();
    assert_eq!(f.elapsed_time, 325);
    assert_eq!(f.ms, 325);

    let exact = m.frame_at_elapsed_ms(400.0, &mut ctx).unwrap();
    assert_eq!(exact.elapsed_time, 400);
    assert!(m.frame_at_elapsed_ms(601.0, &mut ctx).is_none());
}

// ── Live session ────────────────────────────────────────────────

fn store(s: &mut RewindSession, scene: &mut MockScene, l: &Level, x: f64, ms: i32) {
    scene.object_mut(l.client_marble).position = DVec3::new(x, 1.0, 0.0);
    scene
        .object_mut(l.play_gui)
        .fields
        .insert("elapsedTime".into(), ms.to_string());
    s.store_frame(scene, 16).unwrap();
}

#[test]
fn rewinding_restores_mission_objects() {
    let (mut scene, l) = level();
    let mut s = RewindSession::new(RewindConfig::default()).unwrap();

    scene.object_mut(l.platform).path_position = Some(100.0);
    store(&mut s, &mut scene, &l, 0.0, 16);

    scene.object_mut(l.gems[0]).hidden = true;
    scene.object_mut(l.platform).path_position = Some(200.0);
    store(&mut s, &mut scene, &l, 5.0, 32);

    scene.object_mut(l.platform).path_position = Some(300.0);
    assert!(s.rewind_frame(&mut scene, None).unwrap());
    assert!(scene.object(l.gems[0]).hidden);
    assert_eq!(scene.object(l.platform).path_position, Some(200.0));
    assert_eq!(scene.object(l.client_marble).position.x, 5.0);

    assert!(s.rewind_frame(&mut scene, None).unwrap());
    assert!(!scene.object(l.gems[0]).hidden);
    assert!(!scene.object(l.gems[1]).hidden);
    assert_eq!(scene.object(l.platform).path_position, Some(100.0));
    assert_eq!(scene.object(l.client_marble).position, DVec3::new(0.0, 1.0, 0.0));
}

#[test]
fn recorded_session_replays_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.rrec");
    let (mut scene, l) = level();

    let mut s = RewindSession::new(RewindConfig::default()).unwrap();
    s.set_replay_path(&path);
    for (i, x) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
        store(&mut s, &mut scene, &l, x, 16 * (i as i32 + 1));
    }
    s.clear_frames(true).unwrap();
    s.wait_for_worker();
    assert_eq!(s.frame_count(), 0);

    let mut replay = RewindSession::new(RewindConfig::default()).unwrap();
    replay.load_replay(&path, false).unwrap();
    assert_eq!(replay.frame_count(), 4);

    assert!(replay.rewind_to_ms(&mut scene, 32.0).unwrap());
    assert_eq!(scene.object(l.client_marble).position.x, 2.0);
    assert!(replay.rewind_to_ms(&mut scene, 40.0).unwrap());
    assert!((scene.object(l.client_marble).position.x - 2.5).abs() < 1e-9);
}
