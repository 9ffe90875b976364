//! The game-facing entry point.
//!
//! A [`RewindSession`] owns the binding registry, two frame stores (the
//! live run and a ghost replay), and the background worker. Each
//! operation that touches the game takes the host by `&mut` for the
//! duration of the call only.

use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexMap;
use rewind_core::{
    BindingContext, BindingRegistry, Frame, GameFlavor, RewindableBinding, SceneHost, ScriptBridge,
};
use rewind_replay::{analyze, ReplayError, ReplayInfo};

use crate::capture::{
    apply_frame, apply_ghost, call_on_rewind, capture_frame, host_time_delta, require,
    MISSION_GROUP,
};
use crate::config::{validate_time_scale, ConfigError, PlaybackDirection, RewindConfig};
use crate::error::RewindError;
use crate::manager::RewindManager;
use crate::mission::path_durations;
use crate::worker::Worker;

/// Receives the result of [`RewindSession::analyze_replay`].
pub type AnalysisCallback = Box<dyn FnOnce(Result<ReplayInfo, ReplayError>)>;

type AnalysisResult = (u64, Result<ReplayInfo, ReplayError>);

/// Live rewind, replay playback, and ghost overlay for one game.
pub struct RewindSession {
    config: RewindConfig,
    registry: BindingRegistry,
    live: RewindManager,
    ghost: RewindManager,
    worker: Worker,
    previous_frame: Option<Frame>,
    previous_ghost: Option<Frame>,
    analysis_tx: Sender<AnalysisResult>,
    analysis_rx: Receiver<AnalysisResult>,
    pending: IndexMap<u64, AnalysisCallback>,
    next_request: u64,
}

impl RewindSession {
    /// Validate `config` and start the background worker.
    pub fn new(config: RewindConfig) -> Result<Self, RewindError> {
        config.validate()?;
        let (analysis_tx, analysis_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            live: RewindManager::from_config(&config),
            ghost: RewindManager::from_config(&config),
            registry: BindingRegistry::new(),
            worker: Worker::new()?,
            previous_frame: None,
            previous_ghost: None,
            analysis_tx,
            analysis_rx,
            pending: IndexMap::new(),
            next_request: 0,
            config,
        })
    }

    /// Current settings.
    pub fn config(&self) -> &RewindConfig {
        &self.config
    }

    /// The live frame store.
    pub fn live(&self) -> &RewindManager {
        &self.live
    }

    /// Mutable access to the live frame store.
    pub fn live_mut(&mut self) -> &mut RewindManager {
        &mut self.live
    }

    /// The ghost frame store.
    pub fn ghost(&self) -> &RewindManager {
        &self.ghost
    }

    // ── Bindings ───────────────────────────────────────────────────

    /// Registered bindings.
    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Register a binding for both the live run and the ghost.
    pub fn register_rewindable(&mut self, binding: RewindableBinding) {
        self.registry.register(binding);
    }

    /// Remove the binding for `namespace`. Returns false if none existed.
    pub fn unregister_rewindable(&mut self, namespace: &str) -> bool {
        self.registry.unregister(namespace).is_some()
    }

    /// Fire `onRewind` on every binding.
    pub fn call_on_rewind_event<H: SceneHost>(&self, host: &mut H) -> Result<(), RewindError> {
        call_on_rewind(host, &self.registry, self.config.game)
    }

    // ── Settings ───────────────────────────────────────────────────

    /// Switch game build for both stores.
    pub fn set_game(&mut self, game: GameFlavor) {
        self.config.game = game;
        self.live.set_flavor(game);
        self.ghost.set_flavor(game);
    }

    /// Set the live rewind speed multiplier.
    pub fn set_time_scale(&mut self, time_scale: f64) -> Result<(), ConfigError> {
        validate_time_scale(time_scale)?;
        self.config.time_scale = time_scale;
        Ok(())
    }

    /// Consume frames by elapsed time even at normal speed.
    pub fn set_sync_speed(&mut self, sync_speed: bool) {
        self.config.sync_speed = sync_speed;
    }

    /// Set the interpolation direction for both stores.
    pub fn set_direction(&mut self, direction: PlaybackDirection) {
        self.config.direction = direction;
        self.live.set_direction(direction);
        self.ghost.set_direction(direction);
    }

    /// Where [`clear_frames(true)`](Self::clear_frames) saves to.
    pub fn set_replay_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.config.replay_path = path.clone();
        self.live.set_replay_path(path);
    }

    /// Current save path of the live store.
    pub fn replay_path(&self) -> &Path {
        self.live.replay_path()
    }

    /// Set the mission name for saved replays. Saved states belong to a
    /// mission, so they are dropped.
    pub fn set_replay_mission(&mut self, mission: impl Into<String>) {
        let mission = mission.into();
        self.config.replay_mission = mission.clone();
        self.live.set_replay_mission(mission);
        self.live.clear_save_states();
    }

    /// Mean frame delta of the live store.
    pub fn average_frame_delta(&self) -> f64 {
        self.live.average_frame_delta()
    }

    // ── Files ──────────────────────────────────────────────────────

    /// Load a replay into the live store, or the ghost store with
    /// `ghost` set. Returns the replay's mission name.
    ///
    /// A replay from the other game build is not loaded, but its mission
    /// name is still returned.
    pub fn load_replay(
        &mut self,
        path: impl AsRef<Path>,
        ghost: bool,
    ) -> Result<String, RewindError> {
        let path = path.as_ref();
        log::info!("Loading replay {}", path.display());
        let manager = if ghost { &mut self.ghost } else { &mut self.live };
        match manager.load(path, ghost) {
            Ok(mission) => Ok(mission),
            Err(ReplayError::GameMismatch {
                expected,
                found,
                mission,
            }) => {
                log::warn!(
                    "{} was recorded for {found}, not {expected}",
                    path.display()
                );
                Ok(mission)
            }
            Err(e) => {
                log::error!("cannot load replay {}: {e}", path.display());
                Err(e.into())
            }
        }
    }

    /// Empty the live store, saving it in the background when `write`
    /// is set.
    pub fn clear_frames(&mut self, write: bool) -> Result<(), RewindError> {
        self.live.clear(write, &mut self.worker)
    }

    /// Summarize a replay on the worker thread. `callback` runs on the
    /// next [`tick_async`](Self::tick_async) after the analysis is done.
    pub fn analyze_replay(
        &mut self,
        path: impl Into<PathBuf>,
        callback: impl FnOnce(Result<ReplayInfo, ReplayError>) + 'static,
    ) -> Result<(), RewindError> {
        let id = self.next_request;
        self.next_request += 1;
        let path = path.into();
        let tx = self.analysis_tx.clone();
        let flavor = self.config.game;
        let limit = self.config.max_legacy_uncompressed;
        self.worker.add_task(Box::new(move || {
            log::info!("Analyzing replay {}", path.display());
            // The session may be gone by the time this finishes.
            let _ = tx.send((id, analyze(&path, flavor, limit)));
            Ok(())
        }))?;
        self.pending.insert(id, Box::new(callback));
        Ok(())
    }

    /// Deliver finished analyses. Returns how many callbacks ran.
    pub fn tick_async(&mut self) -> usize {
        let mut ran = 0;
        while let Ok((id, result)) = self.analysis_rx.try_recv() {
            if let Some(callback) = self.pending.shift_remove(&id) {
                callback(result);
                ran += 1;
            }
        }
        ran
    }

    /// Block until background saves and analyses have finished.
    pub fn wait_for_worker(&mut self) {
        self.worker.wait_idle();
    }

    // ── Playback ───────────────────────────────────────────────────

    /// Capture the live game and push it as the newest frame.
    pub fn store_frame<H: SceneHost>(
        &mut self,
        host: &mut H,
        delta_ms: i32,
    ) -> Result<(), RewindError> {
        let frame = capture_frame(host, &self.registry, self.config.game, delta_ms)?;
        self.live.push_frame(frame);
        Ok(())
    }

    /// Step the game back, or with `delta` forward through a loaded
    /// replay.
    ///
    /// Without `delta` the newest frame is popped, or with a time scale
    /// or sync speed set, one host tick scaled by the time scale is
    /// consumed. With `delta` the replay stream advances by that many
    /// milliseconds; past the end nothing is applied and false is
    /// returned. An empty store re-applies the last frame.
    pub fn rewind_frame<H: SceneHost>(
        &mut self,
        host: &mut H,
        delta: Option<f64>,
    ) -> Result<bool, RewindError> {
        self.ensure_path_durations(host)?;

        let frame = match delta {
            Some(d) => {
                let mut ctx = BindingContext::new(&self.registry, host);
                match self.live.next_frame(d, &mut ctx) {
                    Some(f) => Some(f),
                    None => return Ok(false),
                }
            }
            None if self.live.frame_count() <= 1 => self.live.pop_frame(false),
            None if self.config.scaled_rewind() => {
                let step = host_time_delta(host)? * self.config.time_scale;
                let mut ctx = BindingContext::new(&self.registry, host);
                self.live.next_rewind_frame(step, &mut ctx)
            }
            None => self.live.pop_frame(false),
        };

        let Some(frame) = frame.or_else(|| self.previous_frame.clone()) else {
            return Ok(false);
        };
        self.apply(host, frame)?;
        Ok(true)
    }

    /// Put the game at `ms` on the replay's elapsed-time axis. Returns
    /// false past the end of the replay.
    pub fn rewind_to_ms<H: SceneHost>(
        &mut self,
        host: &mut H,
        ms: f64,
    ) -> Result<bool, RewindError> {
        self.ensure_path_durations(host)?;
        let frame = {
            let mut ctx = BindingContext::new(&self.registry, host);
            self.live.frame_at_elapsed_ms(ms, &mut ctx)
        };
        match frame {
            Some(f) => {
                self.apply(host, f)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move the ghost marble to `ms` on the ghost replay's clock. Keeps
    /// the last ghost position when the ghost store is empty.
    pub fn rewind_ghost<H: SceneHost>(
        &mut self,
        host: &mut H,
        ms: f64,
    ) -> Result<(), RewindError> {
        let frame = {
            let mut ctx = BindingContext::new(&self.registry, host);
            self.ghost.realtime_frame_at_ms(ms, &mut ctx)
        };
        if let Some(f) = frame {
            self.previous_ghost = Some(f);
        }
        match &self.previous_ghost {
            Some(f) => apply_ghost(host, f),
            None => Ok(()),
        }
    }

    /// Cut the live timeline at `ms` on the elapsed-time axis.
    pub fn splice_replay(&mut self, bridge: &mut dyn ScriptBridge, ms: f64) {
        let mut ctx = BindingContext::new(&self.registry, bridge);
        self.live.splice_replay_from_ms(ms, &mut ctx);
    }

    fn ensure_path_durations<H: SceneHost>(&mut self, host: &mut H) -> Result<(), RewindError> {
        if self.live.path_durations().is_none() {
            let root = require(host, MISSION_GROUP)?;
            let durations = path_durations(host, root, self.config.game);
            log::debug!("found {} moving platforms", durations.len());
            self.live.set_path_durations(durations);
        }
        Ok(())
    }

    fn apply<H: SceneHost>(&mut self, host: &mut H, frame: Frame) -> Result<(), RewindError> {
        let result = apply_frame(host, &self.registry, self.config.game, &frame);
        self.previous_frame = Some(frame);
        match result {
            Err(RewindError::Mission(e)) => {
                log::error!("{e}");
                Ok(())
            }
            other => other,
        }
    }

    // ── Save states ────────────────────────────────────────────────

    /// Frames in the live store.
    pub fn frame_count(&self) -> usize {
        self.live.frame_count()
    }

    /// Snapshot the live store.
    pub fn save_state(&mut self) {
        self.live.save_state();
    }

    /// Restore snapshot `index`. Returns false for an unknown index.
    pub fn load_state(&mut self, index: usize) -> bool {
        self.live.load_state(index).is_some()
    }

    /// Number of snapshots.
    pub fn state_count(&self) -> usize {
        self.live.saved_state_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::DVec3;
    use rewind_core::{BindingKind, StorageKind};
    use rewind_replay::ReplayWriter;
    use rewind_test_utils::fixtures::{elapsed_frames, level, Level};
    use rewind_test_utils::MockScene;

    fn session() -> RewindSession {
        RewindSession::new(RewindConfig::default()).unwrap()
    }

    fn store_at(s: &mut RewindSession, scene: &mut MockScene, l: &Level, x: f64, ms: i32) {
        scene.object_mut(l.client_marble).position = DVec3::new(x, 0.0, 0.0);
        scene
            .object_mut(l.play_gui)
            .fields
            .insert("elapsedTime".into(), ms.to_string());
        s.store_frame(scene, 16).unwrap();
    }

    // ── Live rewind ────────────────────────────────────────────

    #[test]
    fn rewind_pops_newest_then_repeats_last() {
        let (mut scene, l) = level();
        let mut s = session();
        store_at(&mut s, &mut scene, &l, 1.0, 16);
        store_at(&mut s, &mut scene, &l, 2.0, 32);
        store_at(&mut s, &mut scene, &l, 3.0, 48);

        assert!(s.rewind_frame(&mut scene, None).unwrap());
        assert_eq!(scene.object(l.client_marble).position.x, 3.0);
        assert!(s.rewind_frame(&mut scene, None).unwrap());
        assert!(s.rewind_frame(&mut scene, None).unwrap());
        assert_eq!(scene.object(l.client_marble).position.x, 1.0);
        assert_eq!(s.frame_count(), 0);

        scene.object_mut(l.client_marble).position = DVec3::ZERO;
        assert!(s.rewind_frame(&mut scene, None).unwrap());
        assert_eq!(scene.object(l.client_marble).position.x, 1.0);
    }

    #[test]
    fn nothing_to_rewind_to() {
        let (mut scene, _) = level();
        let mut s = session();
        assert!(!s.rewind_frame(&mut scene, None).unwrap());
    }

    #[test]
    fn scaled_rewind_consumes_a_scaled_tick() {
        let (mut scene, l) = level();
        let mut s = session();
        s.set_time_scale(0.5).unwrap();
        for (i, x) in [0.0, 16.0, 32.0].into_iter().enumerate() {
            store_at(&mut s, &mut scene, &l, x, 16 * (i as i32 + 1));
        }
        // Half of one 16 ms tick: halfway between the two newest frames.
        assert!(s.rewind_frame(&mut scene, None).unwrap());
        assert_eq!(scene.object(l.client_marble).position.x, 24.0);
        assert_eq!(s.frame_count(), 3);
    }

    #[test]
    fn path_durations_are_found_once() {
        let (mut scene, l) = level();
        let mut s = session();
        store_at(&mut s, &mut scene, &l, 0.0, 16);
        s.rewind_frame(&mut scene, None).unwrap();
        assert_eq!(s.live().path_durations(), Some(&[3000.0][..]));
    }

    #[test]
    fn invalid_time_scale_is_rejected() {
        let mut s = session();
        assert!(s.set_time_scale(0.0).is_err());
        assert_eq!(s.config().time_scale, 1.0);
    }

    // ── Replay playback ────────────────────────────────────────

    fn write_replay(dir: &Path, frames: &[Frame]) -> PathBuf {
        let path = dir.join("run.rwx");
        ReplayWriter::new(GameFlavor::Mbp, "Level1").save(&path, frames).unwrap();
        path
    }

    fn positioned(elapsed: &[i32]) -> Vec<Frame> {
        let mut frames = elapsed_frames(elapsed);
        for f in &mut frames {
            f.position = DVec3::new(f64::from(f.ms), 0.0, 0.0);
        }
        frames
    }

    #[test]
    fn replay_streams_forward_and_stops_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_replay(dir.path(), &positioned(&[100, 200, 300]));
        let (mut scene, l) = level();
        let mut s = session();
        s.set_direction(PlaybackDirection::Replay);
        assert_eq!(s.load_replay(&path, false).unwrap(), "Level1");

        assert!(s.rewind_frame(&mut scene, Some(150.0)).unwrap());
        assert_eq!(scene.object(l.client_marble).position.x, 150.0);
        assert!(!s.rewind_frame(&mut scene, Some(500.0)).unwrap());
    }

    #[test]
    fn rewind_to_ms_and_splice() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_replay(dir.path(), &positioned(&[100, 200, 300, 400]));
        let (mut scene, l) = level();
        let mut s = session();
        s.load_replay(&path, false).unwrap();

        assert!(s.rewind_to_ms(&mut scene, 300.0).unwrap());
        assert_eq!(scene.object(l.client_marble).position.x, 300.0);
        assert!(!s.rewind_to_ms(&mut scene, 900.0).unwrap());

        s.splice_replay(&mut scene, 250.0);
        assert_eq!(s.frame_count(), 3);
    }

    #[test]
    fn other_game_returns_mission_without_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_replay(dir.path(), &positioned(&[100, 200]));
        let mut s = RewindSession::new(RewindConfig {
            game: GameFlavor::Mbg,
            ..RewindConfig::default()
        })
        .unwrap();
        assert_eq!(s.load_replay(&path, false).unwrap(), "Level1");
        assert_eq!(s.frame_count(), 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        assert!(matches!(
            s.load_replay(dir.path().join("nope.rwx"), false),
            Err(RewindError::Replay(ReplayError::Io(_)))
        ));
    }

    #[test]
    fn ghost_follows_clock_and_holds_last_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_replay(dir.path(), &positioned(&[100, 200]));
        let (mut scene, l) = level();
        let mut s = session();
        s.rewind_ghost(&mut scene, 0.0).unwrap();
        assert_eq!(scene.object(l.ghost_marble).position, DVec3::ZERO);

        s.load_replay(&path, true).unwrap();
        assert_eq!(s.ghost().frame_count(), 2);
        assert_eq!(s.frame_count(), 0);
        s.rewind_ghost(&mut scene, 150.0).unwrap();
        assert_eq!(scene.object(l.ghost_marble).position.x, 150.0);
        s.rewind_ghost(&mut scene, 1000.0).unwrap();
        assert_eq!(scene.object(l.ghost_marble).position.x, 200.0);
    }

    // ── Background work ────────────────────────────────────────

    #[test]
    fn clear_frames_saves_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.rwx");
        let (mut scene, l) = level();
        let mut s = session();
        s.set_replay_path(&path);
        s.set_replay_mission("Level2");
        store_at(&mut s, &mut scene, &l, 1.0, 16);
        store_at(&mut s, &mut scene, &l, 2.0, 32);
        s.clear_frames(true).unwrap();
        assert_eq!(s.frame_count(), 0);
        s.wait_for_worker();

        assert_eq!(s.load_replay(&path, false).unwrap(), "Level2");
        assert_eq!(s.frame_count(), 2);
    }

    #[test]
    fn analysis_arrives_on_tick() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_replay(dir.path(), &positioned(&[100, 200, 300]));
        let mut s = session();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        s.analyze_replay(&path, move |r| *sink.borrow_mut() = Some(r.unwrap()))
            .unwrap();
        s.wait_for_worker();
        assert!(seen.borrow().is_none());
        assert_eq!(s.tick_async(), 1);
        let info = seen.borrow_mut().take().unwrap();
        assert_eq!(info.frame_count, 3);
        assert_eq!(info.replay_mission, "Level1");
        assert_eq!(s.tick_async(), 0);
    }

    #[test]
    fn rejected_analysis_keeps_no_callback() {
        let mut s = session();
        s.worker.shutdown();
        let result = s.analyze_replay("missing.rwx", |_| {});
        assert!(matches!(result, Err(RewindError::WorkerGone)));
        assert!(s.pending.is_empty());
        assert_eq!(s.tick_async(), 0);
    }

    // ── Bindings and save states ───────────────────────────────

    #[test]
    fn bindings_register_and_unregister() {
        let (mut scene, _) = level();
        let mut s = session();
        s.register_rewindable(RewindableBinding::new(
            "Score",
            BindingKind::Variable,
            StorageKind::Int,
        ));
        s.call_on_rewind_event(&mut scene).unwrap();
        assert_eq!(scene.bridge.namespaced_calls("Score", "onRewind").len(), 1);
        assert!(s.unregister_rewindable("Score"));
        assert!(!s.unregister_rewindable("Score"));
        assert!(s.registry().is_empty());
    }

    #[test]
    fn save_states_cleared_by_mission_change() {
        let (mut scene, l) = level();
        let mut s = session();
        store_at(&mut s, &mut scene, &l, 1.0, 16);
        s.save_state();
        store_at(&mut s, &mut scene, &l, 2.0, 32);
        assert_eq!(s.state_count(), 1);
        assert!(s.load_state(0));
        assert_eq!(s.frame_count(), 1);
        assert!(!s.load_state(3));

        s.set_replay_mission("Other");
        assert_eq!(s.state_count(), 0);
    }

    #[test]
    fn set_game_reaches_both_stores() {
        let mut s = session();
        s.set_game(GameFlavor::Mbg);
        assert_eq!(s.live().flavor(), GameFlavor::Mbg);
        assert_eq!(s.ghost().flavor(), GameFlavor::Mbg);
    }
}
