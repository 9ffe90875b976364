//! Frame store, replay persistence, and time-based queries.
//!
//! A [`RewindManager`] keeps frames oldest-first. During live play the
//! session pushes one frame per tick and pops them again to rewind.
//! After [`load`](RewindManager::load) every frame carries an
//! `elapsed_time`, and playback resolves arbitrary times to a frame,
//! interpolating between the two frames that bracket it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rewind_core::{BindingContext, Frame, GameFlavor};
use rewind_replay::{ReplayError, ReplayReader, ReplayWriter, LEGACY_UNCOMPRESSED_LIMIT};

use crate::config::{PlaybackDirection, RewindConfig, DEFAULT_REPLAY_MISSION};
use crate::error::RewindError;
use crate::interpolate::{interpolate_frame, InterpolationPolicy};
use crate::worker::Worker;

/// Which frame key a binary search compares against.
#[derive(Clone, Copy)]
enum Key {
    Elapsed,
    Ms,
}

impl Key {
    fn of(self, f: &Frame) -> f64 {
        match self {
            Key::Elapsed => f64::from(f.elapsed_time),
            Key::Ms => f64::from(f.ms),
        }
    }
}

/// Owns the frames of one timeline (the live run or a ghost).
pub struct RewindManager {
    frames: Vec<Frame>,
    save_states: Vec<Vec<Frame>>,
    current_index: usize,
    stream_time_position: f64,
    average_delta: f64,
    total_time: i64,
    replay_path: PathBuf,
    replay_mission: String,
    flavor: GameFlavor,
    direction: PlaybackDirection,
    path_durations: Option<Vec<f64>>,
    legacy_limit: usize,
}

impl RewindManager {
    /// An empty store for `flavor`.
    pub fn new(flavor: GameFlavor) -> Self {
        Self {
            frames: Vec::new(),
            save_states: Vec::new(),
            current_index: 0,
            stream_time_position: 0.0,
            average_delta: 0.0,
            total_time: 0,
            replay_path: PathBuf::new(),
            replay_mission: DEFAULT_REPLAY_MISSION.to_string(),
            flavor,
            direction: PlaybackDirection::default(),
            path_durations: None,
            legacy_limit: LEGACY_UNCOMPRESSED_LIMIT,
        }
    }

    /// An empty store using the session settings in `config`.
    pub fn from_config(config: &RewindConfig) -> Self {
        Self {
            replay_path: config.replay_path.clone(),
            replay_mission: config.replay_mission.clone(),
            direction: config.direction,
            legacy_limit: config.max_legacy_uncompressed,
            ..Self::new(config.game)
        }
    }

    // ── Stack ──────────────────────────────────────────────────────

    /// Append a frame as the newest.
    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Return the newest frame, removing it unless `peek` is set.
    pub fn pop_frame(&mut self, peek: bool) -> Option<Frame> {
        if peek {
            self.frames.last().cloned()
        } else {
            self.frames.pop()
        }
    }

    /// Frame at `index`, oldest first.
    pub fn frame_at(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Number of stored frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// All frames, oldest first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// True if some frame has clock value `ms`.
    pub fn has_ms(&self, ms: i32) -> bool {
        self.frames.iter().any(|f| f.ms == ms)
    }

    /// Mean `delta_ms` of the stored frames, or 0 when empty.
    pub fn average_frame_delta(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.frames.iter().map(|f| f64::from(f.delta_ms)).sum();
        sum / self.frames.len() as f64
    }

    // ── Settings ───────────────────────────────────────────────────

    /// Path used by [`clear`](Self::clear) when writing.
    pub fn replay_path(&self) -> &Path {
        &self.replay_path
    }

    /// Set the save path.
    pub fn set_replay_path(&mut self, path: impl Into<PathBuf>) {
        self.replay_path = path.into();
    }

    /// Mission name written into saves; set by [`load`](Self::load).
    pub fn replay_mission(&self) -> &str {
        &self.replay_mission
    }

    /// Set the mission name.
    pub fn set_replay_mission(&mut self, mission: impl Into<String>) {
        self.replay_mission = mission.into();
    }

    /// Game build.
    pub fn flavor(&self) -> GameFlavor {
        self.flavor
    }

    /// Switch game build.
    pub fn set_flavor(&mut self, flavor: GameFlavor) {
        self.flavor = flavor;
    }

    /// Operand order used for interpolation.
    pub fn direction(&self) -> PlaybackDirection {
        self.direction
    }

    /// Set the operand order.
    pub fn set_direction(&mut self, direction: PlaybackDirection) {
        self.direction = direction;
    }

    /// Platform path durations, if the mission has been walked.
    pub fn path_durations(&self) -> Option<&[f64]> {
        self.path_durations.as_deref()
    }

    /// Install platform path durations in walk order.
    pub fn set_path_durations(&mut self, durations: Vec<f64>) {
        self.path_durations = Some(durations);
    }

    fn policy(&self) -> InterpolationPolicy<'_> {
        InterpolationPolicy {
            flavor: self.flavor,
            direction: self.direction,
            path_durations: self.path_durations.as_deref(),
        }
    }

    fn blend(
        &self,
        one: &Frame,
        two: &Frame,
        ratio: f64,
        delta: f64,
        ctx: &mut BindingContext<'_>,
    ) -> Frame {
        interpolate_frame(one, two, ratio, delta, &self.policy(), ctx)
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Write all frames to `path` and empty the store.
    ///
    /// Does nothing, and creates no file, when the store is empty.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        if self.frames.is_empty() {
            return Ok(());
        }
        let frames = std::mem::take(&mut self.frames);
        ReplayWriter::new(self.flavor, self.replay_mission.clone()).save(path, &frames)
    }

    /// Replace the store with the frames of a replay file.
    ///
    /// Frames with a negative delta are dropped. With `ghost` set, frames
    /// whose clock value was already seen are dropped too, so a stalled
    /// clock does not freeze the ghost. Returns the file's mission name.
    ///
    /// On error the store is left empty; on a game mismatch the mission
    /// name is still updated from the header.
    pub fn load(&mut self, path: impl AsRef<Path>, ghost: bool) -> Result<String, ReplayError> {
        let path = path.as_ref();
        self.frames.clear();
        self.total_time = 0;
        self.clear_save_states();
        self.replay_path = path.to_path_buf();

        let mut reader = ReplayReader::open(path, self.flavor, self.legacy_limit)?;
        self.replay_mission = reader.header().mission.clone();
        reader.ensure_game(self.flavor)?;

        let mut seen = HashSet::new();
        loop {
            let frame = match reader.next_frame() {
                Ok(Some(f)) => f,
                Ok(None) => break,
                Err(e) => {
                    self.frames.clear();
                    return Err(e);
                }
            };
            if frame.delta_ms < 0 {
                continue;
            }
            if ghost && !seen.insert(frame.ms) {
                continue;
            }
            self.frames.push(frame);
        }

        log::info!(
            "Loaded replay {}, {} frames",
            path.display(),
            self.frames.len()
        );
        self.set_frame_elapsed_times();
        self.frames.reverse();
        self.set_up_streaming();
        Ok(self.replay_mission.clone())
    }

    /// Assign running `elapsed_time` from the oldest frame, which is
    /// last while the list is still in file order.
    fn set_frame_elapsed_times(&mut self) {
        if self.total_time != 0 {
            return;
        }
        for frame in self.frames.iter_mut().rev() {
            self.total_time += i64::from(frame.delta_ms);
            frame.elapsed_time = self.total_time as i32;
        }
    }

    fn set_up_streaming(&mut self) {
        self.current_index = self.frames.len().saturating_sub(1);
        self.stream_time_position = 0.0;
        self.average_delta = self.average_frame_delta();
    }

    /// Empty the store, optionally saving it on `worker` first.
    ///
    /// The save task owns the frames and settings it writes, so changes
    /// made after this call never reach the file.
    pub fn clear(&mut self, write: bool, worker: &mut Worker) -> Result<(), RewindError> {
        let frames = std::mem::take(&mut self.frames);
        self.path_durations = None;
        self.total_time = 0;
        if !write || frames.is_empty() {
            return Ok(());
        }
        let writer = ReplayWriter::new(self.flavor, self.replay_mission.clone());
        let path = self.replay_path.clone();
        worker.add_task(Box::new(move || {
            writer.save(&path, &frames)?;
            Ok(())
        }))
    }

    // ── Queries ────────────────────────────────────────────────────

    fn search(&self, ms: f64, key: Key, ctx: &mut BindingContext<'_>) -> Frame {
        let idx = self.frames.partition_point(|f| key.of(f) < ms);
        match self.frames.get(idx) {
            Some(f) if key.of(f) == ms => f.clone(),
            Some(hi) if idx > 0 => {
                let lo = &self.frames[idx - 1];
                let ratio = (ms - key.of(lo)) / (key.of(hi) - key.of(lo));
                self.blend(lo, hi, ratio, ms, ctx)
            }
            Some(f) => f.clone(),
            None => self.frames[self.frames.len() - 1].clone(),
        }
    }

    /// Frame at `ms` on the `elapsed_time` axis.
    ///
    /// Before the first frame returns the first; past the last returns
    /// `None`.
    pub fn frame_at_elapsed_ms(&self, ms: f64, ctx: &mut BindingContext<'_>) -> Option<Frame> {
        let (first, last) = (self.frames.first()?, self.frames.last()?);
        if ms < f64::from(first.elapsed_time) {
            return Some(first.clone());
        }
        if ms > f64::from(last.elapsed_time) {
            return None;
        }
        log::debug!("frame at elapsed {ms}");
        Some(self.search(ms, Key::Elapsed, ctx))
    }

    /// Frame at `ms` on the in-game clock axis, clamped to the stored
    /// range.
    pub fn realtime_frame_at_ms(&self, ms: f64, ctx: &mut BindingContext<'_>) -> Option<Frame> {
        let (first, last) = (self.frames.first()?, self.frames.last()?);
        if ms < f64::from(first.ms) {
            return Some(first.clone());
        }
        if ms > f64::from(last.ms) {
            return Some(last.clone());
        }
        Some(self.search(ms, Key::Ms, ctx))
    }

    /// Streaming lookup scanning backward from `index` (newest when
    /// `None`).
    ///
    /// On the clock axis the scan position and stream cursor are
    /// remembered, and a cursor that has run ahead of `ms` is first moved
    /// forward by an estimate from the average frame delta.
    pub fn frame_at_ms(
        &mut self,
        ms: f64,
        index: Option<usize>,
        use_elapsed: bool,
        ctx: &mut BindingContext<'_>,
    ) -> Option<Frame> {
        if ms < 0.0 || self.frames.is_empty() {
            return None;
        }
        let last = self.frames.len() - 1;
        let mut index = index.map_or(last, |i| i.min(last));
        let key = if use_elapsed { Key::Elapsed } else { Key::Ms };

        if !use_elapsed && self.stream_time_position > ms {
            let jump = if self.average_delta > 0.0 {
                ((self.stream_time_position - ms) / self.average_delta).ceil() as usize + 3
            } else {
                last
            };
            self.current_index = self.current_index.saturating_add(jump).min(last);
            index = self.current_index;
        }
        let back = &self.frames[last];
        if ms < key.of(back) {
            return Some(back.clone());
        }

        for i in (0..=index).rev() {
            let f = &self.frames[i];
            let k = key.of(f);
            if k <= ms {
                continue;
            }
            let delta = f64::from(f.delta_ms);
            let ratio = if delta == 0.0 {
                1.0
            } else {
                (delta - (k - ms)) / delta
            };
            if !use_elapsed {
                self.current_index = i;
                self.stream_time_position = ms;
            }
            let f = &self.frames[i];
            return Some(match self.frames.get(i + 1) {
                Some(next) => self.blend(next, f, ratio, ms, ctx),
                None => f.clone(),
            });
        }
        None
    }

    /// Consume `delta` milliseconds from the newest end.
    ///
    /// Frames fully covered by `delta` are dropped and the result is
    /// pushed back as the new newest frame, so repeated calls walk back
    /// in time at the requested speed.
    pub fn next_rewind_frame(&mut self, delta: f64, ctx: &mut BindingContext<'_>) -> Option<Frame> {
        if delta < 0.0 || self.frames.is_empty() {
            return None;
        }
        if self.frames.len() < 2 {
            return self.frames.pop();
        }

        let first = self.frames.pop()?;
        if delta < f64::from(first.delta_ms) {
            let second = &self.frames[self.frames.len() - 1];
            let ratio = delta / f64::from(first.delta_ms);
            let f = self.blend(&first, second, ratio, delta, ctx);
            self.frames.push(f.clone());
            return Some(f);
        }

        // Widened so a run of huge deltas from a file cannot overflow.
        let mut accumulated = i64::from(first.delta_ms);
        let mut mid = first.clone();
        let mut out_of_frames = false;
        while (accumulated as f64) < delta {
            match self.frames.pop() {
                Some(f) => {
                    accumulated += i64::from(f.delta_ms);
                    mid = f;
                }
                None => {
                    out_of_frames = true;
                    break;
                }
            }
        }
        if accumulated == 0 {
            self.frames.push(first.clone());
            return Some(first);
        }
        let target = if out_of_frames {
            mid
        } else {
            self.frames.last().cloned().unwrap_or(mid)
        };
        // Running out of frames leaves less history than asked for; land
        // on the oldest frame instead of extrapolating past it.
        let ratio = (delta / accumulated as f64).min(1.0);
        let remaining = (accumulated as f64 - delta).max(0.0);
        let f = self.blend(&first, &target, ratio, remaining, ctx);
        self.frames.push(f.clone());
        Some(f)
    }

    /// Advance the stream cursor by `delta` and resolve it on the
    /// `elapsed_time` axis.
    pub fn next_frame(&mut self, delta: f64, ctx: &mut BindingContext<'_>) -> Option<Frame> {
        self.stream_time_position = (self.stream_time_position + delta).max(0.0);
        self.frame_at_elapsed_ms(self.stream_time_position, ctx)
    }

    /// Advance the stream cursor by `delta` and resolve it on the clock
    /// axis.
    pub fn next_non_elapsed_frame(
        &mut self,
        delta: f64,
        ctx: &mut BindingContext<'_>,
    ) -> Option<Frame> {
        if self.frames.is_empty() {
            return None;
        }
        let last = self.frames.len() - 1;
        self.stream_time_position = (self.stream_time_position + delta).max(0.0);
        if delta < 0.0 && self.average_delta > 0.0 {
            let step = (delta / self.average_delta).ceil() as i64 + 3;
            let moved = (self.current_index as i64 + step).clamp(0, last as i64);
            self.current_index = moved as usize;
        }

        let position = self.stream_time_position;
        let f = self.frame_at_ms(position, Some(self.current_index + 3), false, ctx)?;

        self.current_index = self.current_index.min(last);
        while self.current_index > 0 && f64::from(self.frames[self.current_index].ms) < position {
            self.current_index -= 1;
        }
        Some(f)
    }

    /// Stream cursor position in milliseconds.
    pub fn stream_time_position(&self) -> f64 {
        self.stream_time_position
    }

    // ── Save states ────────────────────────────────────────────────

    /// Snapshot the whole frame list.
    pub fn save_state(&mut self) {
        self.save_states.push(self.frames.clone());
    }

    /// Restore snapshot `index`, returning its frame count.
    ///
    /// An unknown index is logged and leaves the store unchanged.
    pub fn load_state(&mut self, index: usize) -> Option<usize> {
        match self.save_states.get(index) {
            Some(frames) => {
                self.frames = frames.clone();
                Some(self.frames.len())
            }
            None => {
                log::warn!(
                    "no saved state {index} ({} saved)",
                    self.save_states.len()
                );
                None
            }
        }
    }

    /// Number of snapshots.
    pub fn saved_state_count(&self) -> usize {
        self.save_states.len()
    }

    /// Drop all snapshots.
    pub fn clear_save_states(&mut self) {
        self.save_states.clear();
    }

    // ── Editing ────────────────────────────────────────────────────

    /// Cut the timeline at `ms` on the `elapsed_time` axis, keeping the
    /// frame interpolated at the cut as the new newest frame.
    pub fn splice_replay_from_ms(&mut self, ms: f64, ctx: &mut BindingContext<'_>) {
        let at = self.frame_at_elapsed_ms(ms, ctx);
        let mut kept: Vec<Frame> = self
            .frames
            .iter()
            .take_while(|f| f64::from(f.elapsed_time) < ms)
            .cloned()
            .collect();
        kept.extend(at);
        self.frames = kept;
    }
}
