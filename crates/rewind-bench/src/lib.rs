//! Recording profiles for benchmarking the rewind engine.
//!
//! - [`recording`]: a run of fully populated frames at a fixed tick
//! - [`encoded_recording`]: the same run as replay file bytes

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rewind_core::{Frame, GameFlavor};
use rewind_replay::{ReplayError, ReplayWriter};
use rewind_test_utils::fixtures::sample_frame;

/// Simulated tick length in milliseconds.
pub const TICK_MS: i32 = 16;

/// `frames` ticks of play, oldest first, with `elapsed_time` assigned the
/// way a loaded replay has it.
///
/// The marble drifts along x so neighbouring frames differ.
pub fn recording(frames: usize) -> Vec<Frame> {
    (0..frames)
        .map(|i| {
            let ms = (i as i32 + 1) * TICK_MS;
            let mut f = sample_frame(ms, TICK_MS);
            f.elapsed_time = ms;
            f.mp_states[0].path_position = (ms % 3000) as f32;
            f
        })
        .collect()
}

/// [`recording`] encoded as a `flavor` replay file.
pub fn encoded_recording(frames: usize, flavor: GameFlavor) -> Result<Vec<u8>, ReplayError> {
    ReplayWriter::new(flavor, "Benchmark").encode(&recording(frames))
}
