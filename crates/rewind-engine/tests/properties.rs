//! Property tests for frame blending and replay loading.

use glam::DVec3;
use proptest::prelude::*;
use rewind_core::{BindingContext, BindingRegistry, Frame, GameFlavor, MpState};
use rewind_engine::interpolate::interpolate_mp_state;
use rewind_engine::{interpolate_frame, InterpolationPolicy, PlaybackDirection, RewindManager};
use rewind_replay::ReplayWriter;
use rewind_test_utils::fixtures::sample_frame;
use rewind_test_utils::MockBridge;

const DURATIONS: [f64; 2] = [1000.0, 3000.0];

fn blend(one: &Frame, two: &Frame, ratio: f64, delta: f64, flavor: GameFlavor) -> Frame {
    let registry = BindingRegistry::new();
    let mut bridge = MockBridge::new();
    let mut ctx = BindingContext::new(&registry, &mut bridge);
    let policy = InterpolationPolicy::new(flavor, PlaybackDirection::Rewind)
        .with_path_durations(&DURATIONS);
    interpolate_frame(one, two, ratio, delta, &policy, &mut ctx)
}

fn coord() -> impl Strategy<Value = f64> {
    -1.0e4..1.0e4f64
}

fn vec3() -> impl Strategy<Value = DVec3> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| DVec3::new(x, y, z))
}

prop_compose! {
    fn frame()(ms in 0..1_000_000i32, delta in 1..100i32, position in vec3(),
               velocity in vec3(), spin in vec3()) -> Frame {
        let mut f = sample_frame(ms, delta);
        f.elapsed_time = ms;
        f.position = position;
        f.velocity = velocity;
        f.spin = spin;
        f
    }
}

proptest! {
    #[test]
    fn blending_a_frame_with_itself_is_identity(f in frame(), ratio in 0.0..=1.0f64) {
        let out = blend(&f, &f, ratio, f64::from(f.delta_ms), GameFlavor::Mbp);
        prop_assert_eq!(out, f);
    }

    #[test]
    fn endpoints_reproduce_continuous_fields(a in frame(), b in frame()) {
        let at0 = blend(&a, &b, 0.0, 0.0, GameFlavor::Mbg);
        prop_assert_eq!(at0.position, a.position);
        prop_assert_eq!(at0.velocity, a.velocity);
        prop_assert_eq!(at0.spin, a.spin);
        prop_assert_eq!(at0.ms, a.ms);
        prop_assert_eq!(at0.elapsed_time, a.elapsed_time);

        let at1 = blend(&a, &b, 1.0, 0.0, GameFlavor::Mbg);
        prop_assert_eq!(at1.position, b.position);
        prop_assert_eq!(at1.velocity, b.velocity);
        prop_assert_eq!(at1.spin, b.spin);
        prop_assert_eq!(at1.ms, b.ms);
        prop_assert_eq!(at1.elapsed_time, b.elapsed_time);
    }

    #[test]
    fn teleport_snaps_to_the_nearer_frame(a in frame(), b in frame(), ratio in 0.0..=1.0f64) {
        let mut b = b;
        b.teleport.counter = a.teleport.counter + 1;
        let out = blend(&a, &b, ratio, 0.0, GameFlavor::Mbp);
        let near = if ratio > 0.5 { &b } else { &a };
        prop_assert_eq!(out.position, near.position);
        prop_assert_eq!(out.velocity, near.velocity);
        prop_assert_eq!(out.spin, near.spin);
    }

    #[test]
    fn looping_platform_blends_through_the_wrap(
        a in 2900.0..3000.0f32,
        b in 0.0..100.0f32,
        ratio in 0.0..=1.0f64,
    ) {
        let total = 3000.0;
        let out = interpolate_mp_state(
            MpState::new(a, MpState::LOOP_FORWARD),
            MpState::new(b, MpState::LOOP_FORWARD),
            total,
            ratio,
            PlaybackDirection::Replay,
        );
        let p = out.path_position;
        let eps = 1e-2;
        prop_assert!(
            (p >= a - eps && p < total as f32) || (p >= 0.0 && p <= b + eps),
            "{p} outside [{a}, {total}) and [0, {b}]"
        );
    }

    #[test]
    fn loaded_elapsed_times_never_decrease(deltas in prop::collection::vec(-20..50i32, 1..40)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.rrec");
        let mut ms = 0;
        let frames: Vec<Frame> = deltas
            .iter()
            .map(|&d| {
                ms += d.max(0);
                Frame::with_clock(ms, d)
            })
            .collect();
        ReplayWriter::new(GameFlavor::Mbg, "none").save(&path, &frames).unwrap();

        let mut m = RewindManager::new(GameFlavor::Mbg);
        m.load(&path, false).unwrap();

        let kept = deltas.iter().filter(|&&d| d >= 0).count();
        prop_assert_eq!(m.frame_count(), kept);
        prop_assert!(m.frames().windows(2).all(|w| w[0].elapsed_time <= w[1].elapsed_time));
    }
}

#[test]
fn wrap_midpoint_lands_just_before_the_end() {
    let out = interpolate_mp_state(
        MpState::new(2995.0, MpState::LOOP_FORWARD),
        MpState::new(3.0, MpState::LOOP_FORWARD),
        3000.0,
        0.5,
        PlaybackDirection::Replay,
    );
    assert_eq!(out.path_position, 2999.0);
}
