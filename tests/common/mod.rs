//! One-dimensional block world shared by the end-to-end tests.
//!
//! Blocks have unit width and sit at a single coordinate. Regions are
//! closed intervals on the same axis; a pose is contained in a region when
//! the whole block fits inside it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kyroplan::generator::{from_gen_fn, from_list_gen_fn, GenFn};
use kyroplan::{ActionSchema, Atom, Domain, Predicate, Stream, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const BLOCK_WIDTH: f64 = 1.0;

pub fn params(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

/// Interval of a named region; unknown regions are empty.
pub fn region_bounds(region: &Value) -> (f64, f64) {
    match region.as_string() {
        Some("red") => (5.0, 10.0),
        Some("grey") => (0.0, 4.0),
        _ => (0.0, 0.0),
    }
}

/// Interval of block centres that keep the block inside the region.
pub fn placement_interval(region: &Value) -> (f64, f64) {
    let (lo, hi) = region_bounds(region);
    (lo + BLOCK_WIDTH / 2.0, hi - BLOCK_WIDTH / 2.0)
}

pub fn collision_free(block: &Value, pose: f64, other: &Value, other_pose: f64) -> bool {
    block == other || (pose - other_pose).abs() >= BLOCK_WIDTH
}

/// `pick` and `place` over `at-pose`, `holding` and `hand-empty`.
pub fn pick_place_domain() -> Domain {
    Domain::new(vec![
        ActionSchema::new("pick", &["?b", "?p"])
            .precondition(Atom::from_symbols("at-pose", &["?b", "?p"]))
            .precondition(Atom::from_symbols("hand-empty", &[]))
            .add(Atom::from_symbols("holding", &["?b"]))
            .delete(Atom::from_symbols("at-pose", &["?b", "?p"]))
            .delete(Atom::from_symbols("hand-empty", &[])),
        ActionSchema::new("place", &["?b", "?p", "?r"])
            .precondition(Atom::from_symbols("holding", &["?b"]))
            .precondition(Atom::from_symbols("contained", &["?b", "?p", "?r"]))
            .add(Atom::from_symbols("at-pose", &["?b", "?p"]))
            .add(Atom::from_symbols("on", &["?b", "?r"]))
            .add(Atom::from_symbols("hand-empty", &[]))
            .delete(Atom::from_symbols("holding", &["?b"])),
    ])
}

/// `sample-pose(?b ?r) -> ?p` certifying `pose` and `contained`.
pub fn sample_pose_stream(gen_fn: GenFn) -> Stream {
    Stream::new(
        "sample-pose",
        gen_fn,
        params(&["?b", "?r"]),
        vec![Atom::from_symbols("placeable", &["?b", "?r"])],
        params(&["?p"]),
        vec![
            Atom::from_symbols("pose", &["?b", "?p"]),
            Atom::from_symbols("contained", &["?b", "?p", "?r"]),
        ],
    )
    .unwrap()
}

/// Uniform poses inside the region, from a seeded generator per instance.
pub fn uniform_poses(seed: u64) -> GenFn {
    from_gen_fn(move |inputs: &[Value]| {
        let (lo, hi) = placement_interval(&inputs[1]);
        let mut rng = StdRng::seed_from_u64(seed);
        std::iter::repeat_with(move || vec![Value::Float(rng.gen_range(lo..=hi))])
    })
}

/// Uniform poses that also count every step taken.
pub fn counted_poses(seed: u64, steps: Arc<AtomicUsize>) -> GenFn {
    from_gen_fn(move |inputs: &[Value]| {
        let (lo, hi) = placement_interval(&inputs[1]);
        let mut rng = StdRng::seed_from_u64(seed);
        let steps = Arc::clone(&steps);
        std::iter::repeat_with(move || {
            steps.fetch_add(1, Ordering::SeqCst);
            vec![Value::Float(rng.gen_range(lo..=hi))]
        })
    })
}

/// A sampler that never produces a pose and never gives up.
pub fn hopeless_poses() -> GenFn {
    from_list_gen_fn(|_: &[Value]| std::iter::repeat_with(Vec::new))
}

/// `cfree(?b ?p ?o ?q)`: block `?b` at `?p` does not overlap `?o` at `?q`.
pub fn cfree_predicate() -> Predicate {
    Predicate::new(
        "cfree",
        Arc::new(|inputs: &[Value]| {
            let pose = inputs[1].as_float().unwrap_or(f64::NAN);
            let other_pose = inputs[3].as_float().unwrap_or(f64::NAN);
            Ok(collision_free(&inputs[0], pose, &inputs[2], other_pose))
        }),
        params(&["?b", "?p", "?o", "?q"]),
        vec![
            Atom::from_symbols("pose", &["?b", "?p"]),
            Atom::from_symbols("pose", &["?o", "?q"]),
        ],
    )
    .unwrap()
}
