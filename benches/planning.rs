use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use kyroplan::generator::from_gen_fn;
use kyroplan::{
    solve_focused, solve_incremental, ActionSchema, Atom, BestFirstPlanner, Domain, FocusedConfig,
    IncrementalConfig, Predicate, Problem, Stream, Value,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn params(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

/// `blocks` blocks to be placed in the red region, each beside a fixed
/// obstacle that the sampled pose must not overlap.
fn block_world(blocks: usize) -> Problem {
    let place = ActionSchema::new("place", &["?b", "?p", "?r"])
        .precondition(Atom::from_symbols("unplaced", &["?b"]))
        .precondition(Atom::from_symbols("contained", &["?b", "?p", "?r"]))
        .precondition(Atom::from_symbols("cfree", &["?b", "?p", "?o", "?q"]))
        .precondition(Atom::from_symbols("at-pose", &["?o", "?q"]))
        .add(Atom::from_symbols("on", &["?b", "?r"]))
        .add(Atom::from_symbols("at-pose", &["?b", "?p"]))
        .delete(Atom::from_symbols("unplaced", &["?b"]));

    let sample_pose = Stream::new(
        "sample-pose",
        from_gen_fn(|_: &[Value]| {
            let mut rng = StdRng::seed_from_u64(7);
            std::iter::repeat_with(move || vec![Value::Float(rng.gen_range(5.5..=9.5))])
        }),
        params(&["?b", "?r"]),
        vec![Atom::from_symbols("placeable", &["?b", "?r"])],
        params(&["?p"]),
        vec![
            Atom::from_symbols("pose", &["?b", "?p"]),
            Atom::from_symbols("contained", &["?b", "?p", "?r"]),
        ],
    )
    .expect("valid stream");

    let cfree = Predicate::new(
        "cfree",
        Arc::new(|inputs: &[Value]| {
            let p = inputs[1].as_float().unwrap_or(f64::NAN);
            let q = inputs[3].as_float().unwrap_or(f64::NAN);
            Ok(inputs[0] == inputs[2] || (p - q).abs() >= 1.0)
        }),
        params(&["?b", "?p", "?o", "?q"]),
        vec![
            Atom::from_symbols("pose", &["?b", "?p"]),
            Atom::from_symbols("pose", &["?o", "?q"]),
        ],
    )
    .expect("valid predicate");

    let mut builder = Problem::builder(Domain::new(vec![place]))
        .external(sample_pose)
        .external(cfree)
        .init("at-pose", [Value::from("wall"), Value::Float(12.0)])
        .init("pose", [Value::from("wall"), Value::Float(12.0)]);
    for i in 0..blocks {
        let block = Value::from(format!("b{i}"));
        builder = builder
            .init("placeable", [block.clone(), Value::from("red")])
            .init("unplaced", [block.clone()])
            .goal("on", [block, Value::from("red")]);
    }
    builder.build().expect("valid problem")
}

fn bench_focused(c: &mut Criterion) {
    let mut group = c.benchmark_group("focused");
    group.throughput(Throughput::Elements(1));

    for blocks in [1, 2] {
        let problem = block_world(blocks);
        group.bench_function(format!("place_{blocks}_blocks"), |b| {
            b.iter(|| {
                let solution = solve_focused(&problem, &BestFirstPlanner::default(), &FocusedConfig::default())
                    .expect("solve");
                assert!(solution.is_solved());
            });
        });
    }

    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental");
    group.throughput(Throughput::Elements(1));

    let problem = block_world(1);
    group.bench_function("place_1_block", |b| {
        b.iter(|| {
            let solution = solve_incremental(&problem, &BestFirstPlanner::default(), &IncrementalConfig::default())
                .expect("solve");
            assert!(solution.is_solved());
        });
    });

    group.finish();
}

criterion_group!(planning, bench_focused, bench_incremental);
criterion_main!(planning);
