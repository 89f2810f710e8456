mod common;

use std::sync::{Arc, Mutex};

use common::{cfree_predicate, collision_free, params, placement_interval};
use kyroplan::generator::from_generator_fn;
use kyroplan::{
    solve_focused, ActionSchema, Atom, BestFirstPlanner, Domain, External, FocusedConfig, Generator, OutputValues,
    Predicate, Problem, SamplerError, SolveStatus, Stream, StreamContext, Value,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produced poses, flagged when obstacles from the context constrained them.
type PoseLog = Arc<Mutex<Vec<(f64, bool)>>>;

/// Samples poses for one block, rejecting those that overlap the other
/// blocks the rest of the plan checks it against.
struct PoseGenerator {
    block: Value,
    interval: (f64, f64),
    rng: StdRng,
    log: PoseLog,
}

impl PoseGenerator {
    const MAX_REJECTIONS: usize = 200;

    fn new(block: Value, region: &Value, seed: u64, log: PoseLog) -> Self {
        Self {
            block,
            interval: placement_interval(region),
            rng: StdRng::seed_from_u64(seed),
            log,
        }
    }

    fn obstacles(&self, context: &StreamContext) -> Vec<(Value, f64)> {
        context
            .get("cfree")
            .iter()
            .filter(|args| args.first() == Some(&Some(self.block.clone())) && args.get(1) == Some(&None))
            .filter_map(|args| {
                let other = args.get(2)?.clone()?;
                let pose = args.get(3)?.as_ref()?.as_float()?;
                Some((other, pose))
            })
            .collect()
    }

    fn draw(&mut self) -> f64 {
        let (lo, hi) = self.interval;
        self.rng.gen_range(lo..=hi)
    }
}

impl Generator for PoseGenerator {
    fn generate(&mut self, context: Option<&StreamContext>) -> Result<Vec<OutputValues>, SamplerError> {
        let obstacles = context.map(|c| self.obstacles(c)).unwrap_or_default();
        for _ in 0..Self::MAX_REJECTIONS {
            let pose = self.draw();
            if obstacles
                .iter()
                .all(|(other, q)| collision_free(&self.block, pose, other, *q))
            {
                if let Ok(mut log) = self.log.lock() {
                    log.push((pose, !obstacles.is_empty()));
                }
                return Ok(vec![vec![Value::Float(pose)]]);
            }
        }
        Ok(Vec::new())
    }

    fn is_enumerated(&self) -> bool {
        false
    }

    fn uses_context(&self) -> bool {
        true
    }
}

fn sample_free_pose(seed: u64, log: &PoseLog) -> Stream {
    let log = Arc::clone(log);
    Stream::new(
        "sample-pose",
        from_generator_fn(move |inputs: &[Value]| {
            PoseGenerator::new(inputs[0].clone(), &inputs[1], seed, Arc::clone(&log))
        }),
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

/// The `cfree` test registered with `problem`.
fn registered_cfree(problem: &Problem) -> &Predicate {
    problem
        .externals()
        .iter()
        .find_map(|e| match e {
            External::Predicate(p) if e.name() == "cfree" => Some(p),
            _ => None,
        })
        .unwrap()
}

fn place_beside_domain() -> Domain {
    Domain::new(vec![ActionSchema::new("place", &["?b", "?p", "?r", "?o", "?q"])
        .precondition(Atom::from_symbols("unplaced", &["?b"]))
        .precondition(Atom::from_symbols("contained", &["?b", "?p", "?r"]))
        .precondition(Atom::from_symbols("at-pose", &["?o", "?q"]))
        .precondition(Atom::from_symbols("cfree", &["?b", "?p", "?o", "?q"]))
        .add(Atom::from_symbols("on", &["?b", "?r"]))
        .add(Atom::from_symbols("at-pose", &["?b", "?p"]))
        .delete(Atom::from_symbols("unplaced", &["?b"]))])
}

#[test]
fn context_steers_samples_away_from_collisions() {
    let log: PoseLog = Arc::default();
    let problem = Problem::builder(place_beside_domain())
        .external(sample_free_pose(23, &log))
        .external(cfree_predicate())
        .init("placeable", [Value::from("A"), Value::from("red")])
        .init("unplaced", [Value::from("A")])
        .init("at-pose", [Value::from("B"), Value::Float(6.0)])
        .init("pose", [Value::from("B"), Value::Float(6.0)])
        .goal("on", [Value::from("A"), Value::from("red")])
        .build()
        .unwrap();

    let solution = solve_focused(&problem, &BestFirstPlanner::default(), &FocusedConfig::default()).unwrap();

    assert_eq!(solution.status, SolveStatus::Solved);
    let plan = solution.plan.unwrap();
    assert_eq!(plan.len(), 1);
    let pose = plan[0].args[1].as_float().unwrap();
    assert_eq!(plan[0].args[3], Value::from("B"));
    assert!(collision_free(&Value::from("A"), pose, &Value::from("B"), 6.0));

    let cfree = registered_cfree(&problem);
    for step in &plan {
        let inputs = [step.args[0].clone(), step.args[1].clone(), step.args[3].clone(), step.args[4].clone()];
        assert!(cfree.test(&inputs).unwrap(), "{inputs:?} collides");
    }

    let produced = log.lock().unwrap().clone();
    assert!(produced.iter().any(|(_, constrained)| *constrained));
    for (pose, _) in produced.iter().filter(|(_, constrained)| *constrained) {
        let inputs = [Value::from("A"), Value::Float(*pose), Value::from("B"), Value::Float(6.0)];
        assert!(cfree.test(&inputs).unwrap(), "sampled pose {pose} collides with B");
        assert!(collision_free(&Value::from("A"), *pose, &Value::from("B"), 6.0));
    }
}

#[test]
fn generator_honours_cfree_entries_in_context() {
    let log: PoseLog = Arc::default();
    let mut generator = PoseGenerator::new(Value::from("A"), &Value::from("red"), 4, Arc::clone(&log));
    let mut context = StreamContext::new();
    context.insert(
        "cfree",
        vec![Some(Value::from("A")), None, Some(Value::from("B")), Some(Value::Float(6.0))],
    );
    context.insert(
        "cfree",
        vec![Some(Value::from("A")), None, Some(Value::from("C")), Some(Value::Float(8.5))],
    );

    let cfree = cfree_predicate();
    for _ in 0..20 {
        let batch = generator.generate(Some(&context)).unwrap();
        let pose = batch[0][0].clone();
        for (other, q) in [("B", 6.0), ("C", 8.5)] {
            let inputs = [Value::from("A"), pose.clone(), Value::from(other), Value::Float(q)];
            assert!(cfree.test(&inputs).unwrap(), "{pose} collides with {other}");
        }
    }

    let (lo, hi) = placement_interval(&Value::from("red"));
    let batch = generator.generate(None).unwrap();
    let pose = batch[0][0].as_float().unwrap();
    assert!((lo..=hi).contains(&pose));
    assert_eq!(log.lock().unwrap().len(), 21);
}

#[test]
fn entries_for_other_blocks_are_ignored() {
    let mut generator = PoseGenerator::new(Value::from("A"), &Value::from("red"), 8, Arc::default());
    let mut context = StreamContext::new();
    // Obstacles one width apart cover the whole region, but only for Z.
    for q in [5.5, 6.5, 7.5, 8.5, 9.5] {
        context.insert(
            "cfree",
            vec![Some(Value::from("Z")), None, Some(Value::from("B")), Some(Value::Float(q))],
        );
    }

    let batch = generator.generate(Some(&context)).unwrap();
    assert_eq!(batch.len(), 1);

    let mut blocked = PoseGenerator::new(Value::from("Z"), &Value::from("red"), 8, Arc::default());
    assert!(blocked.generate(Some(&context)).unwrap().is_empty());
}
