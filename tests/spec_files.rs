use std::collections::VecDeque;
use std::path::PathBuf;

use gr1_rs::domain::{Domain, Valuation, Value};
use gr1_rs::error::Error;
use gr1_rs::formula::{evaluate, Formula};
use gr1_rs::game::{Game, GameConfig};
use gr1_rs::machine::Controller;
use gr1_rs::simulate::{random_run, RandomSampler};
use gr1_rs::solver::{Outcome, Solver, SolverConfig};
use gr1_rs::spec::{InitMode, Section, Specification};
use gr1_rs::strategy::{Extractor, Strategy};
use test_log::test;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn test_segway_builds() {
    let spec = Specification::from_file(demo("segway.gr1")).unwrap();
    assert!(spec.moore());
    assert_eq!(spec.init_mode(), InitMode::ExistsForall);
    assert_eq!(spec.registry().get("batteryLevel").unwrap().domain, Domain::int(0, 15));
    assert_eq!(spec.formulas(Section::SysProgress).len(), 2);
    assert_eq!(spec.formulas(Section::EnvSafety).len(), 9);

    let game = Game::new(&spec, &GameConfig { bdd_bits: 20 }).unwrap();
    let bdd = game.bdd();
    assert!(!bdd.is_zero(game.theta_s()));
    assert!(!bdd.is_zero(game.rho_e()));
    assert!(!bdd.is_zero(game.rho_s()));
}

fn segway_strategy() -> (Specification, Strategy) {
    let spec = Specification::from_file(demo("segway.gr1")).unwrap();
    let game = Game::new(&spec, &GameConfig { bdd_bits: 20 }).unwrap();
    let Outcome::Realizable(solution) = Solver::new(&game, SolverConfig::default()).solve().unwrap() else {
        panic!("the segway must be realizable");
    };
    let strategy = Extractor::new(&game, &solution).extract().unwrap();
    (spec, strategy)
}

fn holds(formula: &Formula, state: &Valuation) -> bool {
    evaluate(formula, state, &Valuation::new()).unwrap()
}

/// Nodes reachable from `from` in one or more steps, staying inside `allowed`.
fn reachable(strategy: &Strategy, from: usize, allowed: &[bool]) -> Vec<bool> {
    let mut seen = vec![false; strategy.nodes().len()];
    let mut queue = VecDeque::from([from]);
    while let Some(id) = queue.pop_front() {
        for &next in strategy.transitions(id).values() {
            if allowed[next] && !seen[next] {
                seen[next] = true;
                queue.push_back(next);
            }
        }
    }
    seen
}

#[test]
fn test_segway_starts_where_the_environment_can_move() {
    let (spec, strategy) = segway_strategy();
    let present_only: Vec<&Formula> = spec
        .formulas(Section::EnvSafety)
        .iter()
        .filter(|f| !f.has_next())
        .collect();
    assert!(!present_only.is_empty());

    assert!(!strategy.initial().is_empty());
    for &id in strategy.initial().values() {
        let state = &strategy.node(id).state;
        for formula in &present_only {
            assert!(holds(formula, state), "{} violated by {}", formula, state);
        }
        assert!(!strategy.transitions(id).is_empty(), "dead start {}", state);
    }

    for seed in 0..10 {
        let trace = random_run(&strategy, 100, &mut RandomSampler::new(seed)).unwrap();
        assert_eq!(trace.len(), 100, "seed {}", seed);
    }
}

#[test]
fn test_segway_strategy_is_live() {
    let (spec, strategy) = segway_strategy();
    let n = strategy.nodes().len();
    let env_goals = spec.formulas(Section::EnvProgress);
    let sys_goals = spec.formulas(Section::SysProgress);
    assert_eq!((env_goals.len(), sys_goals.len()), (1, 2));

    // A run that stays away from a system goal forever must eventually
    // stay away from some environment goal too: no cycle avoiding a system
    // goal may visit every environment goal.
    for goal in sys_goals {
        let avoiding: Vec<bool> = strategy.nodes().iter().map(|node| !holds(goal, &node.state)).collect();
        let reach: Vec<Vec<bool>> = (0..n)
            .map(|id| if avoiding[id] { reachable(&strategy, id, &avoiding) } else { vec![false; n] })
            .collect();
        for id in (0..n).filter(|&id| avoiding[id] && reach[id][id]) {
            let cycle: Vec<usize> = (0..n).filter(|&other| reach[id][other] && reach[other][id]).collect();
            let fair = env_goals
                .iter()
                .all(|env_goal| cycle.iter().any(|&other| holds(env_goal, &strategy.node(other).state)));
            assert!(
                !fair,
                "cycle through {} avoids '{}' while meeting every assumption",
                strategy.node(id).state,
                goal
            );
        }
    }
}

#[test]
fn test_alternation_file() {
    let spec = Specification::from_file(demo("alternation.gr1")).unwrap();
    let strategy = gr1_rs::synthesize(&spec).unwrap();

    let mut controller = Controller::new(&strategy);
    let quiet = controller.allowed_inputs().next().unwrap().clone();
    let outputs: Vec<Option<Value>> = (0..6).map(|_| controller.step(&quiet).unwrap().get("p")).collect();
    let expected: Vec<Option<Value>> = [0, 1, 0, 1, 0, 1].into_iter().map(|v| Some(Value::Int(v))).collect();
    assert_eq!(outputs, expected);
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        Specification::from_file(demo("no-such-spec.gr1")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_parse_errors_carry_location() {
    let text = "[SYS_VARS]\nx: 0..3\n[SYS_SAFETY]\nX x = (x + 1\n";
    match Specification::parse(text) {
        Err(Error::SyntaxError { text, offset, .. }) => {
            assert_eq!(text, "X x = (x + 1");
            assert_eq!(offset, text.len());
        }
        other => panic!("unexpected {:?}", other),
    }

    let text = "[SYS_VARS]\nx: 0..3\n[SYS_INIT]\nx = y\n";
    match Specification::parse(text) {
        Err(Error::UnboundVariable { name, formula }) => {
            assert_eq!(name, "y");
            assert_eq!(formula, "x = y");
        }
        other => panic!("unexpected {:?}", other),
    }

    let text = "[SYS_VARS]\nx: 0..3\n[SYS_INIT]\nx + 1\n";
    assert!(matches!(Specification::parse(text), Err(Error::TypeMismatch { .. })));
}
