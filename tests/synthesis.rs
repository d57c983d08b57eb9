use gr1_rs::domain::{Domain, Player, Valuation, Value};
use gr1_rs::error::Error;
use gr1_rs::game::{Game, GameConfig};
use gr1_rs::machine::Controller;
use gr1_rs::simulate::{random_run, RandomSampler};
use gr1_rs::solver::{Outcome, Solver, SolverConfig};
use gr1_rs::spec::{SpecBuilder, Specification};
use gr1_rs::strategy::Extractor;
use test_log::test;

/// Two environment flags, two system counters that must alternate `p`
/// while never raising both counters at once.
fn alternation() -> Specification {
    let mut builder = SpecBuilder::new();
    builder.env_var("e1", Domain::Bool).unwrap();
    builder.env_var("e2", Domain::Bool).unwrap();
    builder.sys_var("p", Domain::int(0, 1)).unwrap();
    builder.sys_var("q", Domain::int(0, 1)).unwrap();
    builder.env_init("!e1 & !e2");
    builder.env_progress("e1");
    builder.sys_init("p = 0");
    builder.sys_init("q = 0");
    builder.sys_safety("X p != p");
    builder.sys_safety("!(X p = 1 & X q = 1)");
    builder.sys_progress("p = 1");
    builder.build().unwrap()
}

/// Grant only what is requested, and grant infinitely often.
fn arbiter() -> Specification {
    let mut builder = SpecBuilder::new();
    builder.env_var("r", Domain::Bool).unwrap();
    builder.sys_var("g", Domain::Bool).unwrap();
    builder.env_progress("r");
    builder.sys_safety("X g -> X r");
    builder.sys_progress("g");
    builder.build().unwrap()
}

fn int(v: i64) -> Value {
    Value::Int(v)
}

fn solve(spec: &Specification) -> (Game, Outcome) {
    let game = Game::new(spec, &GameConfig::default()).unwrap();
    let outcome = Solver::new(&game, SolverConfig::default()).solve().unwrap();
    (game, outcome)
}

#[test]
fn test_alternation_is_realizable() {
    let spec = alternation();
    let (game, outcome) = solve(&spec);
    let Outcome::Realizable(solution) = outcome else {
        panic!("expected a realizable specification");
    };

    let initial = Valuation::new()
        .with("e1", Value::Bool(false))
        .with("e2", Value::Bool(false))
        .with("p", int(0))
        .with("q", int(0));
    assert!(game.contains(solution.winning(), &initial));

    let strategy = Extractor::new(&game, &solution).extract().unwrap();
    assert_eq!(strategy.initial().len(), 1);
    assert_eq!(strategy.node(strategy.initial()[&initial.project(spec.registry(), Player::Env)]).state, initial);
}

#[test]
fn test_alternation_strategy_alternates() {
    let strategy = gr1_rs::synthesize(&alternation()).unwrap();
    let trace = random_run(&strategy, 100, &mut RandomSampler::new(2024)).unwrap();
    assert_eq!(trace.len(), 100);

    for (step, (_, output)) in trace.iter().enumerate() {
        let expected = if step % 2 == 0 { 0 } else { 1 };
        assert_eq!(output.get("p"), Some(int(expected)), "step {}", step);
        assert!(!(output.get("p") == Some(int(1)) && output.get("q") == Some(int(1))));
    }
}

#[test]
fn test_unsatisfiable_system_init_is_unrealizable() {
    let mut builder = SpecBuilder::new();
    builder.env_var("a", Domain::Bool).unwrap();
    builder.sys_var("x", Domain::int(0, 3)).unwrap();
    builder.sys_init("x = 0");
    builder.sys_init("x = 1");
    let spec = builder.build().unwrap();

    let (_, outcome) = solve(&spec);
    let Outcome::Unrealizable(diagnostic) = outcome else {
        panic!("expected an unrealizable specification");
    };
    assert!(diagnostic.losing_initial.is_none());
    assert!(matches!(gr1_rs::synthesize(&spec), Err(Error::Unrealizable(_))));
}

#[test]
fn test_solving_is_idempotent() {
    let spec = arbiter();
    let game = Game::new(&spec, &GameConfig::default()).unwrap();
    let solver = Solver::new(&game, SolverConfig::default());
    let first = match solver.solve().unwrap() {
        Outcome::Realizable(solution) => solution,
        Outcome::Unrealizable(d) => panic!("unrealizable: {}", d),
    };
    let second = match solver.solve().unwrap() {
        Outcome::Realizable(solution) => solution,
        Outcome::Unrealizable(d) => panic!("unrealizable: {}", d),
    };
    // Canonical nodes in a shared manager: equal sets have equal references.
    assert_eq!(first.winning(), second.winning());

    // A fresh manager gives a region of the same size.
    let (other, outcome) = solve(&spec);
    let Outcome::Realizable(third) = outcome else {
        panic!("expected a realizable specification");
    };
    assert_eq!(game.count(first.winning()), other.count(third.winning()));
}

#[test]
fn test_strategy_soundness() {
    let spec = alternation();
    let strategy = gr1_rs::synthesize(&spec).unwrap();
    let sys_safety = spec.formulas(gr1_rs::spec::Section::SysSafety);

    // Every reachable transition of the machine respects every system safety formula.
    for (id, node) in strategy.nodes().iter().enumerate() {
        for &next in strategy.transitions(id).values() {
            let next_state = &strategy.node(next).state;
            for formula in sys_safety {
                assert!(
                    gr1_rs::formula::evaluate(formula, &node.state, next_state).unwrap(),
                    "{} violated from {} to {}",
                    formula,
                    node.state,
                    next_state
                );
            }
        }
    }
}

#[test]
fn test_strategy_liveness() {
    let strategy = gr1_rs::synthesize(&arbiter()).unwrap();
    let trace = random_run(&strategy, 200, &mut RandomSampler::new(11)).unwrap();
    let granted = |v: &Valuation| v.get("g") == Some(Value::Bool(true));
    let requested = |v: &Valuation| v.get("r") == Some(Value::Bool(true));

    assert!(trace.iter().any(|(input, _)| requested(input)));
    for pair in trace.windows(2) {
        let (_, prev_output) = &pair[0];
        let (input, output) = &pair[1];
        if granted(output) {
            assert!(requested(input));
        }
        // A pending goal is served at the first request.
        if !granted(prev_output) && requested(input) {
            assert!(granted(output));
        }
    }
}

#[test]
fn test_moore_hides_current_input() {
    let mut builder = SpecBuilder::new();
    builder.env_var("a", Domain::Bool).unwrap();
    builder.sys_var("b", Domain::Bool).unwrap();
    builder.sys_safety("X b <-> X a");
    let mealy = builder.build().unwrap();
    builder.moore(true);
    let moore = builder.build().unwrap();

    assert!(solve(&mealy).1.is_realizable());
    assert!(!solve(&moore).1.is_realizable());
}

#[test]
fn test_moore_outputs_do_not_depend_on_input() {
    let mut builder = SpecBuilder::new();
    builder.env_var("a", Domain::Bool).unwrap();
    builder.sys_var("b", Domain::Bool).unwrap();
    builder.sys_safety("X b <-> a");
    builder.moore(true);
    let strategy = gr1_rs::synthesize(&builder.build().unwrap()).unwrap();

    for id in 0..strategy.nodes().len() {
        let outputs: Vec<Valuation> = strategy.transitions(id).values().map(|&next| strategy.output(next)).collect();
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    }

    let mut controller = Controller::new(&strategy);
    let a = |v: bool| Valuation::new().with("a", Value::Bool(v));
    controller.step(&a(true)).unwrap();
    assert_eq!(controller.step(&a(false)).unwrap().get("b"), Some(Value::Bool(true)));
    assert_eq!(controller.step(&a(false)).unwrap().get("b"), Some(Value::Bool(false)));
}
