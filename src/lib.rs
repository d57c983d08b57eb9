//! # gr1-rs: GR(1) reactive synthesis over Binary Decision Diagrams
//!
//! **`gr1-rs`** turns a GR(1) specification (environment assumptions and system
//! guarantees over finite-domain variables) into a finite-state controller
//! that satisfies the guarantees against every environment honoring the
//! assumptions.
//!
//! ## What is GR(1)?
//!
//! Generalized Reactivity of rank 1 is the fragment of LTL of the form
//!
//! ```text
//! (θe ∧ □ρe ∧ ⋀ □◇J^e_i)  →  (θs ∧ □ρs ∧ ⋀ □◇J_j)
//! ```
//!
//! with initial conditions `θ`, safety (transition) constraints `ρ` and
//! progress goals `J`. Its realizability is decided by a three-nested fixpoint
//! in time polynomial in the size of the state space.
//!
//! ## Pipeline
//!
//! 1. [`spec`]: declare variables and formulas, build an immutable [`Specification`][spec::Specification].
//! 2. [`game`]: compile it into a symbolic [`Game`][game::Game] over a [`Bdd`][bdd::Bdd] manager.
//! 3. [`solver`]: compute the winning region and decide realizability.
//! 4. [`strategy`]: extract an explicit [`Strategy`][strategy::Strategy].
//! 5. [`machine`]: run it step by step with a [`Controller`][machine::Controller].
//!
//! ## Basic Usage
//!
//! ```rust
//! use gr1_rs::domain::{Domain, Valuation, Value};
//! use gr1_rs::machine::Controller;
//! use gr1_rs::spec::SpecBuilder;
//!
//! // The system must grant every request in the following step.
//! let mut builder = SpecBuilder::new();
//! builder.env_var("request", Domain::Bool)?;
//! builder.sys_var("grant", Domain::Bool)?;
//! builder.sys_init("!grant");
//! builder.sys_safety("X grant <-> request");
//! let spec = builder.build()?;
//!
//! let strategy = gr1_rs::synthesize(&spec)?;
//! let mut controller = Controller::new(&strategy);
//! let request = Valuation::new().with("request", Value::Bool(true));
//! controller.step(&request)?;
//! let output = controller.step(&request)?;
//! assert_eq!(output.get("grant"), Some(Value::Bool(true)));
//! # Ok::<(), gr1_rs::error::Error>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`bdd`]**: The BDD manager with complement edges, quantification and renaming.
//! - **[`domain`]**: Finite variable domains and their binary encoding.
//! - **[`formula`]**: Parsing, type checking, evaluation and compilation of constraints.
//! - **[`dot`]**: Visualizing strategies using Graphviz.
//! - **[`simulate`]**: Random runs of a strategy.

pub mod bdd;
pub mod cache;
pub mod domain;
pub mod dot;
pub mod error;
pub mod formula;
pub mod game;
pub mod machine;
pub mod reference;
pub mod sat;
pub mod simulate;
pub mod solver;
pub mod spec;
pub mod strategy;
pub mod table;
pub mod utils;

use crate::error::{Error, Result};
use crate::game::{Game, GameConfig};
use crate::solver::{Outcome, Solver, SolverConfig};
use crate::spec::Specification;
use crate::strategy::{Extractor, Strategy};

/// Solve `spec` with default settings and extract a strategy.
///
/// Unrealizability is reported as [`Error::Unrealizable`]; use [`Solver`]
/// directly to get the verdict as a value.
pub fn synthesize(spec: &Specification) -> Result<Strategy> {
    let game = Game::new(spec, &GameConfig::default())?;
    match Solver::new(&game, SolverConfig::default()).solve()? {
        Outcome::Realizable(solution) => Extractor::new(&game, &solution).extract(),
        Outcome::Unrealizable(diagnostic) => Err(Error::Unrealizable(diagnostic.to_string())),
    }
}
