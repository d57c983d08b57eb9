//! GR(1) winning-region computation.
//!
//! The solver runs the classic three-nested fixpoint
//!
//! ```text
//! νZ. ⋀_j μY. ⋁_i νX. (J_j ∧ cpre(Z)) ∨ cpre(Y) ∨ (¬J^e_i ∧ cpre(X))
//! ```
//!
//! where `J_j` ranges over system goals and `J^e_i` over environment goals.
//! System goals are processed in round-robin order, each one shrinking `Z`
//! in place. The `Y` and `X` iterates of the last (stable) round are kept as
//! ranked layers, which is everything the strategy extractor needs.

use std::fmt;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::domain::{Player, Valuation};
use crate::error::{Error, Result};
use crate::game::Game;
use crate::reference::Ref;
use crate::spec::InitMode;

#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Cap on the total number of fixpoint iterations over all levels.
    pub iteration_limit: Option<usize>,
    /// Check that every iterate moves in the direction of its fixpoint.
    pub check_monotonicity: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iteration_limit: None,
            check_monotonicity: cfg!(debug_assertions),
        }
    }
}

/// Fixpoint level of the solver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// `νZ`, the winning region.
    Outer,
    /// `μY`, attraction towards a system goal.
    Middle,
    /// `νX`, waiting out an environment goal.
    Inner,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Outer => write!(f, "outer fixpoint (Z)"),
            Phase::Middle => write!(f, "middle fixpoint (Y)"),
            Phase::Inner => write!(f, "inner fixpoint (X)"),
        }
    }
}

/// Solver state at the moment an iteration bound was hit.
#[derive(Debug, Clone)]
pub struct SolverSnapshot {
    pub phase: Phase,
    pub sys_goal: Option<usize>,
    pub env_goal: Option<usize>,
    pub outer_iterations: usize,
    pub middle_iterations: usize,
    pub inner_iterations: usize,
    pub total_iterations: usize,
    /// Number of states in the current `Z`, `Y` and `X` iterates.
    pub z_size: BigUint,
    pub y_size: BigUint,
    pub x_size: BigUint,
}

/// Winning region together with the ranked layers of the last round.
#[derive(Debug, Clone)]
pub struct Solution {
    winning: Ref,
    /// `y[j][r]`: states from which goal `j` is reached within `r` rounds; `y[j][0]` is empty.
    y: Vec<Vec<Ref>>,
    /// `x[j][r][i]`: the inner fixpoint for env goal `i` in round `r` of goal `j`.
    x: Vec<Vec<Vec<Ref>>>,
    iterations: usize,
}

impl Solution {
    /// The winning region.
    pub fn winning(&self) -> Ref {
        self.winning
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn layers(&self, sys_goal: usize) -> &[Ref] {
        &self.y[sys_goal]
    }

    pub fn blocking(&self, sys_goal: usize, rank: usize) -> &[Ref] {
        &self.x[sys_goal][rank]
    }

    /// The least `r ≥ 1` such that the state is in `y[j][r]`.
    pub fn rank(&self, game: &Game, sys_goal: usize, state: &Valuation) -> Option<usize> {
        self.y[sys_goal]
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, &layer)| game.contains(layer, state))
            .map(|(r, _)| r)
    }
}

/// Why a specification is unrealizable.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub init_mode: InitMode,
    /// First initial state (in enumeration order) outside the winning region.
    pub losing_initial: Option<Valuation>,
    pub winning_size: BigUint,
    pub initial_size: BigUint,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.initial_size.is_zero() {
            return write!(f, "the initial condition is unsatisfiable");
        }
        write!(
            f,
            "initial condition not won under {} ({} winning states, {} initial states",
            self.init_mode, self.winning_size, self.initial_size
        )?;
        if let Some(state) = &self.losing_initial {
            write!(f, ", losing from {}", state)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Realizable(Solution),
    Unrealizable(Diagnostic),
}

impl Outcome {
    pub fn is_realizable(&self) -> bool {
        matches!(self, Outcome::Realizable(_))
    }
}

#[derive(Debug, Clone)]
struct Counters {
    sys_goal: Option<usize>,
    env_goal: Option<usize>,
    outer: usize,
    middle: usize,
    inner: usize,
    total: usize,
    z: Ref,
    y: Ref,
    x: Ref,
}

pub struct Solver<'g> {
    game: &'g Game,
    config: SolverConfig,
    /// Per-fixpoint iteration bound: the number of valid states plus one.
    bound: usize,
}

impl<'g> Solver<'g> {
    pub fn new(game: &'g Game, config: SolverConfig) -> Self {
        let states = game.count(game.valid());
        let bound = states.to_usize().map_or(usize::MAX, |n| n.saturating_add(1));
        Self { game, config, bound }
    }

    fn snapshot(&self, phase: Phase, c: &Counters) -> Box<SolverSnapshot> {
        Box::new(SolverSnapshot {
            phase,
            sys_goal: c.sys_goal,
            env_goal: c.env_goal,
            outer_iterations: c.outer,
            middle_iterations: c.middle,
            inner_iterations: c.inner,
            total_iterations: c.total,
            z_size: self.game.count(c.z),
            y_size: self.game.count(c.y),
            x_size: self.game.count(c.x),
        })
    }

    /// Account for one more iterate at `phase`, failing once a bound is exceeded.
    fn tick(&self, phase: Phase, c: &mut Counters) -> Result<()> {
        c.total += 1;
        let level = match phase {
            Phase::Outer => &mut c.outer,
            Phase::Middle => &mut c.middle,
            Phase::Inner => &mut c.inner,
        };
        *level += 1;
        let level = *level;

        let limit = if level > self.bound {
            Some(self.bound)
        } else {
            self.config.iteration_limit.filter(|&limit| c.total > limit)
        };
        if let Some(limit) = limit {
            let snapshot = self.snapshot(phase, c);
            log::error!("iteration limit {} exceeded: {:?}", limit, snapshot);
            return Err(Error::IterationLimitExceeded { limit, snapshot });
        }
        Ok(())
    }

    fn check_monotone(&self, phase: Phase, smaller: Ref, larger: Ref) -> Result<()> {
        if self.config.check_monotonicity && !self.game.bdd().is_implies(smaller, larger) {
            return Err(Error::InvariantViolation(format!("{} iterate is not monotone", phase)));
        }
        Ok(())
    }

    /// Compute the winning region and decide realizability.
    pub fn solve(&self) -> Result<Outcome> {
        let game = self.game;
        let bdd = game.bdd();
        let n = game.sys_goals().len();
        let m = game.env_goals().len();
        log::info!(
            "solving: {} system goals, {} environment goals, bound {} per fixpoint",
            n,
            m,
            self.bound
        );

        let mut c = Counters {
            sys_goal: None,
            env_goal: None,
            outer: 0,
            middle: 0,
            inner: 0,
            total: 0,
            z: game.valid(),
            y: bdd.zero,
            x: bdd.zero,
        };
        let mut y_layers = vec![Vec::new(); n];
        let mut x_layers = vec![Vec::new(); n];

        loop {
            self.tick(Phase::Outer, &mut c)?;
            let z_old = c.z;

            for j in 0..n {
                c.sys_goal = Some(j);
                c.middle = 0;
                let start_j = bdd.apply_and(game.sys_goals()[j], game.cpre(c.z));

                c.y = bdd.zero;
                let mut ys = vec![bdd.zero];
                let mut xs = vec![vec![bdd.zero; m]];
                loop {
                    self.tick(Phase::Middle, &mut c)?;
                    let start = bdd.apply_or(start_j, game.cpre(c.y));

                    let mut y_new = bdd.zero;
                    let mut round = Vec::with_capacity(m);
                    for i in 0..m {
                        c.env_goal = Some(i);
                        c.inner = 0;
                        let avoid = bdd.apply_and(-game.env_goals()[i], game.valid());
                        c.x = game.valid();
                        loop {
                            self.tick(Phase::Inner, &mut c)?;
                            let x_new = bdd.apply_or(start, bdd.apply_and(avoid, game.cpre(c.x)));
                            self.check_monotone(Phase::Inner, x_new, c.x)?;
                            if x_new == c.x {
                                break;
                            }
                            c.x = x_new;
                        }
                        c.env_goal = None;
                        y_new = bdd.apply_or(y_new, c.x);
                        round.push(c.x);
                    }

                    self.check_monotone(Phase::Middle, c.y, y_new)?;
                    if y_new == c.y {
                        break;
                    }
                    c.y = y_new;
                    ys.push(y_new);
                    xs.push(round);
                }
                log::debug!(
                    "goal {}: {} layers, {} states attracted",
                    j,
                    ys.len() - 1,
                    game.count(c.y)
                );

                self.check_monotone(Phase::Outer, c.y, c.z)?;
                c.z = c.y;
                y_layers[j] = ys;
                x_layers[j] = xs;
            }
            c.sys_goal = None;

            log::debug!("outer iteration {}: {} winning states", c.outer, game.count(c.z));
            if c.z == z_old {
                break;
            }
        }

        let solution = Solution {
            winning: c.z,
            y: y_layers,
            x: x_layers,
            iterations: c.total,
        };
        log::info!(
            "winning region: {} states after {} iterations",
            game.count(solution.winning),
            c.total
        );

        if self.is_initially_winning(solution.winning) {
            Ok(Outcome::Realizable(solution))
        } else {
            Ok(Outcome::Unrealizable(self.diagnose(solution.winning)))
        }
    }

    /// Whether the initial condition holds under the specification's [`InitMode`].
    pub fn is_initially_winning(&self, winning: Ref) -> bool {
        let game = self.game;
        let bdd = game.bdd();
        let (theta_e, theta_s) = (game.theta_e(), game.theta_s());
        let env = game.present_vars(Some(Player::Env));
        let sys = game.present_vars(Some(Player::Sys));
        let all = game.present_vars(None);

        let start = bdd.apply_and_many([theta_e, theta_s, winning]);
        if bdd.is_zero(start) {
            return false;
        }
        let res = match game.spec().init_mode() {
            InitMode::ForallExists => {
                let answer = bdd.exists(bdd.apply_and(theta_s, winning), sys);
                bdd.forall(bdd.apply_imply(theta_e, answer), all)
            }
            InitMode::ExistsForall => {
                let answer = bdd.forall(bdd.apply_imply(theta_e, bdd.apply_and(theta_s, winning)), env);
                bdd.exists(answer, sys)
            }
            InitMode::ForallForall => bdd.forall(bdd.apply_imply(bdd.apply_and(theta_e, theta_s), winning), all),
            InitMode::ExistsExists => bdd.exists(start, all),
        };
        bdd.is_one(res)
    }

    fn diagnose(&self, winning: Ref) -> Diagnostic {
        let game = self.game;
        let bdd = game.bdd();
        let init = bdd.apply_and(game.theta_e(), game.theta_s());
        let losing = bdd.apply_and(init, -winning);
        let diagnostic = Diagnostic {
            init_mode: game.spec().init_mode(),
            losing_initial: game
                .registry()
                .valuations()
                .find(|state| game.contains(losing, state)),
            winning_size: game.count(winning),
            initial_size: game.count(init),
        };
        log::info!("unrealizable: {}", diagnostic);
        diagnostic
    }
}
