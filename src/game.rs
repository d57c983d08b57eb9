//! The two-player game induced by a specification.
//!
//! The symbolic side holds the compiled constraints as BDDs over interleaved
//! present/next bits and provides the controllable predecessor operator used
//! by the solver. The explicit side builds game states and transitions one
//! at a time, on demand.

use std::collections::HashMap;

use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::domain::{Player, Registry, Valuation};
use crate::error::Result;
use crate::formula::compile;
use crate::reference::Ref;
use crate::spec::{Section, Specification};

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Initial capacity of the BDD manager, as a power of two.
    pub bdd_bits: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { bdd_bits: 16 }
    }
}

/// A position of the explicit game.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum GameState {
    /// The environment picks the next input.
    Env { current: Valuation },
    /// The system answers `input` with the next output.
    Sys { current: Valuation, input: Valuation },
}

impl GameState {
    pub fn current(&self) -> &Valuation {
        match self {
            GameState::Env { current } | GameState::Sys { current, .. } => current,
        }
    }
}

pub struct Game {
    spec: Specification,
    bdd: Bdd,

    env_present: Vec<u32>,
    sys_present: Vec<u32>,
    all_present: Vec<u32>,
    env_next: Vec<u32>,
    sys_next: Vec<u32>,
    to_next: HashMap<u32, u32>,

    /// Type-valid present states.
    valid: Ref,
    theta_e: Ref,
    theta_s: Ref,
    rho_e: Ref,
    rho_s: Ref,
    /// Present states in which the environment has a legal move.
    env_moves: Ref,
    env_goals: Vec<Ref>,
    sys_goals: Vec<Ref>,
}

impl Game {
    pub fn new(spec: &Specification, config: &GameConfig) -> Result<Self> {
        let bdd = Bdd::new(config.bdd_bits);
        let registry = spec.registry();

        let conjoin = |section: Section| -> Result<Ref> {
            let mut res = bdd.one;
            for formula in spec.formulas(section) {
                res = bdd.apply_and(res, compile(&bdd, registry, formula)?);
            }
            Ok(res)
        };
        let goals = |section: Section| -> Result<Vec<Ref>> {
            let mut res = spec
                .formulas(section)
                .iter()
                .map(|formula| compile(&bdd, registry, formula))
                .collect::<Result<Vec<_>>>()?;
            if res.is_empty() {
                res.push(bdd.one);
            }
            Ok(res)
        };

        let env_valid = registry.type_constraint(&bdd, &[Player::Env], false);
        let sys_valid = registry.type_constraint(&bdd, &[Player::Sys], false);
        let valid = bdd.apply_and(env_valid, sys_valid);

        let theta_e = bdd.apply_and(conjoin(Section::EnvInit)?, env_valid);
        let theta_s = bdd.apply_and(conjoin(Section::SysInit)?, sys_valid);
        let rho_e = bdd.apply_and(
            conjoin(Section::EnvSafety)?,
            registry.type_constraint(&bdd, &[Player::Env], true),
        );
        let rho_s = bdd.apply_and(
            conjoin(Section::SysSafety)?,
            registry.type_constraint(&bdd, &[Player::Sys], true),
        );
        let env_next = registry.bdd_vars(&[Player::Env], true);
        let env_moves = bdd.apply_and(bdd.exists(rho_e, &env_next), valid);
        let env_goals = goals(Section::EnvProgress)?;
        let sys_goals = goals(Section::SysProgress)?;

        let game = Game {
            env_present: registry.bdd_vars(&[Player::Env], false),
            sys_present: registry.bdd_vars(&[Player::Sys], false),
            all_present: registry.bdd_vars(&[Player::Env, Player::Sys], false),
            env_next,
            sys_next: registry.bdd_vars(&[Player::Sys], true),
            to_next: registry.prime_map(false),
            valid,
            theta_e,
            theta_s,
            rho_e,
            rho_s,
            env_moves,
            env_goals,
            sys_goals,
            spec: spec.clone(),
            bdd,
        };
        log::debug!(
            "game: {} valid states, rho_e {} nodes, rho_s {} nodes, {} env goals, {} sys goals",
            game.count(game.valid),
            game.bdd.size(game.rho_e),
            game.bdd.size(game.rho_s),
            game.env_goals.len(),
            game.sys_goals.len()
        );
        log::trace!("rho_e = {}", game.bdd.to_bracket_string(game.rho_e));
        log::trace!("rho_s = {}", game.bdd.to_bracket_string(game.rho_s));
        Ok(game)
    }

    pub fn spec(&self) -> &Specification {
        &self.spec
    }

    pub fn registry(&self) -> &Registry {
        self.spec.registry()
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    pub fn valid(&self) -> Ref {
        self.valid
    }

    pub fn theta_e(&self) -> Ref {
        self.theta_e
    }

    pub fn theta_s(&self) -> Ref {
        self.theta_s
    }

    pub fn rho_e(&self) -> Ref {
        self.rho_e
    }

    pub fn rho_s(&self) -> Ref {
        self.rho_s
    }

    /// States from which the environment can move without violating its safety.
    pub fn env_moves(&self) -> Ref {
        self.env_moves
    }

    /// Environment progress goals; never empty.
    pub fn env_goals(&self) -> &[Ref] {
        &self.env_goals
    }

    /// System progress goals; never empty.
    pub fn sys_goals(&self) -> &[Ref] {
        &self.sys_goals
    }

    pub(crate) fn present_vars(&self, player: Option<Player>) -> &[u32] {
        match player {
            Some(Player::Env) => &self.env_present,
            Some(Player::Sys) => &self.sys_present,
            None => &self.all_present,
        }
    }

    pub(crate) fn next_vars(&self, player: Player) -> &[u32] {
        match player {
            Player::Env => &self.env_next,
            Player::Sys => &self.sys_next,
        }
    }

    /// Number of present states in `set`.
    pub fn count(&self, set: Ref) -> BigUint {
        self.bdd.sat_count(set, &self.all_present)
    }

    /// Rename a set of present states into the next-state copy.
    pub fn prime(&self, set: Ref) -> Ref {
        self.bdd.rename(set, &self.to_next)
    }

    /// Controllable predecessor: states from which the system can force the
    /// next state into `target`.
    ///
    /// Mealy: `∀x'. ρe → ∃y'. ρs ∧ target'`.
    /// Moore: `∃y'. ∀x'. ρe → ρs ∧ target'`.
    pub fn cpre(&self, target: Ref) -> Ref {
        let bdd = &self.bdd;
        let target = self.prime(target);
        let res = if self.spec.moore() {
            let step = bdd.apply_imply(self.rho_e, bdd.apply_and(self.rho_s, target));
            bdd.exists(bdd.forall(step, &self.env_next), &self.sys_next)
        } else {
            let answer = bdd.rel_product(self.rho_s, target, &self.sys_next);
            bdd.forall(bdd.apply_imply(self.rho_e, answer), &self.env_next)
        };
        bdd.apply_and(res, self.valid)
    }

    /// BDD of a full or partial state.
    pub fn state(&self, valuation: &Valuation) -> Ref {
        self.registry().cube(&self.bdd, valuation, false)
    }

    pub fn contains(&self, set: Ref, valuation: &Valuation) -> bool {
        self.bdd.evaluate(set, &self.registry().assignment(valuation, false))
    }

    fn step_assignment(&self, current: &Valuation, next: &Valuation) -> HashMap<u32, bool> {
        let mut assignment = self.registry().assignment(current, false);
        assignment.extend(self.registry().assignment(next, true));
        assignment
    }

    /// Whether `candidate` is a legal move of the player to move in `state`.
    pub fn is_legal(&self, state: &GameState, candidate: &Valuation) -> bool {
        match state {
            GameState::Env { current } => {
                self.registry().check(candidate, Player::Env).is_ok()
                    && self.bdd.evaluate(self.rho_e, &self.step_assignment(current, candidate))
            }
            GameState::Sys { current, input } => {
                self.registry().check(candidate, Player::Sys).is_ok()
                    && self
                        .bdd
                        .evaluate(self.rho_s, &self.step_assignment(current, &input.merged(candidate)))
            }
        }
    }

    /// Legal successors of `state`, generated lazily.
    pub fn successors<'a>(&'a self, state: &'a GameState) -> Box<dyn Iterator<Item = GameState> + 'a> {
        match state {
            GameState::Env { current } => Box::new(
                self.registry()
                    .valuations_of(Player::Env)
                    .filter(move |input| self.is_legal(state, input))
                    .map(move |input| GameState::Sys {
                        current: current.clone(),
                        input,
                    }),
            ),
            GameState::Sys { input, .. } => Box::new(
                self.registry()
                    .valuations_of(Player::Sys)
                    .filter(move |output| self.is_legal(state, output))
                    .map(move |output| GameState::Env {
                        current: input.merged(&output),
                    }),
            ),
        }
    }

    /// States satisfying both initial conditions, environment to move.
    pub fn initial_states(&self) -> impl Iterator<Item = GameState> + '_ {
        let init = self.bdd.apply_and(self.theta_e, self.theta_s);
        self.registry()
            .valuations()
            .filter(move |v| self.contains(init, v))
            .map(|current| GameState::Env { current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, Value};
    use crate::spec::SpecBuilder;
    use test_log::test;

    fn toggle(moore: bool) -> Specification {
        let mut builder = SpecBuilder::new();
        builder.env_var("req", Domain::Bool).unwrap();
        builder.sys_var("out", Domain::int(0, 2)).unwrap();
        builder.sys_init("out = 0");
        builder.env_safety("req -> X !req");
        builder.sys_safety("X req -> X out = out + 1 || X out = 0");
        builder.sys_progress("out = 2");
        builder.moore(moore);
        builder.build().unwrap()
    }

    fn valuation(req: bool, out: i64) -> Valuation {
        Valuation::new().with("req", Value::Bool(req)).with("out", Value::Int(out))
    }

    #[test]
    fn test_valid_states() {
        let game = Game::new(&toggle(false), &GameConfig::default()).unwrap();
        assert_eq!(game.count(game.valid()), BigUint::from(6u32));
        assert_eq!(game.sys_goals().len(), 1);
        // No environment goals given: a single trivial goal.
        assert_eq!(game.env_goals(), &[game.bdd().one]);
    }

    #[test]
    fn test_is_legal() {
        let game = Game::new(&toggle(false), &GameConfig::default()).unwrap();
        let env = GameState::Env {
            current: valuation(true, 0),
        };
        let yes = Valuation::new().with("req", Value::Bool(true));
        let no = Valuation::new().with("req", Value::Bool(false));
        assert!(!game.is_legal(&env, &yes));
        assert!(game.is_legal(&env, &no));
        // Outputs are not inputs.
        assert!(!game.is_legal(&env, &Valuation::new().with("out", Value::Int(0))));

        let sys = GameState::Sys {
            current: valuation(false, 1),
            input: yes,
        };
        assert!(game.is_legal(&sys, &Valuation::new().with("out", Value::Int(2))));
        assert!(game.is_legal(&sys, &Valuation::new().with("out", Value::Int(0))));
        assert!(!game.is_legal(&sys, &Valuation::new().with("out", Value::Int(1))));
        assert!(!game.is_legal(&sys, &Valuation::new().with("out", Value::Int(3))));
    }

    #[test]
    fn test_successors_alternate() {
        let game = Game::new(&toggle(false), &GameConfig::default()).unwrap();
        let env = GameState::Env {
            current: valuation(false, 2),
        };
        let sys_states: Vec<GameState> = game.successors(&env).collect();
        assert_eq!(sys_states.len(), 2);
        assert!(sys_states.iter().all(|s| matches!(s, GameState::Sys { .. })));

        let after_req = GameState::Sys {
            current: valuation(false, 2),
            input: Valuation::new().with("req", Value::Bool(true)),
        };
        let next: Vec<GameState> = game.successors(&after_req).collect();
        // out = 3 is outside the domain, so only a reset is possible.
        assert_eq!(
            next,
            vec![GameState::Env {
                current: valuation(true, 0)
            }]
        );
    }

    #[test]
    fn test_initial_states() {
        let game = Game::new(&toggle(false), &GameConfig::default()).unwrap();
        let initial: Vec<Valuation> = game.initial_states().map(|s| s.current().clone()).collect();
        assert_eq!(initial, vec![valuation(false, 0), valuation(true, 0)]);
    }

    #[test]
    fn test_cpre_mealy() {
        let game = Game::new(&toggle(false), &GameConfig::default()).unwrap();

        // With `req` pending the next input is forced to be quiet, so any output is possible.
        // Without it, a request may arrive and force 2 to wrap around to 0.
        let target = game.state(&Valuation::new().with("out", Value::Int(2)));
        let pre = game.cpre(target);
        assert!(game.contains(pre, &valuation(true, 0)));
        assert!(game.contains(pre, &valuation(false, 1)));
        assert!(!game.contains(pre, &valuation(false, 0)));
        assert!(!game.contains(pre, &valuation(false, 2)));

        // Staying away from 1 is always possible by resetting.
        let not_one = game
            .bdd()
            .apply_and(game.valid(), -game.state(&Valuation::new().with("out", Value::Int(1))));
        assert_eq!(game.cpre(not_one), game.valid());
    }

    #[test]
    fn test_cpre_moore_commits_before_input() {
        let mealy = Game::new(&toggle(false), &GameConfig::default()).unwrap();
        let moore = Game::new(&toggle(true), &GameConfig::default()).unwrap();

        // Answer a request with 1 and silence with 2: easy when seeing the input, impossible otherwise.
        let target = |game: &Game| {
            game.bdd()
                .apply_or(game.state(&valuation(true, 1)), game.state(&valuation(false, 2)))
        };
        assert!(mealy.contains(mealy.cpre(target(&mealy)), &valuation(false, 0)));
        assert!(!moore.contains(moore.cpre(target(&moore)), &valuation(false, 0)));

        let zero = moore.state(&Valuation::new().with("out", Value::Int(0)));
        assert_eq!(moore.cpre(zero), moore.valid());
    }
}
