//! Strategy extraction.
//!
//! From a [`Solution`] the [`Extractor`] picks concrete system moves, and
//! [`Extractor::extract`] unfolds them into an explicit [`Strategy`]: a finite
//! machine whose nodes are pairs of a game state and the system goal
//! currently pursued.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use crate::domain::{Player, Registry, Valuation};
use crate::error::{Error, Result};
use crate::game::{Game, GameState};
use crate::reference::Ref;
use crate::solver::Solution;
use crate::spec::InitMode;

/// Index of the system goal currently pursued, cycling through `0..count`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GoalIndex {
    index: usize,
    count: usize,
}

impl GoalIndex {
    /// First of `count` goals.
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "there is always at least one goal");
        Self { index: 0, count }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The next goal, wrapping around after the last one.
    pub fn advance(self) -> Self {
        Self {
            index: (self.index + 1) % self.count,
            count: self.count,
        }
    }
}

impl fmt::Display for GoalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StrategyNode {
    pub state: Valuation,
    pub goal: GoalIndex,
}

/// Explicit finite-state controller.
///
/// Node `i` is entered after the system has produced `nodes[i].state`.
/// `initial` maps the first input to the first node; `transitions[i]` maps
/// every input allowed in node `i` to its successor.
#[derive(Debug, Clone)]
pub struct Strategy {
    registry: Registry,
    nodes: Vec<StrategyNode>,
    initial: BTreeMap<Valuation, usize>,
    transitions: Vec<BTreeMap<Valuation, usize>>,
}

impl Strategy {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn nodes(&self) -> &[StrategyNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &StrategyNode {
        &self.nodes[id]
    }

    pub fn initial(&self) -> &BTreeMap<Valuation, usize> {
        &self.initial
    }

    pub fn transitions(&self, id: usize) -> &BTreeMap<Valuation, usize> {
        &self.transitions[id]
    }

    pub fn num_transitions(&self) -> usize {
        self.initial.len() + self.transitions.iter().map(|t| t.len()).sum::<usize>()
    }

    /// System part of the state of node `id`.
    pub fn output(&self, id: usize) -> Valuation {
        self.nodes[id].state.project(&self.registry, Player::Sys)
    }
}

pub struct Extractor<'a> {
    game: &'a Game,
    solution: &'a Solution,
}

impl<'a> Extractor<'a> {
    pub fn new(game: &'a Game, solution: &'a Solution) -> Self {
        Self { game, solution }
    }

    pub fn initial_goal(&self) -> GoalIndex {
        GoalIndex::new(self.game.sys_goals().len())
    }

    /// Outputs leading from `current` (after `input`) into `target`, as a set over next system bits.
    ///
    /// A Moore system answers before seeing the input, so its outputs must fit every legal input.
    fn answers(&self, current: &Valuation, input: &Valuation, target: Ref) -> Ref {
        let game = self.game;
        let bdd = game.bdd();
        let registry = game.registry();
        let target = game.prime(target);
        let mut assignment = registry.assignment(current, false);
        if game.spec().moore() {
            let step = bdd.apply_imply(game.rho_e(), bdd.apply_and(game.rho_s(), target));
            bdd.forall(bdd.restrict(step, &assignment), game.next_vars(Player::Env))
        } else {
            assignment.extend(registry.assignment(input, true));
            bdd.restrict(bdd.apply_and(game.rho_s(), target), &assignment)
        }
    }

    fn choose(&self, current: &Valuation, input: &Valuation, target: Ref) -> Option<Valuation> {
        let answers = self.answers(current, input, target);
        self.game.registry().pick_min(self.game.bdd(), answers, Player::Sys, true)
    }

    /// The system's answer to `input` in `current` while pursuing `goal`.
    ///
    /// Returns the next output together with the goal to pursue afterwards.
    pub fn next_move(&self, current: &Valuation, goal: GoalIndex, input: &Valuation) -> Result<(Valuation, GoalIndex)> {
        let game = self.game;
        let stuck = || Error::NoWinningMove(format!("{} (goal {})", current, goal));

        if !game.registry().is_state(current) || !game.contains(self.solution.winning(), current) {
            return Err(stuck());
        }
        let state = GameState::Env {
            current: current.clone(),
        };
        if !game.is_legal(&state, input) {
            return Err(Error::InputNotAllowed(input.to_string()));
        }

        let j = goal.index();
        if game.contains(game.sys_goals()[j], current) {
            let output = self.choose(current, input, self.solution.winning()).ok_or_else(stuck)?;
            log::trace!("{}: goal {} reached", current, goal);
            return Ok((output, goal.advance()));
        }

        let rank = self.solution.rank(game, j, current).ok_or_else(stuck)?;
        if rank > 1 {
            if let Some(output) = self.choose(current, input, self.solution.layers(j)[rank - 1]) {
                return Ok((output, goal));
            }
        }
        for &blocking in self.solution.blocking(j, rank) {
            if game.contains(blocking, current) {
                if let Some(output) = self.choose(current, input, blocking) {
                    return Ok((output, goal));
                }
            }
        }
        Err(stuck())
    }

    /// First states, keyed by the first input, according to the initial mode.
    ///
    /// Only states in which the environment still has a legal move are offered.
    fn initial_states(&self) -> Vec<(Valuation, Valuation)> {
        let game = self.game;
        let bdd = game.bdd();
        let registry = game.registry();
        let theta_e = bdd.apply_and(game.theta_e(), game.env_moves());
        let init = bdd.apply_and_many([theta_e, game.theta_s(), self.solution.winning()]);
        let pick = |set: Ref, player: Player| registry.pick_min(bdd, set, player, false);

        let mut res = Vec::new();
        match game.spec().init_mode() {
            InitMode::ForallExists | InitMode::ForallForall => {
                for input in registry.solutions(bdd, init, Player::Env, false) {
                    let here = bdd.apply_and(init, registry.cube(bdd, &input, false));
                    if let Some(output) = pick(here, Player::Sys) {
                        res.push((input, output));
                    }
                }
            }
            InitMode::ExistsForall => {
                let good = bdd.forall(
                    bdd.apply_imply(theta_e, bdd.apply_and(game.theta_s(), self.solution.winning())),
                    game.present_vars(Some(Player::Env)),
                );
                if let Some(output) = pick(bdd.apply_and(good, game.theta_s()), Player::Sys) {
                    let out = registry.cube(bdd, &output, false);
                    for input in registry.valuations_of(Player::Env) {
                        let here = bdd.apply_and_many([init, out, registry.cube(bdd, &input, false)]);
                        if !bdd.is_zero(here) {
                            res.push((input, output.clone()));
                        }
                    }
                }
            }
            InitMode::ExistsExists => {
                if let Some(input) = pick(init, Player::Env) {
                    let here = bdd.apply_and(init, registry.cube(bdd, &input, false));
                    if let Some(output) = pick(here, Player::Sys) {
                        res.push((input, output));
                    }
                }
            }
        }
        res
    }

    /// Unfold the strategy from the initial states into an explicit machine.
    pub fn extract(&self) -> Result<Strategy> {
        let game = self.game;
        let registry = game.registry();
        let inputs: Vec<Valuation> = registry.valuations_of(Player::Env).collect();

        let mut strategy = Strategy {
            registry: registry.clone(),
            nodes: Vec::new(),
            initial: BTreeMap::new(),
            transitions: Vec::new(),
        };
        let mut index: HashMap<(Valuation, GoalIndex), usize> = HashMap::new();
        let mut queue = VecDeque::new();

        let mut intern = |strategy: &mut Strategy, queue: &mut VecDeque<usize>, state: Valuation, goal: GoalIndex| {
            *index.entry((state.clone(), goal)).or_insert_with(|| {
                let id = strategy.nodes.len();
                strategy.nodes.push(StrategyNode { state, goal });
                strategy.transitions.push(BTreeMap::new());
                queue.push_back(id);
                id
            })
        };

        for (input, output) in self.initial_states() {
            let id = intern(&mut strategy, &mut queue, input.merged(&output), self.initial_goal());
            strategy.initial.insert(input, id);
        }

        while let Some(id) = queue.pop_front() {
            let node = strategy.nodes[id].clone();
            let state = GameState::Env {
                current: node.state.clone(),
            };
            for input in inputs.iter().filter(|input| game.is_legal(&state, input)) {
                let (output, goal) = self.next_move(&node.state, node.goal, input)?;
                let next = intern(&mut strategy, &mut queue, input.merged(&output), goal);
                strategy.transitions[id].insert(input.clone(), next);
            }
        }

        log::info!(
            "extracted strategy: {} nodes, {} transitions",
            strategy.nodes.len(),
            strategy.num_transitions()
        );
        Ok(strategy)
    }
}
