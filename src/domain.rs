//! Variable domain registry.
//!
//! Every declared variable owns a block of BDD variables: one bit per binary
//! digit of its (offset) value, each in a present-state and a next-state copy.
//! Present and next copies are interleaved (`2k+1`, `2k+2`), which keeps
//! transition relations small.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use num_bigint::BigUint;
use num_traits::One;

use crate::bdd::Bdd;
use crate::error::{Error, Result};
use crate::reference::Ref;

/// Words that cannot be used as variable names.
pub const RESERVED: &[&str] = &["X", "next", "True", "False", "TRUE", "FALSE"];

/// The two players of the game.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Player {
    Env,
    Sys,
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Env => write!(f, "environment"),
            Player::Sys => write!(f, "system"),
        }
    }
}

/// A finite variable domain.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Domain {
    Bool,
    /// Inclusive integer range.
    Int { min: i64, max: i64 },
}

impl Domain {
    pub fn int(min: i64, max: i64) -> Self {
        Domain::Int { min, max }
    }

    /// Number of values in the domain.
    pub fn size(&self) -> u64 {
        match *self {
            Domain::Bool => 2,
            Domain::Int { min, max } => (max as i128 - min as i128 + 1) as u64,
        }
    }

    /// Number of bits needed to encode the domain.
    pub fn bits(&self) -> usize {
        let n = self.size();
        if n <= 1 {
            0
        } else {
            (64 - (n - 1).leading_zeros()) as usize
        }
    }

    /// The `k`-th value in ascending order.
    pub fn value_at(&self, k: u64) -> Value {
        match *self {
            Domain::Bool => Value::Bool(k != 0),
            Domain::Int { min, .. } => Value::Int(min + k as i64),
        }
    }

    /// Position of `value` in ascending order, if it belongs to the domain.
    pub fn index_of(&self, value: Value) -> Option<u64> {
        match (*self, value) {
            (Domain::Bool, Value::Bool(b)) => Some(b as u64),
            (Domain::Int { min, max }, Value::Int(v)) if min <= v && v <= max => Some((v - min) as u64),
            _ => None,
        }
    }

    pub fn contains(&self, value: Value) -> bool {
        self.index_of(value).is_some()
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.size()).map(move |k| self.value_at(k))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Bool => write!(f, "bool"),
            Domain::Int { min, max } => write!(f, "{}..{}", min, max),
        }
    }
}

/// A value of a variable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
        }
    }
}

/// A declared variable together with its BDD encoding.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
    pub player: Player,
    /// Present-state BDD variables, least significant bit first.
    pub present: Vec<u32>,
    /// Next-state BDD variables, least significant bit first.
    pub next: Vec<u32>,
}

impl Variable {
    pub fn bits(&self, primed: bool) -> &[u32] {
        if primed {
            &self.next
        } else {
            &self.present
        }
    }
}

/// An assignment of values to (some of the) declared variables.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Valuation(BTreeMap<String, Value>);

impl Valuation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Builder-style [`insert`][Self::insert].
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Union of two valuations; values in `other` win.
    pub fn merged(&self, other: &Valuation) -> Valuation {
        let mut res = self.clone();
        res.0.extend(other.0.iter().map(|(k, &v)| (k.clone(), v)));
        res
    }

    /// Keep only the variables owned by `player`.
    pub fn project(&self, registry: &Registry, player: Player) -> Valuation {
        Valuation(
            self.0
                .iter()
                .filter(|(k, _)| registry.get(k).is_some_and(|v| v.player == player))
                .map(|(k, &v)| (k.clone(), v))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Valuation {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Valuation(iter.into_iter().collect())
    }
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Lazy cartesian product of variable domains.
///
/// The last variable varies fastest. A clone continues from the same position;
/// call [`Registry::valuations`] again for a fresh pass.
#[derive(Debug, Clone)]
pub struct Valuations<'a> {
    vars: Vec<&'a Variable>,
    counters: Vec<u64>,
    done: bool,
}

impl<'a> Valuations<'a> {
    fn new(vars: Vec<&'a Variable>) -> Self {
        let counters = vec![0; vars.len()];
        Self {
            vars,
            counters,
            done: false,
        }
    }
}

impl Iterator for Valuations<'_> {
    type Item = Valuation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self
            .vars
            .iter()
            .zip(&self.counters)
            .map(|(var, &k)| (var.name.clone(), var.domain.value_at(k)))
            .collect();

        // Advance the odometer.
        self.done = true;
        for (var, counter) in self.vars.iter().zip(self.counters.iter_mut()).rev() {
            *counter += 1;
            if *counter < var.domain.size() {
                self.done = false;
                break;
            }
            *counter = 0;
        }
        Some(current)
    }
}

/// Registry of declared variables.
///
/// Declarations are append-only; a declared variable never changes.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    vars: Vec<Variable>,
    index: HashMap<String, usize>,
    num_bdd_vars: u32,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new variable.
    pub fn declare(&mut self, name: &str, domain: Domain, player: Player) -> Result<&Variable> {
        if self.index.contains_key(name) {
            return Err(Error::DuplicateVariable(name.to_string()));
        }
        let invalid = |reason: &str| Error::InvalidDomain {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if !is_identifier(name) || RESERVED.contains(&name) {
            return Err(invalid("not a valid identifier"));
        }
        if let Domain::Int { min, max } = domain {
            if min > max {
                return Err(invalid("empty range"));
            }
            if (max as i128 - min as i128) >= (1i128 << 62) {
                return Err(invalid("range too large"));
            }
        }

        let bits = domain.bits() as u32;
        let present = (0..bits).map(|b| self.num_bdd_vars + 2 * b + 1).collect();
        let next = (0..bits).map(|b| self.num_bdd_vars + 2 * b + 2).collect();
        self.num_bdd_vars += 2 * bits;

        log::debug!("declare {} variable '{}' in {} ({} bits)", player, name, domain, bits);
        let index = self.vars.len();
        self.index.insert(name.to_string(), index);
        self.vars.push(Variable {
            name: name.to_string(),
            domain,
            player,
            present,
            next,
        });
        Ok(&self.vars[index])
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&i| &self.vars[i])
    }

    pub fn variables(&self) -> &[Variable] {
        &self.vars
    }

    pub fn variables_of(&self, player: Player) -> impl Iterator<Item = &Variable> {
        self.vars.iter().filter(move |v| v.player == player)
    }

    /// Total number of BDD variables allocated so far.
    pub fn num_bdd_vars(&self) -> u32 {
        self.num_bdd_vars
    }

    /// All valuations over every declared variable.
    pub fn valuations(&self) -> Valuations<'_> {
        Valuations::new(self.vars.iter().collect())
    }

    /// All valuations over the variables of one player.
    pub fn valuations_of(&self, player: Player) -> Valuations<'_> {
        Valuations::new(self.variables_of(player).collect())
    }

    /// Size of the joint valuation space.
    pub fn count(&self) -> BigUint {
        self.vars.iter().fold(BigUint::one(), |acc, v| acc * v.domain.size())
    }

    /// Sorted BDD variables of the given players.
    pub fn bdd_vars(&self, players: &[Player], primed: bool) -> Vec<u32> {
        let mut res: Vec<u32> = self
            .vars
            .iter()
            .filter(|v| players.contains(&v.player))
            .flat_map(|v| v.bits(primed).iter().copied())
            .collect();
        res.sort_unstable();
        res
    }

    /// Renaming present-state bits to next-state bits (or back, if `reverse`).
    pub fn prime_map(&self, reverse: bool) -> HashMap<u32, u32> {
        self.vars
            .iter()
            .flat_map(|v| v.present.iter().copied().zip(v.next.iter().copied()))
            .map(|(p, n)| if reverse { (n, p) } else { (p, n) })
            .collect()
    }

    fn encode(var: &Variable, value: Value, primed: bool) -> Option<Vec<(u32, bool)>> {
        let k = var.domain.index_of(value)?;
        Some(
            var.bits(primed)
                .iter()
                .enumerate()
                .map(|(i, &b)| (b, (k >> i) & 1 == 1))
                .collect(),
        )
    }

    /// BDD of `var = value`; `zero` if the value is outside the domain.
    pub fn value_eq(&self, bdd: &Bdd, var: &Variable, value: Value, primed: bool) -> Ref {
        match Self::encode(var, value, primed) {
            Some(bits) => bdd.cube(bits.into_iter().map(|(b, on)| if on { b as i32 } else { -(b as i32) })),
            None => bdd.zero,
        }
    }

    /// BDD admitting only encodings of in-domain values of the given players.
    pub fn type_constraint(&self, bdd: &Bdd, players: &[Player], primed: bool) -> Ref {
        let mut res = bdd.one;
        for var in self.vars.iter().filter(|v| players.contains(&v.player)) {
            let bits = var.bits(primed);
            let top = var.domain.size() - 1;
            if bits.is_empty() || top == (1u64 << bits.len()) - 1 {
                continue;
            }
            // encoded value <= top, built from the least significant bit up
            let mut le = bdd.one;
            for (i, &b) in bits.iter().enumerate() {
                let x = bdd.mk_var(b);
                le = if (top >> i) & 1 == 1 {
                    bdd.apply_or(-x, le)
                } else {
                    bdd.apply_and(-x, le)
                };
            }
            res = bdd.apply_and(res, le);
        }
        res
    }

    /// Bit assignment of the variables mentioned in `valuation`.
    ///
    /// Unknown names and out-of-domain values are skipped.
    pub fn assignment(&self, valuation: &Valuation, primed: bool) -> HashMap<u32, bool> {
        valuation
            .iter()
            .filter_map(|(name, value)| Self::encode(self.get(name)?, value, primed))
            .flatten()
            .collect()
    }

    /// BDD of the (partial) state described by `valuation`.
    pub fn cube(&self, bdd: &Bdd, valuation: &Valuation, primed: bool) -> Ref {
        let mut res = bdd.one;
        for (name, value) in valuation.iter() {
            match self.get(name) {
                Some(var) => res = bdd.apply_and(res, self.value_eq(bdd, var, value, primed)),
                None => return bdd.zero,
            }
        }
        res
    }

    /// Check that `valuation` assigns exactly the variables of `player`, within their domains.
    pub fn check(&self, valuation: &Valuation, player: Player) -> Result<()> {
        let reject = || Error::InputNotAllowed(valuation.to_string());
        let mut seen = 0;
        for (name, value) in valuation.iter() {
            let var = self.get(name).ok_or_else(reject)?;
            if var.player != player || !var.domain.contains(value) {
                return Err(reject());
            }
            seen += 1;
        }
        if seen != self.variables_of(player).count() {
            return Err(reject());
        }
        Ok(())
    }

    /// Whether `valuation` is a complete state: every declared variable, each within its domain.
    pub fn is_state(&self, valuation: &Valuation) -> bool {
        valuation.len() == self.vars.len()
            && valuation
                .iter()
                .all(|(name, value)| self.get(name).is_some_and(|var| var.domain.contains(value)))
    }

    /// The lowest valuation (in enumeration order) of `player`'s variables in `set`.
    ///
    /// Other variables occurring in `set` are treated existentially.
    pub fn pick_min(&self, bdd: &Bdd, set: Ref, player: Player, primed: bool) -> Option<Valuation> {
        if bdd.is_zero(set) {
            return None;
        }
        let mut current = set;
        let mut res = Valuation::new();
        for var in self.variables_of(player) {
            let (value, rest) = var.domain.values().find_map(|value| {
                let assignment: HashMap<u32, bool> = Self::encode(var, value, primed)?.into_iter().collect();
                let rest = bdd.restrict(current, &assignment);
                (!bdd.is_zero(rest)).then_some((value, rest))
            })?;
            res.insert(var.name.clone(), value);
            current = rest;
        }
        Some(res)
    }

    /// All valuations of `player`'s variables in `set`, in enumeration order.
    pub fn solutions(&self, bdd: &Bdd, set: Ref, player: Player, primed: bool) -> Vec<Valuation> {
        let vars: Vec<&Variable> = self.variables_of(player).collect();
        let mut res = Vec::new();
        let mut prefix = Valuation::new();
        Self::solutions_(bdd, set, &vars, primed, &mut prefix, &mut res);
        res
    }

    fn solutions_(
        bdd: &Bdd,
        set: Ref,
        vars: &[&Variable],
        primed: bool,
        prefix: &mut Valuation,
        res: &mut Vec<Valuation>,
    ) {
        if bdd.is_zero(set) {
            return;
        }
        let Some((var, rest)) = vars.split_first() else {
            res.push(prefix.clone());
            return;
        };
        for value in var.domain.values() {
            let Some(bits) = Self::encode(var, value, primed) else {
                continue;
            };
            let assignment: HashMap<u32, bool> = bits.into_iter().collect();
            let sub = bdd.restrict(set, &assignment);
            prefix.insert(var.name.clone(), value);
            Self::solutions_(bdd, sub, rest, primed, prefix, res);
        }
        prefix.0.remove(&var.name);
    }
}
