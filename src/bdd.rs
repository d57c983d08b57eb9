//! The BDD manager.
//!
//! Nodes live in a single hash-consed [`Table`], so two references are equal
//! iff they denote the same boolean function. Complement edges are encoded in
//! the sign of a [`Ref`]; the high edge of a stored node is never complemented.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::reference::Ref;
use crate::table::Table;
use crate::utils::{mix3, MyHash};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            variable: 0,
            low: Ref::positive(0),
            high: Ref::positive(0),
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        mix3(
            self.variable as u64,
            self.low.get() as i64 as u64,
            self.high.get() as i64 as u64,
        )
    }
}

type Storage = Table<Node>;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum OpKey {
    Ite(Ref, Ref, Ref),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match self {
            OpKey::Ite(f, g, h) => mix3(
                f.get() as i64 as u64,
                g.get() as i64 as u64,
                h.get() as i64 as u64,
            ),
        }
    }
}

pub struct Bdd {
    storage: RefCell<Storage>,
    cache: RefCell<Cache<OpKey, Ref>>,
    pub zero: Ref,
    pub one: Ref,
}

impl Bdd {
    /// Create a manager with `2^bits` unique-table buckets.
    ///
    /// The node storage itself grows on demand.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 30, "Storage bits should be in the range 0..=30");

        let mut storage = Storage::new(bits);

        // Allocate the terminal node:
        let one = storage.add(Node::default());
        assert_eq!(one, 1); // Make sure the terminal node is (1).
        let one = Ref::positive(one as u32);
        let zero = -one;

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(bits.min(20))),
            zero,
            one,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(16)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Bdd")
            .field("buckets", &storage.num_buckets())
            .field("size", &storage.size())
            .finish()
    }
}

impl Bdd {
    pub fn cache(&self) -> std::cell::Ref<'_, Cache<OpKey, Ref>> {
        self.cache.borrow()
    }

    /// Number of nodes ever created (including the terminal).
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().size()
    }

    pub fn variable(&self, index: usize) -> u32 {
        self.storage.borrow().value(index).variable
    }
    pub fn low(&self, index: usize) -> Ref {
        self.storage.borrow().value(index).low
    }
    pub fn high(&self, index: usize) -> Ref {
        self.storage.borrow().value(index).high
    }

    /// Top variable of `node`, or `0` for terminals.
    pub fn top_variable(&self, node: Ref) -> u32 {
        self.variable(node.index())
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.index());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.index());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == self.one.index()
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");

        // Handle canonicity
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        // Handle duplicates
        if low == high {
            return low;
        }

        let i = self.storage.borrow_mut().put(Node {
            variable: v,
            low,
            high,
        });
        Ref::positive(i as u32)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        self.mk_node(v, self.zero, self.one)
    }

    /// Conjunction of literals given as signed variable indices.
    pub fn cube(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_by_key(|&v| std::cmp::Reverse(v.abs()));
        let mut current = self.one;
        for lit in literals {
            assert_ne!(lit, 0, "Variable index should not be zero");
            current = if lit < 0 {
                self.mk_node(lit.unsigned_abs(), current, self.zero)
            } else {
                self.mk_node(lit as u32, self.zero, current)
            };
        }
        current
    }

    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        assert_ne!(v, 0, "Variable index should not be zero");

        if self.is_terminal(node) || v != self.top_variable(node) {
            return (node, node);
        }
        (self.low_node(node), self.high_node(node))
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use gr1_rs::bdd::Bdd;
    ///
    /// let bdd = Bdd::default();
    /// let x = bdd.mk_var(1);
    /// let y = bdd.mk_var(2);
    /// let z = bdd.mk_var(3);
    /// let f = bdd.apply_ite(x, y, z);
    /// let x_and_y = bdd.apply_and(x, y);
    /// let not_x_and_z = bdd.apply_and(-x, z);
    /// assert_eq!(f, bdd.apply_or(x_and_y, not_x_and_z));
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        // ite(1,G,H) => G
        // ite(0,G,H) => H
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,G,~F) => ite(F,G,1)
        let g = if g == f {
            self.one
        } else if g == -f {
            self.zero
        } else {
            g
        };
        let h = if h == f {
            self.zero
        } else if h == -f {
            self.one
        } else {
            h
        };

        // ite(F,G,G) => G
        // ite(F,1,0) => F
        // ite(F,0,1) => ~F
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // ite(~F,G,H) => ite(F,H,G)
        let (f, g, h) = if f.is_negated() { (-f, h, g) } else { (f, g, h) };
        // ite(F,~G,H) => ~ite(F,G,~H)
        let (g, h, n) = if g.is_negated() {
            (-g, -h, true)
        } else {
            (g, h, false)
        };

        let key = OpKey::Ite(f, g, h);
        if let Some(&res) = self.cache.borrow().get(&key) {
            return if n { -res } else { res };
        }

        // Determine the top variable:
        let m = [f, g, h]
            .iter()
            .map(|&x| self.top_variable(x))
            .filter(|&v| v != 0)
            .min()
            .expect("f is not terminal");

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0);
        let t = self.apply_ite(f1, g1, h1);
        let res = self.mk_node(m, e, t);
        self.cache.borrow_mut().insert(key, res);

        if n {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.one)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes {
            res = self.apply_and(res, node);
            if self.is_zero(res) {
                break;
            }
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.zero;
        for node in nodes {
            res = self.apply_or(res, node);
            if self.is_one(res) {
                break;
            }
        }
        res
    }

    /// Check whether `f → g` is valid.
    pub fn is_implies(&self, f: Ref, g: Ref) -> bool {
        self.is_zero(self.apply_and(f, -g))
    }

    /// Existential quantification `∃vars. f`.
    ///
    /// `vars` must be sorted in ascending order.
    pub fn exists(&self, f: Ref, vars: &[u32]) -> Ref {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]), "vars must be sorted");
        let mut cache = HashMap::new();
        self.exists_(f, vars, &mut cache)
    }

    fn exists_(&self, f: Ref, vars: &[u32], cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        let v = self.top_variable(f);
        // Skip quantified variables above the top of `f`.
        let skip = vars.partition_point(|&x| x < v);
        let vars = &vars[skip..];
        if vars.is_empty() {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let low = self.exists_(self.low_node(f), vars, cache);
        let res = if vars[0] == v {
            if self.is_one(low) {
                low
            } else {
                let high = self.exists_(self.high_node(f), vars, cache);
                self.apply_or(low, high)
            }
        } else {
            let high = self.exists_(self.high_node(f), vars, cache);
            self.mk_node(v, low, high)
        };
        cache.insert(f, res);
        res
    }

    /// Universal quantification `∀vars. f`.
    pub fn forall(&self, f: Ref, vars: &[u32]) -> Ref {
        -self.exists(-f, vars)
    }

    /// Relational product `∃vars. f ∧ g`, without building `f ∧ g` first.
    pub fn rel_product(&self, f: Ref, g: Ref, vars: &[u32]) -> Ref {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]), "vars must be sorted");
        let mut cache = HashMap::new();
        let mut ex_cache = HashMap::new();
        self.rel_product_(f, g, vars, &mut cache, &mut ex_cache)
    }

    fn rel_product_(
        &self,
        f: Ref,
        g: Ref,
        vars: &[u32],
        cache: &mut HashMap<(Ref, Ref), Ref>,
        ex_cache: &mut HashMap<Ref, Ref>,
    ) -> Ref {
        if self.is_zero(f) || self.is_zero(g) || f == -g {
            return self.zero;
        }
        if self.is_one(f) || f == g {
            return self.exists_(g, vars, ex_cache);
        }
        if self.is_one(g) {
            return self.exists_(f, vars, ex_cache);
        }

        let m = self.top_variable(f).min(self.top_variable(g));
        let skip = vars.partition_point(|&x| x < m);
        let vars = &vars[skip..];
        if vars.is_empty() {
            return self.apply_and(f, g);
        }

        let key = if f <= g { (f, g) } else { (g, f) };
        if let Some(&res) = cache.get(&key) {
            return res;
        }

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let low = self.rel_product_(f0, g0, vars, cache, ex_cache);
        let res = if vars[0] == m {
            if self.is_one(low) {
                low
            } else {
                let high = self.rel_product_(f1, g1, vars, cache, ex_cache);
                self.apply_or(low, high)
            }
        } else {
            let high = self.rel_product_(f1, g1, vars, cache, ex_cache);
            self.mk_node(m, low, high)
        };
        cache.insert(key, res);
        res
    }

    /// Simultaneous variable substitution `f[v := map(v)]`.
    ///
    /// The map need not preserve the variable order.
    pub fn rename(&self, f: Ref, map: &HashMap<u32, u32>) -> Ref {
        let mut cache = HashMap::new();
        self.rename_(f, map, &mut cache)
    }

    fn rename_(&self, f: Ref, map: &HashMap<u32, u32>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }
        let v = self.top_variable(f);
        let low = self.rename_(self.low_node(f), map, cache);
        let high = self.rename_(self.high_node(f), map, cache);
        let target = map.get(&v).copied().unwrap_or(v);
        let res = self.apply_ite(self.mk_var(target), high, low);
        cache.insert(f, res);
        res
    }

    /// Cofactor `f` by a partial assignment.
    pub fn restrict(&self, f: Ref, values: &HashMap<u32, bool>) -> Ref {
        let mut cache = HashMap::new();
        self.restrict_(f, values, &mut cache)
    }

    fn restrict_(&self, f: Ref, values: &HashMap<u32, bool>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) || values.is_empty() {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let i = self.top_variable(f);
        let res = match values.get(&i) {
            Some(true) => self.restrict_(self.high_node(f), values, cache),
            Some(false) => self.restrict_(self.low_node(f), values, cache),
            None => {
                let low = self.restrict_(self.low_node(f), values, cache);
                let high = self.restrict_(self.high_node(f), values, cache);
                self.mk_node(i, low, high)
            }
        };
        cache.insert(f, res);
        res
    }

    /// Evaluate `f` under a total assignment of its support.
    ///
    /// Variables missing from `values` are read as `false`.
    pub fn evaluate(&self, f: Ref, values: &HashMap<u32, bool>) -> bool {
        let mut current = f;
        while !self.is_terminal(current) {
            let v = self.top_variable(current);
            current = if values.get(&v).copied().unwrap_or(false) {
                self.high_node(current)
            } else {
                self.low_node(current)
            };
        }
        self.is_one(current)
    }

    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> HashSet<usize> {
        let mut visited = HashSet::new();
        visited.insert(self.one.index());
        let mut queue = VecDeque::from_iter(nodes);

        while let Some(node) = queue.pop_front() {
            let i = node.index();
            if visited.insert(i) {
                queue.push_back(self.low(i));
                queue.push_back(self.high(i));
            }
        }

        visited
    }

    /// Number of nodes (terminal included) reachable from `f`.
    pub fn size(&self, f: Ref) -> usize {
        let size = self.descendants([f]).len();
        debug!("size({}) = {}", f, size);
        size
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        if self.is_zero(node) {
            return "(0)".to_string();
        } else if self.is_one(node) {
            return "(1)".to_string();
        }

        let v = self.top_variable(node);
        let low = self.low_node(node);
        let high = self.high_node(node);

        format!(
            "{}:(x{}, {}, {})",
            node,
            v,
            self.to_bracket_string(high),
            self.to_bracket_string(low)
        )
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_var() {
        let bdd = Bdd::default();

        let x = bdd.mk_var(1);

        assert_eq!(bdd.top_variable(x), 1);
        assert_eq!(bdd.high_node(x), bdd.one);
        assert_eq!(bdd.low_node(x), bdd.zero);
        assert_eq!(bdd.high_node(-x), bdd.zero);
        assert_eq!(bdd.low_node(-x), bdd.one);
    }

    #[test]
    fn test_terminal() {
        let bdd = Bdd::default();

        assert!(bdd.is_terminal(bdd.zero));
        assert!(bdd.is_zero(bdd.zero));
        assert!(!bdd.is_one(bdd.zero));
        assert!(bdd.is_terminal(bdd.one));
        assert!(bdd.is_one(bdd.one));
        assert_eq!(bdd.top_variable(bdd.one), 0);
    }

    #[test]
    fn test_cube() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        let f = bdd.apply_and_many([x1, -x2, x3]);
        assert_eq!(f, bdd.cube([3, 1, -2]));
    }

    #[test]
    fn test_de_morgan() {
        let bdd = Bdd::default();

        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);

        assert_eq!(-bdd.apply_and(x, y), bdd.apply_or(-x, -y));
        assert_eq!(-bdd.apply_or(x, y), bdd.apply_and(-x, -y));
    }

    #[test]
    fn test_xor_eq() {
        let bdd = Bdd::default();

        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_and(x, y);

        assert_eq!(bdd.apply_xor(f, f), bdd.zero);
        assert_eq!(bdd.apply_xor(f, -f), bdd.one);
        assert_eq!(bdd.apply_eq(x, y), -bdd.apply_xor(x, y));
    }

    #[test]
    fn test_apply_ite_triples() {
        let bdd = Bdd::default();

        let f = bdd.mk_var(4);
        let g = bdd.mk_var(2);
        let h = bdd.mk_var(3);
        assert_eq!(bdd.apply_ite(f, f, h), bdd.apply_or(f, h));
        assert_eq!(bdd.apply_ite(f, g, f), bdd.apply_and(f, g));
        assert_eq!(bdd.apply_ite(f, -g, bdd.one), -bdd.apply_and(f, g));
        assert_eq!(bdd.apply_ite(f, bdd.zero, -h), -bdd.apply_or(f, h));

        // General case, with the condition above both branches
        let f = bdd.mk_var(6);
        let g = bdd.mk_var(7);
        let h = bdd.mk_var(8);
        assert_eq!(bdd.apply_ite(-f, -g, -h), bdd.mk_node(6, -g, -h));
    }

    #[test]
    fn test_is_implies() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let f = bdd.apply_and(x1, x2);

        assert!(bdd.is_implies(f, x1));
        assert!(bdd.is_implies(f, bdd.apply_or(x1, x2)));
        assert!(!bdd.is_implies(f, -x2));
        assert!(bdd.is_implies(bdd.zero, x1));
        assert!(bdd.is_implies(x1, bdd.one));
    }

    #[test]
    fn test_exists_forall() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        // f = (x1 ∧ x2) ∨ x3
        let f = bdd.apply_or(bdd.apply_and(x1, x2), x3);
        assert_eq!(bdd.exists(f, &[2]), bdd.apply_or(x1, x3));
        assert_eq!(bdd.forall(f, &[2]), x3);
        assert_eq!(bdd.exists(f, &[1, 2, 3]), bdd.one);
        assert_eq!(bdd.forall(f, &[1, 2, 3]), bdd.zero);
        assert_eq!(bdd.exists(f, &[4]), f);
    }

    #[test]
    fn test_rel_product_matches_exists_and() {
        let bdd = Bdd::default();

        let x: Vec<Ref> = (1..=6).map(|v| bdd.mk_var(v)).collect();
        let f = bdd.apply_or(bdd.apply_and(x[0], x[3]), bdd.apply_xor(x[1], x[4]));
        let g = bdd.apply_imply(x[3], bdd.apply_eq(x[2], x[5]));

        let cases: [&[u32]; 5] = [&[4], &[2, 4], &[1, 3, 5], &[4, 5, 6], &[]];
        for vars in cases {
            let expected = bdd.exists(bdd.apply_and(f, g), vars);
            assert_eq!(bdd.rel_product(f, g, vars), expected, "vars = {:?}", vars);
        }
    }

    #[test]
    fn test_rename_swaps_variables() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        // f = x1 ∧ ¬x2 ∨ x3
        let f = bdd.apply_or(bdd.apply_and(x1, -x2), x3);
        let map = HashMap::from([(1, 2), (2, 1)]);
        let g = bdd.rename(f, &map);
        assert_eq!(g, bdd.apply_or(bdd.apply_and(x2, -x1), x3));
        assert_eq!(bdd.rename(g, &map), f);
    }

    #[test]
    fn test_restrict_and_evaluate() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);
        let x4 = bdd.mk_var(4);

        let f = bdd.apply_and_many([-x1, x2, x3, -x4]);
        let values = HashMap::from([(2, true), (4, false)]);
        assert_eq!(bdd.restrict(f, &values), bdd.apply_and(-x1, x3));

        let full = HashMap::from([(1, false), (2, true), (3, true), (4, false)]);
        assert!(bdd.evaluate(f, &full));
        let full = HashMap::from([(1, true), (2, true), (3, true), (4, false)]);
        assert!(!bdd.evaluate(f, &full));
    }

    #[test]
    fn test_canonicity() {
        let bdd = Bdd::default();

        let x1 = bdd.mk_var(1);
        let x2 = bdd.mk_var(2);
        let x3 = bdd.mk_var(3);

        let f = bdd.apply_and(bdd.apply_or(x1, x2), x3);
        let g = bdd.apply_or(bdd.apply_and(x1, x3), bdd.apply_and(x2, x3));
        assert_eq!(f, g);
        assert_eq!(bdd.size(f), 4);
    }
}
