use std::collections::{BTreeSet, HashMap};

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Count the assignments over `vars` satisfying `node`.
    ///
    /// `vars` must be sorted and must cover the support of `node`.
    pub fn sat_count(&self, node: Ref, vars: &[u32]) -> BigUint {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]), "vars must be sorted");
        let mut cache = HashMap::new();
        self.sat_count_(node, vars, 0, &mut cache)
    }

    /// Models of `node` over `vars[from..]`.
    fn sat_count_(&self, node: Ref, vars: &[u32], from: usize, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if self.is_zero(node) {
            return BigUint::zero();
        }
        if self.is_one(node) {
            return BigUint::one() << (vars.len() - from);
        }

        let v = self.top_variable(node);
        let pos = vars
            .binary_search(&v)
            .unwrap_or_else(|_| panic!("variable {} is not in the counted set", v));
        assert!(pos >= from, "variable order violated");

        let below = match cache.get(&node) {
            Some(count) => count.clone(),
            None => {
                let low = self.sat_count_(self.low_node(node), vars, pos + 1, cache);
                let high = self.sat_count_(self.high_node(node), vars, pos + 1, cache);
                let count = low + high;
                cache.insert(node, count.clone());
                count
            }
        };
        // Variables skipped between `from` and the top of `node` are free.
        below << (pos - from)
    }

    /// Set of variables `node` depends on.
    pub fn support(&self, node: Ref) -> BTreeSet<u32> {
        self.descendants([node])
            .into_iter()
            .filter(|&i| i != self.one.index())
            .map(|i| self.variable(i))
            .collect()
    }
}
