//! Translation of formulas into BDDs.
//!
//! Boolean subformulas become a single BDD. Integer terms become a guarded
//! value table: a list of `(value, guard)` pairs whose guards are pairwise
//! disjoint, each stating when the term takes that value. Arithmetic and
//! comparisons combine tables pointwise, which is exact for the small finite
//! domains GR(1) specifications use.

use std::collections::BTreeMap;

use crate::bdd::Bdd;
use crate::domain::{Domain, Registry, Value};
use crate::error::{Error, Result};
use crate::formula::ast::{CmpOp, Expr};
use crate::formula::Formula;
use crate::reference::Ref;

enum Term {
    Bool(Ref),
    Int(Vec<(i64, Ref)>),
}

/// Compile `formula` into a BDD over the present and next bits of `registry`.
pub fn compile(bdd: &Bdd, registry: &Registry, formula: &Formula) -> Result<Ref> {
    formula.check(registry)?;
    let compiler = Compiler {
        bdd,
        registry,
        text: formula.text(),
    };
    let res = compiler.boolean(formula.expr())?;
    log::trace!("compiled '{}' into {} nodes", formula, bdd.size(res));
    Ok(res)
}

struct Compiler<'a> {
    bdd: &'a Bdd,
    registry: &'a Registry,
    text: &'a str,
}

impl Compiler<'_> {
    fn boolean(&self, e: &Expr) -> Result<Ref> {
        match self.term(e)? {
            Term::Bool(f) => Ok(f),
            Term::Int(_) => Err(Error::type_mismatch(self.text, format!("'{}' is not a boolean", e))),
        }
    }

    fn integer(&self, e: &Expr) -> Result<Vec<(i64, Ref)>> {
        match self.term(e)? {
            Term::Int(table) => Ok(table),
            Term::Bool(_) => Err(Error::type_mismatch(self.text, format!("'{}' is not an integer", e))),
        }
    }

    fn variable(&self, name: &str, primed: bool) -> Result<Term> {
        let var = self.registry.get(name).ok_or_else(|| Error::UnboundVariable {
            name: name.to_string(),
            formula: self.text.to_string(),
        })?;
        Ok(match var.domain {
            Domain::Bool => Term::Bool(self.bdd.mk_var(var.bits(primed)[0])),
            Domain::Int { .. } => Term::Int(
                var.domain
                    .values()
                    .map(|value| {
                        let v = match value {
                            Value::Int(v) => v,
                            Value::Bool(b) => b as i64,
                        };
                        (v, self.registry.value_eq(self.bdd, var, value, primed))
                    })
                    .collect(),
            ),
        })
    }

    fn term(&self, e: &Expr) -> Result<Term> {
        let bdd = self.bdd;
        Ok(match e {
            Expr::Bool(b) => Term::Bool(if *b { bdd.one } else { bdd.zero }),
            Expr::Int(v) => Term::Int(vec![(*v, bdd.one)]),
            Expr::Var(name) => self.variable(name, false)?,
            Expr::Next(name) => self.variable(name, true)?,
            Expr::Not(a) => Term::Bool(bdd.apply_not(self.boolean(a)?)),
            Expr::And(a, b) => Term::Bool(bdd.apply_and(self.boolean(a)?, self.boolean(b)?)),
            Expr::Or(a, b) => Term::Bool(bdd.apply_or(self.boolean(a)?, self.boolean(b)?)),
            Expr::Implies(a, b) => Term::Bool(bdd.apply_imply(self.boolean(a)?, self.boolean(b)?)),
            Expr::Iff(a, b) => Term::Bool(bdd.apply_eq(self.boolean(a)?, self.boolean(b)?)),
            Expr::Cmp(op, a, b) => match (self.term(a)?, self.term(b)?) {
                (Term::Bool(x), Term::Bool(y)) => match op {
                    CmpOp::Eq => Term::Bool(bdd.apply_eq(x, y)),
                    CmpOp::Ne => Term::Bool(bdd.apply_xor(x, y)),
                    _ => return Err(Error::type_mismatch(self.text, format!("cannot order booleans in '{}'", e))),
                },
                (Term::Int(xs), Term::Int(ys)) => {
                    let mut res = bdd.zero;
                    for &(x, gx) in &xs {
                        for &(y, gy) in &ys {
                            if op.holds(x, y) {
                                res = bdd.apply_or(res, bdd.apply_and(gx, gy));
                            }
                        }
                    }
                    Term::Bool(res)
                }
                _ => return Err(Error::type_mismatch(self.text, format!("mixed operand sorts in '{}'", e))),
            },
            Expr::Arith(op, a, b) => {
                let (xs, ys) = (self.integer(a)?, self.integer(b)?);
                let mut table: BTreeMap<i64, Ref> = BTreeMap::new();
                for &(x, gx) in &xs {
                    for &(y, gy) in &ys {
                        let guard = bdd.apply_and(gx, gy);
                        if bdd.is_zero(guard) {
                            continue;
                        }
                        let v = op
                            .apply(x, y)
                            .ok_or_else(|| Error::type_mismatch(self.text, format!("arithmetic overflow in '{}'", e)))?;
                        let entry = table.entry(v).or_insert(bdd.zero);
                        *entry = bdd.apply_or(*entry, guard);
                    }
                }
                Term::Int(table.into_iter().collect())
            }
        })
    }
}
