use crate::domain::{Valuation, Value};
use crate::error::{Error, Result};
use crate::formula::ast::{CmpOp, Expr};
use crate::formula::Formula;

/// Evaluate `formula` on a step from `current` to `next`.
///
/// Unprimed names are looked up in `current`, primed names in `next`.
pub fn evaluate(formula: &Formula, current: &Valuation, next: &Valuation) -> Result<bool> {
    let evaluator = Evaluator {
        text: formula.text(),
        current,
        next,
    };
    match evaluator.eval(formula.expr())? {
        Value::Bool(b) => Ok(b),
        Value::Int(_) => Err(Error::type_mismatch(formula.text(), "formula is an integer term")),
    }
}

struct Evaluator<'a> {
    text: &'a str,
    current: &'a Valuation,
    next: &'a Valuation,
}

impl Evaluator<'_> {
    fn lookup(&self, name: &str, valuation: &Valuation) -> Result<Value> {
        valuation.get(name).ok_or_else(|| Error::UnboundVariable {
            name: name.to_string(),
            formula: self.text.to_string(),
        })
    }

    fn bool(&self, e: &Expr) -> Result<bool> {
        match self.eval(e)? {
            Value::Bool(b) => Ok(b),
            Value::Int(v) => Err(Error::type_mismatch(self.text, format!("'{}' = {} is not a boolean", e, v))),
        }
    }

    fn int(&self, e: &Expr) -> Result<i64> {
        match self.eval(e)? {
            Value::Int(v) => Ok(v),
            Value::Bool(b) => Err(Error::type_mismatch(self.text, format!("'{}' = {} is not an integer", e, b))),
        }
    }

    fn eval(&self, e: &Expr) -> Result<Value> {
        Ok(match e {
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Int(v) => Value::Int(*v),
            Expr::Var(name) => self.lookup(name, self.current)?,
            Expr::Next(name) => self.lookup(name, self.next)?,
            Expr::Not(a) => Value::Bool(!self.bool(a)?),
            // Both sides are evaluated so that ill-typed formulas fail consistently.
            Expr::And(a, b) => {
                let (a, b) = (self.bool(a)?, self.bool(b)?);
                Value::Bool(a && b)
            }
            Expr::Or(a, b) => {
                let (a, b) = (self.bool(a)?, self.bool(b)?);
                Value::Bool(a || b)
            }
            Expr::Implies(a, b) => {
                let (a, b) = (self.bool(a)?, self.bool(b)?);
                Value::Bool(!a || b)
            }
            Expr::Iff(a, b) => Value::Bool(self.bool(a)? == self.bool(b)?),
            Expr::Cmp(op, a, b) => match (self.eval(a)?, self.eval(b)?) {
                (Value::Int(x), Value::Int(y)) => Value::Bool(op.holds(x, y)),
                (Value::Bool(x), Value::Bool(y)) if matches!(op, CmpOp::Eq | CmpOp::Ne) => Value::Bool(op.holds(x, y)),
                (x, y) => {
                    return Err(Error::type_mismatch(
                        self.text,
                        format!("cannot compare {} with {} in '{}'", x, y, e),
                    ))
                }
            },
            Expr::Arith(op, a, b) => {
                let (x, y) = (self.int(a)?, self.int(b)?);
                let v = op
                    .apply(x, y)
                    .ok_or_else(|| Error::type_mismatch(self.text, format!("arithmetic overflow in '{}'", e)))?;
                Value::Int(v)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn eval(text: &str, current: &Valuation, next: &Valuation) -> Result<bool> {
        evaluate(&Formula::parse(text).unwrap(), current, next)
    }

    #[test]
    fn test_evaluate_present_and_next() {
        let current = Valuation::new().with("a", Value::Bool(true)).with("n", Value::Int(2));
        let next = Valuation::new().with("a", Value::Bool(false)).with("n", Value::Int(1));

        assert!(eval("a && n = 2", &current, &next).unwrap());
        assert!(eval("X n = n - 1", &current, &next).unwrap());
        assert!(!eval("a' || n' > 1", &current, &next).unwrap());
        assert!(eval("a -> X !a", &current, &next).unwrap());
        assert!(eval("(a = a') <-> False", &current, &next).unwrap());
    }

    #[test]
    fn test_evaluate_unbound() {
        let current = Valuation::new().with("a", Value::Bool(true));
        match eval("a && b", &current, &Valuation::new()) {
            Err(Error::UnboundVariable { name, .. }) => assert_eq!(name, "b"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            eval("X a", &current, &Valuation::new()),
            Err(Error::UnboundVariable { .. })
        ));
    }

    #[test]
    fn test_evaluate_type_mismatch() {
        let current = Valuation::new().with("a", Value::Bool(true)).with("n", Value::Int(0));
        for text in ["n", "a + 1 = 2", "a = n", "a < a", "!n"] {
            assert!(
                matches!(eval(text, &current, &current), Err(Error::TypeMismatch { .. })),
                "'{}' should be a type error",
                text
            );
        }
    }
}
