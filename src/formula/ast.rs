use std::collections::BTreeSet;
use std::fmt;

/// Comparison operators.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn holds<T: Ord>(self, a: T, b: T) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Integer operators.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
}

impl ArithOp {
    pub fn apply(self, a: i64, b: i64) -> Option<i64> {
        match self {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
        }
    }
}

/// Formula syntax tree.
///
/// "Next" is a leaf: `X (a = b)` is stored as `a' = b'`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Expr {
    Bool(bool),
    Int(i64),
    Var(String),
    Next(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn next(name: &str) -> Self {
        Expr::Next(name.to_string())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(e: Expr) -> Self {
        Expr::Not(Box::new(e))
    }

    pub fn and(a: Expr, b: Expr) -> Self {
        Expr::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Expr, b: Expr) -> Self {
        Expr::Or(Box::new(a), Box::new(b))
    }

    pub fn cmp(op: CmpOp, a: Expr, b: Expr) -> Self {
        Expr::Cmp(op, Box::new(a), Box::new(b))
    }

    pub fn arith(op: ArithOp, a: Expr, b: Expr) -> Self {
        Expr::Arith(op, Box::new(a), Box::new(b))
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Bool(_) | Expr::Int(_) | Expr::Var(_) | Expr::Next(_) => vec![],
            Expr::Not(a) => vec![a],
            Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Implies(a, b)
            | Expr::Iff(a, b)
            | Expr::Cmp(_, a, b)
            | Expr::Arith(_, a, b) => vec![a, b],
        }
    }

    /// Move the whole expression one step ahead.
    ///
    /// Fails on an expression that already refers to the next step.
    pub fn shift(self) -> Result<Expr, String> {
        let bin = |a: Box<Expr>, b: Box<Expr>| -> Result<(Box<Expr>, Box<Expr>), String> {
            Ok((Box::new(a.shift()?), Box::new(b.shift()?)))
        };
        Ok(match self {
            Expr::Var(name) => Expr::Next(name),
            Expr::Next(name) => return Err(format!("nested next operator on '{}'", name)),
            e @ (Expr::Bool(_) | Expr::Int(_)) => e,
            Expr::Not(a) => Expr::Not(Box::new(a.shift()?)),
            Expr::And(a, b) => {
                let (a, b) = bin(a, b)?;
                Expr::And(a, b)
            }
            Expr::Or(a, b) => {
                let (a, b) = bin(a, b)?;
                Expr::Or(a, b)
            }
            Expr::Implies(a, b) => {
                let (a, b) = bin(a, b)?;
                Expr::Implies(a, b)
            }
            Expr::Iff(a, b) => {
                let (a, b) = bin(a, b)?;
                Expr::Iff(a, b)
            }
            Expr::Cmp(op, a, b) => {
                let (a, b) = bin(a, b)?;
                Expr::Cmp(op, a, b)
            }
            Expr::Arith(op, a, b) => {
                let (a, b) = bin(a, b)?;
                Expr::Arith(op, a, b)
            }
        })
    }

    /// Names referenced at the current step and at the next step.
    pub fn references(&self) -> (BTreeSet<&str>, BTreeSet<&str>) {
        let mut current = BTreeSet::new();
        let mut next = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            match e {
                Expr::Var(name) => {
                    current.insert(name.as_str());
                }
                Expr::Next(name) => {
                    next.insert(name.as_str());
                }
                _ => stack.extend(e.children()),
            }
        }
        (current, next)
    }

    pub fn has_next(&self) -> bool {
        !self.references().1.is_empty()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Next(name) => write!(f, "{}'", name),
            Expr::Not(a) => write!(f, "!({})", a),
            Expr::And(a, b) => write!(f, "({} && {})", a, b),
            Expr::Or(a, b) => write!(f, "({} || {})", a, b),
            Expr::Implies(a, b) => write!(f, "({} -> {})", a, b),
            Expr::Iff(a, b) => write!(f, "({} <-> {})", a, b),
            Expr::Cmp(op, a, b) => write!(f, "({} {} {})", a, op.symbol(), b),
            Expr::Arith(op, a, b) => write!(f, "({} {} {})", a, op.symbol(), b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_pushes_next_to_leaves() {
        let e = Expr::or(Expr::cmp(CmpOp::Eq, Expr::var("t"), Expr::Int(5)), Expr::var("b"));
        let shifted = e.shift().unwrap();
        assert_eq!(
            shifted,
            Expr::or(Expr::cmp(CmpOp::Eq, Expr::next("t"), Expr::Int(5)), Expr::next("b"))
        );
        assert!(shifted.shift().is_err());
    }

    #[test]
    fn test_references() {
        let e = Expr::and(Expr::var("a"), Expr::cmp(CmpOp::Lt, Expr::next("x"), Expr::var("x")));
        let (current, next) = e.references();
        assert_eq!(current, BTreeSet::from(["a", "x"]));
        assert_eq!(next, BTreeSet::from(["x"]));
        assert!(e.has_next());
    }

    #[test]
    fn test_display() {
        let e = Expr::not(Expr::cmp(
            CmpOp::Ge,
            Expr::arith(ArithOp::Sub, Expr::next("b"), Expr::Int(1)),
            Expr::Int(0),
        ));
        assert_eq!(e.to_string(), "!(((b' - 1) >= 0))");
    }
}
