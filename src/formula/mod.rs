//! Constraint formulas over declared variables.
//!
//! A [`Formula`] keeps its source text next to the parsed [`Expr`], so errors
//! and logs can always point back at what the user wrote.

pub mod ast;
pub mod compile;
pub mod eval;
pub mod parser;

use std::fmt;
use std::str::FromStr;

use crate::domain::{Domain, Registry};
use crate::error::{Error, Result};

pub use ast::{ArithOp, CmpOp, Expr};
pub use compile::compile;
pub use eval::evaluate;

/// Sort of a (sub)formula.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Sort {
    Bool,
    Int,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "boolean"),
            Sort::Int => write!(f, "integer"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Formula {
    text: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(text: &str) -> Result<Self> {
        let expr = parser::parse(text)?;
        Ok(Formula {
            text: text.trim().to_string(),
            expr,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn has_next(&self) -> bool {
        self.expr.has_next()
    }

    /// Type-check against `registry`; the whole formula must be boolean.
    pub fn check(&self, registry: &Registry) -> Result<()> {
        match self.sort_of(&self.expr, registry)? {
            Sort::Bool => Ok(()),
            Sort::Int => Err(Error::type_mismatch(&self.text, "formula is an integer term")),
        }
    }

    fn sort_of(&self, expr: &Expr, registry: &Registry) -> Result<Sort> {
        let expect = |e: &Expr, sort: Sort| -> Result<()> {
            let actual = self.sort_of(e, registry)?;
            if actual != sort {
                return Err(Error::type_mismatch(
                    &self.text,
                    format!("'{}' is {}, expected {}", e, actual, sort),
                ));
            }
            Ok(())
        };
        match expr {
            Expr::Bool(_) => Ok(Sort::Bool),
            Expr::Int(_) => Ok(Sort::Int),
            Expr::Var(name) | Expr::Next(name) => match registry.get(name) {
                Some(var) => Ok(match var.domain {
                    Domain::Bool => Sort::Bool,
                    Domain::Int { .. } => Sort::Int,
                }),
                None => Err(Error::UnboundVariable {
                    name: name.clone(),
                    formula: self.text.clone(),
                }),
            },
            Expr::Not(a) => {
                expect(a, Sort::Bool)?;
                Ok(Sort::Bool)
            }
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Implies(a, b) | Expr::Iff(a, b) => {
                expect(a, Sort::Bool)?;
                expect(b, Sort::Bool)?;
                Ok(Sort::Bool)
            }
            Expr::Cmp(op, a, b) => {
                let sa = self.sort_of(a, registry)?;
                expect(b, sa)?;
                if sa == Sort::Bool && !matches!(op, CmpOp::Eq | CmpOp::Ne) {
                    return Err(Error::type_mismatch(&self.text, format!("cannot order booleans in '{}'", expr)));
                }
                Ok(Sort::Bool)
            }
            Expr::Arith(_, a, b) => {
                expect(a, Sort::Int)?;
                expect(b, Sort::Int)?;
                Ok(Sort::Int)
            }
        }
    }
}

impl FromStr for Formula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Formula::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
