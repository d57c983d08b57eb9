//! Running an extracted strategy.

use std::io::Write;

use crate::domain::Valuation;
use crate::error::{Error, Result};
use crate::strategy::{Strategy, StrategyNode};

/// Step-by-step execution of a [`Strategy`].
///
/// The controller starts before the first input; the first call to
/// [`step`][Controller::step] selects the initial state.
#[derive(Debug, Clone)]
pub struct Controller<'s> {
    strategy: &'s Strategy,
    node: Option<usize>,
}

impl<'s> Controller<'s> {
    pub fn new(strategy: &'s Strategy) -> Self {
        Self { strategy, node: None }
    }

    /// Current node, or `None` before the first step.
    pub fn node(&self) -> Option<&'s StrategyNode> {
        self.node.map(|id| self.strategy.node(id))
    }

    /// Inputs accepted by the next step.
    pub fn allowed_inputs(&self) -> impl Iterator<Item = &'s Valuation> {
        let table = match self.node {
            None => self.strategy.initial(),
            Some(id) => self.strategy.transitions(id),
        };
        table.keys()
    }

    /// Feed one input and return the system output.
    pub fn step(&mut self, input: &Valuation) -> Result<Valuation> {
        let table = match self.node {
            None => self.strategy.initial(),
            Some(id) => self.strategy.transitions(id),
        };
        let &next = table
            .get(input)
            .ok_or_else(|| Error::InputNotAllowed(input.to_string()))?;
        self.node = Some(next);
        Ok(self.strategy.output(next))
    }

    /// Go back to the state before the first input.
    pub fn reset(&mut self) {
        self.node = None;
    }
}

impl Strategy {
    /// Write the strategy as a plain transition table.
    ///
    /// ```text
    /// init {a=false} -> 0
    /// 0 {a=false, p=0} goal 0/2
    ///   {a=true} -> 1
    /// ```
    pub fn write_table(&self, w: &mut impl Write) -> Result<()> {
        for (input, id) in self.initial() {
            writeln!(w, "init {} -> {}", input, id)?;
        }
        for (id, node) in self.nodes().iter().enumerate() {
            writeln!(w, "{} {} goal {}", id, node.state, node.goal)?;
            for (input, next) in self.transitions(id) {
                writeln!(w, "  {} -> {}", input, next)?;
            }
        }
        Ok(())
    }
}
