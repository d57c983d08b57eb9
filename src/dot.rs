//! Strategy to DOT (Graphviz) conversion.
//!
//! The generated graph follows these conventions:
//! - every strategy node is a box labeled with its state and active goal;
//! - a single point-shaped node stands for the moment before the first input;
//! - edges are labeled with the input that triggers them;
//! - edges that advance the goal index are drawn bold.
//!
//! # Examples
//!
//! ```
//! use gr1_rs::domain::Domain;
//! use gr1_rs::spec::SpecBuilder;
//!
//! let mut builder = SpecBuilder::new();
//! builder.env_var("a", Domain::Bool).unwrap();
//! builder.sys_var("b", Domain::Bool).unwrap();
//! builder.sys_safety("X b = a");
//! let strategy = gr1_rs::synthesize(&builder.build().unwrap()).unwrap();
//!
//! let dot = strategy.to_dot().unwrap();
//! // Render with: dot -Tpng strategy.dot -o strategy.png
//! assert!(dot.starts_with("digraph strategy {"));
//! ```

use std::fmt::Write as _;

use crate::strategy::Strategy;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for strategy nodes (default: "box")
    pub node_shape: &'static str,
    /// Shape for the start node (default: "point")
    pub start_shape: &'static str,
    /// Style for edges keeping the goal (default: "solid")
    pub edge_style: &'static str,
    /// Style for edges advancing the goal (default: "bold")
    pub progress_edge_style: &'static str,
    /// Whether to show the goal index inside node labels (default: true)
    pub show_goals: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "box",
            start_shape: "point",
            edge_style: "solid",
            progress_edge_style: "bold",
            show_goals: true,
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Strategy {
    /// Converts the strategy to DOT format with the default configuration.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph strategy {{")?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;
        writeln!(dot, "start [shape={}, label=\"\"];", config.start_shape)?;

        for (id, node) in self.nodes().iter().enumerate() {
            let mut label = escape(&node.state.to_string());
            if config.show_goals {
                write!(label, "\\ngoal {}", node.goal)?;
            }
            writeln!(dot, "n{} [label=\"{}\"];", id, label)?;
        }

        for (input, id) in self.initial() {
            writeln!(dot, "start -> n{} [label=\"{}\"];", id, escape(&input.to_string()))?;
        }
        for (id, node) in self.nodes().iter().enumerate() {
            for (input, &next) in self.transitions(id) {
                let style = if self.node(next).goal != node.goal {
                    config.progress_edge_style
                } else {
                    config.edge_style
                };
                writeln!(
                    dot,
                    "n{} -> n{} [label=\"{}\", style={}];",
                    id,
                    next,
                    escape(&input.to_string()),
                    style
                )?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
