//! Abstract parsed netlist
//!
//! The frontends produce this name-based form; the builder turns it into a
//! [`crate::network::Network`]. Nothing in the core ever reads a netlist
//! file directly.

use crate::network::{Expr, GateKind};

/// A gate function as delivered by a frontend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateFunc {
    /// One of the primitive gate kinds
    Prim(GateKind),
    /// An arbitrary expression over the gate's input pins
    Complex(Expr),
}

/// A named gate instance
#[derive(Debug, Clone)]
pub struct ParsedGate {
    /// Name of the output signal
    pub output: String,
    /// Gate function
    pub func: GateFunc,
    /// Names of the input signals, in pin order
    pub inputs: Vec<String>,
}

/// A D flip-flop, described by its two sides
#[derive(Debug, Clone)]
pub struct ParsedDff {
    /// Name of the Q output signal
    pub output: String,
    /// Name of the D input signal
    pub input: String,
}

/// A parsed netlist: named gates, inputs, outputs and flip-flops
#[derive(Debug, Clone, Default)]
pub struct ParsedNetlist {
    /// Design name
    pub name: String,
    /// Primary input names
    pub inputs: Vec<String>,
    /// Primary output names
    pub outputs: Vec<String>,
    /// Flip-flops
    pub dffs: Vec<ParsedDff>,
    /// Gates, in file order
    pub gates: Vec<ParsedGate>,
}

impl ParsedNetlist {
    /// Convenience constructor for hand-built netlists in tests
    pub fn new(name: &str) -> ParsedNetlist {
        ParsedNetlist {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Add a primary input
    pub fn input(&mut self, name: &str) -> &mut Self {
        self.inputs.push(name.to_string());
        self
    }

    /// Add a primary output
    pub fn output(&mut self, name: &str) -> &mut Self {
        self.outputs.push(name.to_string());
        self
    }

    /// Add a flip-flop
    pub fn dff(&mut self, output: &str, input: &str) -> &mut Self {
        self.dffs.push(ParsedDff {
            output: output.to_string(),
            input: input.to_string(),
        });
        self
    }

    /// Add a primitive gate
    pub fn gate(&mut self, output: &str, kind: GateKind, inputs: &[&str]) -> &mut Self {
        self.gates.push(ParsedGate {
            output: output.to_string(),
            func: GateFunc::Prim(kind),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Add a complex gate
    pub fn complex(&mut self, output: &str, expr: Expr, inputs: &[&str]) -> &mut Self {
        self.gates.push(ParsedGate {
            output: output.to_string(),
            func: GateFunc::Complex(expr),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
        });
        self
    }
}
