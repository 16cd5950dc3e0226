//! Logic expressions for complex gates
//!
//! Frontends that cannot express a gate as a single primitive (BLIF cube
//! lists, for instance) hand the builder an [`Expr`] over the gate's input
//! pins. The builder decomposes it into a subtree of primitive gate nodes.

use crate::network::GateKind;

/// A logic expression over numbered input pins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Input pin of the enclosing gate
    Pin(usize),
    /// Constant value
    Const(bool),
    /// Negation
    Not(Box<Expr>),
    /// Conjunction
    And(Vec<Expr>),
    /// Disjunction
    Or(Vec<Expr>),
    /// Parity
    Xor(Vec<Expr>),
}

impl Expr {
    /// Negate an expression, folding double negations
    pub fn negate(self) -> Expr {
        match self {
            Expr::Not(e) => *e,
            Expr::Const(b) => Expr::Const(!b),
            e => Expr::Not(Box::new(e)),
        }
    }

    /// Number of pins referenced (highest pin index plus one)
    pub fn pin_count(&self) -> usize {
        match self {
            Expr::Pin(p) => p + 1,
            Expr::Const(_) => 0,
            Expr::Not(e) => e.pin_count(),
            Expr::And(v) | Expr::Or(v) | Expr::Xor(v) => {
                v.iter().map(Expr::pin_count).max().unwrap_or(0)
            }
        }
    }

    /// Evaluate over boolean pin values
    pub fn eval(&self, pins: &[bool]) -> bool {
        match self {
            Expr::Pin(p) => pins[*p],
            Expr::Const(b) => *b,
            Expr::Not(e) => !e.eval(pins),
            Expr::And(v) => v.iter().all(|e| e.eval(pins)),
            Expr::Or(v) => v.iter().any(|e| e.eval(pins)),
            Expr::Xor(v) => v.iter().fold(false, |a, e| a ^ e.eval(pins)),
        }
    }

    /// If the whole expression is a single primitive over plain pins,
    /// return its kind and pin order
    pub fn as_primitive(&self) -> Option<(GateKind, Vec<usize>)> {
        fn plain_pins(v: &[Expr]) -> Option<Vec<usize>> {
            v.iter()
                .map(|e| match e {
                    Expr::Pin(p) => Some(*p),
                    _ => None,
                })
                .collect()
        }
        match self {
            Expr::Pin(p) => Some((GateKind::Buf, vec![*p])),
            Expr::Const(false) => Some((GateKind::Const0, Vec::new())),
            Expr::Const(true) => Some((GateKind::Const1, Vec::new())),
            Expr::Not(e) => match e.as_ref() {
                Expr::Pin(p) => Some((GateKind::Not, vec![*p])),
                Expr::And(v) => plain_pins(v).map(|p| (GateKind::Nand, p)),
                Expr::Or(v) => plain_pins(v).map(|p| (GateKind::Nor, p)),
                Expr::Xor(v) => plain_pins(v).map(|p| (GateKind::Xnor, p)),
                _ => None,
            },
            Expr::And(v) => plain_pins(v).map(|p| (GateKind::And, p)),
            Expr::Or(v) => plain_pins(v).map(|p| (GateKind::Or, p)),
            Expr::Xor(v) => plain_pins(v).map(|p| (GateKind::Xor, p)),
        }
    }
}
