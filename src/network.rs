//! Circuit model: nodes, building, derived regions and dominators

mod builder;
mod expr;
mod network;
mod node;
mod parsed;

pub use builder::{build, BuildError};
pub use expr::Expr;
pub use network::{Ffr, Mffc, Network, NetworkStats};
pub use node::{GateKind, Node, NodeId, NodeKind};
pub use parsed::{GateFunc, ParsedDff, ParsedGate, ParsedNetlist};
