//! Test pattern generation and fault simulation for gate-level networks
//!
//! Faultline takes a gate-level netlist and a fault model (single stuck-at
//! or two-frame transition-delay) and produces a compact set of test
//! vectors detecting every testable fault. Three subsystems carry the work:
//!
//! * a fault-oriented circuit model ([`network`]) with levels, fanout-free
//!   regions, maximum fanout-free cones and dominators;
//! * a bit-parallel, event-driven, three-valued fault simulator ([`sim`])
//!   evaluating 64 patterns per pass;
//! * a SAT-based pattern generator ([`dtpg`]) that encodes one formula per
//!   region and turns satisfying assignments into test vectors.
//!
//! The [`atpg`] driver ties them together with random-pattern fault
//! dropping and per-fault bookkeeping.

#![warn(missing_docs)]

pub mod atpg;
pub mod dtpg;
pub mod fault;
pub mod io;
pub mod network;
pub mod packed;
pub mod pattern;
pub mod sim;

pub use fault::{FaultDb, FaultStatus, FaultType};
pub use network::{build, Network, ParsedNetlist};
pub use pattern::{TestVector, Val3};
pub use sim::Fsim;
