//! Bit-parallel event-driven fault simulation

mod eventq;
mod fsim;
mod simnode;

pub use fsim::{DetectedFault, Fsim};
