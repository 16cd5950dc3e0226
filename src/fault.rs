//! Fault model: enumeration, equivalence classes, statuses

mod fault;
mod faultdb;

pub use fault::{Fault, FaultId, FaultLoc, FaultStatus, FaultType};
pub use faultdb::FaultDb;
