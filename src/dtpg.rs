//! SAT-based deterministic test pattern generation

mod engine;
mod ffr;
mod justify;
mod mffc;
mod sat;
mod stats;

pub use engine::{AssignList, NodeVal};
pub use ffr::DtpgFfr;
pub use justify::{JustKind, Justifier};
pub use mffc::DtpgMffc;
pub use sat::{SatModel, SatOptions};
pub use stats::DtpgStats;

use crate::pattern::TestVector;

/// Result of one test generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Testable; the vector detects the fault
    Detected(TestVector),
    /// Proven redundant: no vector can ever detect it
    Untestable,
    /// Gave up within the resource budget
    Aborted,
}

/// Knobs shared by all generation scopes
#[derive(Debug, Clone, Copy, Default)]
pub struct DtpgConfig {
    /// Back-trace strategy
    pub justifier: JustKind,
    /// SAT resource budgets
    pub sat: SatOptions,
}
