//! Fault identities and statuses

use std::fmt;

use crate::network::{Network, NodeId};

/// The fault model a run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultType {
    /// Single stuck-at faults
    #[default]
    StuckAt,
    /// Transition-delay faults across two time frames
    TransitionDelay,
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultType::StuckAt => write!(f, "stuck-at"),
            FaultType::TransitionDelay => write!(f, "transition-delay"),
        }
    }
}

/// Index of a fault inside its [`crate::fault::FaultDb`]
pub type FaultId = usize;

/// Where a fault sits relative to its gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultLoc {
    /// On the gate or PPI output
    Stem,
    /// On fanin `pos` of the gate
    Branch {
        /// Fanin position
        pos: usize,
    },
}

/// A single modeled fault
///
/// `val` is the value the faulty signal holds: the stuck value for stuck-at
/// faults, and the value the slow signal keeps in the second frame for
/// transition faults (0 is slow-to-rise, 1 is slow-to-fall; the previous
/// frame must equal `val` to launch the transition).
#[derive(Debug, Clone)]
pub struct Fault {
    pub(crate) id: FaultId,
    pub(crate) node: NodeId,
    pub(crate) loc: FaultLoc,
    pub(crate) val: bool,
    pub(crate) rep: FaultId,
}

impl Fault {
    /// Fault id
    pub fn id(&self) -> FaultId {
        self.id
    }

    /// The gate or PPI whose output carries the fault effect
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Stem or branch position
    pub fn loc(&self) -> FaultLoc {
        self.loc
    }

    /// The faulty value
    pub fn val(&self) -> bool {
        self.val
    }

    /// Representative after equivalence collapsing
    pub fn rep(&self) -> FaultId {
        self.rep
    }

    /// Whether this fault represents its equivalence class
    pub fn is_rep(&self) -> bool {
        self.rep == self.id
    }

    /// The signal whose value the fault corrupts
    ///
    /// The node itself for a stem fault, the fanin node for a branch fault.
    pub fn site_node(&self, network: &Network) -> NodeId {
        match self.loc {
            FaultLoc::Stem => self.node,
            FaultLoc::Branch { pos } => network.node(self.node).fanin(pos),
        }
    }

    /// Human-readable description
    pub fn describe(&self, network: &Network, fault_type: FaultType) -> String {
        let name = network
            .node(self.node)
            .name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("n{}", self.node));
        let what = match (fault_type, self.val) {
            (FaultType::StuckAt, false) => "sa0",
            (FaultType::StuckAt, true) => "sa1",
            (FaultType::TransitionDelay, false) => "slow-rise",
            (FaultType::TransitionDelay, true) => "slow-fall",
        };
        match self.loc {
            FaultLoc::Stem => format!("{}:O:{}", name, what),
            FaultLoc::Branch { pos } => format!("{}:I{}:{}", name, pos, what),
        }
    }
}

/// Lifecycle of a fault during a run
///
/// Transitions are monotone: a fault leaves `Undetected` exactly once,
/// except that an `Aborted` fault may later be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultStatus {
    /// Not classified yet
    #[default]
    Undetected,
    /// Some pattern detects it
    Detected,
    /// No pattern can detect it
    Untestable,
    /// Gave up within the resource budget
    Aborted,
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultStatus::Undetected => "undetected",
            FaultStatus::Detected => "detected",
            FaultStatus::Untestable => "untestable",
            FaultStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}
