//! Fault enumeration, equivalence collapsing and status tracking

use std::fmt::Write as _;

use fxhash::FxHashMap;

use crate::fault::{Fault, FaultId, FaultLoc, FaultStatus, FaultType};
use crate::network::{GateKind, Network, NodeId};

/// All modeled faults of a network, with their statuses
///
/// Faults are enumerated once, collapsed into equivalence classes, and
/// indexed by the FFR their effect starts in. The status array is the only
/// mutable part; the driver updates it between engine calls.
#[derive(Debug)]
pub struct FaultDb {
    fault_type: FaultType,
    faults: Vec<Fault>,
    status: Vec<FaultStatus>,
    rep_list: Vec<FaultId>,
    ffr_faults: Vec<Vec<FaultId>>,
}

impl FaultDb {
    /// Enumerate and collapse the faults of `network`
    pub fn enumerate(network: &Network, fault_type: FaultType) -> FaultDb {
        let mut faults: Vec<Fault> = Vec::new();
        // (gate, fanin position) -> fault ids for stuck-at 0 / 1
        let mut branch_at: FxHashMap<(NodeId, usize), [FaultId; 2]> = FxHashMap::default();

        let mut add = |faults: &mut Vec<Fault>, node: NodeId, loc: FaultLoc| -> [FaultId; 2] {
            let mut ids = [0; 2];
            for (i, val) in [false, true].into_iter().enumerate() {
                let id = faults.len();
                faults.push(Fault {
                    id,
                    node,
                    loc,
                    val,
                    rep: id,
                });
                ids[i] = id;
            }
            ids
        };

        for id in network.topo_order() {
            let node = network.node(*id);
            if node.is_ppi() && node.fanout_num() > 0 {
                add(&mut faults, *id, FaultLoc::Stem);
            }
            if !node.is_gate() || node.is_decomposed() {
                continue;
            }
            add(&mut faults, *id, FaultLoc::Stem);
            match node.pin_map() {
                Some(map) => {
                    for entry in map.iter().flatten() {
                        let (host, pos) = *entry;
                        let ids = add(&mut faults, host, FaultLoc::Branch { pos });
                        branch_at.insert((host, pos), ids);
                    }
                }
                None => {
                    for pos in 0..node.fanin_num() {
                        let ids = add(&mut faults, *id, FaultLoc::Branch { pos });
                        branch_at.insert((*id, pos), ids);
                    }
                }
            }
        }

        let mut db = FaultDb {
            fault_type,
            status: vec![FaultStatus::Undetected; faults.len()],
            rep_list: Vec::new(),
            ffr_faults: vec![Vec::new(); network.ffrs().len()],
            faults,
        };
        db.collapse(network, &branch_at);

        for f in &db.faults {
            if f.rep == f.id {
                db.rep_list.push(f.id);
                db.ffr_faults[network.node(f.node).ffr_id()].push(f.id);
            }
        }
        db
    }

    /// Merge equivalent faults onto a single representative
    fn collapse(&mut self, network: &Network, branch_at: &FxHashMap<(NodeId, usize), [FaultId; 2]>) {
        // stem fault ids per node, filled on first sight
        let mut stem_at: FxHashMap<NodeId, [FaultId; 2]> = FxHashMap::default();
        for f in &self.faults {
            if f.loc == FaultLoc::Stem {
                let e = stem_at.entry(f.node).or_insert([usize::MAX; 2]);
                e[f.val as usize] = f.id;
            }
        }

        // Branch faults fold into the stem of their own gate
        for id in 0..self.faults.len() {
            let (node, loc, val) = {
                let f = &self.faults[id];
                (f.node, f.loc, f.val)
            };
            let FaultLoc::Branch { .. } = loc else {
                continue;
            };
            let Some(kind) = network.node(node).gate_kind() else {
                continue;
            };
            let target = match kind {
                GateKind::Buf => Some(val),
                GateKind::Not => Some(!val),
                _ => {
                    // A controlling input value fixes the output; the
                    // previous-frame condition does not carry over, so this
                    // rule is for stuck-at faults only
                    if self.fault_type == FaultType::StuckAt
                        && kind.controlling_value() == Some(val)
                    {
                        kind.controlled_output()
                    } else {
                        None
                    }
                }
            };
            if let Some(out_val) = target {
                // hosts inside a decomposition carry no stem faults
                let Some(stems) = stem_at.get(&node) else {
                    continue;
                };
                let stem = stems[out_val as usize];
                if stem != usize::MAX {
                    self.faults[id].rep = stem;
                }
            }
        }

        // A stem that feeds exactly one gate input is the same fault as that
        // branch
        for id in 0..self.faults.len() {
            let (node, loc, val) = {
                let f = &self.faults[id];
                (f.node, f.loc, f.val)
            };
            if loc != FaultLoc::Stem {
                continue;
            }
            let n = network.node(node);
            if n.fanout_num() != 1 {
                continue;
            }
            let fo = network.node(n.fanouts()[0]);
            if !fo.is_gate() {
                continue;
            }
            let positions: Vec<usize> = (0..fo.fanin_num())
                .filter(|p| fo.fanin(*p) == node)
                .collect();
            if positions.len() != 1 {
                continue;
            }
            if let Some(ids) = branch_at.get(&(fo.id(), positions[0])) {
                self.faults[id].rep = ids[val as usize];
            }
        }

        // Compress chains so rep is idempotent
        for id in 0..self.faults.len() {
            let mut rep = self.faults[id].rep;
            while self.faults[rep].rep != rep {
                rep = self.faults[rep].rep;
            }
            self.faults[id].rep = rep;
        }
    }

    /// The fault model this database was enumerated for
    pub fn fault_type(&self) -> FaultType {
        self.fault_type
    }

    /// Total number of faults before collapsing
    pub fn fault_num(&self) -> usize {
        self.faults.len()
    }

    /// Number of representative faults
    pub fn rep_num(&self) -> usize {
        self.rep_list.len()
    }

    /// Fault by id
    pub fn fault(&self, id: FaultId) -> &Fault {
        &self.faults[id]
    }

    /// All faults, collapsed or not
    pub fn all_faults(&self) -> impl Iterator<Item = &Fault> {
        self.faults.iter()
    }

    /// Representative faults only
    pub fn reps(&self) -> impl Iterator<Item = &Fault> {
        self.rep_list.iter().map(|id| &self.faults[*id])
    }

    /// Representative faults whose effect starts inside FFR `ffr`
    pub fn ffr_faults(&self, ffr: usize) -> &[FaultId] {
        &self.ffr_faults[ffr]
    }

    /// Representative faults with a given status
    pub fn reps_with_status(&self, status: FaultStatus) -> impl Iterator<Item = &Fault> + '_ {
        self.reps().filter(move |f| self.status(f.id) == status)
    }

    /// Status of a fault; non-representatives answer for their class
    pub fn status(&self, id: FaultId) -> FaultStatus {
        self.status[self.faults[id].rep]
    }

    /// Update the status of a fault's class
    ///
    /// Only `Undetected` and `Aborted` classes may move; terminal verdicts
    /// never change.
    pub fn set_status(&mut self, id: FaultId, status: FaultStatus) {
        let rep = self.faults[id].rep;
        match self.status[rep] {
            FaultStatus::Undetected => self.status[rep] = status,
            FaultStatus::Aborted => {
                if status != FaultStatus::Undetected {
                    self.status[rep] = status;
                }
            }
            _ => {}
        }
    }

    /// Counts of representative faults by status:
    /// (detected, untestable, aborted, undetected)
    pub fn status_counts(&self) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);
        for id in &self.rep_list {
            match self.status[*id] {
                FaultStatus::Detected => counts.0 += 1,
                FaultStatus::Untestable => counts.1 += 1,
                FaultStatus::Aborted => counts.2 += 1,
                FaultStatus::Undetected => counts.3 += 1,
            }
        }
        counts
    }

    /// Human-readable dump of the representative faults and their statuses
    pub fn dump(&self, network: &Network) -> String {
        let mut out = String::new();
        for f in self.reps() {
            let _ = writeln!(
                out,
                "{}  {}",
                f.describe(network, self.fault_type),
                self.status(f.id)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{build, ParsedNetlist};

    fn inverter() -> Network {
        let mut p = ParsedNetlist::new("inv");
        p.input("a");
        p.gate("y", GateKind::Not, &["a"]);
        p.output("y");
        build(&p).unwrap()
    }

    #[test]
    fn test_inverter_collapse() {
        let net = inverter();
        let db = FaultDb::enumerate(&net, FaultType::StuckAt);
        // a stem 0/1, y stem 0/1, y branch 0/1
        assert_eq!(db.fault_num(), 6);
        // branches fold into y's stems, a's stems chain through the branch
        assert_eq!(db.rep_num(), 2);
        for f in db.all_faults() {
            // representative identity is idempotent
            assert_eq!(db.fault(f.rep()).rep(), f.rep());
        }
        // a:sa0 is equivalent to y:sa1 through the inverter
        let a = net.find_node("a").unwrap();
        let y = net.find_node("y").unwrap();
        let a_sa0 = db
            .all_faults()
            .find(|f| f.node() == a && !f.val() && f.loc() == FaultLoc::Stem)
            .unwrap();
        let rep = db.fault(a_sa0.rep());
        assert_eq!(rep.node(), y);
        assert!(rep.val());
    }

    #[test]
    fn test_and_collapse() {
        let mut p = ParsedNetlist::new("and2");
        p.input("a").input("b");
        p.gate("y", GateKind::And, &["a", "b"]);
        p.output("y");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::StuckAt);
        // {a0, b0, branches-0, y0} is one class; a1, b1, y1 stay apart
        assert_eq!(db.rep_num(), 4);
        let y = net.find_node("y").unwrap();
        let a = net.find_node("a").unwrap();
        let a_sa0 = db
            .all_faults()
            .find(|f| f.node() == a && !f.val())
            .unwrap();
        assert_eq!(db.fault(a_sa0.rep()).node(), y);
        assert!(!db.fault(a_sa0.rep()).val());
        // a stuck-at-1 is represented by the branch on the gate input
        let a_sa1 = db.all_faults().find(|f| f.node() == a && f.val()).unwrap();
        let rep = db.fault(a_sa1.rep());
        assert_eq!(rep.node(), y);
        assert!(matches!(rep.loc(), FaultLoc::Branch { pos: 0 }));
    }

    #[test]
    fn test_transition_no_controlling_collapse() {
        let mut p = ParsedNetlist::new("and2");
        p.input("a").input("b");
        p.gate("y", GateKind::And, &["a", "b"]);
        p.output("y");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::TransitionDelay);
        // Only the single-fanout chaining applies, so input slow-to-rise
        // faults keep their own classes
        assert!(db.rep_num() > 4);
    }

    #[test]
    fn test_status_monotone() {
        let net = inverter();
        let mut db = FaultDb::enumerate(&net, FaultType::StuckAt);
        let f = db.rep_list[0];
        assert_eq!(db.status(f), FaultStatus::Undetected);
        db.set_status(f, FaultStatus::Aborted);
        assert_eq!(db.status(f), FaultStatus::Aborted);
        db.set_status(f, FaultStatus::Detected);
        assert_eq!(db.status(f), FaultStatus::Detected);
        // terminal verdicts stick
        db.set_status(f, FaultStatus::Untestable);
        assert_eq!(db.status(f), FaultStatus::Detected);
    }

    #[test]
    fn test_ffr_faults_cover_reps() {
        let mut p = ParsedNetlist::new("two_out");
        p.input("a").input("b").input("c");
        p.gate("u", GateKind::And, &["a", "b"]);
        p.gate("v", GateKind::Or, &["u", "c"]);
        p.gate("w", GateKind::Not, &["u"]);
        p.output("v").output("w");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::StuckAt);
        let total: usize = (0..net.ffrs().len()).map(|i| db.ffr_faults(i).len()).sum();
        assert_eq!(total, db.rep_num());
    }
}
