//! Per-MFFC test generation
//!
//! One handle encodes a whole maximum fanout-free cone. Each contained FFR
//! root gets a selector variable that injects the fault effect there, so
//! every fault in the cone shares a single formula; propagation between the
//! fault's FFR root and the cone root is left to the solver.

use crate::dtpg::engine::DtpgEngine;
use crate::dtpg::justify::Justifier;
use crate::dtpg::stats::DtpgStats;
use crate::dtpg::{DtpgConfig, Outcome};
use crate::fault::{Fault, FaultType};
use crate::network::{Mffc, Network, NodeId};
use crate::pattern::TestVector;

/// SAT-based pattern generator scoped to one MFFC
pub struct DtpgMffc<'a> {
    engine: DtpgEngine<'a>,
    justifier: Justifier<'a>,
}

impl<'a> DtpgMffc<'a> {
    /// Encode the scope for `mffc`
    pub fn new(
        network: &'a Network,
        fault_type: FaultType,
        mffc: &Mffc,
        config: &DtpgConfig,
        stats: &mut DtpgStats,
    ) -> DtpgMffc<'a> {
        let elems: Vec<NodeId> = mffc
            .ffrs
            .iter()
            .map(|ffr| network.ffr(*ffr).root)
            .collect();
        let engine = DtpgEngine::new(network, fault_type, mffc.root, elems, config.sat, stats);
        let justifier = Justifier::new(config.justifier, network, fault_type);
        DtpgMffc { engine, justifier }
    }

    /// The MFFC root this scope propagates through
    pub fn root(&self) -> NodeId {
        self.engine.root()
    }

    fn fault_selectors(&self, fault: &Fault) -> Vec<crate::dtpg::sat::SatLit> {
        let network = self.engine.network();
        let ffr = network.node(fault.node()).ffr_id();
        let elem = self
            .engine
            .elem_pos(network.ffr(ffr).root)
            .expect("fault outside this scope");
        self.engine.selector_assumptions(elem)
    }

    /// Attempt one fault anywhere inside the cone
    pub fn gen_pattern(&mut self, fault: &Fault, stats: &mut DtpgStats) -> Outcome {
        let extra = self.fault_selectors(fault);
        self.engine
            .gen_pattern_with(&self.justifier, fault, &extra, stats)
    }

    /// Attempt one fault and collect up to `k` distinct vectors for it
    pub fn gen_k_patterns(
        &mut self,
        fault: &Fault,
        k: usize,
        stats: &mut DtpgStats,
    ) -> (Outcome, Vec<TestVector>) {
        let extra = self.fault_selectors(fault);
        self.engine
            .gen_k_patterns_with(&self.justifier, fault, k, &extra, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultDb;
    use crate::network::{build, GateKind, ParsedNetlist};
    use crate::sim::Fsim;

    #[test]
    fn test_mffc_covers_reconvergence() {
        // u fans out to v and w, reconverging at y: one MFFC, three FFRs
        let mut p = ParsedNetlist::new("reconv");
        p.input("a").input("b").input("c");
        p.gate("u", GateKind::And, &["a", "b"]);
        p.gate("v", GateKind::Or, &["u", "c"]);
        p.gate("w", GateKind::Not, &["u"]);
        p.gate("y", GateKind::And, &["v", "w"]);
        p.output("y");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::StuckAt);

        let y = net.find_node("y").unwrap();
        let mffc = net.mffc(net.node(y).mffc_id());
        assert!(mffc.ffrs.len() > 1);

        let mut stats = DtpgStats::default();
        let mut scope = DtpgMffc::new(&net, FaultType::StuckAt, mffc, &DtpgConfig::default(), &mut stats);
        let mut sim = Fsim::new(&net, &db);
        let mut detected = 0;
        for ffr in &mffc.ffrs {
            for fid in db.ffr_faults(*ffr) {
                let fault = db.fault(*fid);
                match scope.gen_pattern(fault, &mut stats) {
                    Outcome::Detected(tv) => {
                        detected += 1;
                        assert!(
                            sim.spsfp(&tv, *fid),
                            "generator pattern missed {}",
                            fault.describe(&net, FaultType::StuckAt)
                        );
                    }
                    Outcome::Untestable => {}
                    Outcome::Aborted => panic!("unbounded attempt aborted"),
                }
            }
        }
        assert!(detected > 0);
        assert_eq!(stats.det_count, detected);
    }

    #[test]
    fn test_mffc_agrees_with_ffr_scope() {
        use crate::dtpg::DtpgFfr;
        let mut p = ParsedNetlist::new("agree");
        p.input("a").input("b").input("c").input("d");
        p.gate("u", GateKind::Nand, &["a", "b"]);
        p.gate("v", GateKind::Nor, &["u", "c"]);
        p.gate("w", GateKind::Xor, &["u", "d"]);
        p.gate("y", GateKind::Or, &["v", "w"]);
        p.output("y");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::StuckAt);
        let config = DtpgConfig::default();

        // classify every representative with both scopes
        let mut by_ffr = std::collections::HashMap::new();
        let mut stats = DtpgStats::default();
        for ffr in net.ffrs() {
            if db.ffr_faults(ffr.id).is_empty() {
                continue;
            }
            let mut scope = DtpgFfr::new(&net, FaultType::StuckAt, ffr, &config, &mut stats);
            for fid in db.ffr_faults(ffr.id) {
                let testable = matches!(
                    scope.gen_pattern(db.fault(*fid), &mut stats),
                    Outcome::Detected(_)
                );
                by_ffr.insert(*fid, testable);
            }
        }
        for mffc in net.mffcs() {
            let any = mffc.ffrs.iter().any(|f| !db.ffr_faults(*f).is_empty());
            if !any {
                continue;
            }
            let mut scope = DtpgMffc::new(&net, FaultType::StuckAt, mffc, &config, &mut stats);
            for ffr in &mffc.ffrs {
                for fid in db.ffr_faults(*ffr) {
                    let testable = matches!(
                        scope.gen_pattern(db.fault(*fid), &mut stats),
                        Outcome::Detected(_)
                    );
                    assert_eq!(by_ffr[fid], testable, "scope disagreement on fault {}", fid);
                }
            }
        }
    }
}
