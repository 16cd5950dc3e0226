//! Bit-parallel event-driven fault simulation
//!
//! The simulator owns its own arena of [`SimNode`]s, built once from the
//! network. A batch of up to 64 patterns is evaluated in one pass: good
//! values first, then per FFR the activation and local observability masks
//! of every live fault, then one event-driven propagation per FFR whose
//! combined mask is nonzero. Values touched by an event run are restored
//! from a clear list, never by a full sweep.

use tracing::debug;

use crate::fault::{FaultDb, FaultId, FaultLoc, FaultType};
use crate::network::{Network, NodeKind};
use crate::packed::{diff, PackedVal, PackedVal3, PV_ALL0, PV_ALL1, PV_BITLEN};
use crate::pattern::{TestVector, Val3};
use crate::sim::eventq::EventQ;
use crate::sim::simnode::{SimFanout, SimGate, SimId, SimNode};

/// One detection reported by [`Fsim::ppsfp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFault {
    /// The detected fault (a representative)
    pub fault: FaultId,
    /// Which of the 64 pattern slots detect it
    pub pat: PackedVal,
}

// A fault as the simulator sees it
#[derive(Debug, Clone)]
struct SimFault {
    fault: FaultId,
    val: bool,
    // gate whose output the effect appears at
    node: SimId,
    // fanin position for branch faults
    branch: Option<usize>,
    // signal whose value activates the fault
    inode: SimId,
    skip: bool,
    obs_mask: PackedVal,
}

#[derive(Debug, Clone)]
struct SimFfr {
    root: SimId,
    faults: Vec<usize>,
}

/// The fault simulator
pub struct Fsim {
    fault_type: FaultType,
    input_num: usize,
    dff_num: usize,
    nodes: Vec<SimNode>,
    ppi_list: Vec<SimId>,
    dff_in_list: Vec<SimId>,
    dff_out_list: Vec<SimId>,
    logic_list: Vec<SimId>,
    prev_val: Vec<PackedVal3>,
    ffrs: Vec<SimFfr>,
    queue: EventQ,
    flip_mask: Vec<PackedVal>,
    clear_list: Vec<(SimId, PackedVal3)>,
    flip_list: Vec<SimId>,
    sim_faults: Vec<SimFault>,
    fault_map: Vec<Option<usize>>,
    pat_map: PackedVal,
    pat_buf: Vec<Option<TestVector>>,
}

impl Fsim {
    /// Build a simulator over a network and its fault database
    ///
    /// Only representative faults are simulated; queries about a collapsed
    /// fault answer for its class.
    pub fn new(network: &Network, faults: &FaultDb) -> Fsim {
        let n = network.node_num();
        let mut nodes = Vec::with_capacity(n);
        for id in 0..n {
            let node = network.node(id);
            let gate = match node.kind() {
                NodeKind::Input { .. } | NodeKind::DffOutput { .. } => SimGate::Input,
                NodeKind::Output { .. } | NodeKind::DffInput { .. } => {
                    SimGate::Buf(node.fanin(0))
                }
                NodeKind::Gate(kind) => SimGate::from_kind(kind, node.fanins()),
            };
            let mut sim_node = SimNode::new(gate, node.level());
            if node.is_ppo() {
                sim_node.set_output();
            }
            nodes.push(sim_node);
        }
        for id in 0..n {
            let node = network.node(id);
            nodes[id].fanout = match node.fanouts() {
                [] => SimFanout::None,
                [single] => SimFanout::Single(*single),
                many => SimFanout::Multi(many.into()),
            };
            if let [single] = node.fanouts() {
                let fo = network.node(*single);
                nodes[id].ipos = fo
                    .fanins()
                    .iter()
                    .position(|f| *f == id)
                    .expect("fanout back edge");
            }
        }

        let mut ffrs = Vec::with_capacity(network.ffrs().len());
        for ffr in network.ffrs() {
            nodes[ffr.root].set_ffr_root();
            ffrs.push(SimFfr {
                root: ffr.root,
                faults: Vec::new(),
            });
        }

        let mut sim_faults = Vec::new();
        let mut rep_sim = vec![None; faults.fault_num()];
        for f in faults.reps() {
            let (branch, inode) = match f.loc() {
                FaultLoc::Stem => (None, f.node()),
                FaultLoc::Branch { pos } => (Some(pos), network.node(f.node()).fanin(pos)),
            };
            let idx = sim_faults.len();
            sim_faults.push(SimFault {
                fault: f.id(),
                val: f.val(),
                node: f.node(),
                branch,
                inode,
                skip: false,
                obs_mask: PV_ALL0,
            });
            rep_sim[f.id()] = Some(idx);
            ffrs[network.node(f.node()).ffr_id()].faults.push(idx);
        }
        let fault_map = faults
            .all_faults()
            .map(|f| rep_sim[f.rep()])
            .collect::<Vec<_>>();

        let mut queue = EventQ::default();
        queue.init(network.max_level() as usize);

        debug!(
            nodes = n,
            faults = sim_faults.len(),
            ffrs = ffrs.len(),
            "fault simulator ready"
        );

        Fsim {
            fault_type: faults.fault_type(),
            input_num: network.input_num(),
            dff_num: network.dff_num(),
            nodes,
            ppi_list: network.ppis().to_vec(),
            dff_in_list: (0..network.dff_num()).map(|i| network.dff_input(i)).collect(),
            dff_out_list: (0..network.dff_num())
                .map(|i| network.dff_output(i))
                .collect(),
            logic_list: network
                .topo_order()
                .iter()
                .copied()
                .filter(|id| !network.node(*id).is_ppi())
                .collect(),
            prev_val: vec![PackedVal3::ALL_X; n],
            ffrs,
            queue,
            flip_mask: vec![PV_ALL0; n],
            clear_list: Vec::new(),
            flip_list: Vec::new(),
            sim_faults,
            fault_map,
            pat_map: PV_ALL0,
            pat_buf: vec![None; PV_BITLEN],
        }
    }

    /// The fault model this simulator runs
    pub fn fault_type(&self) -> FaultType {
        self.fault_type
    }

    //
    // Skip flags
    //

    /// Mark every fault as skipped
    pub fn set_skip_all(&mut self) {
        for sf in &mut self.sim_faults {
            sf.skip = true;
        }
    }

    /// Clear every skip mark
    pub fn clear_skip_all(&mut self) {
        for sf in &mut self.sim_faults {
            sf.skip = false;
        }
    }

    /// Skip one fault (by any id of its class)
    pub fn set_skip(&mut self, fault: FaultId) {
        if let Some(idx) = self.fault_map[fault] {
            self.sim_faults[idx].skip = true;
        }
    }

    /// Re-activate one fault
    pub fn clear_skip(&mut self, fault: FaultId) {
        if let Some(idx) = self.fault_map[fault] {
            self.sim_faults[idx].skip = false;
        }
    }

    //
    // Pattern slots for ppsfp
    //

    /// Clear all pattern slots
    pub fn clear_patterns(&mut self) {
        self.pat_map = PV_ALL0;
        for slot in &mut self.pat_buf {
            *slot = None;
        }
    }

    /// Assign a pattern to slot `pos` (0..64)
    pub fn set_pattern(&mut self, pos: usize, tv: TestVector) {
        assert!(pos < PV_BITLEN);
        self.pat_buf[pos] = Some(tv);
        self.pat_map |= 1u64 << pos;
    }

    /// The pattern in slot `pos`, if set
    pub fn get_pattern(&self, pos: usize) -> Option<&TestVector> {
        self.pat_buf[pos].as_ref()
    }

    //
    // Entry points
    //

    /// Parallel-pattern parallel-fault simulation over the filled slots
    ///
    /// Returns, per detected fault, the bitmask of slots that detect it.
    /// For a fixed slot assignment and skip state the returned multiset is
    /// deterministic.
    pub fn ppsfp(&mut self) -> Vec<DetectedFault> {
        if self.pat_map == PV_ALL0 {
            return Vec::new();
        }
        self.calc_gval_slots();
        let mut det = Vec::new();
        for ffr_idx in 0..self.ffrs.len() {
            let req = self.foreach_faults(ffr_idx) & self.pat_map;
            if req == PV_ALL0 {
                continue;
            }
            let root = self.ffrs[ffr_idx].root;
            let obs = self.prop_sim(root, req) & self.pat_map;
            if obs == PV_ALL0 {
                continue;
            }
            for k in 0..self.ffrs[ffr_idx].faults.len() {
                let sfi = self.ffrs[ffr_idx].faults[k];
                let sf = &self.sim_faults[sfi];
                if sf.skip {
                    continue;
                }
                let pat = sf.obs_mask & obs;
                if pat != PV_ALL0 {
                    det.push(DetectedFault {
                        fault: sf.fault,
                        pat,
                    });
                }
            }
        }
        det
    }

    /// Single-pattern parallel-fault simulation
    ///
    /// Returns every live fault the pattern detects. FFR propagations are
    /// batched 64 at a time through the event queue, one bit lane each.
    pub fn sppfp(&mut self, tv: &TestVector) -> Vec<FaultId> {
        self.calc_gval_single(tv);
        let mut det = Vec::new();
        let mut batch = [0usize; PV_BITLEN];
        let mut bitpos = 0;
        for ffr_idx in 0..self.ffrs.len() {
            let req = self.foreach_faults(ffr_idx);
            if req == PV_ALL0 {
                continue;
            }
            let root = self.ffrs[ffr_idx].root;
            if self.nodes[root].is_output() {
                self.sweep_ffr(ffr_idx, &mut det);
                continue;
            }
            self.put_trigger(root, 1u64 << bitpos, false);
            batch[bitpos] = ffr_idx;
            bitpos += 1;
            if bitpos == PV_BITLEN {
                self.flush_batch(&batch, bitpos, &mut det);
                bitpos = 0;
            }
        }
        if bitpos > 0 {
            self.flush_batch(&batch, bitpos, &mut det);
        }
        det
    }

    /// Single-pattern single-fault simulation
    pub fn spsfp(&mut self, tv: &TestVector, fault: FaultId) -> bool {
        let Some(sfi) = self.fault_map[fault] else {
            return false;
        };
        self.calc_gval_single(tv);
        let obs = self.fault_prop(sfi);
        if obs == PV_ALL0 {
            return false;
        }
        let root = self.ffr_root_of(self.sim_faults[sfi].node);
        self.prop_sim(root, PV_ALL1) != PV_ALL0
    }

    /// Count signal transitions between the two frames of `tv`
    ///
    /// With `weighted` each transitioning node counts `1 + fanout_num`.
    /// A simulation-only query: fault statuses and skip flags are untouched.
    pub fn calc_wsa(&mut self, tv: &TestVector, weighted: bool) -> usize {
        debug_assert_eq!(self.fault_type, FaultType::TransitionDelay);
        self.calc_gval_single(tv);
        let mut wsa = 0;
        for id in 0..self.nodes.len() {
            if self.prev_val[id] != self.nodes[id].val {
                wsa += 1;
                if weighted {
                    wsa += self.nodes[id].fanout.len();
                }
            }
        }
        wsa
    }

    //
    // Good-value computation
    //

    fn val3_packed(v: Val3) -> PackedVal3 {
        match v {
            Val3::X => PackedVal3::ALL_X,
            Val3::V0 => PackedVal3::ALL_0,
            Val3::V1 => PackedVal3::ALL_1,
        }
    }

    fn eval_node(&self, id: SimId) -> PackedVal3 {
        self.nodes[id].gate.eval(|i| self.nodes[i].val)
    }

    fn eval_all(&mut self) {
        for k in 0..self.logic_list.len() {
            let id = self.logic_list[k];
            self.nodes[id].val = self.eval_node(id);
        }
    }

    // Frame shift for the two-frame model: remember every value, then move
    // the captured flip-flop inputs onto their outputs
    fn shift_frames(&mut self) {
        for id in 0..self.nodes.len() {
            self.prev_val[id] = self.nodes[id].val;
        }
        for d in 0..self.dff_num {
            let captured = self.nodes[self.dff_in_list[d]].val;
            self.nodes[self.dff_out_list[d]].val = captured;
        }
    }

    fn calc_gval_single(&mut self, tv: &TestVector) {
        for pos in 0..self.ppi_list.len() {
            let id = self.ppi_list[pos];
            self.nodes[id].val = Self::val3_packed(tv.ppi_val(pos));
        }
        self.eval_all();
        if self.fault_type == FaultType::TransitionDelay {
            self.shift_frames();
            for pos in 0..self.input_num {
                let id = self.ppi_list[pos];
                self.nodes[id].val = Self::val3_packed(tv.aux_input_val(pos));
            }
            self.eval_all();
        }
    }

    // Pack one PPI position across the 64 slots; unused slots replicate the
    // first filled one so no artificial X values appear
    fn pack_slots(&self, get: impl Fn(&TestVector) -> Val3) -> PackedVal3 {
        let first = self
            .pat_buf
            .iter()
            .flatten()
            .next()
            .expect("at least one pattern slot");
        let mut zeros = PV_ALL0;
        let mut ones = PV_ALL0;
        for lane in 0..PV_BITLEN {
            let tv = self.pat_buf[lane].as_ref().unwrap_or(first);
            match get(tv) {
                Val3::V0 => zeros |= 1u64 << lane,
                Val3::V1 => ones |= 1u64 << lane,
                Val3::X => {}
            }
        }
        PackedVal3::new(zeros, ones)
    }

    fn calc_gval_slots(&mut self) {
        for pos in 0..self.ppi_list.len() {
            let id = self.ppi_list[pos];
            self.nodes[id].val = self.pack_slots(|tv| tv.ppi_val(pos));
        }
        self.eval_all();
        if self.fault_type == FaultType::TransitionDelay {
            self.shift_frames();
            for pos in 0..self.input_num {
                let id = self.ppi_list[pos];
                self.nodes[id].val = self.pack_slots(|tv| tv.aux_input_val(pos));
            }
            self.eval_all();
        }
    }

    //
    // FFR-local fault effects
    //

    fn gobs(&self, id: SimId, ipos: usize) -> PackedVal {
        self.nodes[id].gate.gobs(ipos, |i| self.nodes[i].val)
    }

    // Activation and FFR-internal observability of one fault
    fn fault_prop(&self, sfi: usize) -> PackedVal {
        let sf = &self.sim_faults[sfi];
        let ival = self.nodes[sf.inode].val;
        let activated = if sf.val { ival.val0() } else { ival.val1() };
        let mut obs = activated;
        if self.fault_type == FaultType::TransitionDelay {
            let pval = self.prev_val[sf.inode];
            obs &= if sf.val { pval.val1() } else { pval.val0() };
        }
        obs & self.ffr_prop(sfi)
    }

    fn ffr_prop(&self, sfi: usize) -> PackedVal {
        let sf = &self.sim_faults[sfi];
        let mut lobs = PV_ALL1;
        let mut n = sf.node;
        while !self.nodes[n].is_ffr_root() {
            let fo = self.nodes[n].fanout.single().expect("FFR member fanout");
            lobs &= self.gobs(fo, self.nodes[n].ipos);
            n = fo;
        }
        if let Some(ipos) = sf.branch {
            lobs &= self.gobs(sf.node, ipos);
        }
        lobs
    }

    fn foreach_faults(&mut self, ffr_idx: usize) -> PackedVal {
        let mut req = PV_ALL0;
        for k in 0..self.ffrs[ffr_idx].faults.len() {
            let sfi = self.ffrs[ffr_idx].faults[k];
            if self.sim_faults[sfi].skip {
                continue;
            }
            let obs = self.fault_prop(sfi);
            self.sim_faults[sfi].obs_mask = obs;
            req |= obs;
        }
        req
    }

    fn sweep_ffr(&self, ffr_idx: usize, det: &mut Vec<FaultId>) {
        for sfi in &self.ffrs[ffr_idx].faults {
            let sf = &self.sim_faults[*sfi];
            if !sf.skip && sf.obs_mask != PV_ALL0 {
                det.push(sf.fault);
            }
        }
    }

    fn flush_batch(&mut self, batch: &[usize; PV_BITLEN], len: usize, det: &mut Vec<FaultId>) {
        let obs = self.simulate();
        for (bit, ffr_idx) in batch[..len].iter().enumerate() {
            if obs >> bit & 1 != 0 {
                self.sweep_ffr(*ffr_idx, det);
            }
        }
    }

    fn ffr_root_of(&self, mut id: SimId) -> SimId {
        while !self.nodes[id].is_ffr_root() {
            id = self.nodes[id].fanout.single().expect("FFR member fanout");
        }
        id
    }

    //
    // Event-driven propagation
    //

    fn fanout_at(&self, id: SimId, i: usize) -> SimId {
        match &self.nodes[id].fanout {
            SimFanout::Single(x) => *x,
            SimFanout::Multi(v) => v[i],
            SimFanout::None => unreachable!("no fanouts"),
        }
    }

    fn put(&mut self, id: SimId) {
        if !self.nodes[id].in_queue() {
            self.nodes[id].set_queued();
            let level = self.nodes[id].level as usize;
            self.queue.put(id, level);
        }
    }

    fn put_fanouts(&mut self, id: SimId) {
        for i in 0..self.nodes[id].fanout.len() {
            let fo = self.fanout_at(id, i);
            self.put(fo);
        }
    }

    // Inject a flip at `node`. When `immediate` (or for inputs, which no
    // other event can touch) the value changes right away; otherwise the
    // flip mask is applied when the node is dequeued, so several triggers
    // can coexist in one run.
    fn put_trigger(&mut self, node: SimId, valmask: PackedVal, immediate: bool) {
        if immediate || matches!(self.nodes[node].gate, SimGate::Input) {
            let old = self.nodes[node].val;
            self.nodes[node].val = old.flip_with_mask(valmask);
            self.clear_list.push((node, old));
            self.put_fanouts(node);
        } else {
            self.nodes[node].set_flipped();
            self.flip_mask[node] = valmask;
            self.flip_list.push(node);
            self.put(node);
        }
    }

    // Propagate from an FFR root; returns the bits that reach any output
    fn prop_sim(&mut self, root: SimId, obs_mask: PackedVal) -> PackedVal {
        if self.nodes[root].is_output() {
            return PV_ALL1;
        }
        self.put_trigger(root, obs_mask, true);
        self.simulate()
    }

    // Drain the queue in level order, then restore every touched value
    fn simulate(&mut self) -> PackedVal {
        let mut obs = PV_ALL0;
        while let Some(id) = self.queue.pop() {
            self.nodes[id].clear_queued();
            let old = self.nodes[id].val;
            let computed = self.eval_node(id);
            let mut new = old;
            // bits already observed at an output stay frozen
            new.set_with_mask(computed, !obs);
            if self.nodes[id].has_flip_mask() {
                new = new.flip_with_mask(self.flip_mask[id]);
            }
            self.nodes[id].val = new;
            if new != old {
                self.clear_list.push((id, old));
                if self.nodes[id].is_output() {
                    obs |= diff(new, old);
                } else {
                    self.put_fanouts(id);
                }
            }
        }
        for (id, old) in self.clear_list.drain(..) {
            self.nodes[id].val = old;
        }
        for id in self.flip_list.drain(..) {
            self.nodes[id].clear_flipped();
        }
        obs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{build, GateKind, ParsedNetlist};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn tv_from_bits(net: &Network, bits: &[u8]) -> TestVector {
        let mut tv = TestVector::new(net.input_num(), net.dff_num(), FaultType::StuckAt);
        for (i, b) in bits.iter().enumerate() {
            tv.set_ppi_val(i, Val3::from_bool(*b != 0));
        }
        tv
    }

    fn inverter() -> (Network, FaultDb) {
        let mut p = ParsedNetlist::new("inv");
        p.input("a");
        p.gate("y", GateKind::Not, &["a"]);
        p.output("y");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::StuckAt);
        (net, db)
    }

    #[test]
    fn test_spsfp_inverter() {
        let (net, db) = inverter();
        let mut sim = Fsim::new(&net, &db);
        let y = net.find_node("y").unwrap();
        let y_sa0 = db
            .all_faults()
            .find(|f| f.node() == y && !f.val() && f.loc() == FaultLoc::Stem)
            .unwrap()
            .id();
        let y_sa1 = db
            .all_faults()
            .find(|f| f.node() == y && f.val() && f.loc() == FaultLoc::Stem)
            .unwrap()
            .id();
        let tv0 = tv_from_bits(&net, &[0]);
        let tv1 = tv_from_bits(&net, &[1]);
        // a=0 makes y=1: detects y stuck-at-0
        assert!(sim.spsfp(&tv0, y_sa0));
        assert!(!sim.spsfp(&tv0, y_sa1));
        // a=1 makes y=0: detects y stuck-at-1
        assert!(sim.spsfp(&tv1, y_sa1));
        assert!(!sim.spsfp(&tv1, y_sa0));
    }

    #[test]
    fn test_sppfp_subsumes_spsfp() {
        let (net, db) = inverter();
        let mut sim = Fsim::new(&net, &db);
        let tv = tv_from_bits(&net, &[0]);
        let det = sim.sppfp(&tv);
        for f in db.reps() {
            let single = sim.spsfp(&tv, f.id());
            assert_eq!(det.contains(&f.id()), single);
        }
    }

    #[test]
    fn test_ppsfp_slot_masking() {
        // 3-input Or, 10 random patterns in slots 0..10: no detection bit
        // may fall outside those slots
        let mut p = ParsedNetlist::new("or3");
        p.input("a").input("b").input("c");
        p.gate("y", GateKind::Or, &["a", "b", "c"]);
        p.output("y");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::StuckAt);
        let mut sim = Fsim::new(&net, &db);
        let mut rng = SmallRng::seed_from_u64(11);
        sim.clear_patterns();
        for slot in 0..10 {
            let mut tv = TestVector::new(3, 0, FaultType::StuckAt);
            tv.set_random(&mut rng);
            sim.set_pattern(slot, tv);
        }
        let det = sim.ppsfp();
        assert!(!det.is_empty());
        let union = det.iter().fold(0u64, |acc, d| acc | d.pat);
        assert_eq!(union & !0x3FF, 0);
    }

    #[test]
    fn test_ppsfp_matches_spsfp() {
        // c17-ish circuit
        let mut p = ParsedNetlist::new("c17");
        p.input("i0").input("i1").input("i2").input("i3").input("i4");
        p.gate("n1", GateKind::Nand, &["i0", "i2"]);
        p.gate("n2", GateKind::Nand, &["i3", "i2"]);
        p.gate("n3", GateKind::Nand, &["i1", "n2"]);
        p.gate("n4", GateKind::Nand, &["n2", "i4"]);
        p.gate("o1", GateKind::Nand, &["n1", "n3"]);
        p.gate("o2", GateKind::Nand, &["n3", "n4"]);
        p.output("o1").output("o2");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::StuckAt);
        let mut sim = Fsim::new(&net, &db);

        let mut rng = SmallRng::seed_from_u64(23);
        let nb_pat = 8;
        let mut tvs = Vec::new();
        sim.clear_patterns();
        for slot in 0..nb_pat {
            let mut tv = TestVector::new(5, 0, FaultType::StuckAt);
            tv.set_random(&mut rng);
            sim.set_pattern(slot, tv.clone());
            tvs.push(tv);
        }
        let det = sim.ppsfp();
        for f in db.reps() {
            let mask = det
                .iter()
                .find(|d| d.fault == f.id())
                .map(|d| d.pat)
                .unwrap_or(0);
            for (slot, tv) in tvs.iter().enumerate() {
                let single = sim.spsfp(tv, f.id());
                assert_eq!(
                    mask >> slot & 1 != 0,
                    single,
                    "slot {} fault {}",
                    slot,
                    f.describe(&net, FaultType::StuckAt)
                );
            }
        }
    }

    #[test]
    fn test_skip_excludes_faults() {
        let (net, db) = inverter();
        let mut sim = Fsim::new(&net, &db);
        let tv = tv_from_bits(&net, &[0]);
        let all = sim.sppfp(&tv);
        assert!(!all.is_empty());
        sim.set_skip_all();
        assert!(sim.sppfp(&tv).is_empty());
        sim.clear_skip(all[0]);
        let back = sim.sppfp(&tv);
        assert_eq!(back, vec![all[0]]);
        sim.clear_skip_all();
        assert_eq!(sim.sppfp(&tv).len(), all.len());
    }

    #[test]
    fn test_transition_two_frames() {
        // buffer chain a -> b1 -> b2 -> y
        let mut p = ParsedNetlist::new("chain");
        p.input("a");
        p.gate("b1", GateKind::Buf, &["a"]);
        p.gate("b2", GateKind::Buf, &["b1"]);
        p.output("b2");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::TransitionDelay);
        let mut sim = Fsim::new(&net, &db);

        let b1 = net.find_node("b1").unwrap();
        let rise = db
            .all_faults()
            .find(|f| f.node() == b1 && !f.val() && f.loc() == FaultLoc::Stem)
            .unwrap()
            .id();

        // frame1 a=0, frame2 a=1: launches a rising transition
        let mut tv = TestVector::new(1, 0, FaultType::TransitionDelay);
        tv.set_ppi_val(0, Val3::V0);
        tv.set_aux_input_val(0, Val3::V1);
        assert!(sim.spsfp(&tv, rise));

        // no transition launched: not detected
        let mut tv = TestVector::new(1, 0, FaultType::TransitionDelay);
        tv.set_ppi_val(0, Val3::V1);
        tv.set_aux_input_val(0, Val3::V1);
        assert!(!sim.spsfp(&tv, rise));
    }

    #[test]
    fn test_calc_wsa() {
        let mut p = ParsedNetlist::new("chain");
        p.input("a");
        p.gate("b1", GateKind::Buf, &["a"]);
        p.gate("b2", GateKind::Buf, &["b1"]);
        p.output("b2");
        let net = build(&p).unwrap();
        let db = FaultDb::enumerate(&net, FaultType::TransitionDelay);
        let mut sim = Fsim::new(&net, &db);

        let mut tv = TestVector::new(1, 0, FaultType::TransitionDelay);
        tv.set_ppi_val(0, Val3::V0);
        tv.set_aux_input_val(0, Val3::V1);
        // a, b1, b2 and the output sink all toggle
        let wsa = sim.calc_wsa(&tv, false);
        assert_eq!(wsa, 4);
        // each node has one fanout except the sink
        let weighted = sim.calc_wsa(&tv, true);
        assert_eq!(weighted, 7);

        let mut quiet = TestVector::new(1, 0, FaultType::TransitionDelay);
        quiet.set_ppi_val(0, Val3::V1);
        quiet.set_aux_input_val(0, Val3::V1);
        assert_eq!(sim.calc_wsa(&quiet, false), 0);
    }
}
