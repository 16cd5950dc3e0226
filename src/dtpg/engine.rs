//! CNF machinery shared by the FFR and MFFC test generators
//!
//! One engine encodes one scope: the good-value cone, the faulty cone from
//! the scope's injection points, the difference chain with the dominator
//! shortcut, the detection clause, and for transition faults the
//! previous-frame cone. Per-fault work is expressed as assumptions, so the
//! formula is built once per scope.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, warn};

use crate::dtpg::justify::Justifier;
use crate::dtpg::sat::{SatLit, SatModel, SatOptions, SatOutcome, SatScope, SatVar};
use crate::dtpg::stats::DtpgStats;
use crate::dtpg::Outcome;
use crate::fault::{Fault, FaultLoc, FaultType};
use crate::network::{GateKind, Network, NodeId, NodeKind};
use crate::pattern::TestVector;

/// A single required value: node, time frame (0 = previous, 1 = current),
/// and the value itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeVal {
    /// The node carrying the requirement
    pub node: NodeId,
    /// Time frame: 0 is the previous frame, 1 the current one
    pub time: u8,
    /// Required value
    pub val: bool,
}

/// An ordered list of value requirements
#[derive(Debug, Clone, Default)]
pub struct AssignList {
    list: Vec<NodeVal>,
}

impl AssignList {
    /// Empty list
    pub fn new() -> AssignList {
        AssignList::default()
    }

    /// Append a requirement
    pub fn add(&mut self, node: NodeId, time: u8, val: bool) {
        self.list.push(NodeVal { node, time, val });
    }

    /// Append every requirement of `other`
    pub fn merge(&mut self, other: &AssignList) {
        self.list.extend_from_slice(&other.list);
    }

    /// Number of requirements
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Iterate over the requirements
    pub fn iter(&self) -> impl Iterator<Item = &NodeVal> {
        self.list.iter()
    }
}

pub(crate) struct DtpgEngine<'a> {
    network: &'a Network,
    fault_type: FaultType,
    root: NodeId,
    // FFR roots with a fault-injection selector; empty in FFR mode
    elems: Vec<NodeId>,
    selectors: Vec<SatVar>,
    sat: SatScope,
    gvar: Vec<Option<SatVar>>,
    fvar: Vec<Option<SatVar>>,
    dvar: Vec<Option<SatVar>>,
    hvar: Vec<Option<SatVar>>,
    tfo: Vec<bool>,
    tfo_list: Vec<NodeId>,
    output_list: Vec<NodeId>,
}

impl<'a> DtpgEngine<'a> {
    /// Encode a scope rooted at `root`
    ///
    /// `elems` is empty for a plain FFR scope; for an MFFC scope it lists
    /// the contained FFR roots, each of which gets an injection selector.
    pub(crate) fn new(
        network: &'a Network,
        fault_type: FaultType,
        root: NodeId,
        elems: Vec<NodeId>,
        options: SatOptions,
        stats: &mut DtpgStats,
    ) -> DtpgEngine<'a> {
        let start = Instant::now();
        let n = network.node_num();
        let mut engine = DtpgEngine {
            network,
            fault_type,
            root,
            elems,
            selectors: Vec::new(),
            sat: SatScope::new(options),
            gvar: vec![None; n],
            fvar: vec![None; n],
            dvar: vec![None; n],
            hvar: vec![None; n],
            tfo: vec![false; n],
            tfo_list: Vec::new(),
            output_list: Vec::new(),
        };
        engine.prepare_vars();
        engine.gen_good_cnf();
        engine.gen_faulty_cnf();
        engine.gen_dchain_cnf();
        engine.gen_detect_cnf();
        if fault_type == FaultType::TransitionDelay {
            engine.gen_prev_cnf();
        }
        stats.update_cnf(engine.sat.var_num(), engine.sat.clause_num(), start.elapsed());
        debug!(
            root = engine.root,
            vars = engine.sat.var_num(),
            clauses = engine.sat.clause_num(),
            "scope encoded"
        );
        engine
    }

    pub(crate) fn network(&self) -> &'a Network {
        self.network
    }

    pub(crate) fn fault_type(&self) -> FaultType {
        self.fault_type
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    //
    // Variable assignment and clause generation
    //

    fn prepare_vars(&mut self) {
        let network = self.network;
        // transitive fanout of the injection points
        let seeds: Vec<NodeId> = if self.elems.is_empty() {
            vec![self.root]
        } else {
            self.elems.clone()
        };
        let mut work = seeds;
        while let Some(id) = work.pop() {
            if self.tfo[id] {
                continue;
            }
            self.tfo[id] = true;
            for fo in network.node(id).fanouts() {
                work.push(*fo);
            }
        }
        // support cone of everything reached
        let mut cone = vec![false; network.node_num()];
        let mut work: Vec<NodeId> = (0..network.node_num()).filter(|id| self.tfo[*id]).collect();
        while let Some(id) = work.pop() {
            if cone[id] {
                continue;
            }
            cone[id] = true;
            for fi in network.node(id).fanins() {
                work.push(*fi);
            }
        }
        for id in network.topo_order() {
            if cone[*id] {
                let var = self.sat.new_var();
                self.gvar[*id] = Some(var);
            }
            if self.tfo[*id] {
                self.tfo_list.push(*id);
                self.fvar[*id] = Some(self.sat.new_var());
                self.dvar[*id] = Some(self.sat.new_var());
                if network.node(*id).is_ppo() {
                    self.output_list.push(*id);
                }
            }
        }
        for _ in 0..self.elems.len() {
            let var = self.sat.new_var();
            self.selectors.push(var);
        }
        if self.fault_type == FaultType::TransitionDelay {
            self.prepare_prev_vars(&cone);
        }
    }

    // The previous-frame cone: support of the scope root at time 0, plus
    // the capture cones of every flip-flop output the current frame reads
    fn prepare_prev_vars(&mut self, cone: &[bool]) {
        let network = self.network;
        let mut work = vec![self.root];
        for d in 0..network.dff_num() {
            if cone[network.dff_output(d)] {
                work.push(network.dff_input(d));
            }
        }
        let mut prev = vec![false; network.node_num()];
        while let Some(id) = work.pop() {
            if prev[id] {
                continue;
            }
            prev[id] = true;
            for fi in network.node(id).fanins() {
                work.push(*fi);
            }
        }
        for id in network.topo_order() {
            if prev[*id] {
                let var = self.sat.new_var();
                self.hvar[*id] = Some(var);
            }
        }
    }

    fn glit(&self, id: NodeId) -> SatLit {
        self.gvar[id].expect("node in good cone").pos()
    }

    fn flit(&self, id: NodeId) -> SatLit {
        match self.fvar[id] {
            Some(var) => var.pos(),
            None => self.glit(id),
        }
    }

    fn hlit(&self, id: NodeId) -> SatLit {
        self.hvar[id].expect("node in previous-frame cone").pos()
    }

    fn gen_good_cnf(&mut self) {
        for id in 0..self.network.node_num() {
            let Some(out) = self.gvar[id] else { continue };
            let node = self.network.node(id);
            match node.kind() {
                NodeKind::Input { .. } | NodeKind::DffOutput { .. } => {}
                NodeKind::Output { .. } | NodeKind::DffInput { .. } => {
                    let fanin = self.glit(node.fanin(0));
                    self.encode_equal(out.pos(), fanin);
                }
                NodeKind::Gate(kind) => {
                    let fanins: Vec<SatLit> =
                        node.fanins().iter().map(|f| self.glit(*f)).collect();
                    self.encode_gate(kind, out.pos(), &fanins);
                }
            }
        }
    }

    fn gen_faulty_cnf(&mut self) {
        for k in 0..self.tfo_list.len() {
            let id = self.tfo_list[k];
            // in FFR mode the root's faulty value is left free; the
            // difference chain pins it opposite to the good value
            if self.selectors.is_empty() && id == self.root {
                continue;
            }
            let node = self.network.node(id);
            let out = self.fvar[id].expect("tfo node").pos();
            let elem_pos = self.elems.iter().position(|e| *e == id);
            let fanins: Vec<SatLit> = node.fanins().iter().map(|f| self.flit(*f)).collect();
            match elem_pos {
                Some(i) => {
                    // selector injection: f = (gate over faulty fanins) xor s
                    let sel = self.selectors[i].pos();
                    let inner = match node.kind() {
                        NodeKind::Input { .. } | NodeKind::DffOutput { .. } => self.glit(id),
                        _ => {
                            let aux = self.sat.new_var();
                            match node.kind() {
                                NodeKind::Gate(kind) => {
                                    self.encode_gate(kind, aux.pos(), &fanins)
                                }
                                _ => self.encode_equal(aux.pos(), fanins[0]),
                            }
                            aux.pos()
                        }
                    };
                    self.encode_xor2(out, inner, sel);
                }
                None => match node.kind() {
                    NodeKind::Input { .. } | NodeKind::DffOutput { .. } => {}
                    NodeKind::Output { .. } | NodeKind::DffInput { .. } => {
                        self.encode_equal(out, fanins[0]);
                    }
                    NodeKind::Gate(kind) => self.encode_gate(kind, out, &fanins),
                },
            }
        }
    }

    fn gen_dchain_cnf(&mut self) {
        for k in 0..self.tfo_list.len() {
            let id = self.tfo_list[k];
            let node = self.network.node(id);
            let d = self.dvar[id].expect("tfo node").pos();
            let g = self.glit(id);
            let f = self.fvar[id].expect("tfo node").pos();
            self.encode_xor2(d, g, f);
            if node.is_ppo() {
                continue;
            }
            // a difference must keep moving toward an output; the immediate
            // dominator collapses the fanout disjunction to one literal
            match node.imm_dom() {
                Some(dom) if self.tfo[dom] => {
                    let dom_d = self.dvar[dom].expect("dominator in tfo").pos();
                    self.sat.add_clause(&[!d, dom_d]);
                }
                _ => {
                    let mut clause = vec![!d];
                    for fo in node.fanouts() {
                        clause.push(self.dvar[*fo].expect("fanout in tfo").pos());
                    }
                    self.sat.add_clause(&clause);
                }
            }
        }
    }

    fn gen_detect_cnf(&mut self) {
        let clause: Vec<SatLit> = self
            .output_list
            .iter()
            .map(|id| self.dvar[*id].expect("output in tfo").pos())
            .collect();
        self.sat.add_clause(&clause);
        if !self.network.node(self.root).is_ppo() {
            let d = self.dvar[self.root].expect("root in tfo").pos();
            self.sat.add_clause(&[d]);
        }
    }

    fn gen_prev_cnf(&mut self) {
        for id in 0..self.network.node_num() {
            let Some(out) = self.hvar[id] else { continue };
            let node = self.network.node(id);
            match node.kind() {
                NodeKind::Input { .. } | NodeKind::DffOutput { .. } => {}
                NodeKind::Output { .. } | NodeKind::DffInput { .. } => {
                    let fanin = self.hlit(node.fanin(0));
                    self.encode_equal(out.pos(), fanin);
                }
                NodeKind::Gate(kind) => {
                    let fanins: Vec<SatLit> =
                        node.fanins().iter().map(|f| self.hlit(*f)).collect();
                    self.encode_gate(kind, out.pos(), &fanins);
                }
            }
        }
        // the current frame's flip-flop outputs are captured from the
        // previous frame's flip-flop inputs
        for d in 0..self.network.dff_num() {
            let out_ppi = self.network.dff_output(d);
            let in_sink = self.network.dff_input(d);
            if let (Some(g), Some(h)) = (self.gvar[out_ppi], self.hvar[in_sink]) {
                self.encode_equal(g.pos(), h.pos());
            }
        }
    }

    //
    // Clause helpers
    //

    fn encode_equal(&mut self, out: SatLit, a: SatLit) {
        self.sat.add_clause(&[!out, a]);
        self.sat.add_clause(&[out, !a]);
    }

    fn encode_and(&mut self, out: SatLit, fanins: &[SatLit]) {
        let mut last = Vec::with_capacity(fanins.len() + 1);
        last.push(out);
        for a in fanins {
            self.sat.add_clause(&[!out, *a]);
            last.push(!*a);
        }
        self.sat.add_clause(&last);
    }

    fn encode_or(&mut self, out: SatLit, fanins: &[SatLit]) {
        let inverted: Vec<SatLit> = fanins.iter().map(|l| !*l).collect();
        self.encode_and(!out, &inverted);
    }

    fn encode_xor2(&mut self, out: SatLit, a: SatLit, b: SatLit) {
        self.sat.add_clause(&[!out, a, b]);
        self.sat.add_clause(&[!out, !a, !b]);
        self.sat.add_clause(&[out, !a, b]);
        self.sat.add_clause(&[out, a, !b]);
    }

    fn encode_xor_n(&mut self, out: SatLit, fanins: &[SatLit]) {
        match fanins {
            [a] => self.encode_equal(out, *a),
            [a, b] => self.encode_xor2(out, *a, *b),
            _ => {
                let mut cur = fanins[0];
                for a in &fanins[1..fanins.len() - 1] {
                    let aux = self.sat.new_var();
                    self.encode_xor2(aux.pos(), cur, *a);
                    cur = aux.pos();
                }
                self.encode_xor2(out, cur, fanins[fanins.len() - 1]);
            }
        }
    }

    fn encode_gate(&mut self, kind: GateKind, out: SatLit, fanins: &[SatLit]) {
        match kind {
            GateKind::Const0 => self.sat.add_clause(&[!out]),
            GateKind::Const1 => self.sat.add_clause(&[out]),
            GateKind::Buf => self.encode_equal(out, fanins[0]),
            GateKind::Not => self.encode_equal(out, !fanins[0]),
            GateKind::And => self.encode_and(out, fanins),
            GateKind::Nand => self.encode_and(!out, fanins),
            GateKind::Or => self.encode_or(out, fanins),
            GateKind::Nor => self.encode_or(!out, fanins),
            GateKind::Xor => self.encode_xor_n(out, fanins),
            GateKind::Xnor => self.encode_xor_n(!out, fanins),
        }
    }

    //
    // Per-fault conditions
    //

    /// The requirements that make the fault's effect reach its FFR root:
    /// activation at the site, the launch condition in transition mode, and
    /// non-controlling side inputs along the path
    pub(crate) fn ffr_propagate_condition(&self, fault: &Fault) -> AssignList {
        let network = self.network;
        let mut assigns = AssignList::new();
        let site = fault.site_node(network);
        assigns.add(site, 1, !fault.val());
        if self.fault_type == FaultType::TransitionDelay {
            assigns.add(site, 0, fault.val());
        }
        let node = network.node(fault.node());
        if let FaultLoc::Branch { pos } = fault.loc() {
            if let Some(kind) = node.gate_kind() {
                if let Some(nc) = kind.non_controlling_value() {
                    for (i, fi) in node.fanins().iter().enumerate() {
                        if i != pos {
                            assigns.add(*fi, 1, nc);
                        }
                    }
                }
            }
        }
        let ffr_root = network.ffr(node.ffr_id()).root;
        let mut cur = fault.node();
        while cur != ffr_root {
            let fo_id = network.node(cur).fanouts()[0];
            let fo = network.node(fo_id);
            let ipos = fo
                .fanins()
                .iter()
                .position(|f| *f == cur)
                .expect("fanout back edge");
            if let Some(kind) = fo.gate_kind() {
                if let Some(nc) = kind.non_controlling_value() {
                    for (i, fi) in fo.fanins().iter().enumerate() {
                        if i != ipos {
                            assigns.add(*fi, 1, nc);
                        }
                    }
                }
            }
            cur = fo_id;
        }
        assigns
    }

    /// Translate requirements into literals under the variable maps
    pub(crate) fn conv_to_assumptions(&self, assigns: &AssignList) -> Vec<SatLit> {
        assigns
            .iter()
            .map(|nv| {
                let var = match nv.time {
                    0 => self.hvar[nv.node].expect("site in previous-frame cone"),
                    _ => self.gvar[nv.node].expect("site in good cone"),
                };
                var.lit(nv.val)
            })
            .collect()
    }

    /// Assumptions selecting which FFR root injects the fault (MFFC mode)
    pub(crate) fn selector_assumptions(&self, active: usize) -> Vec<SatLit> {
        self.selectors
            .iter()
            .enumerate()
            .map(|(i, s)| s.lit(i == active))
            .collect()
    }

    /// Position of an FFR root among the scope's injection points
    pub(crate) fn elem_pos(&self, ffr_root: NodeId) -> Option<usize> {
        self.elems.iter().position(|e| *e == ffr_root)
    }

    pub(crate) fn solve(&mut self, assumptions: &[SatLit]) -> Result<SatOutcome> {
        self.sat.solve(assumptions)
    }

    pub(crate) fn new_control_var(&mut self) -> SatVar {
        self.sat.new_var()
    }

    pub(crate) fn add_clause(&mut self, lits: &[SatLit]) {
        self.sat.add_clause(lits)
    }

    //
    // Model readers
    //

    pub(crate) fn gval(&self, model: &SatModel, id: NodeId) -> Option<bool> {
        self.gvar[id].and_then(|v| model.value(v))
    }

    pub(crate) fn hval(&self, model: &SatModel, id: NodeId) -> Option<bool> {
        self.hvar[id].and_then(|v| model.value(v))
    }

    fn dval(&self, model: &SatModel, id: NodeId) -> Option<bool> {
        self.dvar[id].and_then(|v| model.value(v))
    }

    /// A sufficient set of current-frame values that carries the fault
    /// effect from its site to an output, read off the model
    ///
    /// Side inputs along the FFR path are taken from the model (this also
    /// covers gates without a controlling value), then the difference chain
    /// is followed from the FFR root to the outputs, pinning the side
    /// inputs of every difference-carrying gate.
    pub(crate) fn sufficient_condition(&self, fault: &Fault, model: &SatModel) -> AssignList {
        let network = self.network;
        let mut assigns = AssignList::new();
        let mut pin_sides = |assigns: &mut AssignList, id: NodeId, skip: usize| {
            let node = network.node(id);
            for (i, fi) in node.fanins().iter().enumerate() {
                if i != skip {
                    if let Some(v) = self.gval(model, *fi) {
                        assigns.add(*fi, 1, v);
                    }
                }
            }
        };

        let node = network.node(fault.node());
        if let FaultLoc::Branch { pos } = fault.loc() {
            pin_sides(&mut assigns, fault.node(), pos);
        }
        let ffr_root = network.ffr(node.ffr_id()).root;
        let mut cur = fault.node();
        while cur != ffr_root {
            let fo_id = network.node(cur).fanouts()[0];
            let ipos = network
                .node(fo_id)
                .fanins()
                .iter()
                .position(|f| *f == cur)
                .expect("fanout back edge");
            pin_sides(&mut assigns, fo_id, ipos);
            cur = fo_id;
        }

        let mut visited = vec![false; network.node_num()];
        let mut stack = vec![ffr_root];
        while let Some(id) = stack.pop() {
            if visited[id] {
                continue;
            }
            visited[id] = true;
            if network.node(id).is_ppo() {
                continue;
            }
            for fo in network.node(id).fanouts() {
                if !self.tfo[*fo] || self.dval(model, *fo) != Some(true) {
                    continue;
                }
                for fi in network.node(*fo).fanins() {
                    if *fi == id {
                        continue;
                    }
                    if self.tfo[*fi] && self.dval(model, *fi) == Some(true) {
                        continue;
                    }
                    if let Some(v) = self.gval(model, *fi) {
                        assigns.add(*fi, 1, v);
                    }
                }
                stack.push(*fo);
            }
        }
        assigns
    }

    //
    // Per-fault attempts
    //

    /// One complete attempt: condition, assumptions, solve, extract, justify
    pub(crate) fn gen_pattern_with(
        &mut self,
        justifier: &Justifier,
        fault: &Fault,
        extra: &[SatLit],
        stats: &mut DtpgStats,
    ) -> Outcome {
        let ffr_cond = self.ffr_propagate_condition(fault);
        let mut assumptions = self.conv_to_assumptions(&ffr_cond);
        assumptions.extend_from_slice(extra);
        let start = Instant::now();
        let result = self.solve(&assumptions);
        let sat_time = start.elapsed();
        match result {
            Ok(SatOutcome::Sat(model)) => {
                let bt_start = Instant::now();
                let tv = self.extract_vector(justifier, fault, &ffr_cond, &model);
                stats.update_det(sat_time, bt_start.elapsed());
                Outcome::Detected(tv)
            }
            Ok(SatOutcome::Unsat) => {
                stats.update_untest(sat_time);
                Outcome::Untestable
            }
            Ok(SatOutcome::Aborted) => {
                stats.update_abort(sat_time);
                Outcome::Aborted
            }
            Err(err) => {
                warn!(%err, "solver failure, recording an abort");
                stats.update_abort(sat_time);
                Outcome::Aborted
            }
        }
    }

    /// Repeat up to `k` times with blocking clauses to collect alternative
    /// vectors for the same fault; the first one matches the `Outcome`
    pub(crate) fn gen_k_patterns_with(
        &mut self,
        justifier: &Justifier,
        fault: &Fault,
        k: usize,
        extra: &[SatLit],
        stats: &mut DtpgStats,
    ) -> (Outcome, Vec<TestVector>) {
        let first = self.gen_pattern_with(justifier, fault, extra, stats);
        let Outcome::Detected(tv) = &first else {
            return (first, Vec::new());
        };
        let mut list = vec![tv.clone()];
        if k > 1 {
            let ffr_cond = self.ffr_propagate_condition(fault);
            let control = self.new_control_var();
            for _ in 1..k {
                let blocked = list.last().expect("nonempty list").clone();
                self.add_blocking_clause(&blocked, control.pos());
                let mut assumptions = self.conv_to_assumptions(&ffr_cond);
                assumptions.extend_from_slice(extra);
                assumptions.push(control.pos());
                let start = Instant::now();
                let result = self.solve(&assumptions);
                let sat_time = start.elapsed();
                match result {
                    Ok(SatOutcome::Sat(model)) => {
                        let bt_start = Instant::now();
                        let tv = self.extract_vector(justifier, fault, &ffr_cond, &model);
                        stats.update_det(sat_time, bt_start.elapsed());
                        list.push(tv);
                    }
                    _ => break,
                }
            }
        }
        (first, list)
    }

    fn extract_vector(
        &self,
        justifier: &Justifier,
        fault: &Fault,
        ffr_cond: &AssignList,
        model: &SatModel,
    ) -> TestVector {
        let mut cond = self.sufficient_condition(fault, model);
        cond.merge(ffr_cond);
        let g = |id: NodeId| self.gval(model, id);
        let h = |id: NodeId| self.hval(model, id);
        justifier.justify(&cond, &g, &h)
    }

    /// Block one test vector's PPI assignment, guarded by `control`
    pub(crate) fn add_blocking_clause(&mut self, tv: &crate::pattern::TestVector, control: SatLit) {
        use crate::pattern::Val3;
        let network = self.network;
        let mut lits = vec![!control];
        for pos in 0..tv.ppi_num() {
            let val = match tv.ppi_val(pos) {
                Val3::X => continue,
                Val3::V0 => false,
                Val3::V1 => true,
            };
            let node = network.ppi(pos);
            let var = match self.fault_type {
                FaultType::StuckAt => self.gvar[node],
                FaultType::TransitionDelay => self.hvar[node],
            };
            if let Some(var) = var {
                lits.push(var.lit(!val));
            }
        }
        if self.fault_type == FaultType::TransitionDelay {
            for pos in 0..tv.input_num() {
                let val = match tv.aux_input_val(pos) {
                    Val3::X => continue,
                    Val3::V0 => false,
                    Val3::V1 => true,
                };
                let node = network.ppi(pos);
                if let Some(var) = self.gvar[node] {
                    lits.push(var.lit(!val));
                }
            }
        }
        self.sat.add_clause(&lits);
    }
}
