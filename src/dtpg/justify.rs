//! Back-tracing a satisfying model into a test vector
//!
//! Given a list of required node values and access to the model, the
//! justifier produces a PPI assignment implying those values, with X in
//! every position it never had to touch.

use fxhash::FxHashSet;

use crate::dtpg::engine::AssignList;
use crate::fault::FaultType;
use crate::network::{GateKind, Network, NodeId, NodeKind};
use crate::pattern::{TestVector, Val3};

/// Which back-trace strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JustKind {
    /// Record every PPI straight from the model
    All,
    /// Minimal-support walk, first controlling fanin wins
    #[default]
    Just1,
    /// Minimal-support walk, cheapest controlling fanin wins
    Just2,
}

/// Model value access for one time frame: current (`g`) and previous (`h`)
pub type ValFn<'m> = dyn Fn(NodeId) -> Option<bool> + 'm;

/// The back-tracer
pub struct Justifier<'a> {
    kind: JustKind,
    network: &'a Network,
    fault_type: FaultType,
    // support-size estimate per node, for Just2 tie-breaking
    weight: Vec<u64>,
}

impl<'a> Justifier<'a> {
    /// Build a justifier for one network
    pub fn new(kind: JustKind, network: &'a Network, fault_type: FaultType) -> Justifier<'a> {
        let mut weight = vec![0u64; network.node_num()];
        if kind == JustKind::Just2 {
            for id in network.topo_order() {
                let node = network.node(*id);
                weight[*id] = if node.is_ppi() {
                    1
                } else {
                    node.fanins()
                        .iter()
                        .fold(0u64, |acc, f| acc.saturating_add(weight[*f]))
                };
            }
        }
        Justifier {
            kind,
            network,
            fault_type,
            weight,
        }
    }

    /// The strategy this justifier runs
    pub fn kind(&self) -> JustKind {
        self.kind
    }

    /// Turn requirements plus a model into a test vector
    ///
    /// `g_of` reads current-frame model values, `h_of` previous-frame ones
    /// (unused in stuck-at mode).
    pub fn justify(&self, assigns: &AssignList, g_of: &ValFn, h_of: &ValFn) -> TestVector {
        let network = self.network;
        let mut tv = TestVector::new(network.input_num(), network.dff_num(), self.fault_type);
        if self.kind == JustKind::All {
            self.record_all(&mut tv, g_of, h_of);
            return tv;
        }

        let mut seen: FxHashSet<(NodeId, u8)> = FxHashSet::default();
        let mut stack: Vec<(NodeId, u8, bool)> = assigns
            .iter()
            .map(|nv| (nv.node, nv.time, nv.val))
            .collect();
        while let Some((id, time, val)) = stack.pop() {
            if !seen.insert((id, time)) {
                continue;
            }
            let node = network.node(id);
            match node.kind() {
                NodeKind::Input { pos } => {
                    if self.fault_type == FaultType::TransitionDelay && time == 1 {
                        tv.set_aux_input_val(pos, Val3::from_bool(val));
                    } else {
                        tv.set_ppi_val(pos, Val3::from_bool(val));
                    }
                }
                NodeKind::DffOutput { dff } => {
                    if self.fault_type == FaultType::TransitionDelay && time == 1 {
                        // captured from the previous frame's flip-flop input
                        stack.push((network.dff_input(dff), 0, val));
                    } else {
                        tv.set_ppi_val(network.input_num() + dff, Val3::from_bool(val));
                    }
                }
                NodeKind::Output { .. } | NodeKind::DffInput { .. } => {
                    stack.push((node.fanin(0), time, val));
                }
                NodeKind::Gate(kind) => {
                    self.justify_gate(id, kind, time, val, &mut stack, g_of, h_of);
                }
            }
        }
        tv
    }

    fn record_all(&self, tv: &mut TestVector, g_of: &ValFn, h_of: &ValFn) {
        let network = self.network;
        match self.fault_type {
            FaultType::StuckAt => {
                for pos in 0..network.ppi_num() {
                    if let Some(v) = g_of(network.ppi(pos)) {
                        tv.set_ppi_val(pos, Val3::from_bool(v));
                    }
                }
            }
            FaultType::TransitionDelay => {
                for pos in 0..network.ppi_num() {
                    if let Some(v) = h_of(network.ppi(pos)) {
                        tv.set_ppi_val(pos, Val3::from_bool(v));
                    }
                }
                for pos in 0..network.input_num() {
                    if let Some(v) = g_of(network.ppi(pos)) {
                        tv.set_aux_input_val(pos, Val3::from_bool(v));
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn justify_gate(
        &self,
        id: NodeId,
        kind: GateKind,
        time: u8,
        val: bool,
        stack: &mut Vec<(NodeId, u8, bool)>,
        g_of: &ValFn,
        h_of: &ValFn,
    ) {
        let node = self.network.node(id);
        let val_at = |fi: NodeId| -> Option<bool> {
            if time == 1 {
                g_of(fi)
            } else {
                h_of(fi)
            }
        };
        match kind {
            GateKind::Const0 | GateKind::Const1 => {}
            GateKind::Buf => stack.push((node.fanin(0), time, val)),
            GateKind::Not => stack.push((node.fanin(0), time, !val)),
            GateKind::And | GateKind::Nand | GateKind::Or | GateKind::Nor => {
                let ctrl = kind.controlling_value().expect("and/or-like gate");
                let core = val ^ kind.inverts_output();
                if core == ctrl {
                    // one controlling fanin is enough; take it from the model
                    let mut pick: Option<NodeId> = None;
                    for fi in node.fanins() {
                        if val_at(*fi) != Some(ctrl) {
                            continue;
                        }
                        match self.kind {
                            JustKind::Just2 => {
                                if pick.map_or(true, |p| self.weight[*fi] < self.weight[p]) {
                                    pick = Some(*fi);
                                }
                            }
                            _ => {
                                pick = Some(*fi);
                                break;
                            }
                        }
                    }
                    match pick {
                        Some(fi) => stack.push((fi, time, ctrl)),
                        None => {
                            // model left a gap; fall back to every binary fanin
                            for fi in node.fanins() {
                                if let Some(v) = val_at(*fi) {
                                    stack.push((*fi, time, v));
                                }
                            }
                        }
                    }
                } else {
                    for fi in node.fanins() {
                        stack.push((*fi, time, !ctrl));
                    }
                }
            }
            GateKind::Xor | GateKind::Xnor => {
                for fi in node.fanins() {
                    if let Some(v) = val_at(*fi) {
                        stack.push((*fi, time, v));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{build, ParsedNetlist};

    // A hand-rolled "model": values for every node by name
    fn model(net: &Network, vals: &[(&str, bool)]) -> Vec<Option<bool>> {
        let mut m = vec![None; net.node_num()];
        for (name, v) in vals {
            m[net.find_node(name).unwrap()] = Some(*v);
        }
        m
    }

    #[test]
    fn test_just1_minimal_support() {
        // y = a & b, justify y = 0 with a = 0 in the model: b stays X
        let mut p = ParsedNetlist::new("just");
        p.input("a").input("b");
        p.gate("y", GateKind::And, &["a", "b"]);
        p.output("y");
        let net = build(&p).unwrap();
        let m = model(&net, &[("a", false), ("b", true), ("y", false)]);
        let g = |id: NodeId| m[id];
        let h = |_: NodeId| None;
        let just = Justifier::new(JustKind::Just1, &net, FaultType::StuckAt);
        let mut assigns = AssignList::new();
        assigns.add(net.find_node("y").unwrap(), 1, false);
        let tv = just.justify(&assigns, &g, &h);
        assert_eq!(tv.ppi_val(0), Val3::V0);
        assert_eq!(tv.ppi_val(1), Val3::X);
    }

    #[test]
    fn test_just1_all_inputs_when_needed() {
        // y = a & b, justify y = 1: both inputs must be 1
        let mut p = ParsedNetlist::new("just");
        p.input("a").input("b");
        p.gate("y", GateKind::And, &["a", "b"]);
        p.output("y");
        let net = build(&p).unwrap();
        let m = model(&net, &[("a", true), ("b", true), ("y", true)]);
        let g = |id: NodeId| m[id];
        let h = |_: NodeId| None;
        let just = Justifier::new(JustKind::Just1, &net, FaultType::StuckAt);
        let mut assigns = AssignList::new();
        assigns.add(net.find_node("y").unwrap(), 1, true);
        let tv = just.justify(&assigns, &g, &h);
        assert_eq!(tv.ppi_val(0), Val3::V1);
        assert_eq!(tv.ppi_val(1), Val3::V1);
    }

    #[test]
    fn test_just2_prefers_cheap_support() {
        // w = (a & b) | c; justify w = 1 when both operands could do it:
        // c alone is cheaper than the and subtree
        let mut p = ParsedNetlist::new("just2");
        p.input("a").input("b").input("c");
        p.gate("u", GateKind::And, &["a", "b"]);
        p.gate("w", GateKind::Or, &["u", "c"]);
        p.output("w");
        let net = build(&p).unwrap();
        let m = model(
            &net,
            &[("a", true), ("b", true), ("c", true), ("u", true), ("w", true)],
        );
        let g = |id: NodeId| m[id];
        let h = |_: NodeId| None;
        let just = Justifier::new(JustKind::Just2, &net, FaultType::StuckAt);
        let mut assigns = AssignList::new();
        assigns.add(net.find_node("w").unwrap(), 1, true);
        let tv = just.justify(&assigns, &g, &h);
        assert_eq!(tv.ppi_val(2), Val3::V1);
        assert_eq!(tv.ppi_val(0), Val3::X);
        assert_eq!(tv.ppi_val(1), Val3::X);
    }

    #[test]
    fn test_all_records_everything() {
        let mut p = ParsedNetlist::new("all");
        p.input("a").input("b");
        p.gate("y", GateKind::Xor, &["a", "b"]);
        p.output("y");
        let net = build(&p).unwrap();
        let m = model(&net, &[("a", true), ("b", false), ("y", true)]);
        let g = |id: NodeId| m[id];
        let h = |_: NodeId| None;
        let just = Justifier::new(JustKind::All, &net, FaultType::StuckAt);
        let tv = just.justify(&AssignList::new(), &g, &h);
        assert_eq!(tv.ppi_val(0), Val3::V1);
        assert_eq!(tv.ppi_val(1), Val3::V0);
    }
}
