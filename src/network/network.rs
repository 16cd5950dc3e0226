//! The immutable circuit view
//!
//! A [`Network`] is built once from a parsed netlist and only queried
//! afterwards. It owns the node arena and the derived structures: the
//! topological order, fanout-free regions, maximum fanout-free cones and
//! levels.

use std::fmt;

use itertools::Itertools;

use crate::network::{GateKind, Node, NodeId, NodeKind};

/// A fanout-free region
///
/// Every member except the root has exactly one fanout, and that fanout is a
/// member of the same region.
#[derive(Debug, Clone)]
pub struct Ffr {
    /// Index in the network's FFR list
    pub id: usize,
    /// The single node through which fault effects leave the region
    pub root: NodeId,
    /// Members in topological order (the root comes last)
    pub members: Vec<NodeId>,
}

/// A maximum fanout-free cone
///
/// The only external sink of the cone is its root; each cone is a union of
/// complete FFRs.
#[derive(Debug, Clone)]
pub struct Mffc {
    /// Index in the network's MFFC list
    pub id: usize,
    /// The single external sink
    pub root: NodeId,
    /// Members in topological order
    pub members: Vec<NodeId>,
    /// FFRs contained in the cone
    pub ffrs: Vec<usize>,
}

/// Immutable post-build view of the circuit
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) input_list: Vec<NodeId>,
    pub(crate) dff_output_list: Vec<NodeId>,
    pub(crate) output_list: Vec<NodeId>,
    pub(crate) dff_input_list: Vec<NodeId>,
    pub(crate) ppi_list: Vec<NodeId>,
    pub(crate) ppo_list: Vec<NodeId>,
    pub(crate) topo: Vec<NodeId>,
    pub(crate) max_level: u32,
    pub(crate) ffrs: Vec<Ffr>,
    pub(crate) mffcs: Vec<Mffc>,
}

impl Network {
    /// Design name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes
    pub fn node_num(&self) -> usize {
        self.nodes.len()
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// All nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Number of primary inputs
    pub fn input_num(&self) -> usize {
        self.input_list.len()
    }

    /// Number of primary outputs
    pub fn output_num(&self) -> usize {
        self.output_list.len()
    }

    /// Number of flip-flops
    pub fn dff_num(&self) -> usize {
        self.dff_output_list.len()
    }

    /// Number of PPIs (inputs plus flip-flop outputs)
    pub fn ppi_num(&self) -> usize {
        self.ppi_list.len()
    }

    /// Number of PPOs (outputs plus flip-flop inputs)
    pub fn ppo_num(&self) -> usize {
        self.ppo_list.len()
    }

    /// PPI node at position `pos`: inputs first, then flip-flop outputs
    pub fn ppi(&self, pos: usize) -> NodeId {
        self.ppi_list[pos]
    }

    /// PPO node at position `pos`: outputs first, then flip-flop inputs
    pub fn ppo(&self, pos: usize) -> NodeId {
        self.ppo_list[pos]
    }

    /// PPI nodes in order
    pub fn ppis(&self) -> &[NodeId] {
        &self.ppi_list
    }

    /// PPO nodes in order
    pub fn ppos(&self) -> &[NodeId] {
        &self.ppo_list
    }

    /// The PPI position of a node, if it is one
    pub fn ppi_pos(&self, id: NodeId) -> Option<usize> {
        match self.nodes[id].kind {
            NodeKind::Input { pos } => Some(pos),
            NodeKind::DffOutput { dff } => Some(self.input_num() + dff),
            _ => None,
        }
    }

    /// The flip-flop input sink for flip-flop `dff`
    pub fn dff_input(&self, dff: usize) -> NodeId {
        self.dff_input_list[dff]
    }

    /// The flip-flop output source for flip-flop `dff`
    pub fn dff_output(&self, dff: usize) -> NodeId {
        self.dff_output_list[dff]
    }

    /// Nodes in topological order: PPIs, gates, PPOs
    pub fn topo_order(&self) -> &[NodeId] {
        &self.topo
    }

    /// Highest level of any node
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Fanout-free regions
    pub fn ffrs(&self) -> &[Ffr] {
        &self.ffrs
    }

    /// FFR by id
    pub fn ffr(&self, id: usize) -> &Ffr {
        &self.ffrs[id]
    }

    /// Maximum fanout-free cones
    pub fn mffcs(&self) -> &[Mffc] {
        &self.mffcs
    }

    /// MFFC by id
    pub fn mffc(&self, id: usize) -> &Mffc {
        &self.mffcs[id]
    }

    /// Look a node up by its netlist name
    ///
    /// Sinks share the name of their driver, so drivers win.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.name.as_deref() == Some(name) && !n.is_ppo())
            .map(|n| n.id)
    }

    /// Check consistency of the derived structures
    ///
    /// Panics on violation; the builder calls it once, tests call it freely.
    pub fn check(&self) {
        for node in &self.nodes {
            for f in &node.fanins {
                assert!(*f < self.nodes.len(), "dangling fanin on node {}", node.id);
                assert!(
                    self.nodes[*f].fanouts.contains(&node.id),
                    "missing back edge {} -> {}",
                    *f,
                    node.id
                );
            }
            if node.is_ppi() {
                assert_eq!(node.level, 0, "PPI {} has nonzero level", node.id);
            } else {
                let want = node
                    .fanins
                    .iter()
                    .map(|f| self.nodes[*f].level + 1)
                    .max()
                    .unwrap_or(0);
                assert_eq!(node.level, want, "bad level on node {}", node.id);
            }
        }
        for ffr in &self.ffrs {
            assert_eq!(self.nodes[ffr.root].ffr, ffr.id);
            for m in &ffr.members {
                assert_eq!(self.nodes[*m].ffr, ffr.id);
                if *m != ffr.root {
                    assert_eq!(self.nodes[*m].fanouts.len(), 1);
                    assert_eq!(self.nodes[self.nodes[*m].fanouts[0]].ffr, ffr.id);
                }
            }
        }
        for mffc in &self.mffcs {
            assert_eq!(self.nodes[mffc.root].mffc, mffc.id);
            let root_ffr = self.nodes[mffc.root].ffr;
            assert!(mffc.ffrs.contains(&root_ffr));
        }
    }

    /// Gather counts for reporting
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            input_num: self.input_num(),
            output_num: self.output_num(),
            dff_num: self.dff_num(),
            max_level: self.max_level,
            ffr_num: self.ffrs.len(),
            mffc_num: self.mffcs.len(),
            ..NetworkStats::default()
        };
        for node in &self.nodes {
            if let NodeKind::Gate(kind) = node.kind {
                stats.gate_num += 1;
                match kind {
                    GateKind::Const0 | GateKind::Const1 => stats.const_num += 1,
                    GateKind::Buf => stats.buf_num += 1,
                    GateKind::Not => stats.not_num += 1,
                    GateKind::And | GateKind::Nand => stats.and_num += 1,
                    GateKind::Or | GateKind::Nor => stats.or_num += 1,
                    GateKind::Xor | GateKind::Xnor => stats.xor_num += 1,
                }
            }
        }
        stats
    }
}

/// Counts of everything in a network, for the `show` report
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    /// Primary inputs
    pub input_num: usize,
    /// Primary outputs
    pub output_num: usize,
    /// Flip-flops
    pub dff_num: usize,
    /// Logic gates of any kind
    pub gate_num: usize,
    /// Constant generators
    pub const_num: usize,
    /// Buffers
    pub buf_num: usize,
    /// Inverters
    pub not_num: usize,
    /// And-like gates (And, Nand)
    pub and_num: usize,
    /// Or-like gates (Or, Nor)
    pub or_num: usize,
    /// Xor-like gates (Xor, Xnor)
    pub xor_num: usize,
    /// Highest level
    pub max_level: u32,
    /// Fanout-free regions
    pub ffr_num: usize,
    /// Maximum fanout-free cones
    pub mffc_num: usize,
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Inputs: {}", self.input_num)?;
        writeln!(f, "Outputs: {}", self.output_num)?;
        if self.dff_num != 0 {
            writeln!(f, "Dff: {}", self.dff_num)?;
        }
        writeln!(f, "Gates: {}", self.gate_num)?;
        let details = [
            ("const", self.const_num),
            ("buf", self.buf_num),
            ("not", self.not_num),
            ("and", self.and_num),
            ("or", self.or_num),
            ("xor", self.xor_num),
        ];
        let line = details
            .iter()
            .filter(|(_, n)| *n != 0)
            .map(|(name, n)| format!("{}: {}", name, n))
            .join(", ");
        if !line.is_empty() {
            writeln!(f, "  {}", line)?;
        }
        writeln!(f, "Levels: {}", self.max_level)?;
        writeln!(f, "FFRs: {}", self.ffr_num)?;
        writeln!(f, "MFFCs: {}", self.mffc_num)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Network {} with {} inputs, {} outputs, {} dffs:",
            self.name,
            self.input_num(),
            self.output_num(),
            self.dff_num()
        )?;
        for id in &self.topo {
            let node = &self.nodes[*id];
            let name = node.name.as_deref().unwrap_or("_");
            match node.kind {
                NodeKind::Input { .. } => writeln!(f, "\tinput {}", name)?,
                NodeKind::DffOutput { dff } => writeln!(f, "\tdff {} output {}", dff, name)?,
                NodeKind::Output { .. } => writeln!(f, "\toutput {}", name)?,
                NodeKind::DffInput { dff } => writeln!(f, "\tdff {} input {}", dff, name)?,
                NodeKind::Gate(kind) => {
                    let fanins = node
                        .fanins
                        .iter()
                        .map(|i| {
                            self.nodes[*i]
                                .name
                                .clone()
                                .unwrap_or_else(|| format!("n{}", i))
                        })
                        .join(", ");
                    writeln!(f, "\t{} = {}({})", name, kind, fanins)?
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::network::{build, GateKind, ParsedNetlist};

    #[test]
    fn test_stats() {
        let mut p = ParsedNetlist::new("stats");
        p.input("a").input("b");
        p.gate("u", GateKind::And, &["a", "b"]);
        p.gate("v", GateKind::Not, &["u"]);
        p.output("u").output("v");
        let net = build(&p).unwrap();
        let stats = net.stats();
        assert_eq!(stats.input_num, 2);
        assert_eq!(stats.output_num, 2);
        assert_eq!(stats.gate_num, 2);
        assert_eq!(stats.and_num, 1);
        assert_eq!(stats.not_num, 1);
        let text = stats.to_string();
        assert!(text.contains("Gates: 2"));
    }

    #[test]
    fn test_find_node() {
        let mut p = ParsedNetlist::new("names");
        p.input("a").input("b");
        p.gate("u", GateKind::Xor, &["a", "b"]);
        p.output("u");
        let net = build(&p).unwrap();
        let u = net.find_node("u").unwrap();
        assert!(net.node(u).is_gate());
        assert!(net.find_node("zz").is_none());
    }
}
