//! ISCAS89 `.bench` reader and writer
//!
//! The format is line-based: `INPUT(name)`, `OUTPUT(name)` and
//! `name = KIND(arg, ...)` statements, with `#` comments. Flip-flops appear
//! as `q = DFF(d)`.

use std::io::{BufRead, BufReader, Read, Write};

use crate::io::IoError;
use crate::network::{GateFunc, GateKind, Network, NodeKind, ParsedDff, ParsedGate, ParsedNetlist};

fn gate_kind(name: &str) -> Option<GateKind> {
    match name.to_ascii_uppercase().as_str() {
        "AND" => Some(GateKind::And),
        "NAND" => Some(GateKind::Nand),
        "OR" => Some(GateKind::Or),
        "NOR" => Some(GateKind::Nor),
        "XOR" => Some(GateKind::Xor),
        "XNOR" => Some(GateKind::Xnor),
        "BUF" | "BUFF" => Some(GateKind::Buf),
        "NOT" | "INV" => Some(GateKind::Not),
        _ => None,
    }
}

fn kind_name(kind: GateKind) -> &'static str {
    match kind {
        GateKind::Const0 => "CONST0",
        GateKind::Const1 => "CONST1",
        GateKind::Buf => "BUFF",
        GateKind::Not => "NOT",
        GateKind::And => "AND",
        GateKind::Nand => "NAND",
        GateKind::Or => "OR",
        GateKind::Nor => "NOR",
        GateKind::Xor => "XOR",
        GateKind::Xnor => "XNOR",
    }
}

/// Parse a `.bench` netlist
pub fn parse_bench<R: Read>(reader: R) -> Result<ParsedNetlist, IoError> {
    let mut parsed = ParsedNetlist::new("bench");
    for (lineno, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let err = |msg: &str| IoError::Parse {
            line: lineno + 1,
            message: msg.to_string(),
        };
        if let Some(rest) = line.strip_prefix("INPUT") {
            parsed.inputs.push(parse_paren(rest).ok_or_else(|| err("malformed INPUT"))?);
        } else if let Some(rest) = line.strip_prefix("OUTPUT") {
            parsed
                .outputs
                .push(parse_paren(rest).ok_or_else(|| err("malformed OUTPUT"))?);
        } else if let Some((target, expr)) = line.split_once('=') {
            let target = target.trim().to_string();
            let expr = expr.trim();
            let (op, args) = expr
                .split_once('(')
                .ok_or_else(|| err("expected KIND(...)"))?;
            let args = args
                .trim_end()
                .strip_suffix(')')
                .ok_or_else(|| err("missing closing parenthesis"))?;
            let inputs: Vec<String> = args
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            let op = op.trim();
            if op.eq_ignore_ascii_case("DFF") {
                if inputs.len() != 1 {
                    return Err(err("DFF takes exactly one input"));
                }
                parsed.dffs.push(ParsedDff {
                    output: target,
                    input: inputs[0].clone(),
                });
            } else {
                let kind = gate_kind(op).ok_or_else(|| err("unknown gate kind"))?;
                let kind = match (kind, inputs.len()) {
                    // single-input and/or reduce to a buffer
                    (GateKind::And | GateKind::Or | GateKind::Xor, 1) => GateKind::Buf,
                    (GateKind::Nand | GateKind::Nor | GateKind::Xnor, 1) => GateKind::Not,
                    (kind, _) => kind,
                };
                parsed.gates.push(ParsedGate {
                    output: target,
                    func: GateFunc::Prim(kind),
                    inputs,
                });
            }
        } else {
            return Err(err("unrecognized statement"));
        }
    }
    Ok(parsed)
}

fn parse_paren(rest: &str) -> Option<String> {
    let inner = rest.trim().strip_prefix('(')?.strip_suffix(')')?.trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

/// Write a network back out as `.bench`
pub fn write_bench<W: Write>(writer: &mut W, network: &Network) -> Result<(), IoError> {
    writeln!(writer, "# {}", network.name())?;
    let name_of = |id: usize| -> String {
        network
            .node(id)
            .name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("n{}", id))
    };
    for pos in 0..network.input_num() {
        writeln!(writer, "INPUT({})", name_of(network.ppi(pos)))?;
    }
    for pos in 0..network.output_num() {
        writeln!(writer, "OUTPUT({})", name_of(network.ppo(pos)))?;
    }
    for d in 0..network.dff_num() {
        let q = name_of(network.dff_output(d));
        let din = network.node(network.dff_input(d)).fanin(0);
        writeln!(writer, "{} = DFF({})", q, name_of(din))?;
    }
    for id in network.topo_order() {
        let node = network.node(*id);
        if let NodeKind::Gate(kind) = node.kind() {
            let args = node
                .fanins()
                .iter()
                .map(|f| name_of(*f))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(writer, "{} = {}({})", name_of(*id), kind_name(kind), args)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::build;

    const C17ISH: &str = "\
# a small benchmark
INPUT(G1)
INPUT(G2)
INPUT(G3)
OUTPUT(G5)
G4 = NAND(G1, G2)
G5 = NAND(G4, G3)
";

    #[test]
    fn test_parse_bench() {
        let parsed = parse_bench(C17ISH.as_bytes()).unwrap();
        assert_eq!(parsed.inputs.len(), 3);
        assert_eq!(parsed.outputs, vec!["G5".to_string()]);
        assert_eq!(parsed.gates.len(), 2);
        let net = build(&parsed).unwrap();
        assert_eq!(net.node_num(), 6);
    }

    #[test]
    fn test_parse_dff() {
        let text = "INPUT(a)\nOUTPUT(q)\nq = DFF(d)\nd = NOT(q)\n";
        let parsed = parse_bench(text.as_bytes()).unwrap();
        assert_eq!(parsed.dffs.len(), 1);
        let net = build(&parsed).unwrap();
        assert_eq!(net.dff_num(), 1);
        assert_eq!(net.ppi_num(), 2);
    }

    #[test]
    fn test_write_round_trip() {
        let parsed = parse_bench(C17ISH.as_bytes()).unwrap();
        let net = build(&parsed).unwrap();
        let mut out = Vec::new();
        write_bench(&mut out, &net).unwrap();
        let back = parse_bench(out.as_slice()).unwrap();
        let net2 = build(&back).unwrap();
        assert_eq!(net.node_num(), net2.node_num());
        assert_eq!(net.input_num(), net2.input_num());
        assert_eq!(net.output_num(), net2.output_num());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let text = "INPUT(a)\nbogus statement\n";
        match parse_bench(text.as_bytes()) {
            Err(IoError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
