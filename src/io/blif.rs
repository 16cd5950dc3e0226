//! BLIF reader
//!
//! Supports the combinational and latch subset: `.model`, `.inputs`,
//! `.outputs`, `.latch`, `.names` with cube lists, `.end`. Each `.names`
//! block becomes an expression gate (a sum of cube products, possibly
//! complemented), which the network builder decomposes into primitive
//! gates.

use std::io::{BufRead, BufReader, Read};

use crate::io::IoError;
use crate::network::{Expr, GateFunc, ParsedDff, ParsedGate, ParsedNetlist};

struct NamesBlock {
    signals: Vec<String>,
    cubes: Vec<(String, char)>,
    line: usize,
}

/// Parse a BLIF netlist
pub fn parse_blif<R: Read>(reader: R) -> Result<ParsedNetlist, IoError> {
    let mut parsed = ParsedNetlist::new("blif");
    let mut block: Option<NamesBlock> = None;

    let mut flush = |parsed: &mut ParsedNetlist, block: Option<NamesBlock>| -> Result<(), IoError> {
        let Some(block) = block else {
            return Ok(());
        };
        let gate = names_to_gate(block)?;
        parsed.gates.push(gate);
        Ok(())
    };

    for (lineno, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line = line.split('#').next().unwrap_or("").trim().to_string();
        if line.is_empty() {
            continue;
        }
        let err = |msg: &str| IoError::Parse {
            line: lineno + 1,
            message: msg.to_string(),
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            ".model" => {
                flush(&mut parsed, block.take())?;
                if let Some(name) = tokens.get(1) {
                    parsed.name = name.to_string();
                }
            }
            ".inputs" => {
                flush(&mut parsed, block.take())?;
                parsed.inputs.extend(tokens[1..].iter().map(|s| s.to_string()));
            }
            ".outputs" => {
                flush(&mut parsed, block.take())?;
                parsed
                    .outputs
                    .extend(tokens[1..].iter().map(|s| s.to_string()));
            }
            ".latch" => {
                flush(&mut parsed, block.take())?;
                if tokens.len() < 3 {
                    return Err(err(".latch needs an input and an output"));
                }
                parsed.dffs.push(ParsedDff {
                    output: tokens[2].to_string(),
                    input: tokens[1].to_string(),
                });
            }
            ".names" => {
                flush(&mut parsed, block.take())?;
                if tokens.len() < 2 {
                    return Err(err(".names needs at least an output"));
                }
                block = Some(NamesBlock {
                    signals: tokens[1..].iter().map(|s| s.to_string()).collect(),
                    cubes: Vec::new(),
                    line: lineno + 1,
                });
            }
            ".end" => {
                flush(&mut parsed, block.take())?;
            }
            ".exdc" | ".wire_load_slope" | ".gate" | ".mlatch" => {
                return Err(err("unsupported BLIF construct"));
            }
            _ => {
                let Some(block) = block.as_mut() else {
                    return Err(err("cube outside a .names block"));
                };
                let (mask, out) = if tokens.len() == 2 {
                    (tokens[0].to_string(), tokens[1])
                } else if tokens.len() == 1 {
                    // constant cube: only the output column
                    (String::new(), tokens[0])
                } else {
                    return Err(err("malformed cube"));
                };
                let out = out.chars().next().unwrap_or('0');
                if out != '0' && out != '1' {
                    return Err(err("cube output must be 0 or 1"));
                }
                block.cubes.push((mask, out));
            }
        }
    }
    flush(&mut parsed, block.take())?;
    Ok(parsed)
}

// Turn a cube list into a sum-of-products expression gate
fn names_to_gate(block: NamesBlock) -> Result<ParsedGate, IoError> {
    let err = |msg: &str| IoError::Parse {
        line: block.line,
        message: msg.to_string(),
    };
    let (output, inputs) = block
        .signals
        .split_last()
        .map(|(out, ins)| (out.clone(), ins.to_vec()))
        .ok_or_else(|| err(".names without signals"))?;

    // with no cubes at all the output is constant 0
    let mut products = Vec::new();
    let mut polarity = '1';
    for (i, (mask, out)) in block.cubes.iter().enumerate() {
        if i == 0 {
            polarity = *out;
        } else if *out != polarity {
            return Err(err("mixed cube output values"));
        }
        if mask.len() != inputs.len() {
            return Err(err("cube width does not match input count"));
        }
        let mut terms = Vec::new();
        for (pin, c) in mask.chars().enumerate() {
            match c {
                '1' => terms.push(Expr::Pin(pin)),
                '0' => terms.push(Expr::Not(Box::new(Expr::Pin(pin)))),
                '-' => {}
                _ => return Err(err("cube characters must be 0, 1 or -")),
            }
        }
        products.push(match terms.len() {
            0 => Expr::Const(true),
            1 => terms.pop().expect("one term"),
            _ => Expr::And(terms),
        });
    }
    let mut expr = match products.len() {
        0 => Expr::Const(false),
        1 => products.pop().expect("one product"),
        _ => Expr::Or(products),
    };
    if polarity == '0' {
        expr = expr.negate();
    }
    Ok(ParsedGate {
        output,
        func: GateFunc::Complex(expr),
        inputs,
    })
}
