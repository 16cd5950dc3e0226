//! Test-pattern files
//!
//! One pattern per line, numbered, one character per vector position
//! (`0`, `1` or `x`), in the same style Atalanta uses:
//!
//! ```text
//! 1: 00011101
//! 2: 0111x000
//! ```

use std::io::{BufRead, BufReader, Read, Write};

use crate::fault::FaultType;
use crate::io::IoError;
use crate::pattern::TestVector;

/// Read a pattern file for a circuit with the given frame sizes
pub fn read_patterns<R: Read>(
    reader: R,
    input_num: usize,
    dff_num: usize,
    fault_type: FaultType,
) -> Result<Vec<TestVector>, IoError> {
    let mut ret = Vec::new();
    for (lineno, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bits = match line.split_once(':') {
            Some((_, bits)) => bits.trim(),
            None => line,
        };
        let tv = TestVector::from_bin_string(bits, input_num, dff_num, fault_type).ok_or(
            IoError::Parse {
                line: lineno + 1,
                message: format!("bad pattern of length {}", bits.len()),
            },
        )?;
        ret.push(tv);
    }
    Ok(ret)
}

/// Write a pattern file
pub fn write_patterns<W: Write>(writer: &mut W, patterns: &[TestVector]) -> Result<(), IoError> {
    for (i, tv) in patterns.iter().enumerate() {
        writeln!(writer, "{}: {}", i + 1, tv.to_bin_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Val3;

    #[test]
    fn test_round_trip() {
        let mut a = TestVector::new(3, 1, FaultType::StuckAt);
        a.set_ppi_val(0, Val3::V1);
        a.set_ppi_val(2, Val3::V0);
        let mut b = TestVector::new(3, 1, FaultType::StuckAt);
        b.set_ppi_val(1, Val3::V1);
        b.set_ppi_val(3, Val3::V1);
        let mut out = Vec::new();
        write_patterns(&mut out, &[a.clone(), b.clone()]).unwrap();
        let back = read_patterns(out.as_slice(), 3, 1, FaultType::StuckAt).unwrap();
        assert_eq!(back, vec![a, b]);
    }

    #[test]
    fn test_length_mismatch() {
        let text = "1: 010\n";
        assert!(matches!(
            read_patterns(text.as_bytes(), 4, 0, FaultType::StuckAt),
            Err(IoError::Parse { line: 1, .. })
        ));
    }
}
