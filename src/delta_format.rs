//! Delta file format.
//!
//! ```text
//! 4 bytes  - chunk length (big-endian)
//! records, until end of file:
//!   match:   0x00, then 3 bytes packing [start chunk:12][end chunk:12]
//!   literal: 0x01, then 3 bytes length (big-endian), then `length` raw bytes
//! ```

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use crate::chunk::validate_chunk_len;
use crate::error::{Error, Result};

pub const CMD_MATCH: u8 = 0x00;
pub const CMD_LITERAL: u8 = 0x01;

/// Highest chunk index a match record can carry (12 bits).
pub const MAX_CHUNK_INDEX: u32 = 0xFFF;
/// Longest literal a single record can carry (24 bits).
pub const MAX_LITERAL_LEN: usize = 0xFF_FFFF;

pub const HEADER_LEN: usize = 4;
pub const RECORD_HEADER_LEN: usize = 4;

/// One record of a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaRun {
    /// Baseline chunks `start..=end`, concatenated.
    Match { start: u32, end: u32 },
    /// Bytes copied verbatim.
    Literal { data: Vec<u8> },
}

impl DeltaRun {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            DeltaRun::Match { start, end } => write_match(writer, *start, *end),
            DeltaRun::Literal { data } => write_literal(writer, data),
        }
    }

    /// Number of bytes this run contributes to the reconstructed file, given
    /// the baseline it refers to.
    pub fn output_len(&self, chunk_len: u32, baseline_len: u64) -> u64 {
        match self {
            DeltaRun::Match { start, end } => {
                let from = u64::from(*start) * u64::from(chunk_len);
                let to = ((u64::from(*end) + 1) * u64::from(chunk_len)).min(baseline_len);
                to.saturating_sub(from)
            }
            DeltaRun::Literal { data } => data.len() as u64,
        }
    }
}

/// A decoded delta file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub chunk_len: u32,
    pub runs: Vec<DeltaRun>,
}

impl Delta {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = self.chunk_len.to_be_bytes().to_vec();
        for run in &self.runs {
            // Writing into a Vec can't fail
            let _ = run.write_to(&mut data);
        }
        data
    }

    /// Decode a whole delta file.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::invalid_delta("missing chunk length header"));
        }
        let chunk_len = validate_chunk_len(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))?;

        let mut runs = Vec::new();
        let mut pos = HEADER_LEN;
        while pos < data.len() {
            let record = data
                .get(pos..pos + RECORD_HEADER_LEN)
                .ok_or_else(|| Error::invalid_delta(format!("truncated record at offset {pos}")))?;
            let field = u32::from_be_bytes([0, record[1], record[2], record[3]]);
            pos += RECORD_HEADER_LEN;

            match record[0] {
                CMD_MATCH => {
                    let (start, end) = (field >> 12, field & MAX_CHUNK_INDEX);
                    if start > end {
                        return Err(Error::invalid_delta(format!(
                            "match run {start}..{end} is reversed"
                        )));
                    }
                    runs.push(DeltaRun::Match { start, end });
                }
                CMD_LITERAL => {
                    let len = field as usize;
                    let literal = data.get(pos..pos + len).ok_or_else(|| {
                        Error::invalid_delta(format!(
                            "literal of {len} bytes at offset {pos} runs past end of file"
                        ))
                    })?;
                    runs.push(DeltaRun::Literal {
                        data: literal.to_vec(),
                    });
                    pos += len;
                }
                cmd => {
                    return Err(Error::invalid_delta(format!(
                        "unknown command 0x{cmd:02x} at offset {}",
                        pos - RECORD_HEADER_LEN
                    )));
                }
            }
        }

        Ok(Self { chunk_len, runs })
    }
}

pub fn write_header<W: Write>(writer: &mut W, chunk_len: u32) -> io::Result<()> {
    writer.write_all(&chunk_len.to_be_bytes())
}

pub fn write_match<W: Write>(writer: &mut W, start: u32, end: u32) -> io::Result<()> {
    debug_assert!(start <= MAX_CHUNK_INDEX && end <= MAX_CHUNK_INDEX);
    let packed = ((start & MAX_CHUNK_INDEX) << 12) | (end & MAX_CHUNK_INDEX);
    let [_, a, b, c] = packed.to_be_bytes();
    writer.write_all(&[CMD_MATCH, a, b, c])
}

pub fn write_literal<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    debug_assert!(data.len() <= MAX_LITERAL_LEN);
    let [_, a, b, c] = (data.len() as u32).to_be_bytes();
    writer.write_all(&[CMD_LITERAL, a, b, c])?;
    writer.write_all(data)
}
