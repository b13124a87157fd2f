use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::Path;

use crate::delta_format::{self, Delta, MAX_LITERAL_LEN};
use crate::error::{Error, Result};
use crate::rolling_hash::RollingHash;
use crate::signature::{self, ChunkIndex, Signature};
use crate::util::{self, MappedFile};

/// The run currently being extended.
#[derive(Debug)]
enum OpenRun {
    None,
    Match { start: u32, end: u32 },
    Literal(Vec<u8>),
}

/// Counts gathered while generating a delta.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeltaSummary {
    pub chunk_len: u32,
    pub match_runs: usize,
    pub matched_chunks: usize,
    pub literal_runs: usize,
    pub literal_bytes: usize,
    /// Size of the delta output, header included.
    pub delta_bytes: u64,
}

/// Slides a window over the updated file and emits match and literal runs
/// against a baseline described by a signature.
///
/// The window holds a whole chunk while we are at a chunk boundary (start of
/// input, or right after a match) and advances one byte at a time inside a
/// literal run, so every offset is tested for a match. Once the updated file
/// is exhausted, the leftover window is drained from the front one byte at a
/// time.
pub struct DeltaEncoder<'a, R, W> {
    chunk_len: u32,
    index: ChunkIndex,
    baseline: &'a [u8],
    updated: R,
    out: W,

    run: OpenRun,
    window: VecDeque<u8>,
    rolling: RollingHash,
    chunk_buf: Vec<u8>,
    max_literal_len: usize,
    summary: DeltaSummary,
}

impl<'a, R: Read, W: Write> DeltaEncoder<'a, R, W> {
    pub fn new(signature: Signature, baseline: &'a [u8], updated: R, out: W) -> Self {
        let chunk_len = signature.chunk_len;
        Self {
            chunk_len,
            index: signature.chunk_index(),
            baseline,
            updated,
            out,
            run: OpenRun::None,
            window: VecDeque::with_capacity(chunk_len as usize),
            rolling: RollingHash::new(),
            chunk_buf: vec![0u8; chunk_len as usize],
            max_literal_len: MAX_LITERAL_LEN,
            summary: DeltaSummary {
                chunk_len,
                ..DeltaSummary::default()
            },
        }
    }

    #[cfg(test)]
    fn with_max_literal_len(mut self, max: usize) -> Self {
        self.max_literal_len = max;
        self
    }

    /// Run the whole generation, returning the output sink and the summary.
    pub fn encode(mut self) -> Result<(W, DeltaSummary)> {
        delta_format::write_header(&mut self.out, self.chunk_len).map_err(write_err)?;
        self.summary.delta_bytes = delta_format::HEADER_LEN as u64;

        loop {
            let more = match self.run {
                OpenRun::None | OpenRun::Match { .. } => self.read_full_chunk()?,
                OpenRun::Literal(_) => self.read_next_byte()?,
            };
            // A short window means the updated file ran out
            if !more || self.window.len() < self.chunk_len as usize {
                break;
            }
            self.search_and_update()?;
        }

        while !self.window.is_empty() {
            self.search_and_update()?;
            if matches!(self.run, OpenRun::Literal(_)) {
                self.skip_first_byte();
            } else {
                self.window.clear();
            }
        }

        self.flush_run()?;
        self.out.flush().map_err(write_err)?;

        tracing::debug!(summary = ?self.summary, "delta generated");
        Ok((self.out, self.summary))
    }

    /// Replace the window with the next `chunk_len` bytes (fewer at end of input).
    fn read_full_chunk(&mut self) -> Result<bool> {
        let n = util::read_exact_or_eof(&mut self.updated, &mut self.chunk_buf).map_err(read_err)?;
        self.window.clear();
        self.window.extend(&self.chunk_buf[..n]);
        self.rolling.init(&self.chunk_buf[..n]);
        Ok(n > 0)
    }

    /// Advance the window by one byte. At end of input the window only shrinks.
    fn read_next_byte(&mut self) -> Result<bool> {
        let mut byte = [0u8; 1];
        if util::read_exact_or_eof(&mut self.updated, &mut byte).map_err(read_err)? == 0 {
            self.skip_first_byte();
            return Ok(true);
        }

        if let Some(old) = self.window.pop_front() {
            self.rolling.rotate(old, byte[0]);
        }
        self.window.push_back(byte[0]);
        Ok(true)
    }

    fn skip_first_byte(&mut self) {
        if let Some(old) = self.window.pop_front() {
            self.rolling.roll_out(old);
        }
    }

    fn search_and_update(&mut self) -> Result<()> {
        match self.search_chunk() {
            Some(index) => self.chunk_found(index),
            None => self.literal_found(),
        }
    }

    /// Look the window's hash up and confirm the hit against the baseline bytes.
    fn search_chunk(&self) -> Option<u32> {
        let hash = self.rolling.digest();
        tracing::trace!("searching hash {hash:08x}");
        let index = *self.index.get(&hash)?;

        let offset = u64::from(index) * u64::from(self.chunk_len);
        let candidate = util::read_at(self.baseline, offset, self.chunk_len as usize);
        if !window_eq(&self.window, candidate) {
            tracing::trace!(index, "hash hit but chunk bytes differ");
            return None;
        }
        Some(index)
    }

    fn chunk_found(&mut self, index: u32) -> Result<()> {
        tracing::trace!(index, "chunk matched");
        self.summary.matched_chunks += 1;

        if let OpenRun::Match { end, .. } = &mut self.run {
            if *end + 1 == index {
                *end += 1;
                return Ok(());
            }
        }

        if !matches!(self.run, OpenRun::None) {
            self.flush_run()?;
        }
        self.run = OpenRun::Match {
            start: index,
            end: index,
        };
        Ok(())
    }

    /// The window's front byte has no match at this offset.
    fn literal_found(&mut self) -> Result<()> {
        let Some(&byte) = self.window.front() else {
            return Ok(());
        };
        tracing::trace!(byte, "found literal");

        if let OpenRun::Literal(data) = &mut self.run {
            if data.len() < self.max_literal_len {
                data.push(byte);
                return Ok(());
            }
        }

        if !matches!(self.run, OpenRun::None) {
            self.flush_run()?;
        }

        let mut data = Vec::with_capacity(self.chunk_len as usize);
        data.push(byte);
        self.run = OpenRun::Literal(data);
        Ok(())
    }

    /// Write the open run and close it.
    fn flush_run(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.run, OpenRun::None) {
            OpenRun::None => {
                tracing::error!("can't write invalid command to delta file");
                Err(Error::InvalidCommand)
            }
            OpenRun::Match { start, end } => {
                tracing::debug!(start, end, "writing match run");
                delta_format::write_match(&mut self.out, start, end).map_err(write_err)?;
                self.summary.match_runs += 1;
                self.summary.delta_bytes += delta_format::RECORD_HEADER_LEN as u64;
                Ok(())
            }
            OpenRun::Literal(data) => {
                tracing::debug!(len = data.len(), "writing literal run");
                delta_format::write_literal(&mut self.out, &data).map_err(write_err)?;
                self.summary.literal_runs += 1;
                self.summary.literal_bytes += data.len();
                self.summary.delta_bytes +=
                    (delta_format::RECORD_HEADER_LEN + data.len()) as u64;
                Ok(())
            }
        }
    }
}

fn window_eq(window: &VecDeque<u8>, chunk: &[u8]) -> bool {
    if window.len() != chunk.len() {
        return false;
    }
    let (front, back) = window.as_slices();
    front == &chunk[..front.len()] && back == &chunk[front.len()..]
}

fn read_err(e: std::io::Error) -> Error {
    tracing::error!(error = %e, "error reading updated file");
    Error::io("reading updated file", e)
}

fn write_err(e: std::io::Error) -> Error {
    tracing::error!(error = %e, "error writing to delta file");
    Error::io("writing delta file", e)
}

/// Compute a delta between in-memory baseline and updated data.
pub fn compute_delta(baseline: &[u8], signature: &Signature, updated: &[u8]) -> Result<Delta> {
    if baseline.is_empty() {
        return Err(Error::EmptyOriginalFile);
    }
    if updated.is_empty() {
        return Err(Error::EmptyUpdatedFile);
    }

    let encoder = DeltaEncoder::new(signature.clone(), baseline, updated, Vec::new());
    let (bytes, _) = encoder.encode()?;
    Delta::from_bytes(&bytes)
}

/// Generate the delta that rebuilds `updated_path` from `baseline_path`.
///
/// The signature is read first, then both inputs are opened, and only then is
/// the delta file created, so a failed precondition leaves nothing on disk.
pub fn generate_delta(
    baseline_path: &Path,
    signature_path: &Path,
    updated_path: &Path,
    delta_path: &Path,
) -> Result<DeltaSummary> {
    let sig = signature::read_signature(signature_path)?;

    let baseline = MappedFile::open(baseline_path)?;
    if baseline.is_empty() {
        tracing::error!(path = %baseline_path.display(), "original file is empty");
        return Err(Error::EmptyOriginalFile);
    }

    let (updated, updated_size) = util::open_read(updated_path)?;
    if updated_size == 0 {
        tracing::error!(path = %updated_path.display(), "updated file is empty");
        return Err(Error::EmptyUpdatedFile);
    }

    let out = util::create_exclusive(delta_path)?;

    tracing::info!(
        chunk_len = sig.chunk_len,
        total_chunks = sig.total_chunks(),
        baseline_size = baseline.len(),
        updated_size,
        "generating delta"
    );

    let encoder = DeltaEncoder::new(sig, baseline.bytes(), updated, out);
    let (out, summary) = encoder.encode()?;
    out.into_inner()
        .map_err(|e| Error::io("flushing delta file", e.into_error()))?;
    Ok(summary)
}
