//! Signature generation and the signature file format.
//!
//! Signature file format (big-endian):
//!
//! ```text
//! offset 0    : u32 chunk length
//! offset 4+4k : u32 rolling hash of chunk k
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::chunk::{optimal_chunk_size, validate_chunk_len};
use crate::delta_format::MAX_CHUNK_INDEX;
use crate::error::{Error, Result};
use crate::rolling_hash;
use crate::util;

/// Maps a chunk hash to the index of the baseline chunk that produced it.
pub type ChunkIndex = HashMap<u32, u32>;

/// Chunk length plus the ordered per-chunk hashes of a baseline file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub chunk_len: u32,
    pub hashes: Vec<u32>,
}

impl Signature {
    pub fn total_chunks(&self) -> usize {
        self.hashes.len()
    }

    /// Build the hash -> chunk lookup used while generating a delta.
    ///
    /// When two chunks share a hash the later chunk wins and the earlier one is
    /// never offered as a match target. Chunks past the 12-bit index a match
    /// record can address are left out.
    pub fn chunk_index(&self) -> ChunkIndex {
        let addressable = self.hashes.len().min(MAX_CHUNK_INDEX as usize + 1);
        if addressable < self.hashes.len() {
            tracing::warn!(
                total_chunks = self.hashes.len(),
                addressable,
                "baseline has more chunks than a match record can address; the rest can only appear as literals"
            );
        }

        let mut index = ChunkIndex::with_capacity(addressable);
        for (i, &hash) in self.hashes[..addressable].iter().enumerate() {
            // addressable <= 4096, so i always fits
            index.insert(hash, i as u32);
        }
        index
    }

    /// Serialize to the signature file layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 4 * self.hashes.len());
        data.extend_from_slice(&self.chunk_len.to_be_bytes());
        for hash in &self.hashes {
            data.extend_from_slice(&hash.to_be_bytes());
        }
        data
    }

    /// Parse the signature file layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 8 || data.len() % 4 != 0 {
            tracing::error!(size = data.len(), "invalid signature file");
            return Err(Error::InvalidSignatureFile);
        }

        let mut words = data
            .chunks_exact(4)
            .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]));

        let chunk_len = words.next().ok_or(Error::InvalidSignatureFile)?;
        let chunk_len = validate_chunk_len(chunk_len)?;
        let hashes: Vec<u32> = words.collect();

        tracing::debug!(chunk_len, total_chunks = hashes.len(), "read signature");
        for (i, hash) in hashes.iter().enumerate() {
            tracing::trace!(chunk = i, "chunk hash {hash:08x}");
        }

        Ok(Self { chunk_len, hashes })
    }
}

/// Hash successive `chunk_len`-byte reads until the reader is exhausted.
pub fn signature_from_reader<R: Read>(reader: &mut R, chunk_len: u32) -> Result<Signature> {
    let mut chunk = vec![0u8; chunk_len as usize];
    let mut hashes = Vec::new();

    loop {
        let n = util::read_exact_or_eof(reader, &mut chunk).map_err(|e| {
            tracing::error!(error = %e, "error reading input file");
            Error::io("reading input file", e)
        })?;
        if n == 0 {
            break;
        }

        let (hash, _) = rolling_hash::hash(&chunk[..n]);
        tracing::trace!(chunk = hashes.len(), "chunk hash {hash:08x}");
        hashes.push(hash);

        if n < chunk.len() {
            break;
        }
    }

    Ok(Signature { chunk_len, hashes })
}

/// Generate a signature for an in-memory baseline.
pub fn generate_signature_from_bytes(data: &[u8], chunk_len: u32) -> Signature {
    let hashes = data
        .chunks(chunk_len as usize)
        .map(|chunk| rolling_hash::hash(chunk).0)
        .collect();
    Signature { chunk_len, hashes }
}

/// Generate a signature for the file at `path`.
///
/// The chunk length comes from the file size unless `chunk_len` overrides it.
pub fn generate_signature(path: &Path, chunk_len: Option<u32>) -> Result<Signature> {
    let chunk_len = chunk_len.map(validate_chunk_len).transpose()?;

    let (mut reader, file_size) = util::open_read(path)?;
    if file_size == 0 {
        tracing::error!(path = %path.display(), "input file is empty");
        return Err(Error::EmptyInput);
    }

    let chunk_len = chunk_len.unwrap_or_else(|| optimal_chunk_size(file_size));
    tracing::info!(file_size, chunk_len, "generating signature");

    signature_from_reader(&mut reader, chunk_len)
}

/// Write a signature to a new file. Fails if `path` already exists.
pub fn write_signature(sig: &Signature, path: &Path) -> Result<()> {
    let mut writer = util::create_exclusive(path)?;
    writer.write_all(&sig.to_bytes()).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "error writing signature file");
        Error::io("writing signature file", e)
    })?;
    writer
        .flush()
        .map_err(|e| Error::io("flushing signature file", e))?;
    Ok(())
}

/// Read a signature file.
pub fn read_signature(path: &Path) -> Result<Signature> {
    let (mut reader, size) = util::open_read(path)?;
    if size < 8 || size % 4 != 0 {
        tracing::error!(path = %path.display(), size, "invalid signature file");
        return Err(Error::InvalidSignatureFile);
    }

    let mut data = Vec::with_capacity(size as usize);
    reader.read_to_end(&mut data).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "error reading signature file");
        Error::io("reading signature file", e)
    })?;
    Signature::from_bytes(&data)
}

/// Generate the signature of `input` and write it to `output`.
pub fn generate_signature_file(
    input: &Path,
    output: &Path,
    chunk_len: Option<u32>,
) -> Result<Signature> {
    let sig = generate_signature(input, chunk_len)?;
    write_signature(&sig, output)?;
    Ok(sig)
}
