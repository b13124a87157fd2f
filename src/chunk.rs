use crate::error::{Error, Result};

pub const MIN_CHUNK_LEN: u32 = 256;
pub const CHUNK_ALIGN: u32 = 128;

/// Chunk length for a baseline of `file_size` bytes: `sqrt(file_size)` rounded
/// down to a multiple of 128, never below 256.
pub fn optimal_chunk_size(file_size: u64) -> u32 {
    if file_size <= u64::from(MIN_CHUNK_LEN) * u64::from(MIN_CHUNK_LEN) {
        return MIN_CHUNK_LEN;
    }
    let root = isqrt(file_size);
    // sqrt of a u64 always fits in u32
    (root as u32) & !(CHUNK_ALIGN - 1)
}

/// Floor square root. The float estimate is corrected so large sizes are exact.
fn isqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt() as u64;
    while root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).is_some_and(|sq| sq <= n) {
        root += 1;
    }
    root
}

/// Reject chunk lengths a signature or delta header can't carry.
pub fn validate_chunk_len(chunk_len: u32) -> Result<u32> {
    if chunk_len < MIN_CHUNK_LEN || chunk_len % CHUNK_ALIGN != 0 {
        tracing::error!(chunk_len, "invalid chunk size");
        return Err(Error::InvalidChunkSize { chunk_len });
    }
    Ok(chunk_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_files_use_minimum() {
        assert_eq!(optimal_chunk_size(0), 256);
        assert_eq!(optimal_chunk_size(1), 256);
        assert_eq!(optimal_chunk_size(256 * 256), 256);
        assert_eq!(optimal_chunk_size(256 * 256 + 1), 256);
    }

    #[test]
    fn test_rounds_down_to_alignment() {
        // sqrt = 383 -> 256
        assert_eq!(optimal_chunk_size(383 * 383), 256);
        // sqrt = 384 -> 384
        assert_eq!(optimal_chunk_size(384 * 384), 384);
        assert_eq!(optimal_chunk_size(384 * 384 - 1), 256);
        // 1 MiB: sqrt = 1024
        assert_eq!(optimal_chunk_size(1 << 20), 1024);
        assert_eq!(optimal_chunk_size(10_000_000), 3072);
    }

    #[test]
    fn test_large_sizes_are_exact() {
        assert_eq!(isqrt(u64::MAX), u64::from(u32::MAX));
        assert_eq!(isqrt((1 << 52) + 1), 1 << 26);
        assert_eq!(optimal_chunk_size(u64::from(u32::MAX)), 65535 & !127);
    }

    #[test]
    fn test_deterministic() {
        for size in [0u64, 999, 70_000, 5_000_000, 1 << 33] {
            assert_eq!(optimal_chunk_size(size), optimal_chunk_size(size));
        }
    }

    #[test]
    fn test_validate_chunk_len() {
        assert_eq!(validate_chunk_len(256).unwrap(), 256);
        assert_eq!(validate_chunk_len(384).unwrap(), 384);
        assert!(matches!(
            validate_chunk_len(128),
            Err(Error::InvalidChunkSize { chunk_len: 128 })
        ));
        assert!(matches!(
            validate_chunk_len(300),
            Err(Error::InvalidChunkSize { chunk_len: 300 })
        ));
        assert!(validate_chunk_len(0).is_err());
    }
}
