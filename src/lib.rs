//! rollingdelta - rolling-hash signatures and binary deltas
//!
//! A signature describes a baseline file as a chunk length plus one rolling
//! hash per chunk. Given that signature, the baseline and an updated file, a
//! delta of match and literal runs is produced that rebuilds the updated file
//! from the baseline.

pub mod chunk;
pub mod delta;
pub mod delta_format;
pub mod error;
pub mod patch;
pub mod rolling_hash;
pub mod signature;
pub mod util;

pub use delta::{compute_delta, generate_delta, DeltaEncoder, DeltaSummary};
pub use delta_format::{Delta, DeltaRun};
pub use error::{Error, Result};
pub use patch::{apply_delta, apply_delta_file};
pub use signature::{generate_signature, read_signature, write_signature, Signature};
