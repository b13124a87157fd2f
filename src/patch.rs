use std::io::Write;
use std::path::Path;

use crate::delta_format::{Delta, DeltaRun};
use crate::error::{Error, Result};
use crate::util::{self, MappedFile};

/// Reconstruct the updated file from the baseline and a decoded delta.
pub fn apply_delta(baseline: &[u8], delta: &Delta) -> Result<Vec<u8>> {
    let chunk_len = u64::from(delta.chunk_len);
    let baseline_len = baseline.len() as u64;

    let estimated_size: u64 = delta
        .runs
        .iter()
        .map(|run| run.output_len(delta.chunk_len, baseline_len))
        .sum();
    let mut result = Vec::with_capacity(estimated_size as usize);

    for run in &delta.runs {
        match run {
            DeltaRun::Match { start, end } => {
                // both ends must name a chunk that exists in the baseline, in order
                let from = u64::from(*start) * chunk_len;
                let last = u64::from(*end) * chunk_len;
                if start > end || last >= baseline_len {
                    return Err(Error::invalid_delta(format!(
                        "match run {start}..{end} is past the end of a {baseline_len}-byte baseline"
                    )));
                }
                let to = (last + chunk_len).min(baseline_len);
                result.extend_from_slice(&baseline[from as usize..to as usize]);
            }
            DeltaRun::Literal { data } => result.extend_from_slice(data),
        }
    }

    Ok(result)
}

/// Read the delta at `delta_path`, apply it to `baseline_path` and write the
/// result to a new file at `output_path`. Returns the number of bytes written.
pub fn apply_delta_file(baseline_path: &Path, delta_path: &Path, output_path: &Path) -> Result<u64> {
    let baseline = MappedFile::open(baseline_path)?;
    let raw = MappedFile::open(delta_path)?;
    let delta = Delta::from_bytes(raw.bytes())?;
    tracing::info!(
        chunk_len = delta.chunk_len,
        runs = delta.runs.len(),
        baseline_size = baseline.len(),
        "applying delta"
    );

    let rebuilt = apply_delta(baseline.bytes(), &delta)?;

    let mut out = util::create_exclusive(output_path)?;
    out.write_all(&rebuilt)
        .and_then(|()| out.flush())
        .map_err(|e| {
            tracing::error!(path = %output_path.display(), error = %e, "error writing output file");
            Error::io("writing output file", e)
        })?;
    Ok(rebuilt.len() as u64)
}
