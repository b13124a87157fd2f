use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rollingdelta::util::files_equal;
use rollingdelta::{Delta, DeltaRun};
use tempfile::TempDir;

fn exe() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rollingdelta"))
}

fn run(args: &[&Path]) -> Output {
    Command::new(exe())
        .args(args)
        .output()
        .expect("Failed to run rollingdelta")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed:\nstdout: {}\nstderr: {}",
        what,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A 256-byte chunk whose contents depend on `seed`.
fn chunk(seed: u8) -> Vec<u8> {
    (0..=255u8)
        .map(|i| i.wrapping_mul(seed | 1).wrapping_add(seed.rotate_left(5)))
        .collect()
}

struct Case {
    dir: TempDir,
}

impl Case {
    fn new(baseline: &[u8], updated: &[u8]) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("test.org"), baseline).unwrap();
        fs::write(dir.path().join("test.update"), updated).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// signature -> delta -> patch, checking the rebuilt file along the way.
    fn full_cycle(&self) -> Delta {
        let (org, sig, update, delta, rebuilt) = (
            self.path("test.org"),
            self.path("test.sig"),
            self.path("test.update"),
            self.path("test.delta"),
            self.path("test.rebuilt"),
        );

        assert_success(&run(&[Path::new("signature"), &org, &sig]), "signature");
        assert_success(&run(&[Path::new("delta"), &org, &sig, &update, &delta]), "delta");
        assert_success(&run(&[Path::new("patch"), &org, &delta, &rebuilt]), "patch");

        assert!(files_equal(&update, &rebuilt).unwrap(), "rebuilt file differs from updated file");
        Delta::from_bytes(&fs::read(&delta).unwrap()).unwrap()
    }
}

fn m(start: u32, end: u32) -> DeltaRun {
    DeltaRun::Match { start, end }
}

fn lit(data: &[u8]) -> DeltaRun {
    DeltaRun::Literal {
        data: data.to_vec(),
    }
}

#[test]
fn test_one_chunk_no_changes() {
    let data = vec![0u8; 256];
    let case = Case::new(&data, &data);
    let delta = case.full_cycle();

    assert_eq!(fs::read(case.path("test.sig")).unwrap().len(), 8);
    assert_eq!(delta.chunk_len, 256);
    assert_eq!(delta.runs, vec![m(0, 0)]);
}

#[test]
fn test_one_chunk_literals_at_start() {
    let baseline = chunk(1);
    let updated = [b"12345".to_vec(), baseline.clone()].concat();
    let delta = Case::new(&baseline, &updated).full_cycle();
    assert_eq!(delta.runs, vec![lit(b"12345"), m(0, 0)]);
}

#[test]
fn test_one_chunk_literals_at_end() {
    let baseline = chunk(2);
    let updated = [baseline.clone(), b"tail".to_vec()].concat();
    let delta = Case::new(&baseline, &updated).full_cycle();
    assert_eq!(delta.runs, vec![m(0, 0), lit(b"tail")]);
}

#[test]
fn test_two_chunks_swapped() {
    let (a, b) = (chunk(3), chunk(4));
    let baseline = [a.clone(), b.clone()].concat();
    let updated = [b, a].concat();
    let delta = Case::new(&baseline, &updated).full_cycle();
    assert_eq!(delta.runs, vec![m(1, 1), m(0, 0)]);
}

#[test]
fn test_two_chunks_duplicated() {
    let (a, b) = (chunk(5), chunk(6));
    let baseline = [a.clone(), b.clone()].concat();
    let updated = [a.clone(), a, b].concat();
    let delta = Case::new(&baseline, &updated).full_cycle();
    assert_eq!(delta.runs, vec![m(0, 0), m(0, 1)]);
}

#[test]
fn test_two_chunks_literals_everywhere() {
    let (a, b) = (chunk(7), chunk(8));
    let baseline = [a.clone(), b.clone()].concat();
    let updated = [b"<".to_vec(), a, b"|".to_vec(), b, b">".to_vec()].concat();
    let delta = Case::new(&baseline, &updated).full_cycle();
    assert_eq!(
        delta.runs,
        vec![lit(b"<"), m(0, 0), lit(b"|"), m(1, 1), lit(b">")]
    );
}

#[test]
fn test_no_common_data() {
    let baseline = vec![0x11u8; 512];
    let updated = vec![0x22u8; 300];
    let delta = Case::new(&baseline, &updated).full_cycle();
    assert_eq!(delta.runs, vec![lit(&updated)]);
}

#[test]
fn test_large_file_with_edits() {
    let baseline: Vec<u8> = (0..200_000u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();
    let mut updated = baseline.clone();
    updated.splice(1000..1000, b"inserted".iter().copied());
    updated.drain(90_000..90_050);
    updated.extend_from_slice(b"appended at the end");

    let case = Case::new(&baseline, &updated);
    let delta = case.full_cycle();
    // sqrt(200000) = 447 -> 384
    assert_eq!(delta.chunk_len, 384);
    assert!(delta.runs.iter().any(|r| matches!(r, DeltaRun::Match { .. })));
    assert!(fs::metadata(case.path("test.delta")).unwrap().len() < 10_000);
}

#[test]
fn test_empty_input_for_signature() {
    let case = Case::new(b"", b"x");
    let output = run(&[Path::new("signature"), &case.path("test.org"), &case.path("test.sig")]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("input file is empty"));
    assert!(!case.path("test.sig").exists());
}

#[test]
fn test_empty_updated_file() {
    let case = Case::new(&chunk(9), b"");
    let (org, sig, update, delta) = (
        case.path("test.org"),
        case.path("test.sig"),
        case.path("test.update"),
        case.path("test.delta"),
    );
    assert_success(&run(&[Path::new("signature"), &org, &sig]), "signature");

    let output = run(&[Path::new("delta"), &org, &sig, &update, &delta]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("updated file is empty"));
    assert!(!delta.exists());
}

#[test]
fn test_invalid_signature_file() {
    let case = Case::new(&chunk(10), &chunk(10));
    let sig = case.path("test.sig");
    fs::write(&sig, [0, 0, 1, 0, 1, 2]).unwrap();

    let output = run(&[
        Path::new("delta"),
        &case.path("test.org"),
        &sig,
        &case.path("test.update"),
        &case.path("test.delta"),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid signature file"));
    assert!(!case.path("test.delta").exists());
}

#[test]
fn test_invalid_chunk_size() {
    let case = Case::new(&chunk(11), &chunk(11));
    let sig = case.path("test.sig");
    fs::write(&sig, [0, 0, 1, 1, 0, 0, 0, 0]).unwrap();

    let output = run(&[
        Path::new("delta"),
        &case.path("test.org"),
        &sig,
        &case.path("test.update"),
        &case.path("test.delta"),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid chunk size"));
}

#[test]
fn test_existing_output_is_not_overwritten() {
    let case = Case::new(&chunk(12), &chunk(12));
    let sig = case.path("test.sig");
    fs::write(&sig, b"precious").unwrap();

    let output = run(&[Path::new("signature"), &case.path("test.org"), &sig]);
    assert!(!output.status.success());
    assert_eq!(fs::read(&sig).unwrap(), b"precious");
}

#[test]
fn test_inspect_delta_json() {
    let case = Case::new(&chunk(13), &chunk(13));
    case.full_cycle();

    let output = Command::new(exe())
        .arg("inspect")
        .arg(case.path("test.delta"))
        .arg("--as-json")
        .output()
        .unwrap();
    assert_success(&output, "inspect");

    let decoded: Delta = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(decoded.runs, vec![m(0, 0)]);
}
