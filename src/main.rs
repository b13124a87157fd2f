use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rollingdelta::{delta, patch, signature, Delta, DeltaRun, Signature};

#[derive(Parser)]
#[command(name = "rollingdelta", version, about = "Rolling-hash signature and delta generator")]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a signature for a baseline file
    Signature {
        /// Baseline file
        input: PathBuf,
        /// Signature file to create (must not exist)
        output: PathBuf,
        /// Chunk length in bytes (multiple of 128, at least 256) [default: from file size]
        #[arg(long)]
        chunk_size: Option<u32>,
    },
    /// Generate a delta from a baseline, its signature and an updated file
    Delta {
        /// Baseline file the signature was generated from
        baseline: PathBuf,
        /// Signature of the baseline
        signature: PathBuf,
        /// Updated file
        updated: PathBuf,
        /// Delta file to create (must not exist)
        output: PathBuf,
    },
    /// Rebuild the updated file from a baseline and a delta
    Patch {
        /// Baseline file the delta was generated against
        baseline: PathBuf,
        /// Delta file
        delta: PathBuf,
        /// Output file to create (must not exist)
        output: PathBuf,
    },
    /// Print the contents of a signature or delta file
    Inspect {
        /// File to decode
        file: PathBuf,
        /// What kind of file it is
        #[arg(long, value_enum, default_value_t = Kind::Delta)]
        kind: Kind,
        /// Print as JSON
        #[arg(long = "as-json")]
        as_json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Signature,
    Delta,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    match cli.command {
        Commands::Signature {
            input,
            output,
            chunk_size,
        } => {
            println!("Generating signature...");
            println!("  Input: {}", input.display());
            println!("  Output: {}", output.display());

            let start = Instant::now();
            let sig = tokio::task::spawn_blocking(move || {
                signature::generate_signature_file(&input, &output, chunk_size)
            })
            .await?
            .context("Failed to generate signature")?;
            let elapsed = start.elapsed();

            println!("\nSignature generated successfully!");
            println!("  Chunk length: {}", sig.chunk_len);
            println!("  Chunks: {}", sig.total_chunks());
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Delta {
            baseline,
            signature,
            updated,
            output,
        } => {
            println!("Generating delta...");
            println!("  Baseline: {}", baseline.display());
            println!("  Signature: {}", signature.display());
            println!("  Updated: {}", updated.display());
            println!("  Output: {}", output.display());

            let start = Instant::now();
            let summary = tokio::task::spawn_blocking(move || {
                delta::generate_delta(&baseline, &signature, &updated, &output)
            })
            .await?
            .context("Failed to generate delta")?;
            let elapsed = start.elapsed();

            println!("\nDelta generated successfully!");
            println!("  Chunk length: {}", summary.chunk_len);
            println!("  Match runs: {}", summary.match_runs);
            println!("  Matched chunks: {}", summary.matched_chunks);
            println!("  Literal runs: {}", summary.literal_runs);
            println!("  Literal bytes: {}", summary.literal_bytes);
            println!("  Delta size: {} bytes", summary.delta_bytes);
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Patch {
            baseline,
            delta,
            output,
        } => {
            println!("Applying delta...");
            println!("  Baseline: {}", baseline.display());
            println!("  Delta: {}", delta.display());
            println!("  Output: {}", output.display());

            let start = Instant::now();
            let written = tokio::task::spawn_blocking(move || {
                patch::apply_delta_file(&baseline, &delta, &output)
            })
            .await?
            .context("Failed to apply delta")?;
            let elapsed = start.elapsed();

            println!("\nDelta applied successfully!");
            println!("  Bytes written: {}", written);
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Inspect {
            file,
            kind,
            as_json,
        } => {
            let raw = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            match kind {
                Kind::Signature => {
                    let sig = Signature::from_bytes(&raw).context("Failed to decode signature")?;
                    if as_json {
                        println!("{}", serde_json::to_string_pretty(&sig)?);
                    } else {
                        print_signature(&sig);
                    }
                }
                Kind::Delta => {
                    let delta = Delta::from_bytes(&raw).context("Failed to decode delta")?;
                    if as_json {
                        println!("{}", serde_json::to_string_pretty(&delta)?);
                    } else {
                        print_delta(&delta);
                    }
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("rollingdelta=warn"),
        1 => EnvFilter::new("rollingdelta=info"),
        2 => EnvFilter::new("rollingdelta=debug"),
        _ => EnvFilter::new("rollingdelta=trace"),
    });

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_signature(sig: &Signature) {
    println!("Chunk length: {}", sig.chunk_len);
    println!("Chunks: {}", sig.total_chunks());
    for (i, hash) in sig.hashes.iter().enumerate() {
        println!("  {:>6}  {:08x}", i, hash);
    }
}

fn print_delta(delta: &Delta) {
    println!("Chunk length: {}", delta.chunk_len);
    println!("Runs: {}", delta.runs.len());
    for run in &delta.runs {
        match run {
            DeltaRun::Match { start, end } => println!("  MATCH   chunks {}..={}", start, end),
            DeltaRun::Literal { data } => println!("  LITERAL {} bytes", data.len()),
        }
    }
}
