use std::path::{Path, PathBuf};

use clap::Parser;
use nedf::{NedfFile, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Samples scanned for markers per file
const SCAN_SAMPLES: u64 = 1000;

#[derive(Parser)]
#[command(name = "nedf_check")]
#[command(about = "Quick sanity check of NEDF recordings", long_about = None)]
struct Cli {
    /// NEDF files to check
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::new("warn"))
        .init();

    for path in &cli.files {
        if let Err(e) = check(path) {
            println!("Error: {}", e);
        }
        println!();
    }
}

fn check(path: &Path) -> Result<()> {
    let mut file = NedfFile::open(path)?;
    let header = file.header().clone();

    println!("File: {}", path.display());
    println!("NEDF Version: {}", header.version);
    println!(
        "nchan: {}/{}, nacc: {}",
        header.eeg.total_channels,
        header.channel_names().len(),
        header.accelerometer.channel_count
    );
    if let Some(start) = header.start_time() {
        println!("Start: {}", start.to_rfc3339());
    }
    println!("Duration: {:.1} s", header.duration_seconds());

    println!("Scanning first {} samples...", SCAN_SAMPLES);
    let mut scan = file.scan_markers(Some(SCAN_SAMPLES))?;
    let count = scan.by_ref().collect::<Result<Vec<_>>>()?.len();
    let corrupt = scan.looks_corrupt();
    let stats = scan.stats();
    drop(scan);
    println!("Markers: {} (longest run {})", count, stats.max_run);
    if corrupt {
        println!("Marker density suggests a corrupt file");
    }

    if header.record_count() > 0 && header.channel_count() > 0 {
        let first = file.read_samples(0, 1, &[0])?;
        let last = file.read_samples(header.record_count() - 1, 1, &[0])?;
        println!("First channel, first sample: {}", first[0]);
        println!("First channel, last sample: {}", last[0]);
    }
    Ok(())
}
