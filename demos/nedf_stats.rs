use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use nedf::NedfFile;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "nedf_stats")]
#[command(about = "Export header / marker data for NEDF files", long_about = None)]
struct Cli {
    /// NEDF files to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// File to save stats to instead of stdout
    #[arg(short = 'o', long)]
    statsfile: Option<PathBuf>,

    /// Quit after this many samples, useful for sanity checks
    #[arg(long)]
    maxsamples: Option<u64>,

    /// Write a `<name>_markers.csv` file next to each input file
    #[arg(long)]
    markercsv: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("error")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let mut out: Box<dyn Write> = match &cli.statsfile {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    writeln!(out, "File;NEDFversion;nchan;nacc;nsample;nmarkers;StartDate_firstEEGTimestamp")?;
    for path in &cli.files {
        // 单个文件出错时继续处理下一个
        if let Err(e) = process_file(path, &cli, &mut out) {
            eprintln!("{}: Error: {:#}", path.display(), e);
        }
    }
    out.flush()?;
    Ok(())
}

fn process_file(path: &Path, cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let label = path.display().to_string();
    let mut file = NedfFile::open_with_advisory(path, move |msg: &str| eprintln!("{}: {}", label, msg))?;

    let mut csv = if cli.markercsv {
        let csv_path = marker_csv_path(path);
        let mut writer = BufWriter::new(
            File::create(&csv_path).with_context(|| format!("creating {}", csv_path.display()))?,
        );
        writeln!(writer, "sample;marker")?;
        Some(writer)
    } else {
        None
    };

    let mut marker_count = 0u64;
    for marker in file.scan_markers(cli.maxsamples)? {
        let marker = marker?;
        if let Some(writer) = csv.as_mut() {
            writeln!(writer, "{};{}", marker.sample, marker.value)?;
        }
        marker_count += 1;
    }
    if let Some(mut writer) = csv {
        writer.flush()?;
    }

    let header = file.header();
    writeln!(
        out,
        "{};{};{};{};{};{};{}",
        path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        header.version,
        header.eeg.total_channels,
        header.accelerometer.channel_count,
        header.eeg.record_count,
        marker_count,
        header.device.start_timestamp
    )?;
    Ok(())
}

fn marker_csv_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{}_markers.csv", stem))
}
