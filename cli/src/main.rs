use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::error;

use ntfscarve_core::CarveConfig;
use ntfscarve_formats::{write_records, OutputFormat};
use ntfscarve_ntfs::{parse_boot_sector, run_carve};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Csv,
    Jsonl,
    Bodyfile,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Jsonl => OutputFormat::JsonLines,
            FormatArg::Bodyfile => OutputFormat::Bodyfile,
        }
    }
}

/// Recover live and deleted `$I30` directory entries from an NTFS volume image.
#[derive(Parser)]
#[command(name = "ntfscarve")]
#[command(about = "Carve live and slack-recovered NTFS directory entries", long_about = None)]
struct Cli {
    /// Path to the volume image or block device.
    volume: PathBuf,

    /// Output file; defaults to stdout.
    outfile: Option<PathBuf>,

    /// Prefix prepended to every resolved path.
    #[arg(short = 'm', long, default_value = "")]
    mount_point: String,

    /// Offset of the NTFS partition within the image, in sectors.
    #[arg(long, default_value_t = 0)]
    partition_offset: u64,

    /// Sector size of the underlying device, in bytes.
    #[arg(long, default_value_t = 512)]
    sector_size: u32,

    /// Traverse `$INDEX_ALLOCATION` attributes of directory records whose
    /// `IN_USE` flag is clear.
    #[arg(long)]
    include_deleted_dirs: bool,

    /// Emit only slack-carved entries, skipping live `$I30` entries. A
    /// carved entry is still suppressed when it exactly duplicates a live
    /// entry's name and file reference in the same directory.
    #[arg(long)]
    slack_only: bool,

    /// Emit only entries whose file reference does not resolve to a live,
    /// current MFT record.
    #[arg(long)]
    deleted_only: bool,

    /// Output format.
    #[arg(long, value_enum, default_value = "csv")]
    format: FormatArg,

    /// Collapse identical output lines.
    #[arg(long)]
    dedup: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::new().filter_level(log_level).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = CarveConfig {
        mount_point: cli.mount_point.clone(),
        partition_offset_sectors: cli.partition_offset,
        sector_size_bytes: cli.sector_size,
        include_deleted_dirs: cli.include_deleted_dirs,
        slack_only: cli.slack_only,
        deleted_only: cli.deleted_only,
        ..CarveConfig::default()
    };

    let mut volume = File::open(&cli.volume)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {e}", cli.volume.display()))?;

    let partition_offset_bytes = config.partition_offset_sectors * config.sector_size_bytes as u64;
    volume.seek(SeekFrom::Start(partition_offset_bytes))?;
    let mut boot_sector = vec![0u8; 512];
    volume.read_exact(&mut boot_sector)?;

    let geometry = parse_boot_sector(&boot_sector, partition_offset_bytes)?;
    let records = run_carve(&mut volume, &geometry, &config)?;

    let format: OutputFormat = cli.format.into();
    match &cli.outfile {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_records(&records, format, cli.dedup, &mut writer)?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_records(&records, format, cli.dedup, &mut writer)?;
            writer.flush()?;
        }
    }

    Ok(())
}
