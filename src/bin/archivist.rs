use anyhow::Result;
use archivist::{
    mirror, repair, report_missing, Archive, CancelToken, CheckpointRange, ConnectOptions,
};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use std::io::Write;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(
    name = "archivist",
    version,
    about = "Scan, mirror and repair ledger history archives"
)]
struct Cli {
    /// Lowest ledger to operate on; rounded up to its checkpoint
    #[arg(long, default_value_t = 0)]
    low: u32,

    /// Highest ledger to operate on; rounded up to its checkpoint
    #[arg(long, default_value_t = u32::MAX)]
    high: u32,

    /// AWS region for s3:// archives
    #[arg(long)]
    s3_region: Option<String>,

    /// env_logger-style filter string; overrides RUST_LOG
    #[arg(long)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan an archive and report which artifacts are present
    Scan {
        /// Archive URL (file://, s3:// or mock://)
        archive: String,
    },
    /// Copy a checkpoint range from one archive to another
    Mirror {
        src: String,
        dst: String,
    },
    /// Copy artifacts missing from the destination out of the source
    Repair {
        src: String,
        dst: String,
    },
    /// Scan an archive and log every missing artifact in the range
    ReportMissing {
        archive: String,
    },
}

fn init_logging(cli_filter: Option<&str>) {
    let env = Env::default().default_filter_or(DEFAULT_LOG_FILTER);
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(filter) = cli_filter {
        builder.parse_filters(filter);
    }
    builder.format(|buf, record| {
        let ts = buf.timestamp();
        writeln!(
            buf,
            "[{} {:<5} {}] {}",
            ts,
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_filter.as_deref());

    let opts = ConnectOptions {
        s3_region: cli.s3_region.clone(),
    };
    let range = CheckpointRange::covering(cli.low, cli.high);

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, draining in-flight work");
            ctrl_c.cancel();
        }
    });

    match &cli.command {
        Command::Scan { archive } => {
            let archive = Archive::connect(archive, &opts)?;
            archive.scan(range, &cancel).await?;
        }
        Command::Mirror { src, dst } => {
            let src = Archive::connect(src, &opts)?;
            let dst = Archive::connect(dst, &opts)?;
            mirror(&src, &dst, range, &cancel).await?;
            info!("mirror complete");
        }
        Command::Repair { src, dst } => {
            let src = Archive::connect(src, &opts)?;
            let dst = Archive::connect(dst, &opts)?;
            repair(&src, &dst, range, &cancel).await?;
            info!("repair complete");
        }
        Command::ReportMissing { archive } => {
            let archive = Archive::connect(archive, &opts)?;
            let report = report_missing(&archive, range, &cancel).await?;
            if !report.is_complete() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
