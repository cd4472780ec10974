use clap::Parser;
use rayon::ThreadPoolBuilder;
use s3_backup::backup::archive::TarArchiver;
use s3_backup::backup::backup_config::BackupConfig;
use s3_backup::backup::cleanup::FsCleaner;
use s3_backup::backup::notifications::EmailNotifier;
use s3_backup::backup::result_error::error::Error;
use s3_backup::backup::result_error::result::Result;
use s3_backup::backup::result_error::AddMsg;
use s3_backup::backup::runner::BackupRunner;
use s3_backup::backup::scheduler::Scheduler;
use s3_backup::backup::upload::s3::S3Uploader;
use std::path::PathBuf;
use std::process::exit;
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Archive directories on a schedule and ship them to S3
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long)]
    config: PathBuf,

    /// Run these backups once at startup, before following the schedule
    #[arg(long = "run-now", value_name = "NAME")]
    run_now: Vec<String>,

    /// Validate the config file and exit
    #[arg(long)]
    check: bool,
}

fn run(args: Args) -> Result<()> {
    let config = BackupConfig::load(&args.config)?;
    if args.check {
        info!("Config {:?} is valid", &args.config);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::from)
        .add_msg("Building async runtime failed")?;
    let pool = Arc::new(ThreadPoolBuilder::new().build()?);

    let archiver = TarArchiver::builder()
        .staging_dir(config.staging_dir())
        .compressor(config.compressor().clone())
        .build();
    let runner = BackupRunner::builder()
        .archiver(Arc::new(archiver))
        .uploader(Arc::new(S3Uploader::new(runtime.handle().clone())))
        .cleaner(Arc::new(FsCleaner))
        .notifier(Arc::new(EmailNotifier::new(runtime.handle().clone())))
        .build();
    let scheduler = Scheduler::new(config.into_definitions(), runner, pool)?;

    let (shutdown_tx, shutdown_rx) = sync_channel(1);
    ctrlc::set_handler(move || {
        if shutdown_tx.try_send(()).is_err() {
            warn!("Shutdown already requested");
        }
    })?;

    scheduler.trigger_all(args.run_now.as_slice())?;

    scheduler.run_until(&shutdown_rx)
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match run(args) {
        Ok(_) => info!("Stopped"),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
