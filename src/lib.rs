//! # s3_backup
//!
//! A scheduled backup agent: directories are archived on cron schedules, uploaded to
//! S3-compatible storage, removed locally and reported by email.
//!
//! ## Quick Start
//!
//! ```no_run
//! use s3_backup::backup::archive::TarArchiver;
//! use s3_backup::backup::backup_config::BackupConfig;
//! use s3_backup::backup::cleanup::FsCleaner;
//! use s3_backup::backup::notifications::EmailNotifier;
//! use s3_backup::backup::runner::BackupRunner;
//! use s3_backup::backup::scheduler::Scheduler;
//! use s3_backup::backup::upload::s3::S3Uploader;
//! use std::sync::Arc;
//!
//! let config = BackupConfig::load("config.yaml")?;
//! let runtime = tokio::runtime::Runtime::new()?;
//! let archiver = TarArchiver::builder()
//!     .staging_dir(config.staging_dir())
//!     .compressor(config.compressor().clone())
//!     .build();
//! let runner = BackupRunner::builder()
//!     .archiver(Arc::new(archiver))
//!     .uploader(Arc::new(S3Uploader::new(runtime.handle().clone())))
//!     .cleaner(Arc::new(FsCleaner))
//!     .notifier(Arc::new(EmailNotifier::new(runtime.handle().clone())))
//!     .build();
//!
//! let pool = Arc::new(rayon::ThreadPoolBuilder::new().build()?);
//! let scheduler = Scheduler::new(config.into_definitions(), runner, pool)?;
//! let (_shutdown_tx, shutdown_rx) = std::sync::mpsc::sync_channel(1);
//! scheduler.run_until(&shutdown_rx)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
