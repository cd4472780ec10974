//! One end-to-end backup run: compress, upload, measure, clean up, notify.
//!
//! Only a failed compression aborts a run. Upload, cleanup and notification failures
//! are logged and the run carries on, so the local archive is always removed and
//! operators always hear about an archive that was produced.

use crate::backup::archive::Archiver;
use crate::backup::backup_config::BackupDefinition;
use crate::backup::cleanup::Cleaner;
use crate::backup::notifications::Notifier;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::upload::Uploader;
use bon::Builder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// What one run produced. Never persisted.
#[derive(Clone, Debug, Builder)]
pub struct ArchiveResult {
    archive_path: PathBuf,
    /// Compressed size, `None` when the archive could not be stat'ed.
    size: Option<u64>,
    compress_duration: Duration,
    upload_duration: Duration,
    /// Upload, size measurement and cleanup. Compression is not included.
    total_duration: Duration,
    upload_error: Option<String>,
}

impl ArchiveResult {
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn compress_duration(&self) -> Duration {
        self.compress_duration
    }

    pub fn upload_duration(&self) -> Duration {
        self.upload_duration
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    pub fn is_uploaded(&self) -> bool {
        self.upload_error.is_none()
    }
}

#[derive(Clone, Builder)]
pub struct BackupRunner {
    archiver: Arc<dyn Archiver>,
    uploader: Arc<dyn Uploader>,
    cleaner: Arc<dyn Cleaner>,
    notifier: Arc<dyn Notifier>,
}

impl BackupRunner {
    /// Runs the pipeline once for `definition`.
    ///
    /// Returns an error only when compression failed, in which case nothing was
    /// uploaded, removed or reported.
    pub fn run(&self, definition: &BackupDefinition) -> Result<ArchiveResult> {
        let name = definition.name();
        info!("Starting backup {} of {:?}", name, definition.source_dir());

        let start = Instant::now();
        let archive_path = self
            .archiver
            .compress(definition.source_dir(), name)
            .add_msg(format!("Backup {} aborted", name))?;
        let compress_duration = start.elapsed();
        info!(
            "Backup {} compressed into {:?} in {:?}",
            name, archive_path, compress_duration
        );

        let start = Instant::now();
        let upload_error = match self.uploader.upload(&archive_path, definition.s3()) {
            Ok(_) => None,
            Err(e) => {
                warn!("Backup {} upload failed, continuing:\n{e}", name);
                Some(e.to_string())
            }
        };
        let upload_duration = start.elapsed();

        let size = match std::fs::metadata(&archive_path) {
            Ok(md) => Some(md.len()),
            Err(e) => {
                warn!("Cannot read size of {:?}: {e}", archive_path);
                None
            }
        };

        if let Err(e) = self.cleaner.remove(&archive_path) {
            warn!("Backup {} left a local archive behind:\n{e}", name);
        }
        let total_duration = start.elapsed();

        let result = ArchiveResult {
            archive_path,
            size,
            compress_duration,
            upload_duration,
            total_duration,
            upload_error,
        };

        if let Err(e) = self.notifier.notify(&result, definition) {
            error!("Backup {} notification failed:\n{e}", name);
        }

        info!(
            "Backup {} finished, uploaded: {}, size: {:?}, total: {:?}",
            name,
            result.is_uploaded(),
            result.size,
            result.total_duration
        );
        Ok(result)
    }
}
