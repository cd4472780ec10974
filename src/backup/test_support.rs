//! Recording fakes shared by the runner and scheduler tests.

use crate::backup::archive::Archiver;
use crate::backup::backup_config::BackupDefinition;
use crate::backup::cleanup::Cleaner;
use crate::backup::destination::DestinationConfig;
use crate::backup::notifications::Notifier;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::runner::ArchiveResult;
use crate::backup::upload::{object_key, Uploader};
use lettre::message::Mailbox;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub struct UploadCall {
    pub bucket: String,
    pub key: String,
    pub existed: bool,
}

#[derive(Default)]
pub struct Calls {
    pub uploads: Mutex<Vec<UploadCall>>,
    pub cleanup: AtomicUsize,
    pub notified: Mutex<Vec<ArchiveResult>>,
}

pub struct RecordingUploader {
    calls: Arc<Calls>,
    fail: bool,
}

impl RecordingUploader {
    pub fn new(calls: Arc<Calls>, fail: bool) -> Self {
        Self { calls, fail }
    }
}

impl Uploader for RecordingUploader {
    fn upload(&self, local_path: &Path, destination: &DestinationConfig) -> Result<()> {
        let key = object_key(local_path)?;
        self.calls.uploads.lock().unwrap().push(UploadCall {
            bucket: destination.bucket().clone(),
            key: key.clone(),
            existed: local_path.exists(),
        });
        if self.fail {
            Err(Error::upload(
                destination.bucket().as_str(),
                key.as_str(),
                Error::aws("NoSuchBucket: The specified bucket does not exist"),
            ))
        } else {
            Ok(())
        }
    }
}

pub struct CountingCleaner<C> {
    calls: Arc<Calls>,
    inner: C,
}

impl<C: Cleaner> CountingCleaner<C> {
    pub fn new(calls: Arc<Calls>, inner: C) -> Self {
        Self { calls, inner }
    }
}

impl<C: Cleaner> Cleaner for CountingCleaner<C> {
    fn remove(&self, path: &Path) -> Result<()> {
        self.calls.cleanup.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(path)
    }
}

pub struct FailingCleaner;

impl Cleaner for FailingCleaner {
    fn remove(&self, path: &Path) -> Result<()> {
        Err(Error::cleanup(
            path,
            Error::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
        ))
    }
}

pub struct RecordingNotifier {
    calls: Arc<Calls>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new(calls: Arc<Calls>, fail: bool) -> Self {
        Self { calls, fail }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, result: &ArchiveResult, _definition: &BackupDefinition) -> Result<()> {
        self.calls.notified.lock().unwrap().push(result.clone());
        if self.fail {
            Err(Error::notify(Error::smtp_send_error("mail relay refused")))
        } else {
            Ok(())
        }
    }
}

/// Delays before delegating, so overlapping runs can be observed.
pub struct SlowArchiver {
    inner: Arc<dyn Archiver>,
    delay: Duration,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub runs: AtomicUsize,
}

impl SlowArchiver {
    pub fn new(inner: Arc<dyn Archiver>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        }
    }
}

impl Archiver for SlowArchiver {
    fn compress(&self, source_path: &Path, job_name: &str) -> Result<PathBuf> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let result = self.inner.compress(source_path, job_name);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn destination() -> DestinationConfig {
    DestinationConfig::builder()
        .bucket("backups")
        .access_key("AKIAEXAMPLE")
        .secret_key("s3cr3t")
        .region("eu-west-1")
        .sender_email("backup@example.com".parse::<Mailbox>().unwrap())
        .recipient_emails(vec!["ops@example.com".parse::<Mailbox>().unwrap()])
        .build()
}

pub fn definition(name: &str, cron: &str, source_dir: &Path) -> BackupDefinition {
    BackupDefinition::builder()
        .name(name)
        .cron(cron)
        .source_dir(source_dir)
        .s3(destination())
        .build()
}

/// A small directory tree under `temp_dir`, returned as the source to back up.
pub fn source_tree(temp_dir: &TempDir) -> PathBuf {
    let src = temp_dir.path().join("data");
    std::fs::create_dir_all(src.join("nested")).unwrap();
    std::fs::write(src.join("dump.sql"), "CREATE TABLE t (id INT);\n".repeat(64)).unwrap();
    std::fs::write(src.join("nested/notes.txt"), "hello").unwrap();
    src
}
