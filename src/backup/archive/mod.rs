pub mod source_dir;

use crate::backup::archive::source_dir::source_dir_entries;
use crate::backup::compress::{CompressorBuilder, CompressorConfig};
use crate::backup::file_ext::FileExtProvider;
use crate::backup::finish::Finish;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use bon::Builder;
use chrono::{DateTime, Utc};
use dyn_iter::DynIter;
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use std::fs::File;
use std::io::{BufWriter, IntoInnerError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

static TAR_FILE_EXT: &str = "tar";
static TOKEN_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Last token handed out, in microseconds since the epoch.
static LAST_TOKEN_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Turns a source directory into one compressed archive on local disk.
pub trait Archiver: Send + Sync {
    /// Returns the path of the finished archive. Fails with [`Error::Archive`].
    fn compress(&self, source_path: &Path, job_name: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveEntryKind {
    Directory,
    /// Regular file or symlink, stored as found.
    File,
}

/// A single filesystem node and the name it gets inside the archive.
#[derive(Debug)]
pub struct ArchiveEntry {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub kind: ArchiveEntryKind,
}

impl ArchiveEntry {
    pub fn directory<A: Into<PathBuf>, B: Into<PathBuf>>(src: A, dst: B) -> ArchiveEntry {
        Self {
            src: src.into(),
            dst: dst.into(),
            kind: ArchiveEntryKind::Directory,
        }
    }

    pub fn file<A: Into<PathBuf>, B: Into<PathBuf>>(src: A, dst: B) -> ArchiveEntry {
        Self {
            src: src.into(),
            dst: dst.into(),
            kind: ArchiveEntryKind::File,
        }
    }
}

/// Returns a timestamp strictly greater than any previously returned one in this process,
/// so archive names stay unique even when runs start within the same second.
pub fn next_archive_token(now: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = now.timestamp_micros();
    let previous = LAST_TOKEN_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(candidate.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);
    let token = candidate.max(previous.saturating_add(1));
    DateTime::from_timestamp_micros(token).unwrap_or(now)
}

/// Writes `<staging_dir>/<job_name>_<token>.tar[.gz|.xz]` archives.
#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct TarArchiver {
    #[builder(into)]
    staging_dir: PathBuf,
    #[builder(default)]
    compressor: CompressorConfig,
}

impl FileExtProvider for TarArchiver {
    fn file_ext(&self) -> Option<&'static str> {
        Some(TAR_FILE_EXT)
    }
}

impl TarArchiver {
    pub fn archive_file_ext(&self) -> String {
        self.file_ext()
            .into_iter()
            .chain(self.compressor.file_ext())
            .join(".")
    }

    pub fn archive_file_name(&self, job_name: &str, token: DateTime<Utc>) -> String {
        format!(
            "{}_{}.{}",
            job_name,
            token.format(TOKEN_FORMAT),
            self.archive_file_ext()
        )
    }

    fn create_archive(&self, source_path: &Path, job_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.staging_dir)
            .map_err(Error::from)
            .add_msg(format!(
                "Creating staging directory {:?} failed",
                self.staging_dir
            ))?;

        let staging_dir = std::fs::canonicalize(&self.staging_dir)
            .map_err(Error::from)
            .add_msg(format!("Resolving staging directory {:?} failed", self.staging_dir))?;
        let entries = source_dir_entries(source_path, Some(&staging_dir))?;

        let file_name = self.archive_file_name(job_name, next_archive_token(Utc::now()));
        let file_path = self.staging_dir.join(&file_name);
        let file_path_tmp = self.staging_dir.join(format!("{file_name}.tmp"));

        tracing::info!("Compressing {:?} into {:?}", source_path, file_path);
        match self
            .write_archive(entries, &file_path_tmp)
            .and_then(|_| std::fs::rename(&file_path_tmp, &file_path).map_err(Error::from))
        {
            Ok(_) => Ok(file_path),
            Err(mut e) => {
                if let Err(e2) = std::fs::remove_file(&file_path_tmp) {
                    if e2.kind() != std::io::ErrorKind::NotFound {
                        e = e.chain(e2.into());
                    }
                }
                Err(e.add_msg(format!("Writing archive {:?} failed", file_path_tmp)))
            }
        }
    }

    fn write_archive(
        &self,
        entries: DynIter<'_, Result<ArchiveEntry>>,
        file_path_tmp: &Path,
    ) -> Result<()> {
        let mut writer = File::create_new(file_path_tmp)
            .map(BufWriter::new)
            .map_err(Error::from)
            .and_then(|f| self.compressor.build_compressor(f))
            .map(BufWriter::new)
            .map(tar::Builder::new)?;
        writer.follow_symlinks(false);

        let mut entry_count = 0usize;
        for entry in entries {
            let entry = entry?;
            match entry.kind {
                ArchiveEntryKind::Directory => writer.append_dir(&entry.dst, &entry.src)?,
                ArchiveEntryKind::File => writer.append_path_with_name(&entry.src, &entry.dst)?,
            }
            entry_count += 1;
        }
        tracing::info!("Processed {} archive entries", entry_count);

        writer
            .into_inner()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .finish()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .sync_all()?;

        Ok(())
    }
}

impl Archiver for TarArchiver {
    #[named]
    fn compress(&self, source_path: &Path, job_name: &str) -> Result<PathBuf> {
        self.create_archive(source_path, job_name)
            .add_fn_name(function_path!())
            .map_err(|e| Error::archive(source_path, e))
    }
}
