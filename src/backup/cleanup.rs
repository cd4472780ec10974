use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::path::Path;

/// Removes local artifacts once a run is done with them.
pub trait Cleaner: Send + Sync {
    /// Fails with [`Error::Cleanup`].
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Deletes files, or directories recursively, from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsCleaner;

impl Cleaner for FsCleaner {
    fn remove(&self, path: &Path) -> Result<()> {
        let res = match std::fs::symlink_metadata(path) {
            Ok(md) if md.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(e) => Err(e),
        };

        match res {
            Ok(_) => {
                tracing::info!("Removed {:?}", path);
                Ok(())
            }
            Err(e) => Err(Error::cleanup(path, Error::from(e))),
        }
    }
}
