pub mod s3;

use crate::backup::destination::DestinationConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::path::Path;

/// Transfers a local archive to the bucket described by a destination.
pub trait Uploader: Send + Sync {
    /// Fails with [`Error::Upload`].
    fn upload(&self, local_path: &Path, destination: &DestinationConfig) -> Result<()>;
}

/// The object key is the archive's base file name, directory components stripped.
pub fn object_key(local_path: &Path) -> Result<String> {
    local_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::from(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{:?} has no usable file name", local_path),
            ))
        })
}
