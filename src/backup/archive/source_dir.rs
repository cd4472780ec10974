use crate::backup::archive::ArchiveEntry;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};

use dyn_iter::{DynIter, IntoDynIterator};
use function_name::named;
use walkdir::{DirEntry, WalkDir};

use std::path::{Path, PathBuf};

/// Walks the whole subtree of `src_dir`, yielding one entry per directory, file and symlink.
///
/// Entries are named inside the archive under the base name of `src_dir`, so
/// `/data/db/dump.sql` becomes `data/db/dump.sql`. A source without a usable base
/// name (`.`, `/`) is stored relative to itself.
///
/// `skip_dir` must be canonical. When it lies inside the source it is left out with
/// everything below it, so a staging directory never ends up in its own archive.
#[named]
pub fn source_dir_entries<'a>(
    src_dir: &Path,
    skip_dir: Option<&Path>,
) -> Result<DynIter<'a, Result<ArchiveEntry>>> {
    if !src_dir.is_dir() {
        tracing::error!(
            "Source directory does not exist or is not a directory: {:?}",
            src_dir
        );
        return Err(Error::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{:?} is not a directory", src_dir),
        )));
    }

    tracing::debug!("Scanning directory {:?}", src_dir);

    let base_src_dir = std::fs::canonicalize(src_dir)
        .map_err(Error::from)
        .add_msg(format!("Resolving {:?} failed", src_dir))?;
    let base_dst_dir = src_dir
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_default();
    let skip_dir = skip_dir.map(Path::to_path_buf);

    let entries = WalkDir::new(&base_src_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |de| match &skip_dir {
            Some(skip_dir) if de.path() == skip_dir => {
                tracing::debug!("Skipping staging directory {:?}", de.path());
                false
            }
            _ => true,
        })
        .filter_map(move |res| match res {
            Ok(de) => process_dir_entry(de, &base_src_dir, &base_dst_dir),
            Err(e) => Some(Err(e.into())),
        })
        .map(move |res| res.add_fn_name(function_path!()));

    Ok(entries.into_dyn_iter())
}

fn process_dir_entry(
    de: DirEntry,
    base_src_dir: &Path,
    base_dst_dir: &Path,
) -> Option<Result<ArchiveEntry>> {
    let is_dir = de.file_type().is_dir();
    let p = de.into_path();
    let stripped = match p.strip_prefix(base_src_dir) {
        Ok(stripped) => stripped,
        Err(e) => {
            return Some(Err(Error::from(std::io::Error::other(e)).add_msg(format!(
                "Stripping {:?} from {:?} failed",
                base_src_dir, p
            ))))
        }
    };

    let dst = if stripped.as_os_str().is_empty() {
        base_dst_dir.to_path_buf()
    } else {
        base_dst_dir.join(stripped)
    };
    if dst.as_os_str().is_empty() {
        tracing::trace!("Skipping archive root {:?}", p);
        return None;
    }

    let entry = if is_dir {
        ArchiveEntry::directory(p, dst)
    } else {
        ArchiveEntry::file(p, dst)
    };
    tracing::trace!("Including: {:?} -> {:?}", entry.src, entry.dst);
    Some(Ok(entry))
}
