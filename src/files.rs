//! Sidecar naming and staged output files.

use crate::dbf_header::encoding_from_label;
use crate::error::{Error, Result, ResultExt};
use encoding_rs::Encoding;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Path of a sidecar file sharing the stem of `path`.
///
/// Follows the case of the main file extension and falls back to the other
/// case when only that one exists on disk.
pub fn sidecar(path: &Path, extension: &str) -> PathBuf {
    let upper = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.chars().any(|c| c.is_ascii_uppercase()));
    let (preferred, other) = if upper {
        (extension.to_ascii_uppercase(), extension.to_ascii_lowercase())
    } else {
        (extension.to_ascii_lowercase(), extension.to_ascii_uppercase())
    };
    let candidate = path.with_extension(preferred);
    if candidate.exists() {
        return candidate;
    }
    let fallback = path.with_extension(other);
    if fallback.exists() {
        fallback
    } else {
        candidate
    }
}

/// Lower-cased extension of `path`.
pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Encoding named by a `.cpg` file, if there is one.
pub fn read_cpg(path: &Path) -> Result<Option<&'static Encoding>> {
    if !path.exists() {
        return Ok(None);
    }
    let label = std::fs::read_to_string(path).in_file(path)?;
    if label.trim().is_empty() {
        return Ok(None);
    }
    encoding_from_label(&label).map(Some).in_file(path)
}

pub fn write_cpg(path: &Path, encoding: &'static Encoding) -> Result<()> {
    let mut file = File::create(path).in_file(path)?;
    file.write_all(encoding.name().as_bytes()).in_file(path)
}

/// Fail on existing files, or remove them when `delete_existing` is set.
pub(crate) fn prepare_targets(targets: &[PathBuf], delete_existing: bool) -> Result<()> {
    for target in targets.iter().filter(|t| t.exists()) {
        if !delete_existing {
            return Err(Error::IO(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "file already exists",
            ))
            .in_file(target));
        }
        debug!("removing {}", target.display());
        std::fs::remove_file(target).in_file(target)?;
    }
    Ok(())
}

pub(crate) type StagedWriter = BufWriter<NamedTempFile>;

/// Temporary file next to `target`, removed unless committed.
pub(crate) fn stage(target: &Path) -> Result<StagedWriter> {
    let dir = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file = tempfile::Builder::new()
        .prefix(".geoflat-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .in_file(target)?;
    Ok(BufWriter::new(file))
}

/// Move a staged file to its final name.
pub(crate) fn commit(staged: StagedWriter, target: &Path) -> Result<()> {
    let file = staged.into_inner().map_err(|e| e.into_error()).in_file(target)?;
    file.persist(target).map_err(|e| e.error).in_file(target)?;
    debug!("wrote {}", target.display());
    Ok(())
}
