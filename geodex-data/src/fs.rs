//! Capability-based filesystem helpers for dataset inputs and outputs.
//!
//! Paths arrive as UTF-8 [`Utf8Path`]s from configuration. Each helper opens
//! the nearest ambient directory with `cap-std` and works relative to it.

use std::io;
use std::path::Component;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

/// Create every missing directory above `path`.
///
/// Paths without a parent, or whose parent is the filesystem root, need no
/// work.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    let (base, relative) = split_anchor(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Whether `path` names a regular file.
///
/// Returns `Ok(false)` for directories and other non-file entries. A missing
/// entry, or a missing parent directory, surfaces as
/// [`io::ErrorKind::NotFound`] so callers can tell the cases apart.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other("path should include a file name"))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Split `dir` into an ambient anchor directory and the path below it.
fn split_anchor(dir: &Utf8Path) -> io::Result<(Dir, Utf8PathBuf)> {
    let std_dir = dir.as_std_path();
    let (anchor, relative) = match std_dir.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let anchor = Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR_STR);
            let relative = dir
                .strip_prefix(&anchor)
                .or_else(|_| dir.strip_prefix(prefix))
                .map_err(|_| io::Error::other("failed to strip prefix from directory"))?
                .to_path_buf();
            (anchor, relative)
        }
        Some(Component::RootDir) => {
            let anchor = Utf8PathBuf::from(std::path::MAIN_SEPARATOR_STR);
            let relative = dir
                .strip_prefix(&anchor)
                .map_err(|_| io::Error::other("failed to strip root from directory"))?
                .to_path_buf();
            (anchor, relative)
        }
        _ => (Utf8PathBuf::from("."), dir.to_path_buf()),
    };
    let base = Dir::open_ambient_dir(&anchor, ambient_authority())?;
    Ok((base, relative))
}
