//! Turning entry names into paths on the host filesystem
//!
//! Entry names are untrusted input. Every component is checked before anything is created, so a
//! name can only ever resolve to a file below the destination root.

use std::{
    borrow::Cow,
    ffi::OsStr,
    io,
    path::{Component, Path, PathBuf},
};

use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Capability for creating a single directory
///
/// Implementations must not create missing parents; [`ensure_directories`] walks the
/// components itself.
pub trait DirBuilder {
    /// Create the directory at `path`
    ///
    /// An [`io::ErrorKind::AlreadyExists`] error is treated as success by the caller.
    fn create_dir(&mut self, path: &Path) -> io::Result<()>;
}

/// [`DirBuilder`] backed by [`std::fs::create_dir`]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDirBuilder;

impl DirBuilder for StdDirBuilder {
    fn create_dir(&mut self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }
}

/// Create every directory leading up to the file named by `name` below `root`.
///
/// `name` is split on `separator`. All components but the last are created in order, the last
/// one names the file and is only joined onto the returned path. Empty and `.` components are
/// skipped, a `..` component or a missing file name fails with [`Error::UnsafeName`] before any
/// directory is created. Names longer than `max_length` fail with [`Error::NameTooLong`].
///
/// ```no_run
/// use std::path::Path;
/// use itb_archive::path::{ensure_directories, StdDirBuilder};
///
/// let path = ensure_directories(&mut StdDirBuilder, Path::new("out"), b"data/maps/a.map", b'/', 4096)?;
/// assert_eq!(path, Path::new("out/data/maps/a.map"));
/// # Ok::<(), itb_archive::error::Error>(())
/// ```
#[instrument(skip(builder, name), fields(name = %String::from_utf8_lossy(name)))]
pub fn ensure_directories<B: DirBuilder + ?Sized>(
    builder: &mut B,
    root: &Path,
    name: &[u8],
    separator: u8,
    max_length: u32,
) -> Result<PathBuf> {
    if name.len() > max_length as usize {
        return Err(Error::NameTooLong {
            entry: None,
            length: u32::try_from(name.len()).unwrap_or(u32::MAX),
            max: max_length,
        });
    }

    let unsafe_name = || Error::UnsafeName {
        name: String::from_utf8_lossy(name).into_owned(),
    };

    let mut parts = name.split(|b| *b == separator);
    let file_name = parts.next_back().map(os_component).ok_or_else(unsafe_name)?;
    if !is_normal(&file_name) {
        return Err(unsafe_name());
    }

    let directories = parts
        .filter(|part| !part.is_empty() && *part != b".")
        .map(os_component)
        .collect::<Vec<_>>();
    if !directories.iter().all(|dir| is_normal(dir)) {
        return Err(unsafe_name());
    }

    let mut path = root.to_path_buf();
    for dir in directories {
        path.push(dir);
        match builder.create_dir(&path) {
            Ok(()) => debug!("created {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(Error::DirectoryCreateFailed { path, source }),
        }
    }

    path.push(file_name);
    Ok(path)
}

/// A component is usable when the host parses it as exactly one plain path segment.
fn is_normal(component: &OsStr) -> bool {
    let mut components = Path::new(component).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(unix)]
fn os_component(raw: &[u8]) -> Cow<'_, OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(OsStr::from_bytes(raw))
}

#[cfg(not(unix))]
fn os_component(raw: &[u8]) -> Cow<'_, OsStr> {
    match String::from_utf8_lossy(raw) {
        Cow::Borrowed(s) => Cow::Borrowed(OsStr::new(s)),
        Cow::Owned(s) => Cow::Owned(s.into()),
    }
}
