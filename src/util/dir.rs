use std::io;
use std::path::{Component, Path, PathBuf};

/// Creates `path` and every missing parent, outermost first.
///
/// Existing directories are left untouched, so calling this repeatedly for
/// the same path is fine. Any other filesystem error (permissions, a prefix
/// that is a regular file, ...) is returned to the caller.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    let prefixes: Vec<&Path> = path
        .ancestors()
        .filter(|prefix| !prefix.as_os_str().is_empty())
        .collect();

    for prefix in prefixes.into_iter().rev() {
        if prefix.is_dir() {
            continue;
        }

        match std::fs::create_dir(prefix) {
            Ok(()) => {
                log::trace!(target: "backup::dir", "Created directory {}", prefix.display());
            }
            // lost a race against another creator
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && prefix.is_dir() => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Joins `relative` onto `base` without ever leaving `base`.
///
/// Only the normal components of `relative` are kept: a leading `/`, a
/// drive prefix, `.` and `..` are dropped.
pub fn join_inside(base: &Path, relative: &str) -> PathBuf {
    let mut joined = base.to_path_buf();
    for component in Path::new(relative).components() {
        if let Component::Normal(part) = component {
            joined.push(part);
        }
    }

    joined
}
