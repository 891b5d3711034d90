// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Directory materialization.
//!
//! Reproduce a source directory tree under a destination directory tree. The
//! copy is additive and overwriting:
//!
//! - Files of the source replace same-named files of the destination.
//! - Files that only exist in the destination are never touched.
//! - Permission bits of every copied file follow the source file.
//! - Permission bits of every created directory follow the source directory,
//!   applied once the directory's children have landed.
//!
//! Copying is best-effort. A failing entry is logged and recorded in the
//! returned [`CopySummary`], and the walk moves on to the next entry. Nothing
//! is rolled back, so a destination may end up holding a mix of old and new
//! files after a failed run.

use std::{
    fs::{copy, metadata, set_permissions, symlink_metadata, DirBuilder, Metadata, Permissions},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Recursive copier of directory trees.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryMaterializer;

impl DirectoryMaterializer {
    /// Construct new directory materializer.
    pub fn new() -> Self {
        Self
    }

    /// Copy every entry of source tree into destination tree.
    ///
    /// Creates destination with the permission mode of the source root if it
    /// does not exist yet. Symbolic links in the source are followed, and the
    /// content they point to is copied. Entries are visited in file name
    /// order.
    ///
    /// # Errors
    ///
    /// - Return [`MaterializeError::ReadSource`] if source root cannot be
    ///   inspected.
    /// - Return [`MaterializeError::NotADirectory`] if source root is not a
    ///   directory.
    /// - Return [`MaterializeError::CreateDestination`] if destination root
    ///   cannot be created.
    ///
    /// Failures past the roots never surface here. Check
    /// [`CopySummary::failures`] instead.
    #[instrument(skip(self, source, destination), level = "debug")]
    pub fn copy_tree(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<CopySummary> {
        let source = source.as_ref();
        let destination = destination.as_ref();
        info!(
            "copy {:?} into {:?}",
            source.display(),
            destination.display()
        );

        let root = metadata(source).map_err(|err| MaterializeError::ReadSource {
            source: err,
            path: source.to_path_buf(),
        })?;
        if !root.is_dir() {
            return Err(MaterializeError::NotADirectory {
                path: source.to_path_buf(),
            });
        }

        let mut summary = CopySummary::default();
        let mut sealed = Vec::new();
        if !destination.exists() {
            create_dir_like(destination, &root).map_err(|err| {
                MaterializeError::CreateDestination {
                    source: err,
                    path: destination.to_path_buf(),
                }
            })?;
            summary.dirs_created += 1;
            if let Some(permissions) = sealed_mode(&root) {
                sealed.push(SealedDir::new(source, destination, permissions));
            }
        }

        let mut walker = WalkDir::new(source)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| source.to_path_buf());
                    summary.record_failure(path, err.into());
                    continue;
                }
            };

            let target = match entry.path().strip_prefix(source) {
                Ok(relative) => destination.join(relative),
                Err(err) => {
                    summary.record_failure(entry.path().to_path_buf(), io::Error::other(err));
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                match copy_dir(entry.path(), &target) {
                    Ok(Some(created)) => {
                        summary.dirs_created += 1;
                        if let Some(permissions) = sealed_mode(&created) {
                            sealed.push(SealedDir::new(entry.path(), &target, permissions));
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        // INVARIANT: Nothing below a missing directory can be copied.
                        summary.record_failure(entry.path().to_path_buf(), err);
                        walker.skip_current_dir();
                    }
                }
            } else {
                match copy_file(entry.path(), &target) {
                    Ok(()) => summary.files_copied += 1,
                    Err(err) => summary.record_failure(entry.path().to_path_buf(), err),
                }
            }
        }

        // INVARIANT: Children are sealed before their parents.
        for dir in sealed.into_iter().rev() {
            if let Err(err) = set_permissions(&dir.target, dir.permissions) {
                summary.record_failure(dir.source, err);
            }
        }

        info!(
            "copied {} files into {:?} with {} failures",
            summary.files_copied,
            destination.display(),
            summary.failures.len()
        );

        Ok(summary)
    }
}

/// Outcome of one tree copy.
#[derive(Debug, Default)]
pub struct CopySummary {
    /// Number of files written to destination.
    pub files_copied: usize,

    /// Number of directories that had to be created in destination.
    pub dirs_created: usize,

    /// Entries that could not be copied.
    pub failures: Vec<CopyFailure>,
}

impl CopySummary {
    /// Check if every entry of source tree made it into destination.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, path: PathBuf, error: io::Error) {
        warn!("failed to copy {:?}: {error}", path.display());
        self.failures.push(CopyFailure { path, error });
    }
}

/// Entry of source tree that could not be copied.
#[derive(Debug)]
pub struct CopyFailure {
    /// Path of entry in source tree.
    pub path: PathBuf,

    /// Reason of failure.
    pub error: io::Error,
}

// Created directory whose source mode would lock the owner out of it while
// its children are still being copied.
#[derive(Debug)]
struct SealedDir {
    source: PathBuf,
    target: PathBuf,
    permissions: Permissions,
}

impl SealedDir {
    fn new(source: &Path, target: &Path, permissions: Permissions) -> Self {
        Self {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            permissions,
        }
    }
}

// Returns metadata of the source directory if the target had to be created.
fn copy_dir(source: &Path, target: &Path) -> io::Result<Option<Metadata>> {
    if target.is_dir() {
        return Ok(None);
    }

    let source = metadata(source)?;
    create_dir_like(target, &source)?;
    debug!("created {:?}", target.display());

    Ok(Some(source))
}

fn copy_file(source: &Path, target: &Path) -> io::Result<()> {
    // INVARIANT: Replace semantics hold for read-only targets too.
    if let Ok(existing) = symlink_metadata(target) {
        if existing.is_file() && existing.permissions().readonly() {
            make_writable(target, &existing)?;
        }
    }

    copy(source, target)?;
    set_permissions(target, metadata(source)?.permissions())?;
    debug!("copied {:?}", target.display());

    Ok(())
}

/// Create directory with mode of another, kept owner-accessible.
///
/// Owner bits missing from the source mode are added here. Once the
/// directory is filled, the walk applies the mode picked by [`sealed_mode`].
#[cfg(unix)]
fn create_dir_like(path: &Path, like: &Metadata) -> io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    DirBuilder::new()
        .recursive(true)
        .mode(like.permissions().mode() | 0o700)
        .create(path)
}

#[cfg(unix)]
fn sealed_mode(like: &Metadata) -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = like.permissions();
    (permissions.mode() & 0o700 != 0o700).then_some(permissions)
}

// Read-only attribute of a directory does not stop entries being added.
#[cfg(not(unix))]
fn sealed_mode(_like: &Metadata) -> Option<Permissions> {
    None
}

#[cfg(not(unix))]
fn create_dir_like(path: &Path, _like: &Metadata) -> io::Result<()> {
    DirBuilder::new().recursive(true).create(path)
}

#[cfg(unix)]
fn make_writable(path: &Path, existing: &Metadata) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = existing.permissions();
    permissions.set_mode(permissions.mode() | 0o200);
    set_permissions(path, permissions)
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path, existing: &Metadata) -> io::Result<()> {
    let mut permissions = existing.permissions();
    permissions.set_readonly(false);
    set_permissions(path, permissions)
}

/// Directory materialization error types.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    /// Source root cannot be inspected.
    #[error("failed to read source tree at {:?}", path.display())]
    ReadSource {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Source root is not a directory.
    #[error("source tree at {:?} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Destination root cannot be created.
    #[error("failed to create destination tree at {:?}", path.display())]
    CreateDestination {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = MaterializeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, read, read_to_string, write};
    use tempfile::TempDir;

    #[test]
    fn copy_tree_reproduces_nested_layout() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let source = root.path().join("source");
        let destination = root.path().join("live/app");
        create_dir_all(source.join("bin/x64"))?;
        write(source.join("app.dll"), b"\x4d\x5a\x90\x00")?;
        write(source.join("bin/x64/native.dll"), "native")?;

        let summary = DirectoryMaterializer::new().copy_tree(&source, &destination)?;

        assert!(summary.is_complete());
        assert_eq!(summary.files_copied, 2);
        assert_eq!(summary.dirs_created, 3);
        assert_eq!(read(destination.join("app.dll"))?, b"\x4d\x5a\x90\x00");
        assert_eq!(read_to_string(destination.join("bin/x64/native.dll"))?, "native");

        Ok(())
    }

    #[test]
    fn copy_tree_overwrites_and_keeps_extra_files() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let source = root.path().join("source");
        let destination = root.path().join("live");
        create_dir_all(&source)?;
        create_dir_all(&destination)?;
        write(source.join("web.config"), "new")?;
        write(destination.join("web.config"), "old and much longer")?;
        write(destination.join("uploads.db"), "keep me")?;

        let summary = DirectoryMaterializer::new().copy_tree(&source, &destination)?;

        assert!(summary.is_complete());
        assert_eq!(summary.dirs_created, 0);
        assert_eq!(read_to_string(destination.join("web.config"))?, "new");
        assert_eq!(read_to_string(destination.join("uploads.db"))?, "keep me");

        Ok(())
    }

    #[test]
    fn copy_tree_missing_source_is_error() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let result = DirectoryMaterializer::new()
            .copy_tree(root.path().join("nope"), root.path().join("live"));

        assert!(matches!(result, Err(MaterializeError::ReadSource { .. })));
        assert!(!root.path().join("live").exists());

        Ok(())
    }

    #[test]
    fn copy_tree_file_source_is_error() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        write(root.path().join("file"), "not a tree")?;
        let result = DirectoryMaterializer::new()
            .copy_tree(root.path().join("file"), root.path().join("live"));

        assert!(matches!(result, Err(MaterializeError::NotADirectory { .. })));

        Ok(())
    }

    #[test]
    fn copy_tree_continues_past_failed_entry() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let source = root.path().join("source");
        let destination = root.path().join("live");
        create_dir_all(source.join("assets"))?;
        write(source.join("assets/logo.png"), "png")?;
        write(source.join("z-last.txt"), "last")?;

        // A file in the way of a directory cannot be replaced.
        create_dir_all(&destination)?;
        write(destination.join("assets"), "blocker")?;

        let summary = DirectoryMaterializer::new().copy_tree(&source, &destination)?;

        assert!(!summary.is_complete());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].path, source.join("assets"));
        assert_eq!(read_to_string(destination.join("z-last.txt"))?, "last");
        assert_eq!(read_to_string(destination.join("assets"))?, "blocker");

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_replaces_read_only_target() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new()?;
        let source = root.path().join("source");
        let destination = root.path().join("live");
        create_dir_all(&source)?;
        create_dir_all(&destination)?;
        write(source.join("run.sh"), "#!/bin/sh\necho new\n")?;
        set_permissions(source.join("run.sh"), std::fs::Permissions::from_mode(0o755))?;
        write(destination.join("run.sh"), "old")?;
        set_permissions(destination.join("run.sh"), std::fs::Permissions::from_mode(0o444))?;

        let summary = DirectoryMaterializer::new().copy_tree(&source, &destination)?;

        assert!(summary.is_complete());
        assert_eq!(read_to_string(destination.join("run.sh"))?, "#!/bin/sh\necho new\n");
        assert_eq!(
            metadata(destination.join("run.sh"))?.permissions().mode() & 0o777,
            0o755
        );

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_fills_read_only_dir_then_seals_it() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new()?;
        let source = root.path().join("source");
        let destination = root.path().join("live");
        create_dir_all(source.join("bin/locked"))?;
        write(source.join("bin/locked/tool.exe"), "tool")?;
        set_permissions(source.join("bin/locked"), std::fs::Permissions::from_mode(0o555))?;

        let summary = DirectoryMaterializer::new().copy_tree(&source, &destination)?;
        let locked_mode = metadata(destination.join("bin/locked"))?.permissions().mode() & 0o777;
        let tool = read_to_string(destination.join("bin/locked/tool.exe"))?;

        // Let TempDir clean up after itself.
        for dir in [source.join("bin/locked"), destination.join("bin/locked")] {
            set_permissions(dir, std::fs::Permissions::from_mode(0o755))?;
        }

        assert!(summary.is_complete());
        assert_eq!(summary.files_copied, 1);
        assert_eq!(tool, "tool");
        assert_eq!(locked_mode, 0o555);

        Ok(())
    }
}
