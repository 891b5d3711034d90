// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the settings file lives, and where release payloads,
//! configuration overlays, and version stamps live on disk.

use crate::config::Settings;

use std::path::{Component, Path, PathBuf};

/// Name of version stamp file at the top of every deployable tree.
pub const VERSION_FILE: &str = "version.txt";

/// Name of directory under the staging root holding configuration overlays.
pub const CONFIG_DIR: &str = "Config";

/// Determine default absolute path to settings file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/oneclick/settings.toml` as
/// the default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigDir`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_settings_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("oneclick").join("settings.toml"))
        .ok_or(NoConfigDir)
}

/// Check that name can be joined onto a directory without escaping it.
///
/// Accepts exactly one normal path component, e.g., "v1.0" but not "",
/// "..", "a/b", "C:", or anything holding a separator of any platform.
pub fn is_single_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', ':', '\0']) {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Filesystem layout of one host.
///
/// Computed once from [`Settings`] at start up, and shared by every
/// component that touches the staging or deployment roots.
///
/// # Layout
///
/// ```text
/// <staging_root>/<release>/...            release payloads
/// <staging_root>/<release>/version.txt    build stamp of release
/// <staging_root>/Config/<environment>/... configuration overlay
/// <deployment_root>/...                   live tree
/// <deployment_root>/version.txt           stamp of deployed release
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentLayout {
    staging_root: PathBuf,
    deployment_root: PathBuf,
    environment: String,
}

impl DeploymentLayout {
    /// Construct new deployment layout.
    pub fn new(
        staging_root: impl Into<PathBuf>,
        deployment_root: impl Into<PathBuf>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            staging_root: staging_root.into(),
            deployment_root: deployment_root.into(),
            environment: environment.into(),
        }
    }

    /// Derive deployment layout from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.deployment.staging_base,
            &settings.deployment.deployment_root,
            &settings.deployment.environment,
        )
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn deployment_root(&self) -> &Path {
        &self.deployment_root
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Staged payload directory of release.
    pub fn release_dir(&self, release: &str) -> PathBuf {
        self.staging_root.join(release)
    }

    /// Configuration overlay directory of current environment.
    pub fn overlay_dir(&self) -> PathBuf {
        self.staging_root.join(CONFIG_DIR).join(&self.environment)
    }

    /// Version stamp of staged release.
    pub fn release_stamp(&self, release: &str) -> PathBuf {
        self.release_dir(release).join(VERSION_FILE)
    }

    /// Version stamp of live tree.
    pub fn deployment_stamp(&self) -> PathBuf {
        self.deployment_root.join(VERSION_FILE)
    }
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigDir;

/// Friendly result alias :3
pub type Result<T, E = NoConfigDir> = std::result::Result<T, E>;
