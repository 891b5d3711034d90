// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version stamp inspection.
//!
//! Every deployable tree carries a `version.txt` at its top-level, written by
//! the build process. The contents are opaque: oneclick only ever checks
//! whether the stamp can be read, and displays whatever it holds.
//!
//! A missing stamp is never an error here. In the staging root it means "not
//! built", and in the deployment root it is reported as [`NO_DATA`].

use crate::{
    catalog::Release,
    path::{is_single_component, DeploymentLayout},
};

use std::{collections::BTreeMap, fs::read, path::Path};
use tracing::{debug, instrument, warn};

/// Reported when the deployment root has no readable version stamp.
pub const NO_DATA: &str = "No data";

/// Build status of each release, keyed by release identifier.
///
/// An empty stamp means that no build of the release is staged.
pub type BuildStatus = BTreeMap<String, String>;

// Stamps are opaque, so tolerate whatever encoding the build wrote.
fn read_stamp(path: &Path) -> std::io::Result<String> {
    read(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Read version stamp of live tree.
#[derive(Debug, Clone)]
pub struct DeployedVersionReader {
    layout: DeploymentLayout,
}

impl DeployedVersionReader {
    /// Construct new deployed version reader.
    pub fn new(layout: DeploymentLayout) -> Self {
        Self { layout }
    }

    /// Report stamp of currently deployed release.
    ///
    /// Returns [`NO_DATA`] if the stamp cannot be read for any reason.
    #[instrument(skip(self), level = "debug")]
    pub fn current_version(&self) -> String {
        let path = self.layout.deployment_stamp();
        match read_stamp(&path) {
            Ok(stamp) => stamp,
            Err(error) => {
                warn!("current version not found at {:?}: {error}", path.display());
                NO_DATA.into()
            }
        }
    }
}

/// Probe staging root for built releases.
#[derive(Debug, Clone)]
pub struct BuildAvailabilityProbe {
    layout: DeploymentLayout,
}

impl BuildAvailabilityProbe {
    /// Construct new build availability probe.
    pub fn new(layout: DeploymentLayout) -> Self {
        Self { layout }
    }

    /// Look up staged build stamp of each release.
    ///
    /// # Invariants
    ///
    /// - Every release identifier gets exactly one entry.
    /// - Unreadable stamp is recorded as empty string.
    #[instrument(skip(self, releases), level = "debug")]
    pub fn probe<'a>(&self, releases: impl IntoIterator<Item = &'a Release>) -> BuildStatus {
        let mut status = BuildStatus::new();
        for release in releases {
            let stamp = self.probe_one(release.name());
            status.insert(release.name().to_owned(), stamp);
        }

        status
    }

    fn probe_one(&self, name: &str) -> String {
        // INVARIANT: Never read outside of staging root.
        if !is_single_component(name) {
            warn!("release {name:?} is not a valid directory name, treating as not built");
            return String::new();
        }

        let path = self.layout.release_stamp(name);
        match read_stamp(&path) {
            Ok(stamp) => stamp,
            Err(error) => {
                debug!("build not found for {name}: {error}");
                String::new()
            }
        }
    }
}
