// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use oneclick::DeploymentLayout;
use std::{
    fs::{create_dir_all, read_to_string, write},
    path::Path,
};
use tempfile::TempDir;

pub(crate) struct HostFixture {
    _root: TempDir,
    layout: DeploymentLayout,
}

impl HostFixture {
    pub(crate) fn new(environment: &str) -> Result<Self> {
        let root = TempDir::new()?;
        let layout = DeploymentLayout::new(
            root.path().join("share/LMPI"),
            root.path().join("inetpub/LMPI"),
            environment,
        );
        create_dir_all(layout.staging_root())?;

        Ok(Self {
            _root: root,
            layout,
        })
    }

    pub(crate) fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    pub(crate) fn stage_release(
        &self,
        release: &str,
        files: &[(&str, &str)],
        stamp: Option<&str>,
    ) -> Result<()> {
        let dir = self.layout.release_dir(release);
        write_tree(&dir, files)?;
        if let Some(stamp) = stamp {
            write(self.layout.release_stamp(release), stamp)?;
        }

        Ok(())
    }

    pub(crate) fn stage_overlay(&self, files: &[(&str, &str)]) -> Result<()> {
        write_tree(&self.layout.overlay_dir(), files)
    }

    pub(crate) fn write_live(&self, files: &[(&str, &str)]) -> Result<()> {
        write_tree(self.layout.deployment_root(), files)
    }

    pub(crate) fn read_live(&self, path: impl AsRef<Path>) -> Result<String> {
        Ok(read_to_string(self.layout.deployment_root().join(path))?)
    }
}

fn write_tree(dir: &Path, files: &[(&str, &str)]) -> Result<()> {
    create_dir_all(dir)?;
    for (path, contents) in files {
        let path = dir.join(path);

        // INVARIANT: Always create parent directories of nested files.
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(path, contents)?;
    }

    Ok(())
}
