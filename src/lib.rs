// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! One-click release deployment.
//!
//! Oneclick lists the release tags of a project, checks which of them have a
//! build staged on a network share, shows which release is live on the
//! current host, and deploys a chosen release by copying its staged files
//! into the live tree followed by the environment's configuration overlay.
//!
//! # Roots
//!
//! Two roots are involved, both fixed for the lifetime of the process:
//!
//! - The __staging root__ holds one directory per release, plus a `Config`
//!   directory holding one overlay directory per environment.
//! - The __deployment root__ is the live tree served by the current host.
//!
//! See [`path::DeploymentLayout`] for the exact layout.

pub mod catalog;
pub mod config;
pub mod deploy;
pub mod path;
pub mod stamp;
pub mod status;

pub use catalog::{GitLabTags, Release, ReleaseCatalog, TagSource};
pub use config::Settings;
pub use deploy::{
    materialize::{CopySummary, DirectoryMaterializer},
    DeployReport, DeploymentOrchestrator,
};
pub use path::DeploymentLayout;
pub use stamp::{BuildAvailabilityProbe, DeployedVersionReader, NO_DATA};
pub use status::{StatusReport, StatusView};
