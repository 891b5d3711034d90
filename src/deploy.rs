// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Release deployment.
//!
//! Deploying a release is a two-phase copy into the deployment root:
//!
//! 1. Copy staged release payload, `<staging_root>/<release>/`.
//! 2. Copy environment overlay, `<staging_root>/Config/<environment>/`.
//!
//! Both phases overwrite, and neither deletes, so whichever phase runs last
//! wins on any path both of them define. The overlay must always win, which
//! is why [`DeploymentPipeline`] only hands out the overlay phase after the
//! release phase has been applied.
//!
//! Deployment is not transactional. Copy failures are logged and reported in
//! [`DeployReport`], but never abort the deployment.
//!
//! # See Also
//!
//! 1. [`materialize`]

pub mod materialize;

use crate::{
    deploy::materialize::{CopySummary, DirectoryMaterializer, MaterializeError},
    path::{is_single_component, DeploymentLayout},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    sync::{Mutex, PoisonError},
    time::Instant,
};
use tracing::{error, info, instrument, warn};

/// Identifier of release that is safe to join onto the staging root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Validate release identifier.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::InvalidRelease`] if identifier is not a single
    ///   plain path component.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !is_single_component(&name) {
            return Err(DeployError::InvalidRelease(name));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ReleaseId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.0)
    }
}

/// Outcome of one deployment phase.
///
/// Root-level failures, e.g., release was never staged, land in `Err`.
/// Entry-level failures land in [`CopySummary::failures`].
pub type PhaseOutcome = std::result::Result<CopySummary, MaterializeError>;

/// Deploys releases into the deployment root of one host.
///
/// Deployments through the same orchestrator are serialized. Nothing
/// guards against other processes writing to the same roots.
#[derive(Debug)]
pub struct DeploymentOrchestrator {
    layout: DeploymentLayout,
    materializer: DirectoryMaterializer,
    lock: Mutex<()>,
}

impl DeploymentOrchestrator {
    /// Construct new deployment orchestrator.
    pub fn new(layout: DeploymentLayout) -> Self {
        Self {
            layout,
            materializer: DirectoryMaterializer::new(),
            lock: Mutex::new(()),
        }
    }

    /// Deploy release, then its environment overlay.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::InvalidRelease`] if release identifier is not
    ///   path-safe. Nothing is touched on disk in that case.
    ///
    /// Copy failures are not errors. Inspect the returned [`DeployReport`].
    #[instrument(skip(self, release), level = "debug")]
    pub fn deploy(&self, release: impl Into<String>) -> Result<DeployReport> {
        let release = ReleaseId::parse(release)?;

        // A panicked deploy leaves nothing behind that the lock protects.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let started = Instant::now();
        info!(
            "deploy {release} from {:?} to {:?}",
            self.layout.staging_root().display(),
            self.layout.deployment_root().display()
        );

        let report = DeploymentPipeline::new(&self.layout, &self.materializer, release)
            .apply_release()
            .apply_overlay();

        info!("deploy of {} processed in {:?}", report.release, started.elapsed());

        Ok(report)
    }
}

/// Two-phase deployment of one release.
///
/// # Invariant
///
/// - Overlay phase can only run after release phase.
#[derive(Debug)]
pub struct DeploymentPipeline<'a> {
    layout: &'a DeploymentLayout,
    materializer: &'a DirectoryMaterializer,
    release: ReleaseId,
}

impl<'a> DeploymentPipeline<'a> {
    /// Construct new deployment pipeline.
    pub fn new(
        layout: &'a DeploymentLayout,
        materializer: &'a DirectoryMaterializer,
        release: ReleaseId,
    ) -> Self {
        Self {
            layout,
            materializer,
            release,
        }
    }

    /// Copy staged release payload into deployment root.
    pub fn apply_release(self) -> ReleaseApplied<'a> {
        let source = self.layout.release_dir(self.release.as_str());
        let outcome = run_phase(
            self.materializer,
            "release",
            &source,
            self.layout.deployment_root(),
        );

        ReleaseApplied {
            layout: self.layout,
            materializer: self.materializer,
            release: self.release,
            release_phase: outcome,
        }
    }
}

/// Deployment pipeline whose release phase has run.
#[derive(Debug)]
pub struct ReleaseApplied<'a> {
    layout: &'a DeploymentLayout,
    materializer: &'a DirectoryMaterializer,
    release: ReleaseId,
    release_phase: PhaseOutcome,
}

impl ReleaseApplied<'_> {
    /// Outcome of release phase.
    pub fn release_phase(&self) -> &PhaseOutcome {
        &self.release_phase
    }

    /// Copy environment overlay into deployment root.
    ///
    /// Runs regardless of how release phase went.
    pub fn apply_overlay(self) -> DeployReport {
        let source = self.layout.overlay_dir();
        let outcome = run_phase(
            self.materializer,
            "overlay",
            &source,
            self.layout.deployment_root(),
        );

        DeployReport {
            release: self.release,
            release_phase: self.release_phase,
            overlay_phase: outcome,
        }
    }
}

/// Outcome of deployment.
#[derive(Debug)]
pub struct DeployReport {
    /// Deployed release.
    pub release: ReleaseId,

    /// Copy of staged release payload.
    pub release_phase: PhaseOutcome,

    /// Copy of environment overlay.
    pub overlay_phase: PhaseOutcome,
}

impl DeployReport {
    /// Check if both phases copied every entry.
    pub fn is_complete(&self) -> bool {
        [&self.release_phase, &self.overlay_phase]
            .into_iter()
            .all(|phase| phase.as_ref().is_ok_and(CopySummary::is_complete))
    }
}

fn run_phase(
    materializer: &DirectoryMaterializer,
    phase: &str,
    source: &Path,
    destination: &Path,
) -> PhaseOutcome {
    let outcome = materializer.copy_tree(source, destination);
    match &outcome {
        Ok(summary) if summary.is_complete() => info!("{phase} phase complete"),
        Ok(summary) => warn!(
            "{phase} phase left {} entries behind",
            summary.failures.len()
        ),
        Err(err) => error!("{phase} phase failed: {err}"),
    }

    outcome
}

/// Deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Release identifier would escape staging root.
    #[error("release {0:?} is not a valid release identifier")]
    InvalidRelease(String),
}

/// Friendly result alias :3
pub type Result<T, E = DeployError> = std::result::Result<T, E>;
