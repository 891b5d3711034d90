// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment status view.
//!
//! Gather everything an operator needs before pressing the button: which
//! host they are looking at, which release is live, which releases exist, and
//! which of them have a staged build ready to go. Everything is gathered
//! fresh on every query.

use crate::{
    catalog::{GitLabTags, Release, ReleaseCatalog, TagSource},
    deploy::DeploymentOrchestrator,
    path::DeploymentLayout,
    stamp::{BuildAvailabilityProbe, BuildStatus, DeployedVersionReader, NO_DATA},
};

use serde::Serialize;
use std::{
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    io,
    net::Ipv4Addr,
    process::Command,
    sync::Arc,
};
use tokio::task::spawn_blocking;
use tracing::{error, info, instrument, warn};

/// Snapshot of deployment status of one host.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Stamp of live tree, or [`NO_DATA`](crate::stamp::NO_DATA).
    pub current_version: String,

    /// Environment name of host.
    pub environment: String,

    /// Non-loopback IPv4 addresses of host.
    pub host_addresses: Vec<String>,

    /// Releases known to remote.
    pub releases: Vec<Release>,

    /// Staged build stamp of each release.
    pub build_status: BuildStatus,
}

impl Display for StatusReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "environment:     {}", self.environment)?;
        writeln!(fmt, "host addresses:  {}", self.host_addresses.join(", "))?;
        writeln!(fmt, "current version: {}", self.current_version.trim())?;

        if self.releases.is_empty() {
            return writeln!(fmt, "releases:        none");
        }

        writeln!(fmt, "releases:")?;
        let width = self
            .releases
            .iter()
            .map(|release| release.name().len())
            .max()
            .unwrap_or_default();
        for release in &self.releases {
            let stamp = self
                .build_status
                .get(release.name())
                .map(|stamp| stamp.trim())
                .filter(|stamp| !stamp.is_empty())
                .unwrap_or("not built");
            let summary = release.message().lines().next().unwrap_or_default();
            writeln!(
                fmt,
                "  {:<width$}  [{stamp}]  {summary}",
                release.name()
            )?;
        }

        Ok(())
    }
}

/// Composes release catalog, build probe, and deployed version reader.
#[derive(Debug)]
pub struct StatusView<S = GitLabTags>
where
    S: TagSource,
{
    catalog: ReleaseCatalog<S>,
    probe: BuildAvailabilityProbe,
    reader: DeployedVersionReader,
    environment: String,
}

impl<S> StatusView<S>
where
    S: TagSource,
{
    /// Construct new status view.
    pub fn new(layout: DeploymentLayout, catalog: ReleaseCatalog<S>) -> Self {
        Self {
            catalog,
            probe: BuildAvailabilityProbe::new(layout.clone()),
            reader: DeployedVersionReader::new(layout.clone()),
            environment: layout.environment().to_owned(),
        }
    }

    /// Gather current deployment status.
    ///
    /// Filesystem and process work runs on the blocking thread pool.
    #[instrument(skip(self), level = "debug")]
    pub async fn status(&self) -> StatusReport {
        let releases = self.catalog.list_releases().await;
        let probe = self.probe.clone();
        let reader = self.reader.clone();
        let local = spawn_blocking(move || {
            let build_status = probe.probe(&releases);
            (releases, build_status, reader.current_version(), host_addresses())
        })
        .await;

        let (releases, build_status, current_version, host_addresses) = match local {
            Ok(local) => local,
            Err(err) => {
                error!("failed to inspect host: {err}");
                (Vec::new(), BuildStatus::new(), NO_DATA.into(), Vec::new())
            }
        };

        StatusReport {
            current_version,
            environment: self.environment.clone(),
            host_addresses,
            releases,
            build_status,
        }
    }

    /// Deploy release, then gather deployment status.
    ///
    /// Whatever the deployment outcome, it is only logged, and the status
    /// afterwards is always returned.
    #[instrument(skip(self, orchestrator, release), level = "debug")]
    pub async fn deploy_then_status(
        &self,
        orchestrator: Arc<DeploymentOrchestrator>,
        release: impl Into<String>,
    ) -> StatusReport {
        let release = release.into();
        match spawn_blocking(move || orchestrator.deploy(release)).await {
            Ok(Ok(report)) if report.is_complete() => {
                info!("deploy of {} complete", report.release)
            }
            Ok(Ok(report)) => {
                warn!("deploy of {} finished with failures, see log above", report.release)
            }
            Ok(Err(err)) => error!("deploy rejected: {err}"),
            Err(err) => error!("deploy did not finish: {err}"),
        }

        self.status().await
    }
}

/// List non-loopback IPv4 addresses of host.
///
/// Display-only diagnostic. Returns an empty listing if the addresses cannot
/// be determined.
pub fn host_addresses() -> Vec<String> {
    let listing = if cfg!(windows) {
        syscall("ipconfig", Vec::<&str>::new()).map(|out| parse_ipconfig(&out))
    } else {
        syscall("hostname", ["-I"]).map(|out| parse_hostname(&out))
    };

    match listing {
        Ok(addresses) => addresses.iter().map(ToString::to_string).collect(),
        Err(error) => {
            warn!("cannot determine host addresses: {error}");
            Vec::new()
        }
    }
}

fn syscall(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> io::Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    if !output.status.success() {
        return Err(io::Error::other(format!(
            "command {:?} failed with {}",
            cmd.as_ref(),
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// Output of `hostname -I`: whitespace separated, IPv6 mixed in.
fn parse_hostname(output: &str) -> Vec<Ipv4Addr> {
    keep_routable(
        output
            .split_whitespace()
            .filter_map(|token| token.parse::<Ipv4Addr>().ok()),
    )
}

// Output of `ipconfig`: only "IPv4 Address. . . : x.x.x.x(Preferred)" lines
// matter, since masks and gateways look like addresses too.
fn parse_ipconfig(output: &str) -> Vec<Ipv4Addr> {
    keep_routable(
        output
            .lines()
            .filter(|line| line.contains("IPv4"))
            .filter_map(|line| line.rsplit(':').next())
            .map(|value| value.trim().trim_end_matches("(Preferred)"))
            .filter_map(|value| value.parse::<Ipv4Addr>().ok()),
    )
}

fn keep_routable(addresses: impl Iterator<Item = Ipv4Addr>) -> Vec<Ipv4Addr> {
    let mut kept = Vec::new();
    for address in addresses {
        if !address.is_loopback() && !address.is_unspecified() && !kept.contains(&address) {
            kept.push(address);
        }
    }

    kept
}
