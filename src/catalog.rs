// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Release catalog.
//!
//! A __release__ is a tag of the project's repository on the remote
//! source-control service. The catalog asks the remote for its tags on every
//! query. Nothing is cached, so every status view reflects the remote as it
//! is right now, at the cost of one round trip per query.
//!
//! # Failure Policy
//!
//! The catalog is best-effort. If the remote cannot be reached, or answers
//! with garbage, the error is logged and an empty listing is returned. The
//! status view simply shows no releases rather than refusing to render.
//!
//! # See Also
//!
//! 1. [`gitlab`]

pub mod gitlab;

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{error, info, instrument};

pub use gitlab::GitLabTags;

/// A named build candidate.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Release {
    name: String,
    message: String,
}

impl Release {
    /// Construct new release.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Tag name identifying the release.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text message attached to the release.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Source of release tags.
///
/// Layer of indirection over the remote tag listing service.
pub trait TagSource: Send + Sync {
    /// List every tag of the project in the order the remote reports them.
    fn list_tags(&self) -> impl Future<Output = Result<Vec<Release>>> + Send;
}

/// Listing of releases available for deployment.
#[derive(Debug)]
pub struct ReleaseCatalog<S = GitLabTags>
where
    S: TagSource,
{
    source: S,
}

impl<S> ReleaseCatalog<S>
where
    S: TagSource,
{
    /// Construct new release catalog.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// List releases from remote.
    ///
    /// Queries the tag source exactly once. Returns an empty listing if the
    /// query fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_releases(&self) -> Vec<Release> {
        info!("fetching repository tags");
        match self.source.list_tags().await {
            Ok(releases) => {
                info!("found {} releases", releases.len());
                releases
            }
            Err(error) => {
                error!("failed to fetch repository tags: {error}");
                Vec::new()
            }
        }
    }
}

/// Release catalog error types.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Remote URL cannot be built from settings.
    #[error("invalid remote URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Request to remote fails, or remote answers with an error status.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Friendly result alias :3
pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
