// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! GitLab tag listing.
//!
//! Lists repository tags through the GitLab REST API:
//! `GET {host}{api_path}/projects/{project_id}/repository/tags`. The access
//! token is sent through the `PRIVATE-TOKEN` header. Results are paginated,
//! so the `X-Next-Page` header is followed until the remote stops handing
//! out pages.
//!
//! # See Also
//!
//! 1. [GitLab - Tags API](https://docs.gitlab.com/ee/api/tags.html)

use crate::{
    catalog::{CatalogError, Release, Result, TagSource},
    config::RemoteSettings,
};

use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const PAGE_SIZE: &str = "100";

/// Tag source backed by the GitLab REST API.
#[derive(Debug, Clone)]
pub struct GitLabTags {
    client: Client,
    tags_url: Url,
    token: String,
}

impl GitLabTags {
    /// Construct new GitLab tag source from remote settings.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::InvalidUrl`] if host and API path do not form
    ///   a valid base URL.
    /// - Return [`CatalogError::Http`] if HTTP client cannot be built.
    pub fn new(settings: &RemoteSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            tags_url: tags_url(settings)?,
            token: settings.token.clone(),
        })
    }
}

impl TagSource for GitLabTags {
    #[instrument(skip(self), level = "debug")]
    async fn list_tags(&self) -> Result<Vec<Release>> {
        let mut releases = Vec::new();
        let mut page = Some(String::from("1"));

        while let Some(current) = page.take() {
            debug!("request page {current} of {}", self.tags_url);
            let response = self
                .client
                .get(self.tags_url.clone())
                .header("PRIVATE-TOKEN", &self.token)
                .query(&[("per_page", PAGE_SIZE), ("page", current.as_str())])
                .send()
                .await?
                .error_for_status()?;

            // INVARIANT: Blank or missing next page header means last page.
            page = response
                .headers()
                .get("x-next-page")
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned);

            let tags: Vec<GitLabTag> = response.json().await?;
            releases.extend(tags.into_iter().map(Release::from));
        }

        Ok(releases)
    }
}

fn tags_url(settings: &RemoteSettings) -> Result<Url> {
    let base = format!(
        "{}{}",
        settings.host.trim_end_matches('/'),
        settings.api_path
    );
    let invalid = |reason: String| CatalogError::InvalidUrl {
        url: base.clone(),
        reason,
    };

    let mut url = Url::parse(&base).map_err(|error| invalid(error.to_string()))?;

    // INVARIANT: Project id is one segment, so "group/project" gets encoded.
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be a base URL".into()))?
        .pop_if_empty()
        .extend([
            "projects",
            settings.project_id.as_str(),
            "repository",
            "tags",
        ]);

    Ok(url)
}

#[derive(Debug, Deserialize)]
struct GitLabTag {
    name: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    commit: Option<GitLabCommit>,
}

#[derive(Debug, Deserialize)]
struct GitLabCommit {
    #[serde(default)]
    message: Option<String>,
}

// Lightweight tags have no message of their own, so fall back to the commit.
impl From<GitLabTag> for Release {
    fn from(tag: GitLabTag) -> Self {
        let message = tag
            .message
            .filter(|message| !message.trim().is_empty())
            .or_else(|| tag.commit.and_then(|commit| commit.message))
            .unwrap_or_default();

        Release::new(tag.name, message)
    }
}
