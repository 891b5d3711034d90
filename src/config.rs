// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that oneclick reads once at start
//! up. File I/O is left to the caller to figure out. Once parsed, settings are
//! never mutated for the rest of the process lifetime.
//!
//! # General Layout
//!
//! ```toml
//! [remote]
//! host = "https://gitlab.example.com"
//! api_path = "/api/v4"
//! token = "secret"
//! project_id = "42"
//!
//! [deployment]
//! environment = "Staging"
//! staging_base = "Z:\\LMPI"
//! deployment_root = "D:\\Inetpub\\LMPI"
//! ```

use crate::path::is_single_component;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Settings of oneclick.
///
/// Composed of two sections: where to find release tags remotely, and where
/// release payloads live on disk for the current host.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Remote tag listing service.
    pub remote: RemoteSettings,

    /// Filesystem layout of staging and deployment roots.
    pub deployment: DeploymentSettings,
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every filesystem path.
        settings.deployment.staging_base = expand_path(&settings.deployment.staging_base)?;
        settings.deployment.deployment_root = expand_path(&settings.deployment.deployment_root)?;

        // INVARIANT: Environment name doubles as a directory name under the
        // config overlay, so it must not escape it.
        if !is_single_component(&settings.deployment.environment) {
            return Err(ConfigError::InvalidEnvironment(
                settings.deployment.environment,
            ));
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Settings of remote tag listing service.
#[derive(PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RemoteSettings {
    /// Base URL of the GitLab host, e.g., "https://gitlab.example.com".
    pub host: String,

    /// API prefix appended to host.
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Private access token.
    pub token: String,

    /// Numeric project id, or URL path of project like "group/project".
    pub project_id: String,

    /// Skip TLS certificate verification for self-signed hosts.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Keep the access token out of logs.
impl Debug for RemoteSettings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("RemoteSettings")
            .field("host", &self.host)
            .field("api_path", &self.api_path)
            .field("token", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Deployment layout settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DeploymentSettings {
    /// Environment name, selects `<staging_base>/Config/<environment>`.
    pub environment: String,

    /// Network share holding one directory per release.
    #[serde(default = "default_staging_base")]
    pub staging_base: PathBuf,

    /// Live location served on this host.
    #[serde(default = "default_deployment_root")]
    pub deployment_root: PathBuf,
}

fn default_api_path() -> String {
    "/api/v4".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_staging_base() -> PathBuf {
    PathBuf::from(r"Z:\LMPI")
}

fn default_deployment_root() -> PathBuf {
    PathBuf::from(r"D:\Inetpub\LMPI")
}

fn expand_path(path: &std::path::Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Environment name is not a plain directory name.
    #[error("environment name {0:?} must be a single path component")]
    InvalidEnvironment(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("SHARE", "/mnt/share")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            [remote]
            host = "https://gitlab.example.com"
            token = "abc123"
            project_id = "web/portal"
            accept_invalid_certs = true

            [deployment]
            environment = "Staging"
            staging_base = "$SHARE/LMPI"
            deployment_root = "/srv/www/LMPI"
        "#
        .parse()?;

        let expect = Settings {
            remote: RemoteSettings {
                host: "https://gitlab.example.com".into(),
                api_path: "/api/v4".into(),
                token: "abc123".into(),
                project_id: "web/portal".into(),
                accept_invalid_certs: true,
                timeout_secs: 30,
            },
            deployment: DeploymentSettings {
                environment: "Staging".into(),
                staging_base: PathBuf::from("/mnt/share/LMPI"),
                deployment_root: PathBuf::from("/srv/www/LMPI"),
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_settings() {
        let result = Settings {
            remote: RemoteSettings {
                host: "https://gitlab.example.com".into(),
                api_path: "/api/v4".into(),
                token: "abc123".into(),
                project_id: "42".into(),
                accept_invalid_certs: false,
                timeout_secs: 10,
            },
            deployment: DeploymentSettings {
                environment: "Production".into(),
                staging_base: PathBuf::from("/mnt/share/LMPI"),
                deployment_root: PathBuf::from("/srv/www/LMPI"),
            },
        }
        .to_string();

        let expect = indoc! {r#"
            [remote]
            host = "https://gitlab.example.com"
            api_path = "/api/v4"
            token = "abc123"
            project_id = "42"
            accept_invalid_certs = false
            timeout_secs = 10

            [deployment]
            environment = "Production"
            staging_base = "/mnt/share/LMPI"
            deployment_root = "/srv/www/LMPI"
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn reject_environment_outside_overlay() {
        let result = r#"
            [remote]
            host = "https://gitlab.example.com"
            token = "abc123"
            project_id = "42"

            [deployment]
            environment = "../Production"
            staging_base = "/mnt/share/LMPI"
            deployment_root = "/srv/www/LMPI"
        "#
        .parse::<Settings>();

        assert!(matches!(result, Err(ConfigError::InvalidEnvironment(_))));
    }

    #[test]
    fn reject_missing_token() {
        let result = r#"
            [remote]
            host = "https://gitlab.example.com"
            project_id = "42"

            [deployment]
            environment = "Production"
        "#
        .parse::<Settings>();

        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn debug_output_redacts_token() {
        let remote = RemoteSettings {
            host: "https://gitlab.example.com".into(),
            api_path: "/api/v4".into(),
            token: "abc123".into(),
            project_id: "42".into(),
            accept_invalid_certs: false,
            timeout_secs: 30,
        };

        assert!(!format!("{remote:?}").contains("abc123"));
    }
}
