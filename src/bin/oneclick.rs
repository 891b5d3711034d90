// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use oneclick::{
    config::Settings, path::default_settings_path, DeploymentLayout, DeploymentOrchestrator,
    GitLabTags, ReleaseCatalog, StatusReport, StatusView,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs::read_to_string, path::PathBuf, process::exit, sync::Arc};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  oneclick [options] <oneclick-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = load_settings(self.settings)?;
        debug!("loaded settings: {settings:?}");
        let layout = DeploymentLayout::from_settings(&settings);
        let source = GitLabTags::new(&settings.remote).context("invalid remote settings")?;
        let view = StatusView::new(layout.clone(), ReleaseCatalog::new(source));

        match self.command {
            Command::Status(opts) => run_status(&view, opts).await,
            Command::Deploy(opts) => run_deploy(&view, layout, opts).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show live version and staged builds of every release.
    #[command(override_usage = "oneclick status [options]")]
    Status(StatusOptions),

    /// Deploy staged release, then environment configuration overlay.
    #[command(override_usage = "oneclick deploy [options] <release>")]
    Deploy(DeployOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StatusOptions {
    /// Print status as JSON.
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeployOptions {
    /// Tag name of release to deploy.
    #[arg(required = true, value_name = "release")]
    pub release: String,

    /// Print resulting status as JSON.
    #[arg(short, long)]
    pub json: bool,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

// Settings are the one thing oneclick cannot run without.
fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = match path {
        Some(path) => path,
        None => default_settings_path()?,
    };

    let data = read_to_string(&path)
        .with_context(|| format!("failed to read settings file {:?}", path.display()))?;
    data.parse::<Settings>()
        .with_context(|| format!("failed to parse settings file {:?}", path.display()))
}

async fn run_status(view: &StatusView, opts: StatusOptions) -> Result<()> {
    render(&view.status().await, opts.json)
}

async fn run_deploy(
    view: &StatusView,
    layout: DeploymentLayout,
    opts: DeployOptions,
) -> Result<()> {
    let orchestrator = Arc::new(DeploymentOrchestrator::new(layout));

    // INVARIANT: Always return to status view, whatever the outcome.
    let report = view.deploy_then_status(orchestrator, opts.release).await;
    render(&report, opts.json)
}

fn render(report: &StatusReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{report}");
    }

    Ok(())
}
