use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dtl_types::TagState;

#[derive(Parser)]
#[command(
    name = "dtl",
    about = "Deployment Tag Ledger: releases, quality states and deployments as git tags",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the ledger configuration (default: <repo>/.dtl.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Repository to operate on
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum StateArg {
    Stable,
    Unstable,
    Deprecated,
}

impl From<StateArg> for TagState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Stable => TagState::Stable,
            StateArg::Unstable => TagState::Unstable,
            StateArg::Deprecated => TagState::Deprecated,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Classify a tag name against the ledger grammar
    Classify(ClassifyArgs),
    /// Create the version tag for a release
    Release(ReleaseArgs),
    /// Record a quality state for a released version
    Mark(MarkArgs),
    /// Point an environment at a released version
    Deploy(DeployArgs),
    /// Roll an environment back to the best previous version
    Rollback(RollbackArgs),
    /// Show the version deployed to an environment
    Current(EnvironmentArgs),
    /// Show the deployment of every environment
    Status(StatusArgs),
    /// Print the conflict scope key for an environment
    ScopeKey(EnvironmentArgs),
    /// List commits carrying more than one version tag
    Violations,
    /// Delete a ledger tag under administrative override
    Delete(DeleteArgs),
    /// Git hook entry points
    Hook(HookArgs),
}

#[derive(Args)]
pub struct ClassifyArgs {
    pub name: String,
}

#[derive(Args)]
pub struct ReleaseArgs {
    #[arg(long)]
    pub version: String,
    #[arg(long)]
    pub subproject: Option<String>,
    /// Revision to tag
    #[arg(long, default_value = "HEAD")]
    pub commit: String,
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Args)]
pub struct MarkArgs {
    #[arg(long)]
    pub version: String,
    #[arg(long)]
    pub state: StateArg,
    #[arg(long)]
    pub subproject: Option<String>,
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Args)]
pub struct DeployArgs {
    #[arg(long)]
    pub version: String,
    #[arg(long)]
    pub environment: String,
    #[arg(long)]
    pub subproject: Option<String>,
}

#[derive(Args)]
pub struct RollbackArgs {
    #[arg(long)]
    pub environment: String,
    #[arg(long)]
    pub subproject: Option<String>,
    /// Resolve and print the target without moving the tag
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct EnvironmentArgs {
    #[arg(long)]
    pub environment: String,
    #[arg(long)]
    pub subproject: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub subproject: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub name: String,
    #[arg(long)]
    pub override_actor: String,
    #[arg(long)]
    pub override_reason: String,
}

#[derive(Args)]
pub struct HookArgs {
    #[command(subcommand)]
    pub hook: HookCommand,
}

#[derive(Subcommand)]
pub enum HookCommand {
    /// Check tag updates read from stdin (git pre-push protocol)
    PrePush {
        remote: Option<String>,
        url: Option<String>,
    },
}
