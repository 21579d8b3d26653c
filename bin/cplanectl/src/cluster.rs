//! ---
//! cp_section: "05-networking-external-interfaces"
//! cp_subsection: "binary"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Control CLI for administrators driving cluster lifecycle."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use cplane_common::{init_tracing, ClusterConfig, LoadedClusterConfig};
use cplane_docker::DockerRuntime;
use cplane_services::{etcd, kube_controller, UpgradeOutcome, UpgradeReport};
use tokio::runtime::Runtime;
use tracing::info;

/// Top-level cluster lifecycle commands.
#[derive(Debug, Subcommand)]
pub enum ClusterCommand {
    /// Bring the etcd plane and then the controller plane up on every
    /// configured host.
    Up(ClusterOptions),
    /// Tear both planes down, controller plane first.
    Remove(ClusterOptions),
    /// Upgrade the controller plane in place, one host at a time.
    Upgrade(ClusterOptions),
}

impl ClusterCommand {
    fn options(&self) -> &ClusterOptions {
        match self {
            ClusterCommand::Up(opts)
            | ClusterCommand::Remove(opts)
            | ClusterCommand::Upgrade(opts) => opts,
        }
    }
}

/// Shared options for cluster operations.
#[derive(Debug, Args)]
pub struct ClusterOptions {
    /// Path to the cluster configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Execute the supplied cluster command.
pub fn run(command: ClusterCommand) -> Result<()> {
    let loaded = load_config(command.options())?;
    init_tracing("cplanectl", &loaded.config.logging)?;
    info!(source = %loaded.source.display(), hosts = loaded.config.hosts.len(), "cluster configuration loaded");

    let docker = DockerRuntime::new();
    let runtime = Runtime::new()?;
    match command {
        ClusterCommand::Up(_) => runtime.block_on(bring_up(&docker, &loaded.config)),
        ClusterCommand::Remove(_) => runtime.block_on(tear_down(&docker, &loaded.config)),
        ClusterCommand::Upgrade(_) => runtime.block_on(upgrade(&docker, &loaded.config)),
    }
}

fn load_config(options: &ClusterOptions) -> Result<LoadedClusterConfig> {
    let mut candidates = Vec::new();
    if let Some(path) = &options.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/cluster.example.toml"));
    ClusterConfig::load_with_source(&candidates)
}

async fn bring_up(docker: &DockerRuntime, config: &ClusterConfig) -> Result<()> {
    let report = etcd::run_etcd_plane(docker, &config.etcd_hosts(), &config.services.etcd).await;
    let hosts = report
        .into_result()
        .context("etcd plane bring-up failed")?;
    println!("etcd plane up on {} host(s)", hosts.len());

    let report = kube_controller::run_control_plane(
        docker,
        &config.control_hosts(),
        &config.services.kube_controller,
    )
    .await;
    let hosts = report
        .into_result()
        .context("controller plane bring-up failed")?;
    println!("controller plane up on {} host(s)", hosts.len());
    Ok(())
}

async fn tear_down(docker: &DockerRuntime, config: &ClusterConfig) -> Result<()> {
    let report = kube_controller::remove_control_plane(docker, &config.control_hosts()).await;
    report
        .into_result()
        .context("controller plane tear-down failed")?;
    println!("controller plane removed");

    let report = etcd::remove_etcd_plane(docker, &config.etcd_hosts()).await;
    report
        .into_result()
        .context("etcd plane tear-down failed")?;
    println!("etcd plane removed");
    Ok(())
}

async fn upgrade(docker: &DockerRuntime, config: &ClusterConfig) -> Result<()> {
    let report = kube_controller::upgrade_control_plane(
        docker,
        &config.control_hosts(),
        &config.services.kube_controller,
    )
    .await;
    render_upgrade_report(&report);
    if !report.is_success() {
        bail!(
            "controller plane upgrade failed on {} host(s)",
            report.failures.len()
        );
    }
    Ok(())
}

fn render_upgrade_report(report: &UpgradeReport) {
    for entry in &report.outcomes {
        match entry.outcome {
            UpgradeOutcome::AlreadyCurrent => println!("{}: already current", entry.hostname),
            UpgradeOutcome::Replaced => println!("{}: replaced", entry.hostname),
        }
    }
    for failure in &report.failures {
        println!("{}: failed ({})", failure.hostname, failure.error);
    }
}
