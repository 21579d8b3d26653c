//! ---
//! cp_section: "05-networking-external-interfaces"
//! cp_subsection: "binary"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Control CLI for administrators driving cluster lifecycle."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use cplane_common::VersionInfo;

mod cluster;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Control-plane administrative utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand, about = "Cluster lifecycle actions")]
    Cluster(cluster::ClusterCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return Ok(());
    }
    match cli.command {
        Some(Commands::Cluster(cmd)) => cluster::run(cmd)?,
        None => Cli::command().print_long_help()?,
    }
    Ok(())
}
