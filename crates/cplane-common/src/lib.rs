//! ---
//! cp_section: "01-core-functionality"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Shared primitives and utilities for the cplane workspace."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
//! Core shared primitives for the cplane workspace.
//! This crate exposes cluster configuration loading, logging setup, and
//! version metadata utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod version;

pub use config::{
    ClusterConfig, EtcdServiceConfig, Host, HostRole, KubeControllerServiceConfig,
    LoadedClusterConfig, LoggingConfig, ServicesConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use version::VersionInfo;
