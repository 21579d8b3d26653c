//! ---
//! cp_section: "01-core-functionality"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Shared primitives and utilities for the cplane workspace."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object describing a cluster bring-up run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`ClusterConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedClusterConfig {
    pub config: ClusterConfig,
    pub source: PathBuf,
}

impl ClusterConfig {
    pub const ENV_CONFIG_PATH: &str = "CPLANE_CONFIG";

    /// Load configuration from disk, respecting the `CPLANE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedClusterConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedClusterConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedClusterConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<ClusterConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Hosts carrying the consensus-store role, in declaration order.
    pub fn etcd_hosts(&self) -> Vec<&Host> {
        self.hosts
            .iter()
            .filter(|h| h.has_role(HostRole::Etcd))
            .collect()
    }

    /// Hosts carrying the control-plane role, in declaration order.
    pub fn control_hosts(&self) -> Vec<&Host> {
        self.hosts
            .iter()
            .filter(|h| h.has_role(HostRole::Controlplane))
            .collect()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(anyhow!("configuration must contain at least one host"));
        }
        let mut seen = HashSet::new();
        for host in &self.hosts {
            host.validate()?;
            if !seen.insert(host.advertised_hostname.as_str()) {
                return Err(anyhow!(
                    "advertised hostname '{}' is declared more than once",
                    host.advertised_hostname
                ));
            }
        }
        if self.etcd_hosts().is_empty() {
            return Err(anyhow!("at least one host must carry the 'etcd' role"));
        }
        if self.control_hosts().is_empty() {
            return Err(anyhow!(
                "at least one host must carry the 'controlplane' role"
            ));
        }
        self.services.validate()?;
        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            services: ServicesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for ClusterConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: ClusterConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// A cluster member targeted by plane operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Unique label used for container naming and peer URLs.
    pub advertised_hostname: String,
    /// Network address the other members and clients reach this host on.
    pub advertise_address: String,
    #[serde(default)]
    pub roles: Vec<HostRole>,
    /// Docker engine endpoint override. Defaults to `tcp://<advertise_address>:2375`.
    #[serde(default)]
    pub docker_endpoint: Option<String>,
}

impl Host {
    pub fn has_role(&self, role: HostRole) -> bool {
        self.roles.contains(&role)
    }

    fn validate(&self) -> Result<()> {
        if self.advertised_hostname.trim().is_empty() {
            return Err(anyhow!("a host is missing its advertised_hostname"));
        }
        if self.advertise_address.trim().is_empty() {
            return Err(anyhow!(
                "host '{}' is missing its advertise_address",
                self.advertised_hostname
            ));
        }
        if self.roles.is_empty() {
            return Err(anyhow!(
                "host '{}' must declare at least one role",
                self.advertised_hostname
            ));
        }
        Ok(())
    }
}

/// Roles a host can take within the cluster.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    Etcd,
    Controlplane,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicesConfig {
    #[serde(default)]
    pub etcd: EtcdServiceConfig,
    #[serde(default)]
    pub kube_controller: KubeControllerServiceConfig,
}

impl ServicesConfig {
    fn validate(&self) -> Result<()> {
        if self.etcd.image.trim().is_empty() {
            return Err(anyhow!("services.etcd.image must not be empty"));
        }
        if self.kube_controller.image.trim().is_empty() {
            return Err(anyhow!("services.kube_controller.image must not be empty"));
        }
        if self.kube_controller.cluster_cidr.trim().is_empty() {
            return Err(anyhow!(
                "services.kube_controller.cluster_cidr must not be empty"
            ));
        }
        if self.kube_controller.service_cluster_ip_range.trim().is_empty() {
            return Err(anyhow!(
                "services.kube_controller.service_cluster_ip_range must not be empty"
            ));
        }
        Ok(())
    }
}

/// Consensus-store service settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EtcdServiceConfig {
    #[serde(default)]
    pub image: String,
    /// Additional flags appended after the fixed flag set, in declaration order.
    #[serde(default)]
    pub extra_args: IndexMap<String, String>,
}

/// Controller-manager service settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KubeControllerServiceConfig {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub cluster_cidr: String,
    #[serde(default)]
    pub service_cluster_ip_range: String,
    /// Additional flags appended after the fixed flag set, in declaration order.
    #[serde(default)]
    pub extra_args: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}
