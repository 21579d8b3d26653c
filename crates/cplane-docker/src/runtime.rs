//! ---
//! cp_section: "02-container-runtime"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Container runtime seam and Docker Engine implementation."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use async_trait::async_trait;
use bollard::container::Config;
use bollard::models::HostConfig;
use cplane_common::Host;
use thiserror::Error;

/// Facts reported when inspecting a named container.
#[derive(Debug, Clone, Default)]
pub struct ContainerFacts {
    /// Image reference the container was created from.
    pub image: Option<String>,
    /// Raw runtime status string (`running`, `exited`, ...).
    pub status: Option<String>,
    /// Whether the runtime reports the container as currently running.
    pub running: bool,
}

/// Errors surfaced by a container runtime implementation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The engine endpoint for a host could not be reached or configured.
    #[error("docker endpoint for host '{host}' is unusable")]
    Connect {
        /// Advertised hostname of the affected host.
        host: String,
        /// Underlying client error.
        #[source]
        source: bollard::errors::Error,
    },
    /// Pulling or inspecting an image failed.
    #[error("image '{image}' unavailable on host '{host}'")]
    Pull {
        /// Advertised hostname of the affected host.
        host: String,
        /// Image reference that could not be made available.
        image: String,
        /// Underlying client error.
        #[source]
        source: bollard::errors::Error,
    },
    /// A lifecycle call against a named container failed.
    #[error("container '{name}' on host '{host}' failed during {operation}")]
    Container {
        /// Advertised hostname of the affected host.
        host: String,
        /// Container name the call addressed.
        name: String,
        /// Lifecycle step that failed (`create`, `start`, `stop`, ...).
        operation: &'static str,
        /// Underlying client error.
        #[source]
        source: bollard::errors::Error,
    },
    /// A container that was expected to exist is absent.
    #[error("container '{name}' on host '{host}' does not exist")]
    Missing {
        /// Advertised hostname of the affected host.
        host: String,
        /// Container name that was looked up.
        name: String,
    },
}

/// Per-host container lifecycle capability driven by the orchestration layer.
///
/// Implementations must treat each call as independent; the orchestration
/// layer never caches facts across calls.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Ensure a container built from `config` is running on `host` under `name`.
    ///
    /// An already-running container under the name is left untouched. A
    /// stopped leftover under the name is removed before the new container is
    /// created. The image is pulled when not present on the host.
    async fn create_and_start(
        &self,
        host: &Host,
        name: &str,
        config: Config<String>,
        host_config: HostConfig,
    ) -> Result<(), RuntimeError>;

    /// Force-remove the named container. An absent container is not an error.
    async fn remove(&self, host: &Host, name: &str) -> Result<(), RuntimeError>;

    /// Report image and status facts for the named container.
    ///
    /// Returns [`RuntimeError::Missing`] when no container exists under the
    /// name.
    async fn inspect(&self, host: &Host, name: &str) -> Result<ContainerFacts, RuntimeError>;

    /// Stop the named container, then rename it to `new_name`.
    async fn stop_and_rename(
        &self,
        host: &Host,
        name: &str,
        new_name: &str,
    ) -> Result<(), RuntimeError>;
}
