//! ---
//! cp_section: "03-service-lifecycle"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Failure taxonomy and operation reports."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use cplane_docker::RuntimeError;
use thiserror::Error;

/// Failures surfaced by plane and upgrade operations.
///
/// Every variant names the advertised hostname it originated on and carries
/// the underlying runtime error as its source. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The running container could not be inspected ahead of an upgrade.
    #[error("inspect of '{container}' failed on host '{host}'")]
    InspectFailed {
        /// Advertised hostname of the affected host.
        host: String,
        /// Canonical container name that was inspected.
        container: String,
        /// Underlying runtime failure.
        #[source]
        source: RuntimeError,
    },
    /// The running container could not be parked under its rescue name.
    #[error("stop/rename of '{container}' failed on host '{host}'")]
    RenameFailed {
        /// Advertised hostname of the affected host.
        host: String,
        /// Canonical container name that was being parked.
        container: String,
        /// Underlying runtime failure.
        #[source]
        source: RuntimeError,
    },
    /// The replacement container could not be deployed; the rescue container
    /// is left in place for manual restore.
    #[error("deploy of '{container}' failed on host '{host}'; rescue container '{rescue}' kept")]
    DeployFailed {
        /// Advertised hostname of the affected host.
        host: String,
        /// Canonical container name of the failed deployment.
        container: String,
        /// Rescue name the previous container is still parked under.
        rescue: String,
        /// Underlying runtime failure.
        #[source]
        source: RuntimeError,
    },
    /// The parked rescue container could not be removed after a successful
    /// deploy; the new container is live, the old one is leaked.
    #[error("cleanup of rescue container '{rescue}' failed on host '{host}'")]
    CleanupFailed {
        /// Advertised hostname of the affected host.
        host: String,
        /// Rescue container that still needs manual removal.
        rescue: String,
        /// Underlying runtime failure.
        #[source]
        source: RuntimeError,
    },
    /// Bring-up of a container failed during a plane run.
    #[error("run of '{container}' failed on host '{host}'")]
    RunFailed {
        /// Advertised hostname of the affected host.
        host: String,
        /// Canonical container name that failed to start.
        container: String,
        /// Underlying runtime failure.
        #[source]
        source: RuntimeError,
    },
    /// Tear-down of a container failed during a plane removal.
    #[error("removal of '{container}' failed on host '{host}'")]
    RemoveFailed {
        /// Advertised hostname of the affected host.
        host: String,
        /// Canonical container name that could not be removed.
        container: String,
        /// Underlying runtime failure.
        #[source]
        source: RuntimeError,
    },
}

impl ServiceError {
    /// Advertised hostname the failure originated on.
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            ServiceError::InspectFailed { host, .. }
            | ServiceError::RenameFailed { host, .. }
            | ServiceError::DeployFailed { host, .. }
            | ServiceError::CleanupFailed { host, .. }
            | ServiceError::RunFailed { host, .. }
            | ServiceError::RemoveFailed { host, .. } => host,
        }
    }
}

/// Outcome of a sequential plane operation.
///
/// Hosts visited before a failure stay in whatever state the operation left
/// them; the report hands the caller enough to decide remediation.
#[derive(Debug)]
pub struct PlaneReport {
    /// Hostnames that completed, in visit order.
    pub completed: Vec<String>,
    /// First failure, when the loop stopped early.
    pub failed: Option<FailedHost>,
}

impl PlaneReport {
    /// True when every host completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Collapse into a plain result for callers without remediation logic.
    pub fn into_result(self) -> Result<Vec<String>, ServiceError> {
        match self.failed {
            Some(failure) => Err(failure.error),
            None => Ok(self.completed),
        }
    }
}

/// Host identity plus the error that stopped an operation there.
#[derive(Debug)]
pub struct FailedHost {
    /// Advertised hostname of the failing host.
    pub hostname: String,
    /// The failure as surfaced to the caller.
    pub error: ServiceError,
}

/// Terminal success states of a single-host upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The running image already matched; nothing was touched.
    AlreadyCurrent,
    /// The container was replaced with one running the requested image.
    Replaced,
}

/// Per-host success record from an upgrade pass.
#[derive(Debug)]
pub struct HostUpgrade {
    /// Advertised hostname of the upgraded host.
    pub hostname: String,
    /// How the host reached its terminal state.
    pub outcome: UpgradeOutcome,
}

/// Outcome of an upgrade pass across a plane.
///
/// Hosts are upgraded independently; a failure on one does not stop the
/// others, so the report can carry several failures.
#[derive(Debug, Default)]
pub struct UpgradeReport {
    /// Hosts that reached a terminal success state, in visit order.
    pub outcomes: Vec<HostUpgrade>,
    /// Hosts whose upgrade failed, with the error for each.
    pub failures: Vec<FailedHost>,
}

impl UpgradeReport {
    /// True when no host failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
