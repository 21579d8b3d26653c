//! ---
//! cp_section: "03-service-lifecycle"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Plane bring-up, tear-down, and guarded in-place upgrades."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
//! Lifecycle engine for the cluster control-plane services.
//!
//! Everything here is stateless between calls: plane operations re-derive all
//! container configuration from the current host list and service settings,
//! then drive a [`cplane_docker::ContainerRuntime`] one host at a time. The
//! only stateful sequence is the per-host upgrade in [`upgrade`], which parks
//! the old container under a rescue name until the replacement is confirmed
//! running.

#![warn(missing_docs)]

pub mod error;
pub mod etcd;
pub mod kube_controller;
pub mod plane;
pub mod role;
pub mod upgrade;

pub use error::{FailedHost, HostUpgrade, PlaneReport, ServiceError, UpgradeOutcome, UpgradeReport};
pub use role::{rescue_name, ServiceRole};
