//! ---
//! cp_section: "02-container-runtime"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Container runtime seam and Docker Engine implementation."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
//! Container runtime access for plane operations.
//!
//! The orchestration layer only speaks [`ContainerRuntime`]; the one shipped
//! implementation, [`DockerRuntime`], drives per-host Docker engines through
//! `bollard`. Tests substitute their own recording implementations.

pub mod docker;
pub mod runtime;

pub use docker::DockerRuntime;
pub use runtime::{ContainerFacts, ContainerRuntime, RuntimeError};
