//! ---
//! cp_section: "03-service-lifecycle"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Sequential fail-fast plane bring-up and tear-down."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use bollard::container::Config;
use bollard::models::HostConfig;
use cplane_common::Host;
use cplane_docker::ContainerRuntime;
use tracing::{error, info};

use crate::error::{FailedHost, PlaneReport, ServiceError};
use crate::role::ServiceRole;

/// Bring a service up on every host, in order, stopping at the first failure.
///
/// `build` derives the per-host container configuration and runs once per
/// visited host. Hosts brought up before a failure stay up; no compensating
/// rollback is attempted.
pub async fn run_plane<R, F>(
    runtime: &R,
    role: ServiceRole,
    hosts: &[&Host],
    mut build: F,
) -> PlaneReport
where
    R: ContainerRuntime + ?Sized,
    F: FnMut(&Host) -> (Config<String>, HostConfig),
{
    let container = role.canonical_name();
    info!(plane = %role.plane(), "bringing up service plane");
    let mut completed = Vec::new();
    for host in hosts {
        let (config, host_config) = build(host);
        match runtime
            .create_and_start(host, container, config, host_config)
            .await
        {
            Ok(()) => completed.push(host.advertised_hostname.clone()),
            Err(source) => {
                let failure = FailedHost {
                    hostname: host.advertised_hostname.clone(),
                    error: ServiceError::RunFailed {
                        host: host.advertised_hostname.clone(),
                        container: container.to_owned(),
                        source,
                    },
                };
                error!(
                    plane = %role.plane(),
                    host = %failure.hostname,
                    error = %failure.error,
                    "plane bring-up halted"
                );
                return PlaneReport {
                    completed,
                    failed: Some(failure),
                };
            }
        }
    }
    info!(plane = %role.plane(), hosts = completed.len(), "service plane up");
    PlaneReport {
        completed,
        failed: None,
    }
}

/// Remove a service from every host, in order, stopping at the first failure.
///
/// Hosts already cleared before a failure stay cleared.
pub async fn remove_plane<R>(runtime: &R, role: ServiceRole, hosts: &[&Host]) -> PlaneReport
where
    R: ContainerRuntime + ?Sized,
{
    let container = role.canonical_name();
    info!(plane = %role.plane(), "tearing down service plane");
    let mut completed = Vec::new();
    for host in hosts {
        match runtime.remove(host, container).await {
            Ok(()) => completed.push(host.advertised_hostname.clone()),
            Err(source) => {
                let failure = FailedHost {
                    hostname: host.advertised_hostname.clone(),
                    error: ServiceError::RemoveFailed {
                        host: host.advertised_hostname.clone(),
                        container: container.to_owned(),
                        source,
                    },
                };
                error!(
                    plane = %role.plane(),
                    host = %failure.hostname,
                    error = %failure.error,
                    "plane tear-down halted"
                );
                return PlaneReport {
                    completed,
                    failed: Some(failure),
                };
            }
        }
    }
    info!(plane = %role.plane(), hosts = completed.len(), "service plane removed");
    PlaneReport {
        completed,
        failed: None,
    }
}
