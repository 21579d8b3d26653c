//! ---
//! cp_section: "03-service-lifecycle"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Guarded in-place replacement of a running container."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use bollard::container::Config;
use bollard::models::HostConfig;
use cplane_common::Host;
use cplane_docker::ContainerRuntime;
use tracing::{debug, info};

use crate::error::{ServiceError, UpgradeOutcome};
use crate::role::{rescue_name, ServiceRole};

/// Replace one host's running container with one built from the current
/// settings, keeping the previous container under a rescue name until the
/// replacement is confirmed running.
///
/// Steps, in order: inspect the canonical container, short-circuit when its
/// image already matches `target_image`, stop it and rename it to the rescue
/// name, deploy the replacement under the canonical name, remove the rescue
/// container. A deploy failure deliberately leaves the rescue container in
/// place so an operator can rename it back; a cleanup failure leaks the
/// rescue container while the replacement keeps serving.
pub async fn upgrade_host<R, F>(
    runtime: &R,
    role: ServiceRole,
    host: &Host,
    target_image: &str,
    mut build: F,
) -> Result<UpgradeOutcome, ServiceError>
where
    R: ContainerRuntime + ?Sized,
    F: FnMut(&Host) -> (Config<String>, HostConfig),
{
    let container = role.canonical_name();
    let hostname = host.advertised_hostname.as_str();

    debug!(plane = %role.plane(), host = %hostname, container = %container, "checking deployed version");
    let facts = runtime
        .inspect(host, container)
        .await
        .map_err(|source| ServiceError::InspectFailed {
            host: hostname.to_owned(),
            container: container.to_owned(),
            source,
        })?;
    if facts.image.as_deref() == Some(target_image) {
        info!(plane = %role.plane(), host = %hostname, container = %container, "already up to date");
        return Ok(UpgradeOutcome::AlreadyCurrent);
    }

    let rescue = rescue_name(container);
    debug!(plane = %role.plane(), host = %hostname, rescue = %rescue, "parking old container");
    runtime
        .stop_and_rename(host, container, &rescue)
        .await
        .map_err(|source| ServiceError::RenameFailed {
            host: hostname.to_owned(),
            container: container.to_owned(),
            source,
        })?;

    debug!(plane = %role.plane(), host = %hostname, container = %container, "deploying new container");
    let (config, host_config) = build(host);
    runtime
        .create_and_start(host, container, config, host_config)
        .await
        .map_err(|source| ServiceError::DeployFailed {
            host: hostname.to_owned(),
            container: container.to_owned(),
            rescue: rescue.clone(),
            source,
        })?;

    debug!(plane = %role.plane(), host = %hostname, rescue = %rescue, "removing parked container");
    runtime
        .remove(host, &rescue)
        .await
        .map_err(|source| ServiceError::CleanupFailed {
            host: hostname.to_owned(),
            rescue: rescue.clone(),
            source,
        })?;

    info!(plane = %role.plane(), host = %hostname, image = %target_image, "container upgraded");
    Ok(UpgradeOutcome::Replaced)
}
