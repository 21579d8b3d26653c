//! ---
//! cp_section: "03-service-lifecycle"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Controller-manager plane configuration, bring-up, and upgrade."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use bollard::container::Config;
use bollard::models::{HostConfig, RestartPolicy, RestartPolicyNameEnum};
use cplane_common::{Host, KubeControllerServiceConfig};
use cplane_docker::ContainerRuntime;
use tracing::{error, info};

use crate::error::{
    FailedHost, HostUpgrade, PlaneReport, ServiceError, UpgradeOutcome, UpgradeReport,
};
use crate::plane;
use crate::role::{extra_flags, ServiceRole};
use crate::upgrade;

const KUBERNETES_DIR_BIND: &str = "/etc/kubernetes:/etc/kubernetes";

/// Derive the container configuration pair for a controller-manager instance.
///
/// The fixed flags ride in the entrypoint; caller-supplied extra args land in
/// the command, which the engine appends after the entrypoint, so extras
/// always come last in the effective argument sequence.
#[must_use]
pub fn build_config(service: &KubeControllerServiceConfig) -> (Config<String>, HostConfig) {
    let entrypoint = vec![
        "kube-controller-manager".to_owned(),
        "--address=0.0.0.0".to_owned(),
        "--cloud-provider=".to_owned(),
        "--leader-elect=true".to_owned(),
        format!("--kubeconfig={}", cplane_pki::KUBE_CONTROLLER_CONFIG_PATH),
        "--enable-hostpath-provisioner=false".to_owned(),
        "--node-monitor-grace-period=40s".to_owned(),
        "--pod-eviction-timeout=5m0s".to_owned(),
        "--v=2".to_owned(),
        "--allocate-node-cidrs=true".to_owned(),
        format!("--cluster-cidr={}", service.cluster_cidr),
        format!(
            "--service-cluster-ip-range={}",
            service.service_cluster_ip_range
        ),
        format!(
            "--service-account-private-key-file={}",
            cplane_pki::KUBE_API_KEY_PATH
        ),
        format!("--root-ca-file={}", cplane_pki::CA_CERT_PATH),
    ];
    let extras = extra_flags(&service.extra_args);

    let config = Config {
        image: Some(service.image.clone()),
        entrypoint: Some(entrypoint),
        cmd: if extras.is_empty() { None } else { Some(extras) },
        ..Default::default()
    };
    let host_config = HostConfig {
        binds: Some(vec![KUBERNETES_DIR_BIND.to_owned()]),
        network_mode: Some("host".to_owned()),
        restart_policy: Some(RestartPolicy {
            name: Some(RestartPolicyNameEnum::ALWAYS),
            ..Default::default()
        }),
        ..Default::default()
    };
    (config, host_config)
}

/// Ensure a controller-manager container is running on `host`.
pub async fn run_kube_controller<R>(
    runtime: &R,
    host: &Host,
    service: &KubeControllerServiceConfig,
) -> Result<(), ServiceError>
where
    R: ContainerRuntime + ?Sized,
{
    let container = ServiceRole::KubeController.canonical_name();
    let (config, host_config) = build_config(service);
    runtime
        .create_and_start(host, container, config, host_config)
        .await
        .map_err(|source| ServiceError::RunFailed {
            host: host.advertised_hostname.clone(),
            container: container.to_owned(),
            source,
        })
}

/// Upgrade the controller-manager container on one host.
///
/// See [`upgrade::upgrade_host`] for the exact replacement sequence and its
/// failure guarantees.
pub async fn upgrade_kube_controller<R>(
    runtime: &R,
    host: &Host,
    service: &KubeControllerServiceConfig,
) -> Result<UpgradeOutcome, ServiceError>
where
    R: ContainerRuntime + ?Sized,
{
    upgrade::upgrade_host(
        runtime,
        ServiceRole::KubeController,
        host,
        &service.image,
        |_| build_config(service),
    )
    .await
}

/// Bring up the controller plane across `hosts`, in order.
pub async fn run_control_plane<R>(
    runtime: &R,
    hosts: &[&Host],
    service: &KubeControllerServiceConfig,
) -> PlaneReport
where
    R: ContainerRuntime + ?Sized,
{
    plane::run_plane(runtime, ServiceRole::KubeController, hosts, |_| {
        build_config(service)
    })
    .await
}

/// Tear down the controller plane across `hosts`, in order.
pub async fn remove_control_plane<R>(runtime: &R, hosts: &[&Host]) -> PlaneReport
where
    R: ContainerRuntime + ?Sized,
{
    plane::remove_plane(runtime, ServiceRole::KubeController, hosts).await
}

/// Upgrade the controller plane, visiting every host even when one fails.
///
/// Each host's upgrade is independent; failures are collected per host
/// instead of halting the pass.
pub async fn upgrade_control_plane<R>(
    runtime: &R,
    hosts: &[&Host],
    service: &KubeControllerServiceConfig,
) -> UpgradeReport
where
    R: ContainerRuntime + ?Sized,
{
    let role = ServiceRole::KubeController;
    info!(plane = %role.plane(), hosts = hosts.len(), "upgrading controller plane");
    let mut report = UpgradeReport::default();
    for host in hosts {
        match upgrade_kube_controller(runtime, host, service).await {
            Ok(outcome) => report.outcomes.push(HostUpgrade {
                hostname: host.advertised_hostname.clone(),
                outcome,
            }),
            Err(err) => {
                error!(
                    plane = %role.plane(),
                    host = %host.advertised_hostname,
                    error = %err,
                    "host upgrade failed"
                );
                report.failures.push(FailedHost {
                    hostname: host.advertised_hostname.clone(),
                    error: err,
                });
            }
        }
    }
    info!(
        plane = %role.plane(),
        upgraded = report.outcomes.len(),
        failed = report.failures.len(),
        "controller plane upgrade finished"
    );
    report
}
