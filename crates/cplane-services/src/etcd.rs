//! ---
//! cp_section: "03-service-lifecycle"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Consensus-store plane configuration and bring-up."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use bollard::container::Config;
use bollard::models::{HostConfig, PortBinding, PortMap, RestartPolicy, RestartPolicyNameEnum};
use cplane_common::{EtcdServiceConfig, Host};
use cplane_docker::ContainerRuntime;

use crate::error::PlaneReport;
use crate::plane;
use crate::role::{extra_flags, ServiceRole};

/// Client port served to external consumers.
pub const CLIENT_PORT: u16 = 2379;

/// Peer port used for member-to-member replication.
pub const PEER_PORT: u16 = 2380;

/// Legacy client port kept in the advertised URL set for old clients.
pub const LEGACY_CLIENT_PORT: u16 = 4001;

const DATA_DIR_BIND: &str = "/var/lib/etcd:/etcd-data";
const INITIAL_CLUSTER_TOKEN: &str = "etcd-cluster-1";

/// Bootstrap membership list used during first-time cluster formation.
///
/// One `etcd-<hostname>=http://<address>:2380` entry per host, comma-joined
/// in input order, no trailing comma. Total over any host list; an empty list
/// yields an empty string.
#[must_use]
pub fn initial_cluster(hosts: &[&Host]) -> String {
    hosts
        .iter()
        .map(|host| {
            format!(
                "etcd-{}=http://{}:{}",
                host.advertised_hostname, host.advertise_address, PEER_PORT
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Client connection string handed to API servers.
///
/// One `http://<address>:2379` entry per host, comma-joined in input order.
#[must_use]
pub fn client_conn_string(hosts: &[&Host]) -> String {
    hosts
        .iter()
        .map(|host| format!("http://{}:{}", host.advertise_address, CLIENT_PORT))
        .collect::<Vec<_>>()
        .join(",")
}

/// Derive the container configuration pair for one consensus-store member.
///
/// Caller-supplied extra args are appended after the fixed flag set, in
/// declaration order.
#[must_use]
pub fn build_config(
    host: &Host,
    service: &EtcdServiceConfig,
    initial_cluster: &str,
) -> (Config<String>, HostConfig) {
    let mut cmd = vec![
        "/usr/local/bin/etcd".to_owned(),
        format!("--name=etcd-{}", host.advertised_hostname),
        "--data-dir=/etcd-data".to_owned(),
        format!(
            "--advertise-client-urls=http://{addr}:{client},http://{addr}:{legacy}",
            addr = host.advertise_address,
            client = CLIENT_PORT,
            legacy = LEGACY_CLIENT_PORT
        ),
        format!("--listen-client-urls=http://0.0.0.0:{}", CLIENT_PORT),
        format!(
            "--initial-advertise-peer-urls=http://{}:{}",
            host.advertise_address, PEER_PORT
        ),
        format!("--listen-peer-urls=http://0.0.0.0:{}", PEER_PORT),
        format!("--initial-cluster-token={}", INITIAL_CLUSTER_TOKEN),
        format!("--initial-cluster={}", initial_cluster),
        "--initial-cluster-state=new".to_owned(),
    ];
    cmd.extend(extra_flags(&service.extra_args));

    let config = Config {
        image: Some(service.image.clone()),
        cmd: Some(cmd),
        ..Default::default()
    };
    let host_config = HostConfig {
        binds: Some(vec![DATA_DIR_BIND.to_owned()]),
        port_bindings: Some(published_ports()),
        restart_policy: Some(RestartPolicy {
            name: Some(RestartPolicyNameEnum::ALWAYS),
            ..Default::default()
        }),
        ..Default::default()
    };
    (config, host_config)
}

fn published_ports() -> PortMap {
    let mut ports = PortMap::new();
    for port in [CLIENT_PORT, PEER_PORT] {
        ports.insert(
            format!("{}/tcp", port),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_owned()),
                host_port: Some(port.to_string()),
            }]),
        );
    }
    ports
}

/// Bring up the consensus-store plane across `hosts`, in order.
///
/// The bootstrap membership list is computed once over the full host list and
/// shared by every member's configuration.
pub async fn run_etcd_plane<R>(
    runtime: &R,
    hosts: &[&Host],
    service: &EtcdServiceConfig,
) -> PlaneReport
where
    R: ContainerRuntime + ?Sized,
{
    let bootstrap = initial_cluster(hosts);
    plane::run_plane(runtime, ServiceRole::Etcd, hosts, |host| {
        build_config(host, service, &bootstrap)
    })
    .await
}

/// Tear down the consensus-store plane across `hosts`, in order.
pub async fn remove_etcd_plane<R>(runtime: &R, hosts: &[&Host]) -> PlaneReport
where
    R: ContainerRuntime + ?Sized,
{
    plane::remove_plane(runtime, ServiceRole::Etcd, hosts).await
}
