//! ---
//! cp_section: "03-service-lifecycle"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Behavioral coverage for plane loops and guarded upgrades."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use std::collections::HashSet;

use async_trait::async_trait;
use bollard::container::Config;
use bollard::models::HostConfig;
use cplane_common::{EtcdServiceConfig, Host, HostRole, KubeControllerServiceConfig};
use cplane_docker::{ContainerFacts, ContainerRuntime, RuntimeError};
use cplane_services::{etcd, kube_controller, upgrade, ServiceError, ServiceRole, UpgradeOutcome};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    CreateStart { host: String, name: String },
    Remove { host: String, name: String },
    Inspect { host: String, name: String },
    StopRename { host: String, name: String, new_name: String },
}

/// In-memory runtime fake recording every lifecycle call in order.
///
/// `running_image` is what `inspect` reports for any container; `None` makes
/// every container look absent. Failures are scripted per hostname.
#[derive(Default)]
struct RecordingRuntime {
    journal: Mutex<Vec<Call>>,
    running_image: Mutex<Option<String>>,
    fail_create_on: Mutex<HashSet<String>>,
    fail_rename_on: Mutex<HashSet<String>>,
    fail_remove_on: Mutex<HashSet<String>>,
}

impl RecordingRuntime {
    fn new() -> Self {
        Self::default()
    }

    fn with_running_image(image: &str) -> Self {
        let runtime = Self::default();
        *runtime.running_image.lock() = Some(image.to_owned());
        runtime
    }

    fn fail_create(self, hostname: &str) -> Self {
        self.fail_create_on.lock().insert(hostname.to_owned());
        self
    }

    fn fail_rename(self, hostname: &str) -> Self {
        self.fail_rename_on.lock().insert(hostname.to_owned());
        self
    }

    fn fail_remove(self, hostname: &str) -> Self {
        self.fail_remove_on.lock().insert(hostname.to_owned());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.journal.lock().clone()
    }
}

fn scripted_failure(host: &str, name: &str, operation: &'static str) -> RuntimeError {
    RuntimeError::Container {
        host: host.to_owned(),
        name: name.to_owned(),
        operation,
        source: bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "scripted failure".to_owned(),
        },
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn create_and_start(
        &self,
        host: &Host,
        name: &str,
        _config: Config<String>,
        _host_config: HostConfig,
    ) -> Result<(), RuntimeError> {
        self.journal.lock().push(Call::CreateStart {
            host: host.advertised_hostname.clone(),
            name: name.to_owned(),
        });
        if self
            .fail_create_on
            .lock()
            .contains(host.advertised_hostname.as_str())
        {
            return Err(scripted_failure(&host.advertised_hostname, name, "create"));
        }
        Ok(())
    }

    async fn remove(&self, host: &Host, name: &str) -> Result<(), RuntimeError> {
        self.journal.lock().push(Call::Remove {
            host: host.advertised_hostname.clone(),
            name: name.to_owned(),
        });
        if self
            .fail_remove_on
            .lock()
            .contains(host.advertised_hostname.as_str())
        {
            return Err(scripted_failure(&host.advertised_hostname, name, "remove"));
        }
        Ok(())
    }

    async fn inspect(&self, host: &Host, name: &str) -> Result<ContainerFacts, RuntimeError> {
        self.journal.lock().push(Call::Inspect {
            host: host.advertised_hostname.clone(),
            name: name.to_owned(),
        });
        match self.running_image.lock().clone() {
            Some(image) => Ok(ContainerFacts {
                image: Some(image),
                status: Some("running".to_owned()),
                running: true,
            }),
            None => Err(RuntimeError::Missing {
                host: host.advertised_hostname.clone(),
                name: name.to_owned(),
            }),
        }
    }

    async fn stop_and_rename(
        &self,
        host: &Host,
        name: &str,
        new_name: &str,
    ) -> Result<(), RuntimeError> {
        self.journal.lock().push(Call::StopRename {
            host: host.advertised_hostname.clone(),
            name: name.to_owned(),
            new_name: new_name.to_owned(),
        });
        if self
            .fail_rename_on
            .lock()
            .contains(host.advertised_hostname.as_str())
        {
            return Err(scripted_failure(&host.advertised_hostname, name, "rename"));
        }
        Ok(())
    }
}

fn host(hostname: &str, address: &str) -> Host {
    Host {
        advertised_hostname: hostname.to_owned(),
        advertise_address: address.to_owned(),
        roles: vec![HostRole::Etcd, HostRole::Controlplane],
        docker_endpoint: None,
    }
}

fn etcd_service() -> EtcdServiceConfig {
    EtcdServiceConfig {
        image: "quay.io/coreos/etcd:latest".to_owned(),
        extra_args: Default::default(),
    }
}

fn controller_service(image: &str) -> KubeControllerServiceConfig {
    KubeControllerServiceConfig {
        image: image.to_owned(),
        cluster_cidr: "10.42.0.0/16".to_owned(),
        service_cluster_ip_range: "10.43.0.0/16".to_owned(),
        extra_args: Default::default(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_plane_reports_every_host_on_success() {
    let runtime = RecordingRuntime::new();
    let (h1, h2, h3) = (
        host("h1", "10.0.0.1"),
        host("h2", "10.0.0.2"),
        host("h3", "10.0.0.3"),
    );

    let report = etcd::run_etcd_plane(&runtime, &[&h1, &h2, &h3], &etcd_service()).await;

    assert!(report.is_success());
    assert_eq!(report.completed, vec!["h1", "h2", "h3"]);
    assert_eq!(
        runtime.calls(),
        vec![
            Call::CreateStart {
                host: "h1".to_owned(),
                name: "etcd".to_owned()
            },
            Call::CreateStart {
                host: "h2".to_owned(),
                name: "etcd".to_owned()
            },
            Call::CreateStart {
                host: "h3".to_owned(),
                name: "etcd".to_owned()
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_plane_stops_at_the_first_failing_host() {
    let runtime = RecordingRuntime::new().fail_create("h2");
    let (h1, h2, h3) = (
        host("h1", "10.0.0.1"),
        host("h2", "10.0.0.2"),
        host("h3", "10.0.0.3"),
    );

    let report = etcd::run_etcd_plane(&runtime, &[&h1, &h2, &h3], &etcd_service()).await;

    assert_eq!(report.completed, vec!["h1"]);
    let failure = report.failed.expect("second host fails");
    assert_eq!(failure.hostname, "h2");
    assert!(matches!(
        failure.error,
        ServiceError::RunFailed { ref host, .. } if host == "h2"
    ));
    // Third host is never visited.
    assert_eq!(runtime.calls().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remove_plane_stops_at_the_first_failing_host() {
    let runtime = RecordingRuntime::new().fail_remove("h2");
    let (h1, h2, h3) = (
        host("h1", "10.0.0.1"),
        host("h2", "10.0.0.2"),
        host("h3", "10.0.0.3"),
    );

    let report = etcd::remove_etcd_plane(&runtime, &[&h1, &h2, &h3]).await;

    assert_eq!(report.completed, vec!["h1"]);
    let failure = report.failed.expect("second host fails");
    assert_eq!(failure.hostname, "h2");
    assert!(matches!(failure.error, ServiceError::RemoveFailed { .. }));
    assert_eq!(
        runtime.calls(),
        vec![
            Call::Remove {
                host: "h1".to_owned(),
                name: "etcd".to_owned()
            },
            Call::Remove {
                host: "h2".to_owned(),
                name: "etcd".to_owned()
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_host_controller_run_uses_the_canonical_name() {
    let runtime = RecordingRuntime::new();
    let h1 = host("h1", "10.0.0.1");

    kube_controller::run_kube_controller(
        &runtime,
        &h1,
        &controller_service("rancher/k8s:v1.8.3-rancher2"),
    )
    .await
    .expect("run succeeds");

    assert_eq!(
        runtime.calls(),
        vec![Call::CreateStart {
            host: "h1".to_owned(),
            name: "kube-controller-manager".to_owned()
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn upgrade_is_a_noop_when_the_image_matches() {
    let runtime = RecordingRuntime::with_running_image("rancher/k8s:v1.8.3-rancher2");
    let h1 = host("h1", "10.0.0.1");

    let outcome =
        kube_controller::upgrade_kube_controller(&runtime, &h1, &controller_service("rancher/k8s:v1.8.3-rancher2"))
            .await
            .expect("upgrade succeeds");

    assert_eq!(outcome, UpgradeOutcome::AlreadyCurrent);
    assert_eq!(
        runtime.calls(),
        vec![Call::Inspect {
            host: "h1".to_owned(),
            name: "kube-controller-manager".to_owned()
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn upgrade_runs_park_deploy_cleanup_in_order() {
    let runtime = RecordingRuntime::with_running_image("rancher/k8s:v1.8.2-rancher1");
    let h1 = host("h1", "10.0.0.1");

    let outcome =
        kube_controller::upgrade_kube_controller(&runtime, &h1, &controller_service("rancher/k8s:v1.8.3-rancher2"))
            .await
            .expect("upgrade succeeds");

    assert_eq!(outcome, UpgradeOutcome::Replaced);
    assert_eq!(
        runtime.calls(),
        vec![
            Call::Inspect {
                host: "h1".to_owned(),
                name: "kube-controller-manager".to_owned()
            },
            Call::StopRename {
                host: "h1".to_owned(),
                name: "kube-controller-manager".to_owned(),
                new_name: "old-kube-controller-manager".to_owned()
            },
            Call::CreateStart {
                host: "h1".to_owned(),
                name: "kube-controller-manager".to_owned()
            },
            Call::Remove {
                host: "h1".to_owned(),
                name: "old-kube-controller-manager".to_owned()
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deploy_failure_keeps_the_rescue_container() {
    let runtime =
        RecordingRuntime::with_running_image("rancher/k8s:v1.8.2-rancher1").fail_create("h1");
    let h1 = host("h1", "10.0.0.1");

    let err = kube_controller::upgrade_kube_controller(
        &runtime,
        &h1,
        &controller_service("rancher/k8s:v1.8.3-rancher2"),
    )
    .await
    .expect_err("deploy fails");

    assert!(matches!(
        err,
        ServiceError::DeployFailed { ref rescue, .. } if rescue == "old-kube-controller-manager"
    ));
    let calls = runtime.calls();
    assert!(matches!(calls.last(), Some(Call::CreateStart { .. })));
    assert!(!calls
        .iter()
        .any(|call| matches!(call, Call::Remove { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rename_failure_aborts_before_deploying() {
    let runtime =
        RecordingRuntime::with_running_image("rancher/k8s:v1.8.2-rancher1").fail_rename("h1");
    let h1 = host("h1", "10.0.0.1");

    let err = kube_controller::upgrade_kube_controller(
        &runtime,
        &h1,
        &controller_service("rancher/k8s:v1.8.3-rancher2"),
    )
    .await
    .expect_err("rename fails");

    assert!(matches!(err, ServiceError::RenameFailed { .. }));
    assert_eq!(runtime.calls().len(), 2);
    assert!(!runtime
        .calls()
        .iter()
        .any(|call| matches!(call, Call::CreateStart { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cleanup_failure_is_reported_while_the_replacement_lives() {
    let runtime =
        RecordingRuntime::with_running_image("rancher/k8s:v1.8.2-rancher1").fail_remove("h1");
    let h1 = host("h1", "10.0.0.1");

    let err = kube_controller::upgrade_kube_controller(
        &runtime,
        &h1,
        &controller_service("rancher/k8s:v1.8.3-rancher2"),
    )
    .await
    .expect_err("cleanup fails");

    assert!(matches!(
        err,
        ServiceError::CleanupFailed { ref rescue, .. } if rescue == "old-kube-controller-manager"
    ));
    // The replacement was deployed before cleanup was attempted.
    let calls = runtime.calls();
    let deploy_at = calls
        .iter()
        .position(|call| matches!(call, Call::CreateStart { .. }))
        .expect("deploy happened");
    let cleanup_at = calls
        .iter()
        .position(|call| matches!(call, Call::Remove { .. }))
        .expect("cleanup attempted");
    assert!(deploy_at < cleanup_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn upgrade_of_an_absent_container_surfaces_inspect_failure() {
    let runtime = RecordingRuntime::new();
    let h1 = host("h1", "10.0.0.1");

    let err = kube_controller::upgrade_kube_controller(
        &runtime,
        &h1,
        &controller_service("rancher/k8s:v1.8.3-rancher2"),
    )
    .await
    .expect_err("nothing to inspect");

    assert!(matches!(err, ServiceError::InspectFailed { .. }));
    assert_eq!(runtime.calls().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn plane_upgrade_visits_every_host_despite_failures() {
    let runtime =
        RecordingRuntime::with_running_image("rancher/k8s:v1.8.2-rancher1").fail_create("h2");
    let (h1, h2, h3) = (
        host("h1", "10.0.0.1"),
        host("h2", "10.0.0.2"),
        host("h3", "10.0.0.3"),
    );

    let report = kube_controller::upgrade_control_plane(
        &runtime,
        &[&h1, &h2, &h3],
        &controller_service("rancher/k8s:v1.8.3-rancher2"),
    )
    .await;

    assert!(!report.is_success());
    let upgraded: Vec<&str> = report
        .outcomes
        .iter()
        .map(|entry| entry.hostname.as_str())
        .collect();
    assert_eq!(upgraded, vec!["h1", "h3"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].hostname, "h2");
    assert!(matches!(
        report.failures[0].error,
        ServiceError::DeployFailed { .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn upgrade_engine_is_role_generic() {
    let runtime = RecordingRuntime::with_running_image("quay.io/coreos/etcd:v3.0.17");
    let h1 = host("h1", "10.0.0.1");
    let service = etcd_service();

    let outcome = upgrade::upgrade_host(
        &runtime,
        ServiceRole::Etcd,
        &h1,
        &service.image,
        |member| etcd::build_config(member, &service, ""),
    )
    .await
    .expect("upgrade succeeds");

    assert_eq!(outcome, UpgradeOutcome::Replaced);
    assert!(runtime.calls().contains(&Call::StopRename {
        host: "h1".to_owned(),
        name: "etcd".to_owned(),
        new_name: "old-etcd".to_owned()
    }));
}
