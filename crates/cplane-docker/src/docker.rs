//! ---
//! cp_section: "02-container-runtime"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Container runtime seam and Docker Engine implementation."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    RenameContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, HostConfig};
use bollard::Docker;
use cplane_common::Host;
use futures::TryStreamExt;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::runtime::{ContainerFacts, ContainerRuntime, RuntimeError};

/// Seconds the engine waits for a container to exit before killing it.
const STOP_GRACE_SECS: i64 = 10;

/// Seconds allowed for engine API calls before the client gives up.
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Default engine port when a host declares no explicit endpoint.
const DEFAULT_ENGINE_PORT: u16 = 2375;

#[derive(Debug, PartialEq, Eq)]
enum Endpoint {
    LocalSocket,
    Http(String),
    Socket(String),
}

fn endpoint_for(host: &Host) -> Endpoint {
    match &host.docker_endpoint {
        Some(endpoint) if endpoint.starts_with("unix://") => Endpoint::Socket(endpoint.clone()),
        Some(endpoint) => Endpoint::Http(endpoint.clone()),
        None if is_loopback(&host.advertise_address) => Endpoint::LocalSocket,
        None => Endpoint::Http(format!(
            "tcp://{}:{}",
            host.advertise_address, DEFAULT_ENGINE_PORT
        )),
    }
}

fn is_loopback(address: &str) -> bool {
    address == "localhost"
        || address
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

fn facts_from(details: ContainerInspectResponse) -> ContainerFacts {
    let image = details.config.as_ref().and_then(|c| c.image.clone());
    let state = details.state.as_ref();
    ContainerFacts {
        image,
        status: state.and_then(|s| s.status.as_ref()).map(|s| s.to_string()),
        running: state.and_then(|s| s.running).unwrap_or(false),
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// [`ContainerRuntime`] implementation over per-host Docker engines.
///
/// Clients are created lazily and cached per advertised hostname; the engine
/// endpoint comes from the host entry, defaulting to plain TCP on the
/// advertise address and the local socket for loopback hosts.
pub struct DockerRuntime {
    clients: Mutex<HashMap<String, Docker>>,
}

impl DockerRuntime {
    /// Create a runtime with an empty client cache.
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, host: &Host) -> Result<Docker, RuntimeError> {
        if let Some(client) = self.clients.lock().get(&host.advertised_hostname) {
            return Ok(client.clone());
        }
        let client = Self::connect(host)?;
        self.clients
            .lock()
            .insert(host.advertised_hostname.clone(), client.clone());
        Ok(client)
    }

    fn connect(host: &Host) -> Result<Docker, RuntimeError> {
        let endpoint = endpoint_for(host);
        debug!(host = %host.advertised_hostname, endpoint = ?endpoint, "connecting docker client");
        let connected = match &endpoint {
            Endpoint::LocalSocket => Docker::connect_with_local_defaults(),
            Endpoint::Http(address) => {
                Docker::connect_with_http(address, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            Endpoint::Socket(path) => {
                Docker::connect_with_socket(path, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
        };
        connected.map_err(|source| RuntimeError::Connect {
            host: host.advertised_hostname.clone(),
            source,
        })
    }

    async fn inspect_existing(
        &self,
        docker: &Docker,
        host: &Host,
        name: &str,
    ) -> Result<Option<ContainerFacts>, RuntimeError> {
        match docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => Ok(Some(facts_from(details))),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(source) => Err(RuntimeError::Container {
                host: host.advertised_hostname.clone(),
                name: name.to_owned(),
                operation: "inspect",
                source,
            }),
        }
    }

    async fn remove_if_present(
        &self,
        docker: &Docker,
        host: &Host,
        name: &str,
    ) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match docker.remove_container(name, Some(options)).await {
            Ok(()) => {
                info!(host = %host.advertised_hostname, container = %name, "container removed");
                Ok(())
            }
            Err(err) if is_not_found(&err) => {
                debug!(host = %host.advertised_hostname, container = %name, "container already absent");
                Ok(())
            }
            Err(source) => Err(RuntimeError::Container {
                host: host.advertised_hostname.clone(),
                name: name.to_owned(),
                operation: "remove",
                source,
            }),
        }
    }

    async fn ensure_image(
        &self,
        docker: &Docker,
        host: &Host,
        image: &str,
    ) -> Result<(), RuntimeError> {
        match docker.inspect_image(image).await {
            Ok(_) => {
                debug!(host = %host.advertised_hostname, image = %image, "image already present");
                return Ok(());
            }
            Err(err) if is_not_found(&err) => {}
            Err(source) => {
                return Err(RuntimeError::Pull {
                    host: host.advertised_hostname.clone(),
                    image: image.to_owned(),
                    source,
                })
            }
        }

        info!(host = %host.advertised_hostname, image = %image, "pulling image");
        let options = CreateImageOptions {
            from_image: image.to_owned(),
            ..Default::default()
        };
        docker
            .create_image(Some(options), None, None)
            .try_for_each(|_progress| async { Ok(()) })
            .await
            .map_err(|source| RuntimeError::Pull {
                host: host.advertised_hostname.clone(),
                image: image.to_owned(),
                source,
            })?;
        debug!(host = %host.advertised_hostname, image = %image, "image pulled");
        Ok(())
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_and_start(
        &self,
        host: &Host,
        name: &str,
        mut config: Config<String>,
        host_config: HostConfig,
    ) -> Result<(), RuntimeError> {
        let docker = self.client_for(host)?;

        match self.inspect_existing(&docker, host, name).await? {
            Some(facts) if facts.running => {
                info!(host = %host.advertised_hostname, container = %name, "container already running");
                return Ok(());
            }
            Some(facts) => {
                debug!(
                    host = %host.advertised_hostname,
                    container = %name,
                    status = facts.status.as_deref().unwrap_or("unknown"),
                    "removing stopped leftover before recreate"
                );
                self.remove_if_present(&docker, host, name).await?;
            }
            None => {}
        }

        if let Some(image) = config.image.clone() {
            self.ensure_image(&docker, host, &image).await?;
        }

        config.host_config = Some(host_config);
        let options = CreateContainerOptions {
            name: name.to_owned(),
            platform: None,
        };
        docker
            .create_container(Some(options), config)
            .await
            .map_err(|source| RuntimeError::Container {
                host: host.advertised_hostname.clone(),
                name: name.to_owned(),
                operation: "create",
                source,
            })?;
        docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|source| RuntimeError::Container {
                host: host.advertised_hostname.clone(),
                name: name.to_owned(),
                operation: "start",
                source,
            })?;
        info!(host = %host.advertised_hostname, container = %name, "container started");
        Ok(())
    }

    async fn remove(&self, host: &Host, name: &str) -> Result<(), RuntimeError> {
        let docker = self.client_for(host)?;
        self.remove_if_present(&docker, host, name).await
    }

    async fn inspect(&self, host: &Host, name: &str) -> Result<ContainerFacts, RuntimeError> {
        let docker = self.client_for(host)?;
        self.inspect_existing(&docker, host, name)
            .await?
            .ok_or_else(|| RuntimeError::Missing {
                host: host.advertised_hostname.clone(),
                name: name.to_owned(),
            })
    }

    async fn stop_and_rename(
        &self,
        host: &Host,
        name: &str,
        new_name: &str,
    ) -> Result<(), RuntimeError> {
        let docker = self.client_for(host)?;
        docker
            .stop_container(name, Some(StopContainerOptions { t: STOP_GRACE_SECS }))
            .await
            .map_err(|source| RuntimeError::Container {
                host: host.advertised_hostname.clone(),
                name: name.to_owned(),
                operation: "stop",
                source,
            })?;
        docker
            .rename_container(
                name,
                RenameContainerOptions {
                    name: new_name.to_owned(),
                },
            )
            .await
            .map_err(|source| RuntimeError::Container {
                host: host.advertised_hostname.clone(),
                name: name.to_owned(),
                operation: "rename",
                source,
            })?;
        info!(
            host = %host.advertised_hostname,
            container = %name,
            renamed_to = %new_name,
            "container stopped and renamed"
        );
        Ok(())
    }
}
