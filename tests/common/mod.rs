// Shared fakes for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use testservices::docker::{ContainerState, ContainerStatus};
use testservices::port::free_port;
use testservices::service::Availability;
use testservices::{ConnectionHandle, ContainerRuntime, ContainerSpec, DockerError, Service};

#[derive(Debug, Clone)]
struct FakeContainer {
    image: String,
    status: ContainerStatus,
    ports: HashMap<u16, u16>,
}

/// In-memory container engine.
///
/// Starting a container binds a real loopback listener for its readiness
/// port (optionally after a delay) so the Port Waiter has something to
/// connect to.
pub struct FakeRuntime {
    reachable: bool,
    listen_delay: Duration,
    log: String,
    containers: Mutex<HashMap<String, FakeContainer>>,
    listeners: Arc<Mutex<Vec<TcpListener>>>,
    starts: Mutex<usize>,
    restarts: Mutex<usize>,
    removes: Mutex<usize>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            reachable: true,
            listen_delay: Duration::ZERO,
            log: String::new(),
            containers: Mutex::new(HashMap::new()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            starts: Mutex::new(0),
            restarts: Mutex::new(0),
            removes: Mutex::new(0),
        }
    }

    /// An engine that never answers a ping.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    /// Readiness ports start accepting only after `delay`.
    pub fn with_listen_delay(mut self, delay: Duration) -> Self {
        self.listen_delay = delay;
        self
    }

    /// Log text every container reports.
    pub fn with_log(mut self, log: &str) -> Self {
        self.log = log.to_string();
        self
    }

    pub fn starts(&self) -> usize {
        *self.starts.lock()
    }

    pub fn restarts(&self) -> usize {
        *self.restarts.lock()
    }

    pub fn removes(&self) -> usize {
        *self.removes.lock()
    }

    /// Number of containers in the running state.
    pub fn running_count(&self) -> usize {
        self.containers
            .lock()
            .values()
            .filter(|c| c.status.is_running())
            .count()
    }

    pub fn host_port(&self, name: &str, container_port: u16) -> Option<u16> {
        self.containers
            .lock()
            .get(name)
            .and_then(|c| c.ports.get(&container_port).copied())
    }

    /// Mark a container as exited, as if it had been stopped.
    pub fn stop(&self, name: &str) {
        if let Some(container) = self.containers.lock().get_mut(name) {
            container.status = ContainerStatus::Exited;
        }
    }

    fn listen(&self, port: u16) {
        let listeners = Arc::clone(&self.listeners);
        let delay = self.listen_delay;
        let bind = move || {
            let listener = TcpListener::bind(("127.0.0.1", port)).expect("bind fake container port");
            listeners.lock().push(listener);
        };
        if delay.is_zero() {
            bind();
        } else {
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                bind();
            });
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> bool {
        self.reachable
    }

    async fn find(&self, name: &str) -> Result<Option<ContainerState>, DockerError> {
        if !self.reachable {
            return Err(DockerError::DaemonUnavailable);
        }
        Ok(self.containers.lock().get(name).map(|c| ContainerState {
            id: format!("fake-{}", name),
            name: name.to_string(),
            image: c.image.clone(),
            status: c.status,
            ports: c.ports.clone(),
        }))
    }

    async fn start(&self, spec: &ContainerSpec) -> Result<(), DockerError> {
        if self.containers.lock().contains_key(&spec.name) {
            return Err(DockerError::NameInUse {
                container: spec.name.clone(),
            });
        }
        *self.starts.lock() += 1;

        let mut ports = HashMap::new();
        for mapping in &spec.ports {
            let host = match mapping.host {
                Some(host) => host,
                None => free_port().expect("free port"),
            };
            ports.insert(mapping.container, host);
        }
        if let Some(&host) = ports.get(&spec.ready_port) {
            self.listen(host);
        }

        self.containers.lock().insert(
            spec.name.clone(),
            FakeContainer {
                image: spec.image.clone(),
                status: ContainerStatus::Running,
                ports,
            },
        );
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<(), DockerError> {
        *self.restarts.lock() += 1;
        match self.containers.lock().get_mut(name) {
            Some(container) => {
                container.status = ContainerStatus::Running;
                Ok(())
            }
            None => Err(DockerError::ContainerNotFound {
                container: name.to_string(),
            }),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), DockerError> {
        *self.removes.lock() += 1;
        self.containers.lock().remove(name);
        Ok(())
    }

    async fn logs(&self, _name: &str, _tail: Option<usize>) -> Result<String, DockerError> {
        Ok(self.log.clone())
    }

    fn describe(&self) -> String {
        "fake engine".to_string()
    }
}

/// A candidate that fails the test if the provider touches it at all.
pub struct Untouchable(pub &'static str);

#[async_trait]
impl Service for Untouchable {
    fn name(&self) -> &str {
        self.0
    }

    async fn availability(&self) -> testservices::Result<Availability> {
        panic!("candidate '{}' must not be queried", self.0)
    }

    async fn exists(&self) -> testservices::Result<bool> {
        panic!("candidate '{}' must not be queried", self.0)
    }

    async fn create(&self) -> testservices::Result<()> {
        panic!("candidate '{}' must not be created", self.0)
    }

    async fn get(&self) -> testservices::Result<ConnectionHandle> {
        panic!("candidate '{}' must not be resolved", self.0)
    }
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    free_port().expect("free port")
}

/// Write an executable shell script that stands in for the engine CLI.
#[cfg(unix)]
pub fn fake_engine(dir: &std::path::Path, body: &str) -> testservices::RuntimeConfig {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-engine");
    let mut file = std::fs::File::create(&path).expect("create fake engine");
    writeln!(file, "#!/bin/sh\n{}", body).expect("write fake engine");
    file.sync_all().expect("sync fake engine");
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake engine");
    testservices::RuntimeConfig::new(path.to_string_lossy())
}
