//! Container engine CLI client.
//!
//! All engine interactions go through `DockerClient`, which provides
//! consistent timeout handling, error mapping to [`DockerError`], and a single
//! point where the engine command is constructed. The engine binary and
//! endpoint come from [`RuntimeConfig`].

use super::{ContainerRuntime, ContainerSpec, ContainerState, ContainerStatus, DockerError};
use crate::config::RuntimeConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Label attached to every container this crate launches.
pub const MANAGED_LABEL: &str = "org.testservices.managed=true";

/// Client for container engine CLI operations.
#[derive(Debug, Clone)]
pub struct DockerClient {
    config: RuntimeConfig,
}

impl DockerClient {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Client for the process-wide runtime configuration.
    pub fn from_env() -> Self {
        Self::new(RuntimeConfig::global().clone())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn command_string(&self, args: &[&str]) -> String {
        format!("{} {}", self.config.binary, args.join(" "))
    }

    fn command(&self, args: &[&str]) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.config.binary);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(ref endpoint) = self.config.endpoint {
            command.env(self.config.endpoint_env_var(), endpoint);
        }
        command
    }

    /// Run an engine command with a timeout, returning raw Output.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output, DockerError> {
        let mut command = self.command(args);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let result = tokio::time::timeout(timeout, command.output()).await;
        let cmd_str = self.command_string(args);

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DockerError::exec_failed(cmd_str, e)),
            Err(_) => Err(DockerError::timeout(cmd_str, timeout)),
        }
    }

    /// Run an engine command whose stdout and stderr share one capture file.
    ///
    /// Both streams write through the same file description, so the captured
    /// text keeps the order the engine wrote it in. The combined text is
    /// returned as both `stdout` and `stderr` of the Output.
    async fn run_interleaved(&self, args: &[&str], timeout: Duration) -> Result<Output, DockerError> {
        let cmd_str = self.command_string(args);
        let capture_failed = |e: std::io::Error| DockerError::exec_failed(cmd_str.clone(), e);

        let capture = tempfile::tempfile().map_err(capture_failed)?;
        let mut command = self.command(args);
        command
            .stdout(capture.try_clone().map_err(capture_failed)?)
            .stderr(capture.try_clone().map_err(capture_failed)?);

        let status = match tokio::time::timeout(timeout, command.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(capture_failed(e)),
            Err(_) => return Err(DockerError::timeout(cmd_str.clone(), timeout)),
        };
        drop(command);

        let mut capture = tokio::fs::File::from_std(capture);
        let mut combined = Vec::new();
        capture
            .seek(SeekFrom::Start(0))
            .await
            .map_err(capture_failed)?;
        capture
            .read_to_end(&mut combined)
            .await
            .map_err(capture_failed)?;

        Ok(Output {
            status,
            stdout: combined.clone(),
            stderr: combined,
        })
    }

    /// Check if an image exists locally.
    pub async fn image_exists(&self, image: &str) -> bool {
        match self
            .run(&["image", "inspect", image], self.config.command_timeout)
            .await
        {
            Ok(o) => o.status.success(),
            Err(_) => false,
        }
    }

    /// Pull an image.
    pub async fn pull(&self, image: &str) -> Result<(), DockerError> {
        let output = self.run(&["pull", image], self.config.pull_timeout).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        // "up to date" or "already exists" aren't real failures
        if stderr.contains("up to date") || stderr.contains("already exists") {
            return Ok(());
        }
        Err(DockerError::failed(self.command_string(&["pull", image]), &output))
    }

    /// Arguments for `run` that launch `spec` detached.
    pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            spec.name.clone(),
            "--label".to_string(),
            MANAGED_LABEL.to_string(),
        ];
        for port in &spec.ports {
            args.push("-p".to_string());
            args.push(port.publish_arg());
        }
        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        for volume in &spec.volumes {
            args.push("-v".to_string());
            args.push(volume.clone());
        }
        args.push(spec.image.clone());
        args
    }
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::from_env()
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn ping(&self) -> bool {
        match self.run(&["info"], self.config.ping_timeout).await {
            Ok(o) => o.status.success(),
            Err(e) => {
                tracing::debug!("Container engine unreachable: {}", e);
                false
            }
        }
    }

    async fn find(&self, name: &str) -> Result<Option<ContainerState>, DockerError> {
        let args = ["container", "inspect", name];
        let output = self.run(&args, self.config.command_timeout).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
            if stderr.contains("no such container") || stderr.contains("no such object") {
                return Ok(None);
            }
            return Err(DockerError::from_run_failure(
                self.command_string(&args),
                name,
                &output,
            ));
        }
        parse_inspect(&String::from_utf8_lossy(&output.stdout)).map_err(|detail| {
            DockerError::UnexpectedOutput {
                command: self.command_string(&args),
                detail,
            }
        })
    }

    async fn start(&self, spec: &ContainerSpec) -> Result<(), DockerError> {
        if spec.always_pull || !self.image_exists(&spec.image).await {
            tracing::info!("Pulling image '{}'", spec.image);
            self.pull(&spec.image).await?;
        } else {
            tracing::debug!("Image '{}' found locally, skipping pull", spec.image);
        }

        let args = Self::run_args(spec);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs, self.config.command_timeout).await?;
        if !output.status.success() {
            return Err(DockerError::from_run_failure(
                self.command_string(&arg_refs[..2]),
                &spec.name,
                &output,
            ));
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::info!(
            "Started container '{}' ({}) from {}",
            spec.name,
            id.chars().take(12).collect::<String>(),
            spec.image
        );
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<(), DockerError> {
        let args = ["start", name];
        let output = self.run(&args, self.config.command_timeout).await?;
        if output.status.success() {
            tracing::info!("Restarted stopped container '{}'", name);
            return Ok(());
        }
        Err(DockerError::from_run_failure(
            self.command_string(&args),
            name,
            &output,
        ))
    }

    async fn remove(&self, name: &str) -> Result<(), DockerError> {
        let args = ["rm", "-f", name];
        let output = self.run(&args, self.config.command_timeout).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if stderr.contains("no such container") {
            return Ok(());
        }
        Err(DockerError::failed(self.command_string(&args), &output))
    }

    async fn logs(&self, name: &str, tail: Option<usize>) -> Result<String, DockerError> {
        let tail_str = tail.map(|t| t.to_string());
        let mut args = vec!["logs"];
        if let Some(ref t) = tail_str {
            args.push("--tail");
            args.push(t);
        }
        args.push(name);

        // Entrypoints print to stdout while database servers log to stderr,
        // and readiness phrases must be matched in the order they were written.
        let output = self
            .run_interleaved(&args, self.config.command_timeout)
            .await?;
        if !output.status.success() {
            return Err(DockerError::from_run_failure(
                self.command_string(&args),
                name,
                &output,
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn describe(&self) -> String {
        self.config.describe()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedContainer {
    id: String,
    name: String,
    #[serde(default)]
    config: Option<InspectedConfig>,
    state: InspectedState,
    #[serde(default)]
    network_settings: Option<InspectedNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedConfig {
    #[serde(default)]
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedState {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedNetwork {
    #[serde(default)]
    ports: Option<HashMap<String, Option<Vec<InspectedBinding>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedBinding {
    #[serde(default)]
    host_port: String,
}

/// Parse `container inspect` output (a JSON array) into a [`ContainerState`].
fn parse_inspect(json: &str) -> Result<Option<ContainerState>, String> {
    let containers: Vec<InspectedContainer> =
        serde_json::from_str(json.trim()).map_err(|e| e.to_string())?;
    let Some(container) = containers.into_iter().next() else {
        return Ok(None);
    };

    let mut ports = HashMap::new();
    let bindings = container
        .network_settings
        .and_then(|n| n.ports)
        .unwrap_or_default();
    for (container_port, bindings) in bindings {
        // Keys look like "5432/tcp"
        let Some(port) = container_port
            .split('/')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
        else {
            continue;
        };
        let host_port = bindings
            .unwrap_or_default()
            .iter()
            .find_map(|b| b.host_port.parse::<u16>().ok());
        if let Some(host_port) = host_port {
            ports.insert(port, host_port);
        }
    }

    Ok(Some(ContainerState {
        id: container.id,
        name: container.name.trim_start_matches('/').to_string(),
        image: container.config.map(|c| c.image).unwrap_or_default(),
        status: ContainerStatus::parse(&container.state.status),
        ports,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::PortMapping;

    const DOCKER_INSPECT: &str = r#"[
        {
            "Id": "4f2a9c1e",
            "Name": "/pg-test",
            "State": {"Status": "running", "Running": true},
            "Config": {"Image": "postgres:16", "Env": ["POSTGRES_USER=postgres"]},
            "NetworkSettings": {
                "Ports": {
                    "5432/tcp": [{"HostIp": "127.0.0.1", "HostPort": "49153"}],
                    "8080/tcp": null
                }
            }
        }
    ]"#;

    #[test]
    fn test_parse_inspect_running_container() {
        let state = parse_inspect(DOCKER_INSPECT).unwrap().unwrap();
        assert_eq!(state.id, "4f2a9c1e");
        assert_eq!(state.name, "pg-test");
        assert_eq!(state.image, "postgres:16");
        assert_eq!(state.status, ContainerStatus::Running);
        assert_eq!(state.host_port(5432), Some(49153));
        assert_eq!(state.host_port(8080), None);
    }

    #[test]
    fn test_parse_inspect_stopped_container_without_ports() {
        let json = r#"[{"Id": "x", "Name": "pg-test", "State": {"Status": "exited"},
                        "NetworkSettings": {"Ports": {}}}]"#;
        let state = parse_inspect(json).unwrap().unwrap();
        assert_eq!(state.status, ContainerStatus::Exited);
        assert!(state.ports.is_empty());
        assert!(state.image.is_empty());
    }

    #[test]
    fn test_parse_inspect_empty_and_garbage() {
        assert_eq!(parse_inspect("[]").unwrap(), None);
        assert!(parse_inspect("not json").is_err());
    }

    #[test]
    fn test_run_args_include_name_ports_env_and_image_last() {
        let spec = ContainerSpec::new("pg-test", "postgres:16", 5432)
            .with_ports(vec![PortMapping::fixed(15432, 5432)])
            .with_env("POSTGRES_PASSWORD", "secret")
            .with_volume("pgdata:/var/lib/postgresql/data");
        let args = DockerClient::run_args(&spec);

        assert_eq!(&args[..4], &["run", "-d", "--name", "pg-test"]);
        assert!(args.windows(2).any(|w| w == ["-p", "127.0.0.1:15432:5432"]));
        assert!(args.windows(2).any(|w| w == ["-e", "POSTGRES_PASSWORD=secret"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["-v", "pgdata:/var/lib/postgresql/data"]));
        assert!(args.windows(2).any(|w| w == ["--label", MANAGED_LABEL]));
        assert_eq!(args.last().map(String::as_str), Some("postgres:16"));
    }

    /// Write an executable shell script standing in for the engine CLI.
    #[cfg(unix)]
    fn fake_engine(dir: &std::path::Path, body: &str) -> RuntimeConfig {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-engine");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{}", body).unwrap();
        file.sync_all().unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        RuntimeConfig::new(path.to_string_lossy())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_logs_keep_stream_interleaving() {
        let dir = tempfile::tempdir().unwrap();
        // The server logs readiness on stderr before the entrypoint's stdout line
        let client = DockerClient::new(fake_engine(
            dir.path(),
            r#"echo "LOG:  database system is ready to accept connections" >&2
echo "PostgreSQL init process complete; ready for start up."
echo "LOG:  database system is shut down" >&2"#,
        ));

        let log = client.logs("pg-test", None).await.unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(
            lines,
            vec![
                "LOG:  database system is ready to accept connections",
                "PostgreSQL init process complete; ready for start up.",
                "LOG:  database system is shut down",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_logs_report_engine_message() {
        let dir = tempfile::tempdir().unwrap();
        let client = DockerClient::new(fake_engine(
            dir.path(),
            r#"echo "Error response from daemon: No such container: pg-test" >&2
exit 1"#,
        ));

        let err = client.logs("pg-test", None).await.unwrap_err();
        assert!(
            matches!(err, DockerError::ContainerNotFound { ref container } if container == "pg-test"),
            "{:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_missing_engine_binary_is_unreachable() {
        let client = DockerClient::new(RuntimeConfig::new("testservices-no-such-engine"));
        assert!(!client.ping().await);
        assert!(!client.running("pg-test").await);
        let err = client.find("pg-test").await.unwrap_err();
        assert!(matches!(err, DockerError::ExecFailed { .. }));
    }
}
