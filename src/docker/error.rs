use std::fmt;
use std::time::Duration;

/// Structured error type for container engine CLI operations.
///
/// Container-backed services fold these into `Error::Provisioning`, keeping
/// the engine's own message.
#[derive(Debug)]
pub enum DockerError {
    /// Engine command timed out.
    Timeout { command: String, timeout: Duration },

    /// Engine command ran but returned non-zero exit.
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    /// Engine binary couldn't be executed (not in PATH, permission denied).
    ExecFailed {
        command: String,
        source: std::io::Error,
    },

    /// Container doesn't exist (parsed from "No such container" stderr).
    ContainerNotFound { container: String },

    /// Another container already owns the name (lost a concurrent create race).
    NameInUse { container: String },

    /// Engine daemon not responding.
    DaemonUnavailable,

    /// Engine output could not be understood.
    UnexpectedOutput { command: String, detail: String },
}

impl DockerError {
    /// Create a timeout error.
    pub fn timeout(cmd: impl Into<String>, dur: Duration) -> Self {
        DockerError::Timeout {
            command: cmd.into(),
            timeout: dur,
        }
    }

    /// Create a command-failed error from an `std::process::Output`.
    pub fn failed(cmd: impl Into<String>, output: &std::process::Output) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        DockerError::CommandFailed {
            command: cmd.into(),
            stderr,
            exit_code: output.status.code(),
        }
    }

    /// Create an exec-failed error (binary not found / permission denied).
    pub fn exec_failed(cmd: impl Into<String>, err: std::io::Error) -> Self {
        DockerError::ExecFailed {
            command: cmd.into(),
            source: err,
        }
    }

    /// Classify a failed `run`/`start` by the engine's stderr.
    pub(crate) fn from_run_failure(
        cmd: impl Into<String>,
        container: &str,
        output: &std::process::Output,
    ) -> Self {
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if stderr.contains("is already in use") {
            DockerError::NameInUse {
                container: container.to_string(),
            }
        } else if stderr.contains("cannot connect to the docker daemon")
            || stderr.contains("is the docker daemon running")
            || stderr.contains("unable to connect to podman")
        {
            DockerError::DaemonUnavailable
        } else if stderr.contains("no such container") {
            DockerError::ContainerNotFound {
                container: container.to_string(),
            }
        } else {
            DockerError::failed(cmd, output)
        }
    }
}

impl fmt::Display for DockerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockerError::Timeout { command, timeout } => {
                write!(
                    f,
                    "Timed out running '{}' (exceeded {} seconds)",
                    command,
                    timeout.as_secs()
                )
            }
            DockerError::CommandFailed {
                command,
                stderr,
                exit_code,
            } => {
                if let Some(code) = exit_code {
                    write!(f, "'{}' failed (exit code {}): {}", command, code, stderr)
                } else {
                    write!(f, "'{}' failed: {}", command, stderr)
                }
            }
            DockerError::ExecFailed { command, source } => {
                write!(f, "Failed to execute '{}': {}", command, source)
            }
            DockerError::ContainerNotFound { container } => {
                write!(f, "No such container: {}", container)
            }
            DockerError::NameInUse { container } => {
                write!(f, "Container name '{}' is already in use", container)
            }
            DockerError::DaemonUnavailable => {
                write!(f, "Container engine daemon is not responding")
            }
            DockerError::UnexpectedOutput { command, detail } => {
                write!(f, "Unexpected output from '{}': {}", command, detail)
            }
        }
    }
}

impl std::error::Error for DockerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DockerError::ExecFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{ExitStatus, Output};

    #[cfg(unix)]
    fn failed_output(stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: ExitStatus::from_raw(125 << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_classifies_name_conflict() {
        let output = failed_output(
            "docker: Error response from daemon: Conflict. The container name \"/pg-test\" is already in use by container \"abc\".",
        );
        let err = DockerError::from_run_failure("docker run", "pg-test", &output);
        assert!(matches!(err, DockerError::NameInUse { ref container } if container == "pg-test"));
    }

    #[cfg(unix)]
    #[test]
    fn test_classifies_daemon_down() {
        let output = failed_output(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
        );
        let err = DockerError::from_run_failure("docker run", "pg-test", &output);
        assert!(matches!(err, DockerError::DaemonUnavailable));
    }

    #[cfg(unix)]
    #[test]
    fn test_other_failures_keep_engine_message() {
        let output = failed_output("Bind for 127.0.0.1:5432 failed: port is already allocated");
        let err = DockerError::from_run_failure("docker run", "pg-test", &output);
        let text = err.to_string();
        assert!(text.contains("exit code 125"), "{}", text);
        assert!(text.contains("port is already allocated"));
    }
}
