// OpenSSH channel
//
// `open` authenticates once by starting a backgrounded ControlMaster; every
// invocation then multiplexes a new session over the master socket, and
// `close` asks the master to exit.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use procman_core::domain::{ShellDialect, TargetDescriptor};
use procman_core::port::{ChannelError, CommandOutput, RemoteChannel};

use crate::connector::ConnectorSettings;
use crate::shell;

/// ssh reserves this exit status for its own failures
const SSH_TRANSPORT_EXIT: i32 = 255;

pub struct SshChannel {
    id: String,
    host: String,
    dialect: ShellDialect,
    program: String,
    control_path: PathBuf,
    invoke_timeout: Duration,
    closed: bool,
}

impl SshChannel {
    /// Start the master connection for `target`
    ///
    /// # Errors
    /// - ChannelError::Open if ssh cannot be spawned or authentication fails
    pub async fn open(
        target: &TargetDescriptor,
        id: String,
        settings: &ConnectorSettings,
    ) -> Result<Self, ChannelError> {
        let control_path = settings.control_dir().join(format!("procman-{}.sock", id));
        let channel = Self {
            id,
            host: target.host.clone(),
            dialect: target.shell,
            program: settings.ssh_program.clone(),
            control_path,
            invoke_timeout: settings.invoke_timeout(),
            closed: false,
        };

        let open_failed = |reason: String| ChannelError::Open {
            host: target.host.clone(),
            reason,
        };

        // Master output goes nowhere: a backgrounded master keeps pipes open
        let status = Command::new(&channel.program)
            .args(master_args(target, &channel.control_path, settings))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| open_failed(format!("cannot run {}: {}", channel.program, e)))?;
        if !status.success() {
            return Err(open_failed(format!("ssh master exited with {}", status)));
        }

        // The master is already backgrounded here; a failed check must not leak it
        let failure = match channel.control(&["-O", "check"]).await {
            Ok(check) if check.succeeded() => None,
            Ok(check) => Some(format!("master not responding: {}", check.stderr.trim())),
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = failure {
            warn!(channel_id = %channel.id, host = %channel.host, reason = %reason, "SSH master check failed");
            if let Err(e) = channel.shut_master().await {
                warn!(channel_id = %channel.id, error = %e, "Failed to stop unchecked SSH master");
            }
            return Err(open_failed(reason));
        }

        info!(
            channel_id = %channel.id,
            host = %channel.host,
            control_path = %channel.control_path.display(),
            "SSH master established"
        );
        Ok(channel)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn control_path(&self) -> &Path {
        &self.control_path
    }

    async fn control(&self, op: &[&str]) -> Result<CommandOutput, ChannelError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-S").arg(&self.control_path).args(op).arg(&self.host);
        shell::run_captured(cmd, Some(self.invoke_timeout)).await
    }

    /// Ask the master to exit and remove its socket
    async fn shut_master(&self) -> Result<CommandOutput, ChannelError> {
        let result = self.control(&["-O", "exit"]).await;
        if let Err(e) = tokio::fs::remove_file(&self.control_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(channel_id = %self.id, error = %e, "Failed to remove control socket");
            }
        }
        result
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn invoke(&mut self, command: &str) -> Result<CommandOutput, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        debug!(channel_id = %self.id, host = %self.host, "Invoking over SSH");
        let mut cmd = Command::new(&self.program);
        cmd.args(session_args(&self.control_path, &self.host))
            .arg(shell::remote_line(self.dialect, command));

        let output = shell::run_captured(cmd, Some(self.invoke_timeout)).await?;
        if output.exit_code == Some(SSH_TRANSPORT_EXIT) {
            return Err(ChannelError::Invoke(format!(
                "ssh transport failure: {}",
                output.stderr.trim()
            )));
        }
        Ok(output)
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let output = self.shut_master().await?;
        if !output.succeeded() {
            return Err(ChannelError::Io(format!(
                "ssh -O exit failed: {}",
                output.stderr.trim()
            )));
        }
        info!(channel_id = %self.id, host = %self.host, "SSH master closed");
        Ok(())
    }
}

/// Arguments that start a backgrounded master for `target`
pub fn master_args(
    target: &TargetDescriptor,
    control_path: &Path,
    settings: &ConnectorSettings,
) -> Vec<String> {
    let host_key_checking = if target.secure { "yes" } else { "accept-new" };
    let mut args = vec![
        "-M".to_string(),
        "-N".to_string(),
        "-f".to_string(),
        "-o".to_string(),
        "ControlMaster=yes".to_string(),
        "-o".to_string(),
        format!("ControlPath={}", control_path.display()),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("StrictHostKeyChecking={}", host_key_checking),
        "-o".to_string(),
        format!("ConnectTimeout={}", settings.connect_timeout_secs),
    ];
    if let Some(principal) = &target.principal {
        args.push("-l".to_string());
        args.push(principal.clone());
    }
    args.push(target.host.clone());
    args
}

/// Arguments that run one command over an existing master
pub fn session_args(control_path: &Path, host: &str) -> Vec<String> {
    vec![
        "-S".to_string(),
        control_path.display().to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        host.to_string(),
        "--".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_args_for_secure_target() {
        let target = TargetDescriptor::new("ws-12")
            .with_principal("ops")
            .with_secure(true);
        let args = master_args(&target, Path::new("/tmp/p.sock"), &ConnectorSettings::default());

        assert_eq!(&args[..3], ["-M", "-N", "-f"]);
        assert!(args.contains(&"ControlPath=/tmp/p.sock".to_string()));
        assert!(args.contains(&"StrictHostKeyChecking=yes".to_string()));
        assert_eq!(&args[args.len() - 3..], ["-l", "ops", "ws-12"]);
    }

    #[test]
    fn test_master_args_without_principal() {
        let target = TargetDescriptor::new("ws-12");
        let args = master_args(&target, Path::new("/tmp/p.sock"), &ConnectorSettings::default());

        assert!(args.contains(&"StrictHostKeyChecking=accept-new".to_string()));
        assert!(!args.contains(&"-l".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("ws-12"));
    }

    #[test]
    fn test_session_args_end_with_separator() {
        let args = session_args(Path::new("/tmp/p.sock"), "ws-12");
        assert_eq!(args, ["-S", "/tmp/p.sock", "-o", "BatchMode=yes", "ws-12", "--"]);
    }

    #[tokio::test]
    async fn test_open_without_ssh_binary_fails() {
        let settings = ConnectorSettings {
            ssh_program: "/nonexistent/ssh".to_string(),
            ..ConnectorSettings::default()
        };
        let result = SshChannel::open(&TargetDescriptor::new("ws-12"), "c-1".to_string(), &settings).await;

        match result {
            Err(ChannelError::Open { host, reason }) => {
                assert_eq!(host, "ws-12");
                assert!(reason.contains("/nonexistent/ssh"));
            }
            _ => panic!("expected open failure"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_check_tears_down_master() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("procman-ssh-check-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let log = dir.join("calls.log");
        let socket = dir.join("procman-c-9.sock");
        let fake_ssh = dir.join("fake-ssh");
        std::fs::write(
            &fake_ssh,
            format!(
                "#!/bin/sh\necho \"$*\" >> '{log}'\ncase \"$*\" in\n  *'-O check'*) exit 255 ;;\n  *'-O exit'*) exit 0 ;;\n  *) touch '{socket}'; exit 0 ;;\nesac\n",
                log = log.display(),
                socket = socket.display(),
            ),
        )
        .unwrap();
        std::fs::set_permissions(&fake_ssh, std::fs::Permissions::from_mode(0o755)).unwrap();

        let settings = ConnectorSettings {
            ssh_program: fake_ssh.display().to_string(),
            control_dir: Some(dir.clone()),
            ..ConnectorSettings::default()
        };
        let result = SshChannel::open(&TargetDescriptor::new("ws-12"), "c-9".to_string(), &settings).await;

        assert!(matches!(result, Err(ChannelError::Open { .. })));
        let calls = std::fs::read_to_string(&log).unwrap();
        assert!(calls.lines().any(|line| line.contains("-M")));
        assert!(calls.lines().any(|line| line.contains("-O exit")));
        assert!(!socket.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
