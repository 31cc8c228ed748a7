// Process descriptor and observed process status

use super::dialect::ShellDialect;
use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// A named process and the commands that start and stop it
///
/// Commands are opaque strings; they are never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDescriptor {
    name: String,
    start_command: String,
    stop_command: String,
}

impl ProcessDescriptor {
    /// Descriptor using the dialect's canonical start/stop commands
    pub fn new(name: impl Into<String>, dialect: ShellDialect) -> Self {
        let name = name.into();
        Self {
            start_command: dialect.default_start_command(&name),
            stop_command: dialect.default_stop_command(&name),
            name,
        }
    }

    /// Descriptor with optional overrides, falling back to the dialect defaults
    pub fn from_parts(
        name: impl Into<String>,
        start_command: Option<String>,
        stop_command: Option<String>,
        dialect: ShellDialect,
    ) -> Self {
        let mut descriptor = Self::new(name, dialect);
        if let Some(cmd) = start_command {
            descriptor.start_command = cmd;
        }
        if let Some(cmd) = stop_command {
            descriptor.stop_command = cmd;
        }
        descriptor
    }

    pub fn with_start_command(mut self, command: impl Into<String>) -> Self {
        self.start_command = command.into();
        self
    }

    pub fn with_stop_command(mut self, command: impl Into<String>) -> Self {
        self.stop_command = command.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_command(&self) -> &str {
        &self.start_command
    }

    pub fn stop_command(&self) -> &str {
        &self.stop_command
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyField { field: "process name" });
        }
        if self.start_command.trim().is_empty() {
            return Err(DomainError::EmptyField { field: "start command" });
        }
        if self.stop_command.trim().is_empty() {
            return Err(DomainError::EmptyField { field: "stop command" });
        }
        Ok(())
    }
}

/// Snapshot of a process as reported by the status script
///
/// Built fresh on every query, never cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Cumulative CPU time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    /// Resident memory in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessStatus {
    pub fn not_running() -> Self {
        Self::default()
    }

    /// Status standing in for a query that could not be completed
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Parse status script output
    ///
    /// Noise around the document (banners, warnings) is ignored: the first
    /// `{` starts it and anything after the closing brace is dropped.
    pub fn parse(output: &str) -> Result<Self> {
        let trimmed = output.trim();
        let start = trimmed
            .find('{')
            .ok_or_else(|| DomainError::MalformedStatus(format!("no JSON object in {:?}", trimmed)))?;
        let mut status = serde_json::Deserializer::from_str(&trimmed[start..])
            .into_iter::<ProcessStatus>()
            .next()
            .ok_or_else(|| DomainError::MalformedStatus("empty status document".to_string()))?
            .map_err(|e| DomainError::MalformedStatus(e.to_string()))?;
        if status.start_time.as_deref().is_some_and(|s| s.trim().is_empty()) {
            status.start_time = None;
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults_follow_dialect() {
        let process = ProcessDescriptor::new("calc", ShellDialect::PowerShell);
        assert_eq!(process.name(), "calc");
        assert_eq!(process.start_command(), "Start-Process 'calc'");
        assert_eq!(process.stop_command(), "Stop-Process -Name 'calc' -Force");
    }

    #[test]
    fn test_descriptor_overrides() {
        let process = ProcessDescriptor::from_parts(
            "calc",
            Some("launch calc".to_string()),
            None,
            ShellDialect::Posix,
        );
        assert_eq!(process.start_command(), "launch calc");
        assert_eq!(process.stop_command(), ShellDialect::Posix.default_stop_command("calc"));

        let process = process.with_stop_command("kill calc");
        assert_eq!(process.stop_command(), "kill calc");
    }

    #[test]
    fn test_descriptor_validate() {
        let process = ProcessDescriptor::new("", ShellDialect::Posix);
        assert!(process.validate().is_err());

        let process = ProcessDescriptor::new("calc", ShellDialect::Posix).with_start_command(" ");
        let err = process.validate().unwrap_err();
        assert!(err.to_string().contains("start command"));
    }

    #[test]
    fn test_parse_powershell_output() {
        let output = r#"{"memory":52310016,"cpu":1.40625,"start_time":"2026-10-19T09:14:00.0000000+02:00","running":true,"pid":4242}"#;
        let status = ProcessStatus::parse(output).unwrap();
        assert!(status.running);
        assert_eq!(status.pid, Some(4242));
        assert_eq!(status.memory, Some(52310016));
        assert_eq!(status.cpu, Some(1.40625));
        assert!(status.error.is_none());
    }

    #[test]
    fn test_parse_posix_output_with_null_cpu() {
        let output = "{\"running\":true,\"pid\":17,\"cpu\":null,\"memory\":0,\"start_time\":\"\"}\n";
        let status = ProcessStatus::parse(output).unwrap();
        assert!(status.running);
        assert_eq!(status.cpu, None);
        assert_eq!(status.start_time, None);
    }

    #[test]
    fn test_parse_not_running_after_banner() {
        let output = "Welcome to host\n{\"running\":false}\n";
        let status = ProcessStatus::parse(output).unwrap();
        assert_eq!(status, ProcessStatus::not_running());
    }

    #[test]
    fn test_parse_ignores_trailing_warning() {
        let output = "{\"running\":true,\"pid\":4242}\nWARNING: The names of some imported commands include unapproved verbs.\n";
        let status = ProcessStatus::parse(output).unwrap();
        assert!(status.running);
        assert_eq!(status.pid, Some(4242));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ProcessStatus::parse("").is_err());
        assert!(ProcessStatus::parse("Access is denied.").is_err());
        assert!(ProcessStatus::parse("{\"running\": tru").is_err());
    }
}
