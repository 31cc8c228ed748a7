// Catalog of named targets and the processes managed on them
//
// Every lookup happens before a channel is touched: an unknown name is a
// configuration error, never a retry.

use crate::domain::{ProcessDescriptor, ShellDialect, TargetDescriptor};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder in a principal replaced by the requesting operator
pub const USER_PLACEHOLDER: &str = "{user}";

/// Process entry; commands fall back to the target dialect's defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    #[serde(default)]
    pub start_command: Option<String>,
    #[serde(default)]
    pub stop_command: Option<String>,
}

/// Target entry as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub host: String,
    #[serde(default)]
    pub principal: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub shell: ShellDialect,
    #[serde(default)]
    pub processes: BTreeMap<String, ProcessEntry>,
}

/// Listing row for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub name: String,
    pub host: String,
    pub shell: ShellDialect,
    pub processes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    targets: BTreeMap<String, TargetEntry>,
}

impl Catalog {
    pub fn new(targets: BTreeMap<String, TargetEntry>) -> Self {
        Self { targets }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Build the descriptor for the target called `name`
    ///
    /// # Errors
    /// - AppError::NotFound if no such target is configured
    /// - AppError::Validation if the principal needs a user and none was given
    pub fn resolve_target(&self, name: &str, user: Option<&str>) -> Result<TargetDescriptor> {
        let (_, entry) = self.entry(name)?;

        let principal = match entry.principal.as_deref() {
            Some(p) if p.contains(USER_PLACEHOLDER) => {
                let user = user.map(str::trim).filter(|u| !u.is_empty()).ok_or_else(|| {
                    AppError::Validation(format!("target {} requires a user name", name))
                })?;
                Some(p.replace(USER_PLACEHOLDER, user))
            }
            Some(p) => Some(p.to_string()),
            None => None,
        };

        let target = TargetDescriptor {
            host: entry.host.clone(),
            principal,
            secure: entry.secure,
            shell: entry.shell,
        };
        target.validate()?;
        Ok(target)
    }

    /// Build the descriptor for `process` on target `target`
    ///
    /// # Errors
    /// - AppError::NotFound if the target or the process is not configured
    pub fn resolve_process(&self, target: &str, process: &str) -> Result<ProcessDescriptor> {
        let (_, entry) = self.entry(target)?;
        let (name, process_entry) = entry
            .processes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(process))
            .ok_or_else(|| {
                AppError::NotFound(format!("process {} on target {}", process, target))
            })?;

        let descriptor = ProcessDescriptor::from_parts(
            name.clone(),
            process_entry.start_command.clone(),
            process_entry.stop_command.clone(),
            entry.shell,
        );
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// All targets with their process names, sorted by name
    pub fn summaries(&self) -> Vec<TargetSummary> {
        self.targets
            .iter()
            .map(|(name, entry)| TargetSummary {
                name: name.clone(),
                host: entry.host.clone(),
                shell: entry.shell,
                processes: entry.processes.keys().cloned().collect(),
            })
            .collect()
    }

    // Keys may have been lowercased by the configuration loader
    fn entry(&self, name: &str) -> Result<(&String, &TargetEntry)> {
        self.targets
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .ok_or_else(|| AppError::NotFound(format!("target {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        serde_json::from_str(
            r#"{
                "workstation": {
                    "host": "ws-12.corp",
                    "principal": "CORP\\{user}",
                    "secure": true,
                    "shell": "powershell",
                    "processes": {
                        "calc": {},
                        "agent": { "start_command": "Start-Service agent" }
                    }
                },
                "local": {
                    "host": "localhost",
                    "processes": { "nginx": { "stop_command": "nginx -s quit" } }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_target_substitutes_user() {
        let target = catalog().resolve_target("workstation", Some("alice")).unwrap();
        assert_eq!(target.host, "ws-12.corp");
        assert_eq!(target.principal.as_deref(), Some("CORP\\alice"));
        assert!(target.secure);
        assert_eq!(target.shell, ShellDialect::PowerShell);
    }

    #[test]
    fn test_resolve_target_requires_user_for_placeholder() {
        let err = catalog().resolve_target("workstation", None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = catalog().resolve_target("workstation", Some("  ")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_resolve_target_defaults() {
        let target = catalog().resolve_target("LOCAL", Some("ignored")).unwrap();
        assert_eq!(target.principal, None);
        assert!(!target.secure);
        assert_eq!(target.shell, ShellDialect::Posix);
        assert!(target.is_local());
    }

    #[test]
    fn test_unknown_names_are_not_found() {
        let catalog = catalog();
        assert!(matches!(
            catalog.resolve_target("nowhere", None),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            catalog.resolve_process("local", "redis"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            catalog.resolve_process("nowhere", "nginx"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_process_fills_dialect_defaults() {
        let catalog = catalog();

        let calc = catalog.resolve_process("workstation", "calc").unwrap();
        assert_eq!(calc.start_command(), "Start-Process 'calc'");
        assert_eq!(calc.stop_command(), "Stop-Process -Name 'calc' -Force");

        let agent = catalog.resolve_process("workstation", "Agent").unwrap();
        assert_eq!(agent.name(), "agent");
        assert_eq!(agent.start_command(), "Start-Service agent");

        let nginx = catalog.resolve_process("local", "nginx").unwrap();
        assert_eq!(nginx.start_command(), "nohup 'nginx' >/dev/null 2>&1 &");
        assert_eq!(nginx.stop_command(), "nginx -s quit");
    }

    #[test]
    fn test_summaries_are_sorted() {
        let summaries = catalog().summaries();
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["local", "workstation"]);
        assert_eq!(summaries[1].processes, vec!["agent", "calc"]);
    }
}
