// Target host descriptor and the pool key derived from it

use super::dialect::ShellDialect;
use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Principal placeholder used in pool keys when no principal is given
const LOCAL_PRINCIPAL: &str = "local";

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Identity of a pooled channel: `<host>_<principal>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey(String);

impl PoolKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection parameters for one host
///
/// Immutable for the duration of an operation; the pool only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub host: String,
    pub principal: Option<String>,
    /// Require a verified transport (strict host key checking for SSH)
    pub secure: bool,
    pub shell: ShellDialect,
}

impl TargetDescriptor {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            principal: None,
            secure: false,
            shell: ShellDialect::default(),
        }
    }

    /// Local machine under the caller's own identity
    pub fn local() -> Self {
        Self::new("localhost")
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_shell(mut self, shell: ShellDialect) -> Self {
        self.shell = shell;
        self
    }

    /// Pool key: host and principal, `local` when no principal is set
    pub fn pool_key(&self) -> PoolKey {
        let principal = self.principal.as_deref().unwrap_or(LOCAL_PRINCIPAL);
        PoolKey(format!("{}_{}", self.host, principal))
    }

    /// Loopback host without an explicit principal
    pub fn is_local(&self) -> bool {
        self.principal.is_none()
            && LOOPBACK_HOSTS
                .iter()
                .any(|h| self.host.eq_ignore_ascii_case(h))
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DomainError::EmptyField { field: "host" });
        }
        if matches!(&self.principal, Some(p) if p.trim().is_empty()) {
            return Err(DomainError::EmptyField { field: "principal" });
        }
        Ok(())
    }
}
