// Shell dialect spoken by a target host
//
// The dialect owns every script the core generates itself (status check,
// connectivity probe, default start/stop). Operator supplied commands are
// passed through untouched.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the quoted process name in script templates
const NAME_PLACEHOLDER: &str = "{name}";

const POWERSHELL_STATUS_SCRIPT: &str = r#"$process = Get-Process -Name {name} -ErrorAction SilentlyContinue | Select-Object -First 1
if ($process) {
    @{
        'running' = $true
        'pid' = $process.Id
        'cpu' = $process.CPU
        'memory' = $process.WorkingSet64
        'start_time' = $process.StartTime.ToString('o')
    } | ConvertTo-Json -Compress
} else {
    @{ 'running' = $false } | ConvertTo-Json -Compress
}"#;

/// Placeholder replaced by the pid selector in POSIX templates
const PIDS_PLACEHOLDER: &str = "{pids}";

// Pids whose command name or argv[0] basename equals the name. `comm` alone is
// cut to 15 characters on Linux, so argv[0] carries long names.
const POSIX_PID_SELECTOR: &str = r#"ps -eo pid=,comm=,args= 2>/dev/null | awk -v n={name} -v self=$$ '$1 != self { c = $2; sub(".*/", "", c); a = $3; sub(".*/", "", a); if (c == n || a == n) print $1 }'"#;

const POSIX_STATUS_SCRIPT: &str = r#"pid=$({pids} | sort -n | head -n 1)
if [ -n "$pid" ]; then
    set -- $(ps -o times=,rss= -p "$pid" 2>/dev/null)
    started=$(ps -o lstart= -p "$pid" 2>/dev/null | sed 's/^ *//')
    printf '{"running":true,"pid":%s,"cpu":%s,"memory":%s,"start_time":"%s"}\n' "$pid" "${1:-null}" "$(( ${2:-0} * 1024 ))" "$started"
else
    printf '{"running":false}\n'
fi"#;

/// Command language of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellDialect {
    /// Windows PowerShell / pwsh
    PowerShell,
    /// Any POSIX `sh`
    #[default]
    Posix,
}

impl ShellDialect {
    /// Quote a process name so it survives as a single literal word
    pub fn quote(&self, value: &str) -> String {
        match self {
            ShellDialect::PowerShell => format!("'{}'", value.replace('\'', "''")),
            ShellDialect::Posix => format!("'{}'", value.replace('\'', r"'\''")),
        }
    }

    /// Script printing a single JSON object describing the named process
    ///
    /// Output shape: `{"running": bool, "pid"?, "cpu"?, "memory"?, "start_time"?}`
    pub fn status_script(&self, name: &str) -> String {
        let template = match self {
            ShellDialect::PowerShell => POWERSHELL_STATUS_SCRIPT.to_string(),
            ShellDialect::Posix => POSIX_STATUS_SCRIPT.replace(PIDS_PLACEHOLDER, POSIX_PID_SELECTOR),
        };
        template.replace(NAME_PLACEHOLDER, &self.quote(name))
    }

    /// Pipeline printing the pid of every process called `name`, one per line
    fn posix_pid_selector(&self, name: &str) -> String {
        POSIX_PID_SELECTOR.replace(NAME_PLACEHOLDER, &self.quote(name))
    }

    /// Script printing the host name, used to probe connectivity
    pub fn probe_script(&self) -> &'static str {
        match self {
            ShellDialect::PowerShell => "$env:COMPUTERNAME",
            ShellDialect::Posix => "hostname",
        }
    }

    /// Canonical start command when none is configured
    pub fn default_start_command(&self, name: &str) -> String {
        match self {
            ShellDialect::PowerShell => format!("Start-Process {}", self.quote(name)),
            ShellDialect::Posix => format!("nohup {} >/dev/null 2>&1 &", self.quote(name)),
        }
    }

    /// Canonical stop command when none is configured
    pub fn default_stop_command(&self, name: &str) -> String {
        match self {
            ShellDialect::PowerShell => format!("Stop-Process -Name {} -Force", self.quote(name)),
            ShellDialect::Posix => format!(
                "pids=$({}); [ -z \"$pids\" ] || kill $pids",
                self.posix_pid_selector(name)
            ),
        }
    }
}

impl std::fmt::Display for ShellDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShellDialect::PowerShell => write!(f, "powershell"),
            ShellDialect::Posix => write!(f, "posix"),
        }
    }
}
