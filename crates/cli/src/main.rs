//! procman CLI - Command-line client for the procman daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9527";

#[derive(Parser)]
#[command(name = "procman")]
#[command(about = "Start, stop and inspect processes on managed hosts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "PROCMAN_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Operator name for targets whose principal contains {user}
    #[arg(short, long, env = "PROCMAN_USER", global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the state of a process
    Status {
        /// Target name from the daemon catalog
        target: String,
        /// Process name
        process: String,
    },

    /// Start a process (no-op if it is already running)
    Start { target: String, process: String },

    /// Stop a process (no-op if it is not running)
    Stop { target: String, process: String },

    /// Check that a target can be reached
    Probe { target: String },

    /// List configured targets
    Targets,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct ProcessStatus {
    running: bool,
    pid: Option<u32>,
    cpu: Option<f64>,
    memory: Option<u64>,
    start_time: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct StatusResult {
    target: String,
    process: String,
    success: bool,
    status: ProcessStatus,
}

#[derive(Deserialize)]
struct ActionResult {
    success: bool,
    message: String,
}

#[derive(Deserialize)]
struct TargetSummary {
    name: String,
    host: String,
    shell: String,
    processes: Vec<String>,
}

#[derive(Deserialize)]
struct CatalogList {
    targets: Vec<TargetSummary>,
}

#[derive(Tabled)]
struct TargetRow {
    name: String,
    host: String,
    shell: String,
    processes: String,
}

impl From<TargetSummary> for TargetRow {
    fn from(summary: TargetSummary) -> Self {
        Self {
            name: summary.name,
            host: summary.host,
            shell: summary.shell,
            processes: summary.processes.join(", "),
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn process_params(target: &str, process: &str, user: Option<&str>) -> serde_json::Value {
    json!({
        "target": target,
        "process": process,
        "user": user,
    })
}

fn print_action(result: &ActionResult) {
    if result.success {
        println!("{}", format!("✓ {}", result.message).green().bold());
    } else {
        println!("{}", format!("✗ {}", result.message).red().bold());
    }
}

fn print_status(result: &StatusResult) {
    println!(
        "{}",
        format!("{} on {}", result.process, result.target).cyan().bold()
    );
    println!();

    if !result.success {
        println!("  {} {}", "State:".bold(), "UNKNOWN".yellow());
        if let Some(error) = &result.status.error {
            println!("  {} {}", "Error:".bold(), error);
        }
        return;
    }

    let status = &result.status;
    if !status.running {
        println!("  {} {}", "State:".bold(), "STOPPED".red());
        return;
    }

    println!("  {} {}", "State:".bold(), "RUNNING".green());
    if let Some(pid) = status.pid {
        println!("  {} {}", "PID:".bold(), pid);
    }
    if let Some(cpu) = status.cpu {
        println!("  {} {:.2} s", "CPU:".bold(), cpu);
    }
    if let Some(memory) = status.memory {
        println!("  {} {:.1} MB", "Memory:".bold(), memory as f64 / (1024.0 * 1024.0));
    }
    if let Some(started) = &status.start_time {
        println!("  {} {}", "Started:".bold(), started);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let user = cli.user.as_deref();

    let succeeded = match &cli.command {
        Commands::Status { target, process } => {
            let result = call_rpc(
                &cli.rpc_url,
                "process.status.v1",
                process_params(target, process, user),
            )
            .await?;
            let status: StatusResult = serde_json::from_value(result)?;
            print_status(&status);
            status.success
        }

        Commands::Start { target, process } => {
            let result = call_rpc(
                &cli.rpc_url,
                "process.start.v1",
                process_params(target, process, user),
            )
            .await?;
            let action: ActionResult = serde_json::from_value(result)?;
            print_action(&action);
            action.success
        }

        Commands::Stop { target, process } => {
            let result = call_rpc(
                &cli.rpc_url,
                "process.stop.v1",
                process_params(target, process, user),
            )
            .await?;
            let action: ActionResult = serde_json::from_value(result)?;
            print_action(&action);
            action.success
        }

        Commands::Probe { target } => {
            let params = json!({ "target": target, "user": user });
            let result = call_rpc(&cli.rpc_url, "target.probe.v1", params).await?;
            let action: ActionResult = serde_json::from_value(result)?;
            print_action(&action);
            action.success
        }

        Commands::Targets => {
            let result = call_rpc(&cli.rpc_url, "catalog.list.v1", json!([])).await?;
            let list: CatalogList = serde_json::from_value(result)?;

            if list.targets.is_empty() {
                println!("{}", "No targets configured".yellow());
            } else {
                let rows: Vec<TargetRow> = list.targets.into_iter().map(TargetRow::from).collect();
                println!("{}", Table::new(rows));
            }
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_params_omit_nothing() {
        let params = process_params("lab", "worker", None);
        assert_eq!(params["target"], "lab");
        assert_eq!(params["process"], "worker");
        assert!(params["user"].is_null());
    }

    #[test]
    fn test_cli_parses_global_user() {
        let cli = Cli::try_parse_from(["procman", "start", "lab", "worker", "--user", "alice"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert!(matches!(cli.command, Commands::Start { .. }));
    }

    #[test]
    fn test_target_row_joins_processes() {
        let row = TargetRow::from(TargetSummary {
            name: "lab".to_string(),
            host: "lab-01".to_string(),
            shell: "posix".to_string(),
            processes: vec!["nginx".to_string(), "worker".to_string()],
        });
        assert_eq!(row.processes, "nginx, worker");
    }
}
