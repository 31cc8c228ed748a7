// Remote Execution Channel Port
// Abstraction over a stateful connection that runs commands against a host

use crate::domain::TargetDescriptor;
use async_trait::async_trait;
use thiserror::Error;

/// Textual result of one invocation
///
/// A non-zero exit code is data, not a fault: the command ran and the
/// lifecycle layer decides what the outcome means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Protocol level faults; always retryable, always evict the channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Failed to open channel to {host}: {reason}")]
    Open { host: String, reason: String },

    #[error("Invocation failed: {0}")]
    Invoke(String),

    #[error("Channel is closed")]
    Closed,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// An open channel
///
/// Implementations need not tolerate concurrent invocations: the pool wraps
/// every channel so that one invocation runs at a time.
#[async_trait]
pub trait RemoteChannel: Send {
    /// Run one command and collect its output
    async fn invoke(&mut self, command: &str) -> Result<CommandOutput, ChannelError>;

    /// Release the channel. Called at most once, only by the pool.
    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// Opens channels from connection parameters
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// # Errors
    /// - ChannelError::Open if the host cannot be reached or refuses the session
    async fn open(&self, target: &TargetDescriptor) -> Result<Box<dyn RemoteChannel>, ChannelError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ShellDialect;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// What a command does to the simulated host
    #[derive(Debug, Clone)]
    pub enum CommandEffect {
        /// Flip a tracked process on or off
        SetRunning { process: String, running: bool },
        /// Print canned stdout
        Reply(String),
    }

    #[derive(Default)]
    struct HostState {
        running: HashMap<String, bool>,
        status_scripts: HashMap<String, String>,
        effects: HashMap<String, CommandEffect>,
        invocations: Vec<String>,
        pending_invoke_faults: VecDeque<String>,
        pending_open_faults: VecDeque<String>,
        close_error: Option<String>,
        open_delay: Duration,
        opened: usize,
        close_calls: HashMap<usize, usize>,
    }

    /// Simulated host shared by every channel a MockConnector opens
    #[derive(Default)]
    pub struct MockHost {
        state: Mutex<HostState>,
    }

    impl MockHost {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Answer the dialect's status script for `process` (initially stopped)
        pub fn track(&self, process: &str, dialect: ShellDialect) {
            let mut state = self.state.lock().unwrap();
            state
                .status_scripts
                .insert(dialect.status_script(process), process.to_string());
            state.running.entry(process.to_string()).or_insert(false);
        }

        pub fn set_running(&self, process: &str, running: bool) {
            self.state
                .lock()
                .unwrap()
                .running
                .insert(process.to_string(), running);
        }

        pub fn is_running(&self, process: &str) -> bool {
            self.state
                .lock()
                .unwrap()
                .running
                .get(process)
                .copied()
                .unwrap_or(false)
        }

        pub fn on_command(&self, command: &str, effect: CommandEffect) {
            self.state
                .lock()
                .unwrap()
                .effects
                .insert(command.to_string(), effect);
        }

        /// The next `count` invocations fault with `message`
        pub fn fail_next_invocations(&self, count: usize, message: &str) {
            let mut state = self.state.lock().unwrap();
            for _ in 0..count {
                state.pending_invoke_faults.push_back(message.to_string());
            }
        }

        /// The next `count` opens fail with `message`
        pub fn fail_next_opens(&self, count: usize, message: &str) {
            let mut state = self.state.lock().unwrap();
            for _ in 0..count {
                state.pending_open_faults.push_back(message.to_string());
            }
        }

        /// Every close from now on reports `message`
        pub fn fail_closes(&self, message: &str) {
            self.state.lock().unwrap().close_error = Some(message.to_string());
        }

        /// Delay every open, to widen race windows
        pub fn set_open_delay(&self, delay: Duration) {
            self.state.lock().unwrap().open_delay = delay;
        }

        pub fn invocations(&self) -> Vec<String> {
            self.state.lock().unwrap().invocations.clone()
        }

        pub fn invocation_count(&self, command: &str) -> usize {
            self.state
                .lock()
                .unwrap()
                .invocations
                .iter()
                .filter(|c| c.as_str() == command)
                .count()
        }

        /// Number of channels opened so far
        pub fn opened(&self) -> usize {
            self.state.lock().unwrap().opened
        }

        /// Close calls received by the `ordinal`-th opened channel (0-based)
        pub fn close_calls(&self, ordinal: usize) -> usize {
            self.state
                .lock()
                .unwrap()
                .close_calls
                .get(&ordinal)
                .copied()
                .unwrap_or(0)
        }

        pub fn total_close_calls(&self) -> usize {
            self.state.lock().unwrap().close_calls.values().sum()
        }

        fn run(&self, command: &str) -> Result<CommandOutput, ChannelError> {
            let mut state = self.state.lock().unwrap();
            state.invocations.push(command.to_string());

            if let Some(message) = state.pending_invoke_faults.pop_front() {
                return Err(ChannelError::Invoke(message));
            }

            if let Some(process) = state.status_scripts.get(command).cloned() {
                let running = state.running.get(&process).copied().unwrap_or(false);
                let json = if running {
                    format!("{{\"running\":true,\"pid\":{}}}", 1000 + process.len())
                } else {
                    "{\"running\":false}".to_string()
                };
                return Ok(CommandOutput::from_stdout(json));
            }

            match state.effects.get(command).cloned() {
                Some(CommandEffect::SetRunning { process, running }) => {
                    state.running.insert(process, running);
                    Ok(CommandOutput::from_stdout(""))
                }
                Some(CommandEffect::Reply(stdout)) => Ok(CommandOutput::from_stdout(stdout)),
                None => Ok(CommandOutput::from_stdout("")),
            }
        }
    }

    /// Connector handing out channels onto a MockHost
    pub struct MockConnector {
        host: Arc<MockHost>,
    }

    impl MockConnector {
        pub fn new(host: Arc<MockHost>) -> Self {
            Self { host }
        }
    }

    #[async_trait]
    impl ChannelConnector for MockConnector {
        async fn open(
            &self,
            target: &TargetDescriptor,
        ) -> Result<Box<dyn RemoteChannel>, ChannelError> {
            let delay = self.host.state.lock().unwrap().open_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.host.state.lock().unwrap();
            if let Some(reason) = state.pending_open_faults.pop_front() {
                return Err(ChannelError::Open {
                    host: target.host.clone(),
                    reason,
                });
            }
            let ordinal = state.opened;
            state.opened += 1;

            Ok(Box::new(MockChannel {
                ordinal,
                host: Arc::clone(&self.host),
            }))
        }
    }

    /// Channel onto a MockHost
    pub struct MockChannel {
        ordinal: usize,
        host: Arc<MockHost>,
    }

    #[async_trait]
    impl RemoteChannel for MockChannel {
        async fn invoke(&mut self, command: &str) -> Result<CommandOutput, ChannelError> {
            self.host.run(command)
        }

        async fn close(&mut self) -> Result<(), ChannelError> {
            let mut state = self.host.state.lock().unwrap();
            *state.close_calls.entry(self.ordinal).or_insert(0) += 1;
            match &state.close_error {
                Some(message) => Err(ChannelError::Io(message.clone())),
                None => Ok(()),
            }
        }
    }
}
