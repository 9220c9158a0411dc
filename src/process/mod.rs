mod std_runner;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use std_runner::StdCommandRunner;

/// One run of an external program with `stdin` piped in and stdout captured.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

#[derive(Clone, Default)]
pub struct InvocationOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    /// Capped diagnostic output. May echo input, so it is never logged.
    pub stderr: String,
}

impl InvocationOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl std::fmt::Debug for InvocationOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationOutput")
            .field("exit_code", &self.exit_code)
            .field("stdout_len", &self.stdout.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Runs an external program. Swappable so accessor logic can be tested with a
/// fake encryptor instead of a real GPG install.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation, stdin: &[u8]) -> Result<InvocationOutput, RunError>;
}
