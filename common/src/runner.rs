use std::{
    path::PathBuf,
    process::{ExitStatus, Stdio},
};

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: ExitStatus },
    #[error("{program} printed non UTF-8 output")]
    Utf8 { program: String },
}

/// Something that produces benchmark output for a list of parameters
#[async_trait::async_trait]
pub trait SampleSource: Send + Sync {
    /// Command line shown in diagnostics for `args`
    fn command_line(&self, args: &[i64]) -> String;
    /// Runs once with `args` and returns everything written to stdout
    async fn output(&self, args: &[i64]) -> Result<String, RunError>;
}

/// Runs a benchmark executable to completion, one invocation at a time.
///
/// Stderr is discarded, there is no timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait::async_trait]
impl SampleSource for ProcessRunner {
    fn command_line(&self, args: &[i64]) -> String {
        std::iter::once(self.program_name())
            .chain(args.iter().map(i64::to_string))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn output(&self, args: &[i64]) -> Result<String, RunError> {
        debug!("Running {}", self.command_line(args));
        let output = Command::new(&self.program)
            .args(args.iter().map(i64::to_string))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|source| RunError::Spawn {
                program: self.program_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(RunError::Exit {
                program: self.program_name(),
                status: output.status,
            });
        }
        String::from_utf8(output.stdout).map_err(|_| RunError::Utf8 {
            program: self.program_name(),
        })
    }
}
