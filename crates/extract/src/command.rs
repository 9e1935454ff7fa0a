//! Local sidecar programs (Donut, Moondream) that print raw output on stdout.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::backend::InferenceRunner;
use crate::decode::RawOutput;
use crate::error::ExtractError;
use crate::retry::{with_retry, AttemptError, RetryPolicy};

/// Lines of stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 5;

/// Runs `program [args...] <image>` and reads stdout as the raw output.
/// Failed runs (model still loading, out of memory) are retried.
pub struct CommandRunner {
    label: String,
    program: PathBuf,
    args: Vec<String>,
    policy: RetryPolicy,
}

impl CommandRunner {
    pub fn new(label: impl Into<String>, program: PathBuf, args: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            label: label.into(),
            program,
            args,
            policy,
        }
    }

    fn command(&self, image: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(image);
        cmd
    }

    fn attempt(&self, image: &Path) -> Result<String, AttemptError> {
        let output = self.command(image).output().map_err(|e| {
            AttemptError::transient(format!(
                "failed to run {} ({}): {e}",
                self.label,
                self.program.display()
            ))
        })?;

        if !output.status.success() {
            return Err(AttemptError::transient(format!(
                "{} exited with {}: {}",
                self.label,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(AttemptError::transient(format!(
                "{} produced no output: {}",
                self.label,
                stderr_tail(&output.stderr)
            )));
        }
        Ok(stdout)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

impl InferenceRunner for CommandRunner {
    fn name(&self) -> &str {
        &self.label
    }

    fn run(&self, image: &Path) -> Result<RawOutput, ExtractError> {
        if !image.is_file() {
            return Err(ExtractError::Io(format!("{}: no such file", image.display())));
        }
        log::info!("{}: {} via {}", self.label, image.display(), self.program.display());

        let stdout = with_retry(self.policy, &self.label, |_| self.attempt(image))?;
        log::debug!("{}: {} bytes of output", self.label, stdout.len());
        Ok(RawOutput::Text(stdout))
    }
}
