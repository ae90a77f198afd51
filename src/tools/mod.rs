// Wrappers around the external command-line tools (ffmpeg, ffprobe, yt-dlp).
//
// Every invocation is a synchronous child process from the caller's point of view:
// it is awaited to completion, stdout and stderr are captured, and the exit
// status is turned into a typed ToolError.

pub mod ytdlp;

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::ToolError;

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A named external binary.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: &'static str,
    program: PathBuf,
    /// Arguments placed before every invocation's own arguments
    base_args: Vec<OsString>,
}

impl ExternalTool {
    pub fn new(name: &'static str, program: impl Into<PathBuf>) -> Self {
        Self {
            name,
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    /// Prepend fixed arguments, e.g. `python3 -m yt_dlp`.
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run the tool to completion. A non-zero exit status is an error carrying
    /// the tool's stderr verbatim.
    pub async fn run<I, S>(&self, args: I) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!("Running {}: {:?}", self.name, command.as_std());

        let output = command.output().await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound {
                    tool: self.name.to_string(),
                    source,
                }
            } else {
                ToolError::Io {
                    tool: self.name.to_string(),
                    source,
                }
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::error!("{} failed ({}): {}", self.name, output.status, stderr.trim());
            return Err(ToolError::Failed {
                tool: self.name.to_string(),
                status: output.status,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}
