// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::ToolError;

/// A fully rendered external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Shell command line, values already quoted
    pub command_line: String,
    /// Directory the command runs in
    pub working_dir: PathBuf,
    /// File the command is expected to create, if any
    pub produces: Option<PathBuf>,
}

impl Invocation {
    pub fn new(command_line: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command_line: command_line.into(),
            working_dir: working_dir.into(),
            produces: None,
        }
    }

    pub fn producing(mut self, path: impl Into<PathBuf>) -> Self {
        self.produces = Some(path.into());
        self
    }
}

/// Capability to run external encoders and probers
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Run with inherited stdout and stderr, failing on a non-zero exit
    async fn run(&self, invocation: &Invocation) -> Result<(), ToolError>;

    /// Run and return whatever the command wrote to stdout
    async fn capture(&self, invocation: &Invocation) -> Result<String, ToolError>;
}

/// A shared reference to an external tool runner
pub type SharedTool = Arc<dyn ExternalTool>;

/// Runs command lines through `/bin/sh -c`.
///
/// On unix every command line gets its own process group, and the whole
/// group is killed when the future driving it is dropped. Pipelines such as
/// `ffmpeg ... | lame ...` go down with the shell instead of being orphaned.
#[derive(Debug, Clone)]
pub struct ShellTool {
    shell: PathBuf,
}

impl ShellTool {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
        }
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Wrap in an Arc for sharing between components
    pub fn shared() -> SharedTool {
        Arc::new(Self::new())
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&invocation.command_line)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    fn spawn(&self, mut cmd: Command, invocation: &Invocation) -> Result<(Child, GroupGuard), ToolError> {
        let child = cmd.spawn().map_err(|e| ToolError::SpawnFailed {
            command: invocation.command_line.clone(),
            source: e,
        })?;
        let guard = GroupGuard::new(child.id());
        Ok((child, guard))
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Kills a child's process group unless disarmed after a normal exit
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.and_then(|id| libc::pid_t::try_from(id).ok()) {
            debug!(pgid, "killing process group");
            // SAFETY: killpg has no memory effects; the group was created by
            // `process_group(0)` for this child and is only signalled here.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
}

#[async_trait]
impl ExternalTool for ShellTool {
    async fn run(&self, invocation: &Invocation) -> Result<(), ToolError> {
        let mut cmd = self.command(invocation);
        cmd.stdout(Stdio::inherit());
        debug!(command = %invocation.command_line, dir = %invocation.working_dir.display(), "running");

        let (mut child, guard) = self.spawn(cmd, invocation)?;
        let status = child.wait().await.map_err(|e| ToolError::WaitFailed {
            command: invocation.command_line.clone(),
            source: e,
        })?;
        guard.disarm();

        check_status(&invocation.command_line, status)
    }

    async fn capture(&self, invocation: &Invocation) -> Result<String, ToolError> {
        let mut cmd = self.command(invocation);
        cmd.stdout(Stdio::piped());
        debug!(command = %invocation.command_line, "capturing");

        let (child, guard) = self.spawn(cmd, invocation)?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ToolError::WaitFailed {
                command: invocation.command_line.clone(),
                source: e,
            })?;
        guard.disarm();
        check_status(&invocation.command_line, output.status)?;

        String::from_utf8(output.stdout).map_err(|_| ToolError::InvalidOutput {
            command: invocation.command_line.clone(),
        })
    }
}

fn check_status(command: &str, status: ExitStatus) -> Result<(), ToolError> {
    if status.success() {
        return Ok(());
    }
    let status = match status.code() {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    };
    Err(ToolError::ExitFailure {
        command: command.to_string(),
        status,
    })
}
