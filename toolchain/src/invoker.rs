//! Subprocess execution of toolchain requests.

use std::future::Future;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use jls_types::{ExitStatus, InvocationOutput, InvocationRequest};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time;

use crate::process::{self, ChildGuard};

/// Cap per captured stream; anything past it is dropped.
const MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// How long to wait for a killed process to be reaped.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Transport failure: the toolchain did not run to completion.
///
/// A process that ran and exited non-zero is *not* an error here; see
/// [`InvocationOutput`].
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("'{program}' not found (is the j toolchain installed and on PATH?)")]
    NotFound { program: String },
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("'{program}' timed out after {}s", after.as_secs())]
    TimedOut { program: String, after: Duration },
}

/// Runs toolchain requests.
///
/// A single attempt per call; callers that want retries invoke again.
pub trait Invoker: Send + Sync + 'static {
    fn invoke(
        &self,
        request: &InvocationRequest,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<InvocationOutput, InvokeError>> + Send;
}

/// Runs the toolchain as a real subprocess.
///
/// The executable is resolved on `PATH` (or used as-is when it is a path),
/// arguments are passed as argv without a shell, stdin is closed and both
/// output streams are captured as lossy UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessInvoker;

impl Invoker for ProcessInvoker {
    async fn invoke(
        &self,
        request: &InvocationRequest,
        timeout: Option<Duration>,
    ) -> Result<InvocationOutput, InvokeError> {
        let program = request.program();
        let resolved = which::which(program).map_err(|_| InvokeError::NotFound {
            program: program.to_string(),
        })?;

        let mut cmd = Command::new(&resolved);
        cmd.args(request.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = request.working_dir() {
            cmd.current_dir(dir);
        }
        process::set_new_session(&mut cmd);

        tracing::debug!(command = %request.command_line(), "Invoking toolchain");

        let child = cmd.spawn().map_err(|source| InvokeError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let mut guard = ChildGuard::new(child);

        let (Some(stdout), Some(stderr)) = (
            guard.child_mut().stdout.take(),
            guard.child_mut().stderr.take(),
        ) else {
            return Err(InvokeError::Spawn {
                program: program.to_string(),
                source: io::Error::other("output streams were not captured"),
            });
        };

        let stdout_task = tokio::spawn(read_to_end_limited(stdout, MAX_OUTPUT_BYTES));
        let stderr_task = tokio::spawn(read_to_end_limited(stderr, MAX_OUTPUT_BYTES));

        let wait_result = match timeout {
            Some(limit) => {
                if let Ok(res) = time::timeout(limit, guard.child_mut().wait()).await {
                    res
                } else {
                    guard.kill_group();
                    let _ = time::timeout(KILL_GRACE, guard.child_mut().wait()).await;
                    guard.disarm();
                    stdout_task.abort();
                    stderr_task.abort();
                    tracing::warn!(command = %request.command_line(), "Toolchain timed out");
                    return Err(InvokeError::TimedOut {
                        program: program.to_string(),
                        after: limit,
                    });
                }
            }
            None => guard.child_mut().wait().await,
        };
        let status = wait_result.map_err(|source| InvokeError::Wait {
            program: program.to_string(),
            source,
        })?;
        guard.disarm();

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let status = if status.success() {
            ExitStatus::Succeeded
        } else {
            ExitStatus::Failed {
                code: status.code(),
            }
        };
        tracing::debug!(
            command = %request.command_line(),
            ?status,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "Toolchain finished"
        );

        Ok(InvocationOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

async fn read_to_end_limited<R: AsyncRead + Unpin + Send + 'static>(
    mut reader: R,
    max_bytes: usize,
) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];

    loop {
        let n = match reader.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let remaining = max_bytes.saturating_sub(buf.len());
        // Keep draining past the cap so the child never blocks on a full pipe.
        let take = remaining.min(n);
        buf.extend_from_slice(&tmp[..take]);
    }

    buf
}
