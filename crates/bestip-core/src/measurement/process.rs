//! Subprocess-backed [`MeasurementExecutor`]
//!
//! Spawns the measurement binary and bounds the whole run with an outer
//! timeout. The per-request timeouts inside the tool do not cover a hung
//! process; on expiry the child is killed.
//!
//! Stdout and stderr are read line by line while the child runs and merged
//! in arrival order, so output written before a timeout is still reported.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RunError;
use crate::traits::{ExecutionOutput, Invocation, MeasurementExecutor};

/// Runs the measurement tool as a child process
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    bin_path: PathBuf,
    timeout: Duration,
}

impl ProcessExecutor {
    /// Create an executor for the binary at `bin_path`
    pub fn new(bin_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin_path: bin_path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MeasurementExecutor for ProcessExecutor {
    async fn invoke(&self, invocation: &Invocation) -> Result<ExecutionOutput, RunError> {
        let mut command = Command::new(&self.bin_path);
        command
            .args(invocation.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            "Spawning {} (timeout {:?})",
            self.bin_path.display(),
            self.timeout
        );

        let mut child = command.spawn().map_err(|e| {
            RunError::launch(format!(
                "failed to launch {}: {}",
                self.bin_path.display(),
                e
            ))
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let readers = [
            forward_lines(child.stdout.take(), tx.clone()),
            forward_lines(child.stderr.take(), tx),
        ];
        let aborts: Vec<_> = readers.iter().map(JoinHandle::abort_handle).collect();

        let finished = tokio::time::timeout(self.timeout, async {
            let status = child.wait().await?;
            for reader in readers {
                if let Err(e) = reader.await {
                    debug!("Output reader stopped: {}", e);
                }
            }
            Ok::<ExitStatus, std::io::Error>(status)
        })
        .await;

        match finished {
            Ok(Ok(status)) => Ok(ExecutionOutput {
                exit_code: status.code(),
                output: drain(&mut rx),
            }),
            Ok(Err(e)) => {
                aborts.iter().for_each(|a| a.abort());
                Err(RunError::launch(format!(
                    "failed to wait for {}: {}",
                    self.bin_path.display(),
                    e
                )))
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", self.bin_path.display(), e);
                }
                // Descendants may still hold the pipes open
                aborts.iter().for_each(|a| a.abort());

                Err(RunError::ExecutionFailed {
                    reason: format!(
                        "{} did not finish within {:?}",
                        self.bin_path.display(),
                        self.timeout
                    ),
                    exit_code: None,
                    output: drain(&mut rx),
                })
            }
        }
    }
}

/// Forward each line of `stream` to `tx` until EOF
fn forward_lines<R>(stream: Option<R>, tx: mpsc::UnboundedSender<Vec<u8>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else {
            return;
        };
        let mut reader = BufReader::new(stream);

        loop {
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Failed to read tool output: {}", e);
                    break;
                }
            }
        }
    })
}

/// Collect everything received so far
fn drain(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> String {
    let mut bytes = Vec::new();
    while let Ok(line) = rx.try_recv() {
        bytes.extend_from_slice(&line);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
