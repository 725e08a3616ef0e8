use crate::error::AppError;
use crate::utils::utf8_decoder::Utf8ChunkDecoder;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio as StdProcessStdio};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

const READ_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How a run ended. Logged by the server, never sent to the browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatus {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

impl RunStatus {
    fn from_exit_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            exit_code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Receives the output of one run.
///
/// `output` is called once per decoded chunk, in arrival order for each
/// stream. `closed` is called exactly once, after both streams hit EOF and
/// the process has been reaped.
#[async_trait]
pub trait RunSink: Send + Sync + 'static {
    async fn output(&self, stream: OutputStream, chunk: String);
    async fn closed(&self, status: RunStatus);
}

#[derive(Debug, Clone)]
pub struct RunSpec {
    pub argv: Vec<String>,
    /// `None` runs the child in the server's own working directory.
    pub cwd: Option<PathBuf>,
}

impl RunSpec {
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

#[derive(Debug)]
pub struct RunHandle {
    pub pid: Option<u32>,
    task: JoinHandle<RunStatus>,
}

impl RunHandle {
    /// Waits for the run to finish. Dropping the handle instead leaves the
    /// run going in the background.
    pub async fn wait(self) -> RunStatus {
        match self.task.await {
            Ok(status) => status,
            Err(e) => {
                error!(pid = ?self.pid, error = %e, "Run supervisor task failed");
                RunStatus::default()
            }
        }
    }
}

/// Spawns one process and streams its output into `sink`.
///
/// The child inherits the server's environment unmodified and runs in `cwd`
/// as given, or in the server's directory when there is none. There is no
/// timeout and no way to cancel a run once started.
#[instrument(skip(spec, sink), fields(command = %spec.command_line(), cwd = ?spec.cwd))]
pub fn spawn_run<S: RunSink>(spec: &RunSpec, sink: Arc<S>) -> Result<RunHandle, AppError> {
    let command_line = spec.command_line();
    let (program, args) = spec.argv.split_first().ok_or_else(|| AppError::SpawnError {
        command: command_line.clone(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
    })?;

    let mut command_process = TokioCommand::new(program);
    command_process
        .args(args)
        .stdin(StdProcessStdio::null())
        .stdout(StdProcessStdio::piped())
        .stderr(StdProcessStdio::piped());
    if let Some(cwd) = &spec.cwd {
        command_process.current_dir(cwd);
    }

    debug!("Spawning command");
    let mut child = command_process.spawn().map_err(|e| {
        error!(error = %e, "Failed to spawn command");
        AppError::SpawnError {
            command: command_line.clone(),
            source: e,
        }
    })?;

    let pid = child.id();
    let missing_pipe = |name: &str| {
        AppError::StdIoError(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("{} was not captured", name),
        ))
    };
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
    info!(pid = ?pid, "Command started");

    let task = tokio::spawn(async move {
        let stdout_task = pump(stdout, OutputStream::Stdout, sink.clone());
        let stderr_task = pump(stderr, OutputStream::Stderr, sink.clone());

        let (wait_result, _, _) = tokio::join!(child.wait(), stdout_task, stderr_task);

        let status = match wait_result {
            Ok(exit_status) => {
                let status = RunStatus::from_exit_status(exit_status);
                if status.success() {
                    info!(command = %command_line, pid = ?pid, "Command finished");
                } else {
                    warn!(command = %command_line, pid = ?pid, exit_code = ?status.exit_code, signal = ?status.signal, "Command finished unsuccessfully");
                }
                status
            }
            Err(e) => {
                warn!(command = %command_line, pid = ?pid, error = %e, "Failed to wait for command");
                RunStatus::default()
            }
        };

        sink.closed(status).await;
        status
    });

    Ok(RunHandle { pid, task })
}

async fn pump<R, S>(mut reader: R, stream: OutputStream, sink: Arc<S>)
where
    R: AsyncRead + Unpin,
    S: RunSink,
{
    let mut decoder = Utf8ChunkDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty() {
                    sink.output(stream, text).await;
                }
            }
            Err(e) => {
                warn!(stream = ?stream, error = %e, "Failed reading command output");
                break;
            }
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        sink.output(stream, rest).await;
    }
}
