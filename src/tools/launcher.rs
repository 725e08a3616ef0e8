use crate::error::AppError;
use crate::session::schemas::{LaunchRequest, ServerEvent};
use crate::tools::command_gate::CommandGate;
use crate::tools::process_runner::{spawn_run, OutputStream, RunHandle, RunSink, RunSpec, RunStatus};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Forwards a run's output to one connection's outbound queue.
#[derive(Debug)]
struct ChannelSink {
    out: mpsc::Sender<ServerEvent>,
}

#[async_trait]
impl RunSink for ChannelSink {
    async fn output(&self, stream: OutputStream, chunk: String) {
        let event = match stream {
            OutputStream::Stdout => ServerEvent::CmdStdout(chunk),
            OutputStream::Stderr => ServerEvent::CmdStderr(chunk),
        };
        // The browser may be gone; the run keeps going and its output is dropped.
        if self.out.send(event).await.is_err() {
            debug!("Connection closed, dropping command output");
        }
    }

    async fn closed(&self, _status: RunStatus) {
        if self.out.send(ServerEvent::CmdExit).await.is_err() {
            debug!("Connection closed before cmd-exit could be delivered");
        }
    }
}

/// Runs launch requests: gate check, spawn, and relay.
#[derive(Debug, Clone)]
pub struct Launcher {
    gate: CommandGate,
}

impl Launcher {
    pub fn new(gate: CommandGate) -> Self {
        Self { gate }
    }

    /// Handles one `launch` event.
    ///
    /// A rejected or unspawnable request produces one `cmd-stderr` and one
    /// `cmd-exit` on `out` and returns `None`. Otherwise the run streams into
    /// `out` in the background and its handle is returned.
    #[instrument(skip(self, request, out), fields(cmd = %request.cmd, cwd = %request.cwd))]
    pub async fn launch(
        &self,
        request: LaunchRequest,
        out: mpsc::Sender<ServerEvent>,
    ) -> Option<RunHandle> {
        match self.start(&request, out.clone()) {
            Ok(handle) => Some(handle),
            Err(err) => {
                refuse(&out, &err).await;
                None
            }
        }
    }

    fn start(
        &self,
        request: &LaunchRequest,
        out: mpsc::Sender<ServerEvent>,
    ) -> Result<RunHandle, AppError> {
        let argv = self.gate.check(&request.cmd)?;
        // An empty cwd leaves the child in the server's working directory.
        let cwd = (!request.cwd.is_empty()).then(|| PathBuf::from(&request.cwd));
        let spec = RunSpec { argv, cwd };
        spawn_run(&spec, Arc::new(ChannelSink { out }))
    }
}

async fn refuse(out: &mpsc::Sender<ServerEvent>, err: &AppError) {
    let events = [ServerEvent::CmdStderr(err.client_message()), ServerEvent::CmdExit];
    for event in events {
        if out.send(event).await.is_err() {
            debug!("Connection closed before refusal could be delivered");
            return;
        }
    }
}
