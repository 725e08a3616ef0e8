use crate::config::Config;
use crate::error::AppError;
use crate::session::events::EventHandlers;
use crate::session::schemas::{parse_client_frame, ClientEvent, ServerEvent};
use crate::tools::command_gate::CommandGate;
use crate::tools::launcher::Launcher;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Shared by every connection.
#[derive(Debug, Clone)]
pub struct AppState {
    pub launcher: Arc<Launcher>,
    pub events: Arc<EventHandlers>,
    pub channel_capacity: usize,
}

impl AppState {
    pub fn new(config: &Config, events: EventHandlers) -> Self {
        Self {
            launcher: Arc::new(Launcher::new(CommandGate::new(config.allowed_tool.clone()))),
            events: Arc::new(events),
            channel_capacity: config.channel_capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// Per-connection bookkeeping. Runs on one connection are independent and
/// may overlap; this only counts them.
#[derive(Debug, Default)]
pub struct ConnectionRuns {
    outstanding: AtomicUsize,
}

impl ConnectionRuns {
    pub fn state(&self) -> SessionState {
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            SessionState::Idle
        } else {
            SessionState::Running
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn started(&self) -> usize {
        self.outstanding.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn finished(&self) -> usize {
        self.outstanding.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

/// `GET /ws`
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

#[instrument(skip_all, fields(conn_id = tracing::field::Empty))]
async fn handle_connection(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::Span::current().record("conn_id", conn_id.as_str());
    info!("Browser connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.channel_capacity);
    let runs = Arc::new(ConnectionRuns::default());

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(error = %e, "Failed to serialize server event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                debug!("Browser WebSocket send failed");
                break;
            }
        }
    }
    .in_current_span());

    let recv_state = state.clone();
    let recv_runs = runs.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = dispatch(&text, &recv_state, &recv_runs, &tx).await {
                        let preview = &text[..floor_char_boundary(&text, 200)];
                        warn!(error = %e, raw = %preview, "Ignoring invalid browser message");
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    }
    .in_current_span());

    // Outstanding runs keep going; once the outbound queue is gone their output is dropped.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(outstanding_runs = runs.outstanding(), "Browser disconnected");
}

/// Handles one inbound text frame.
async fn dispatch(
    text: &str,
    state: &AppState,
    runs: &Arc<ConnectionRuns>,
    out: &mpsc::Sender<ServerEvent>,
) -> Result<(), AppError> {
    let event = parse_client_frame(text).map_err(|e| AppError::InvalidFrame(e.to_string()))?;

    match event {
        ClientEvent::Launch(request) => {
            if runs.state() == SessionState::Running {
                debug!(outstanding = runs.outstanding(), "Launch while another run is in flight");
            }
            if let Some(handle) = state.launcher.launch(request, out.clone()).await {
                let outstanding = runs.started();
                debug!(pid = ?handle.pid, outstanding, "Run started");

                let runs = runs.clone();
                tokio::spawn(async move {
                    handle.wait().await;
                    let outstanding = runs.finished();
                    debug!(outstanding, "Run finished");
                });
            }
        }
        ClientEvent::Extension { event, data } => {
            let handler = state
                .events
                .get(&event)
                .ok_or_else(|| AppError::InvalidFrame(format!("no handler for event `{}`", event)))?;
            debug!(event = %event, "Dispatching extension event");
            if let Err(e) = handler.handle(data, out.clone()).await {
                warn!(event = %event, error = %e, "Extension event handler failed");
            }
        }
    }
    Ok(())
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
