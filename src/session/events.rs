//! Named inbound events contributed by extensions.

use crate::error::AppError;
use crate::session::schemas::{ServerEvent, LAUNCH_EVENT};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Answers one named event on the realtime channel.
///
/// `out` is the sending connection's outbound queue. Handlers run inline with
/// the connection's receive loop, so long work should be spawned.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, data: Value, out: mpsc::Sender<ServerEvent>) -> Result<(), AppError>;
}

/// Event name to handler. Built once at startup and shared by all connections.
#[derive(Clone, Default)]
pub struct EventHandlers {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// `launch` is reserved and the first handler for a name wins; both
    /// cases are skipped with a warning.
    pub fn on<H: EventHandler + 'static>(&mut self, event: impl Into<String>, handler: H) {
        let event = event.into();
        if event == LAUNCH_EVENT {
            warn!(event = %event, "Event name is reserved, skipping handler");
            return;
        }
        if self.handlers.contains_key(&event) {
            warn!(event = %event, "Event already has a handler, skipping");
            return;
        }
        self.handlers.insert(event, Arc::new(handler));
    }

    pub fn get(&self, event: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(event).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("EventHandlers").field("events", &names).finish()
    }
}
