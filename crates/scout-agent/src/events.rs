use crate::todo::Todo;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Notification emitted by the agent loop or a tool dispatch.
///
/// Events are transient: they are fanned out to the registered handlers and
/// never stored.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolStarted {
        tool_name: String,
        input: Value,
    },
    ToolCompleted {
        tool_name: String,
        output: Option<Value>,
    },
    ToolError {
        tool_name: String,
        error: String,
    },
    AssistantMessage {
        text: String,
    },
    FileViewed {
        path: String,
    },
    WebSearchError {
        error_code: String,
    },
    UnknownContent {
        content_type: String,
    },
    FinalOutput {
        result: String,
    },
    TodosUpdated {
        todos: Vec<Todo>,
    },
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &AgentEvent);
}

/// A request for user approval of a mutating action, answered synchronously.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmationRequest {
    pub tool_name: String,
    pub action: String,
    pub path: Option<String>,
    pub preview: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmationDecision {
    pub approved: bool,
    pub reason: Option<String>,
}

impl ConfirmationDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }
}

pub trait ConfirmationHandler: Send + Sync {
    fn confirm(&self, request: &ConfirmationRequest) -> ConfirmationDecision;
}

#[derive(Default)]
struct BusInner {
    handlers: Mutex<Vec<Arc<dyn EventHandler>>>,
    confirmation: Mutex<Option<Arc<dyn ConfirmationHandler>>>,
}

/// Fan-out notification channel plus a single confirmation slot.
///
/// Cheap to clone; a top-level agent and all of its sub-agents share one bus
/// so nested activity is observable identically to top-level activity. The
/// handler list is locked only long enough to snapshot it, so a handler may
/// emit further events without deadlocking.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.inner.handlers.lock().expect("event bus mutex poisoned");
        handlers.push(handler);
    }

    pub fn set_confirmation_handler(&self, handler: Arc<dyn ConfirmationHandler>) {
        let mut slot = self
            .inner
            .confirmation
            .lock()
            .expect("event bus mutex poisoned");
        *slot = Some(handler);
    }

    pub fn emit(&self, event: AgentEvent) {
        let handlers = self
            .inner
            .handlers
            .lock()
            .expect("event bus mutex poisoned")
            .clone();
        for handler in handlers {
            handler.handle(&event);
        }
    }

    /// Ask the registered confirmation handler to approve an action.
    ///
    /// Fails open: with no handler registered the action is auto-approved,
    /// which keeps headless runs from stalling.
    pub fn request_confirmation(&self, request: &ConfirmationRequest) -> ConfirmationDecision {
        let handler = self
            .inner
            .confirmation
            .lock()
            .expect("event bus mutex poisoned")
            .clone();
        match handler {
            Some(handler) => handler.confirm(request),
            None => ConfirmationDecision::approve(),
        }
    }
}

/// Event handler that records everything it sees; used by tests and
/// embedders that want to inspect a run after the fact.
#[derive(Clone, Default)]
pub struct BufferedEventHandler {
    events: Arc<Mutex<Vec<AgentEvent>>>,
}

impl BufferedEventHandler {
    pub fn snapshot(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .expect("buffered handler mutex poisoned")
            .clone()
    }
}

impl EventHandler for BufferedEventHandler {
    fn handle(&self, event: &AgentEvent) {
        let mut events = self
            .events
            .lock()
            .expect("buffered handler mutex poisoned");
        events.push(event.clone());
    }
}
