use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::SessionControl;

pub const CONVERSATION_ROUTE_PREFIX: &str = "/conversations/";
pub const HOME_ROUTE: &str = "/";

/// True when the route points inside an active conversation.
pub fn is_session_route(path: &str) -> bool {
    path.starts_with(CONVERSATION_ROUTE_PREFIX)
}

pub fn conversation_route(id: &str) -> String {
    format!("{CONVERSATION_ROUTE_PREFIX}{id}")
}

pub fn conversation_id_from_route(path: &str) -> Option<&str> {
    path.strip_prefix(CONVERSATION_ROUTE_PREFIX)
        .map(|rest| rest.split('/').next().unwrap_or(rest))
        .filter(|id| !id.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Loading,
    #[default]
    Init,
    Running,
    AwaitingUserInput,
    Paused,
    Stopped,
    Finished,
    Rejected,
    Error,
    RateLimited,
    AwaitingUserConfirmation,
    UserConfirmed,
    UserRejected,
}

const RUNTIME_INACTIVE_STATES: [AgentState; 4] = [
    AgentState::Init,
    AgentState::Loading,
    AgentState::Stopped,
    AgentState::Error,
];

impl AgentState {
    /// States in which the runtime cannot serve file listings or editor links.
    pub fn is_runtime_inactive(self) -> bool {
        RUNTIME_INACTIVE_STATES.contains(&self)
    }

    pub fn label(self) -> &'static str {
        match self {
            AgentState::Loading => "loading",
            AgentState::Init => "init",
            AgentState::Running => "running",
            AgentState::AwaitingUserInput => "awaiting input",
            AgentState::Paused => "paused",
            AgentState::Stopped => "stopped",
            AgentState::Finished => "finished",
            AgentState::Rejected => "rejected",
            AgentState::Error => "error",
            AgentState::RateLimited => "rate limited",
            AgentState::AwaitingUserConfirmation => "awaiting confirmation",
            AgentState::UserConfirmed => "confirmed",
            AgentState::UserRejected => "user rejected",
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session already started. Close this session and start a new one.")]
    AlreadyStarted,
    #[error("Session {0} is closed")]
    Closed(String),
    #[error("Failed to create conversation workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One conversation with the agent and the host directory backing it.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: String,
    host_path: Option<PathBuf>,
    agent_state: AgentState,
    started: bool,
    closed: bool,
    started_at_epoch_secs: u64,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host_path: None,
            agent_state: AgentState::Init,
            started: false,
            closed: false,
            started_at_epoch_secs: 0,
        }
    }

    pub fn generate_id() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        format!("{:x}", nanos & 0xffff_ffff_ffff)
    }

    /// Creates `<workspace_base>/<id>` when a base is configured and moves the
    /// agent to running.
    pub fn start(&mut self, workspace_base: Option<&Path>) -> Result<(), SessionError> {
        if self.closed {
            tracing::warn!(session = %self.id, "session closed before starting");
            return Err(SessionError::Closed(self.id.clone()));
        }
        if self.started {
            return Err(SessionError::AlreadyStarted);
        }
        self.agent_state = AgentState::Loading;
        if let Some(base) = workspace_base {
            let path = base.join(&self.id);
            if let Err(source) = fs::create_dir_all(&path) {
                self.agent_state = AgentState::Error;
                return Err(SessionError::Workspace { path, source });
            }
            self.host_path = Some(path);
        }
        self.started = true;
        self.started_at_epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.agent_state = AgentState::Running;
        tracing::info!(session = %self.id, "conversation session started");
        Ok(())
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.agent_state = AgentState::Stopped;
        tracing::info!(session = %self.id, "conversation session closed");
    }

    pub fn set_agent_state(&mut self, state: AgentState) {
        if self.closed {
            return;
        }
        self.agent_state = state;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host_path(&self) -> Option<&Path> {
        self.host_path.as_deref()
    }

    pub fn agent_state(&self) -> AgentState {
        self.agent_state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn started_at_epoch_secs(&self) -> u64 {
        self.started_at_epoch_secs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    EndSession,
}

/// Ends the active session by messaging the event loop.
#[derive(Debug, Clone)]
pub struct SessionEndSignal {
    tx: Sender<SessionCommand>,
}

impl SessionEndSignal {
    pub fn new(tx: Sender<SessionCommand>) -> Self {
        Self { tx }
    }
}

impl SessionControl for SessionEndSignal {
    fn terminate(&mut self) {
        if self.tx.send(SessionCommand::EndSession).is_err() {
            tracing::warn!("end-session signal dropped: event loop receiver is gone");
        }
    }
}
