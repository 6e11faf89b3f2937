use std::collections::VecDeque;
use std::path::Path;

use tracing::{debug, info};

use crate::events::AppEvent;
use crate::explorer::{ExplorerPanel, VsCodeLink, resolve_vscode_link};
use crate::form::{FormField, SettingsForm};
use crate::gate::{GateStatus, SubmissionGate};
use crate::notify::{SharedToasts, Toast};
use crate::session::{
    AgentState, ConversationSession, HOME_ROUTE, SessionError, conversation_route,
    is_session_route,
};
use crate::settings::SettingsPayload;

const MAX_ACTIVITY_LINES: usize = 200;

/// Work the event loop performs on behalf of the app because it needs
/// services the app does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    OpenSettings,
    NewConversation,
    RefreshExplorer,
    OpenVsCode,
}

/// The settings modal: one form and the gate guarding its submission.
#[derive(Debug)]
pub struct SettingsModal {
    pub form: SettingsForm,
    gate: SubmissionGate,
}

impl SettingsModal {
    pub fn is_confirming(&self) -> bool {
        self.gate.is_confirming()
    }

    pub fn is_saving(&self) -> bool {
        self.gate.is_saving()
    }
}

#[derive(Debug)]
pub struct App {
    pub running: bool,
    pub ticks: u64,
    route: String,
    session: Option<ConversationSession>,
    observed_agent_state: AgentState,
    explorer: ExplorerPanel,
    models: Vec<String>,
    settings: Option<SettingsModal>,
    toasts: SharedToasts,
    activity: VecDeque<String>,
}

impl App {
    pub fn new(explorer_open: bool, models: Vec<String>, toasts: SharedToasts) -> Self {
        Self {
            running: true,
            ticks: 0,
            route: HOME_ROUTE.to_string(),
            session: None,
            observed_agent_state: AgentState::Init,
            explorer: ExplorerPanel::new(explorer_open),
            models,
            settings: None,
            toasts,
            activity: VecDeque::new(),
        }
    }

    pub fn on_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
        self.toasts.on_tick(self.ticks);
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = route.into();
        debug!(route = %self.route, "navigated");
    }

    /// True while the current route is inside a conversation.
    pub fn is_session_active(&self) -> bool {
        is_session_route(&self.route)
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        self.session.as_ref()
    }

    pub fn agent_state(&self) -> AgentState {
        self.session
            .as_ref()
            .map(ConversationSession::agent_state)
            .unwrap_or_default()
    }

    pub fn set_agent_state(&mut self, state: AgentState) {
        if let Some(session) = self.session.as_mut() {
            session.set_agent_state(state);
        }
    }

    /// Reports the agent state once each time it changes.
    pub fn take_agent_state_change(&mut self) -> Option<AgentState> {
        let current = self.agent_state();
        if current == self.observed_agent_state {
            return None;
        }
        self.observed_agent_state = current;
        Some(current)
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.session.as_ref().and_then(ConversationSession::host_path)
    }

    /// Closes any current conversation, starts `id` and navigates into it.
    pub fn start_conversation(
        &mut self,
        id: impl Into<String>,
        workspace_base: Option<&Path>,
    ) -> Result<(), SessionError> {
        if let Some(mut previous) = self.session.take() {
            previous.close();
        }
        let mut session = ConversationSession::new(id);
        session.start(workspace_base)?;
        self.set_route(conversation_route(session.id()));
        self.push_activity(format!("Started conversation {}", session.id()));
        self.explorer.clear();
        self.session = Some(session);
        Ok(())
    }

    /// Closes the active conversation and returns home.
    pub fn end_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
            info!(session = session.id(), "session ended");
            self.push_activity(format!("Ended conversation {}", session.id()));
        }
        self.explorer.clear();
        self.set_route(HOME_ROUTE);
    }

    pub fn explorer(&self) -> &ExplorerPanel {
        &self.explorer
    }

    pub fn explorer_mut(&mut self) -> &mut ExplorerPanel {
        &mut self.explorer
    }

    /// Launch link for the VSCode button, or `None` while the button is disabled.
    pub fn vscode_link(&self) -> Option<VsCodeLink> {
        if !self.explorer.vscode_enabled(self.agent_state()) {
            return None;
        }
        Some(resolve_vscode_link(self.agent_state(), self.workspace_path()))
    }

    pub fn settings_modal(&self) -> Option<&SettingsModal> {
        self.settings.as_ref()
    }

    pub fn is_settings_open(&self) -> bool {
        self.settings.is_some()
    }

    pub fn is_confirming(&self) -> bool {
        self.settings.as_ref().is_some_and(SettingsModal::is_confirming)
    }

    /// Opens a fresh form seeded from `current`. Each form gets its own gate.
    pub fn open_settings(&mut self, current: &SettingsPayload, gate: SubmissionGate) {
        if self.settings.is_some() {
            return;
        }
        self.settings = Some(SettingsModal {
            form: SettingsForm::new(current, &self.models),
            gate,
        });
    }

    /// Dismisses the form unless a prompt or save still depends on it.
    pub fn close_settings(&mut self) {
        let Some(modal) = self.settings.as_mut() else {
            return;
        };
        if modal.is_saving() || modal.is_confirming() {
            return;
        }
        self.settings = None;
    }

    pub fn submit_settings(&mut self) {
        let session_active = self.is_session_active();
        let Some(modal) = self.settings.as_mut() else {
            return;
        };
        if !modal.form.is_valid() {
            modal.form.set_error("Select a model before saving");
            return;
        }
        modal.form.clear_error();
        let payload = modal.form.payload();
        match modal.gate.submit(payload, session_active) {
            Ok(status) => debug!(?status, "settings submitted"),
            Err(err) => modal.form.set_error(err.to_string()),
        }
    }

    pub fn confirm_settings(&mut self) {
        let Some(modal) = self.settings.as_mut() else {
            return;
        };
        modal.form.clear_error();
        if let Err(err) = modal.gate.confirm() {
            modal.form.set_error(err.to_string());
        }
    }

    pub fn cancel_settings_confirmation(&mut self) {
        let Some(modal) = self.settings.as_mut() else {
            return;
        };
        if let Err(err) = modal.gate.cancel() {
            modal.form.set_error(err.to_string());
        }
    }

    /// Applies finished saves. Returns true when the form closed after a
    /// successful save.
    pub fn poll_settings(&mut self) -> bool {
        let Some(modal) = self.settings.as_mut() else {
            return false;
        };
        let mut closed = false;
        for outcome in modal.gate.poll() {
            match outcome {
                Ok(GateStatus::Closed { session_terminated }) => {
                    closed = true;
                    if session_terminated {
                        self.activity.push_back("Settings saved; session ended".to_string());
                    } else {
                        self.activity.push_back("Settings saved".to_string());
                    }
                }
                Ok(status) => debug!(?status, "settings gate update"),
                Err(err) => modal.form.set_error(err.to_string()),
            }
        }
        if closed {
            self.settings = None;
            self.trim_activity();
        }
        closed
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.snapshot()
    }

    /// A handle that posts into the on-screen toast stack.
    pub fn notifier(&self) -> SharedToasts {
        self.toasts.clone()
    }

    pub fn activity(&self) -> impl Iterator<Item = &str> {
        self.activity.iter().map(String::as_str)
    }

    pub fn push_activity(&mut self, line: impl Into<String>) {
        self.activity.push_back(line.into());
        self.trim_activity();
    }

    fn trim_activity(&mut self) {
        while self.activity.len() > MAX_ACTIVITY_LINES {
            self.activity.pop_front();
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Option<AppCommand> {
        match event {
            AppEvent::Tick => {
                self.on_tick();
                return None;
            }
            AppEvent::Quit => {
                self.quit();
                return None;
            }
            _ => {}
        }

        if self.is_confirming() {
            match event {
                AppEvent::Submit | AppEvent::InputChar('y') | AppEvent::InputChar('Y') => {
                    self.confirm_settings();
                }
                AppEvent::Cancel | AppEvent::InputChar('n') | AppEvent::InputChar('N') => {
                    self.cancel_settings_confirmation();
                }
                _ => {}
            }
            return None;
        }

        if self.settings.is_some() {
            match event {
                AppEvent::Submit => self.submit_settings(),
                AppEvent::Cancel => self.close_settings(),
                other => {
                    if let Some(modal) = self.settings.as_mut() {
                        edit_form(&mut modal.form, other);
                    }
                }
            }
            return None;
        }

        match event {
            AppEvent::ToggleExplorer => {
                self.explorer.toggle();
                None
            }
            AppEvent::MoveUp => {
                self.explorer.select_prev();
                None
            }
            AppEvent::MoveDown => {
                self.explorer.select_next();
                None
            }
            AppEvent::EndSession => {
                self.end_session();
                None
            }
            AppEvent::Cancel => {
                self.toasts.dismiss_all();
                None
            }
            AppEvent::RefreshExplorer => Some(AppCommand::RefreshExplorer),
            AppEvent::OpenVsCode => Some(AppCommand::OpenVsCode),
            AppEvent::OpenSettings => Some(AppCommand::OpenSettings),
            AppEvent::NewConversation => Some(AppCommand::NewConversation),
            _ => None,
        }
    }
}

fn edit_form(form: &mut SettingsForm, event: AppEvent) {
    match event {
        AppEvent::NextField => form.focus_next(),
        AppEvent::PrevField => form.focus_prev(),
        AppEvent::MoveUp if form.focus() == FormField::Model => form.select_prev_model(),
        AppEvent::MoveDown if form.focus() == FormField::Model => form.select_next_model(),
        AppEvent::InputChar(ch) => form.input_char(ch),
        AppEvent::Backspace => form.backspace(),
        _ => {}
    }
}

#[cfg(test)]
#[path = "../tests/unit/app_tests.rs"]
mod tests;
