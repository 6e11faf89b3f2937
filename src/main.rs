use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

mod analytics;
mod app;
mod artifact_io;
mod config;
mod events;
mod explorer;
mod form;
mod gate;
mod models;
mod notify;
mod session;
mod settings;
mod settings_store;
mod theme;
mod ui;

use analytics::{DisabledAnalytics, JsonlAnalyticsSink};
use app::{App, AppCommand};
use config::AppConfig;
use explorer::{CommandLauncher, FileListAdapter, open_vscode};
use gate::SubmissionGate;
use notify::{Notifier, SharedToasts};
use session::{
    AgentState, ConversationSession, SessionCommand, SessionEndSignal,
    conversation_id_from_route,
};
use settings::SettingsPayload;
use settings_store::{SettingsFileStore, SettingsSaveAdapter};
use theme::Theme;

const LOG_FILTER_ENV: &str = "AGENTDESK_LOG";
const MAX_SESSION_COMMANDS_PER_LOOP: usize = 8;

/// Terminal workbench for agent conversations.
#[derive(Debug, Parser)]
#[command(name = "agentdesk", version, about)]
struct Cli {
    /// Config file to load instead of ~/.agentdesk/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base directory for new conversation workspaces, overriding the saved setting
    #[arg(long, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Start inside this conversation
    #[arg(long, value_name = "ID")]
    conversation: Option<String>,

    /// Initial route, e.g. /conversations/<id>
    #[arg(long, value_name = "PATH")]
    route: Option<String>,
}

/// Everything the event loop needs that the app state does not own.
struct Services {
    store: SettingsFileStore,
    current_settings: SettingsPayload,
    analytics_file: Option<PathBuf>,
    session_tx: Sender<SessionCommand>,
    lister: FileListAdapter,
    launcher: Option<CommandLauncher>,
    workspace_override: Option<PathBuf>,
}

impl Services {
    fn new_gate(&self, notifier: SharedToasts) -> SubmissionGate {
        let persistence = SettingsSaveAdapter::new(self.store.clone());
        let session = SessionEndSignal::new(self.session_tx.clone());
        match &self.analytics_file {
            Some(path) => SubmissionGate::new(
                persistence,
                session,
                JsonlAnalyticsSink::new(path.clone()),
                notifier,
            ),
            None => SubmissionGate::new(persistence, session, DisabledAnalytics, notifier),
        }
    }

    fn reload_settings(&mut self, notifier: &mut dyn Notifier) {
        match self.store.load_for_form() {
            Ok(settings) => self.current_settings = settings,
            Err(err) => {
                notifier.error(
                    "settings-load-error",
                    &format!("Failed to load settings: {err}"),
                );
            }
        }
    }

    fn workspace_base(&self) -> Option<PathBuf> {
        self.workspace_override.clone().or_else(|| {
            self.current_settings
                .workspace_base()
                .map(PathBuf::from)
        })
    }
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|err| {
        eprintln!("Failed to load config: {err}. Using defaults.");
        AppConfig::default()
    });
    if let Err(err) = init_logging(&config) {
        eprintln!("Logging disabled: {err}");
    }

    let toasts = SharedToasts::new();
    let mut app = App::new(
        config.explorer.start_open,
        config.models.available.clone(),
        toasts.clone(),
    );
    let (session_tx, session_rx) = mpsc::channel();
    let mut services = build_services(&config, cli.workspace, session_tx)?;
    services.reload_settings(&mut toasts.clone());
    apply_launch_location(&mut app, &services, cli.conversation, cli.route);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    let theme = Theme::load_or_default("theme.toml");
    let result = run_app(&mut terminal, app, &theme, services, session_rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        tracing::error!("event loop failed: {err}");
    }
    result
}

fn init_logging(config: &AppConfig) -> io::Result<()> {
    let path = config.log_file()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new().create(true).append(true).open(&path)?;
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .try_init()
        .map_err(io::Error::other)
}

fn build_services(
    config: &AppConfig,
    workspace_override: Option<PathBuf>,
    session_tx: Sender<SessionCommand>,
) -> io::Result<Services> {
    let analytics_file = if config.analytics.enabled {
        Some(config.analytics_file()?)
    } else {
        None
    };
    let launcher = CommandLauncher::from_command_line(&config.vscode.opener);
    if launcher.is_none() {
        tracing::warn!("no VS Code opener configured");
    }
    Ok(Services {
        store: SettingsFileStore::new(config.settings_file()?),
        current_settings: SettingsPayload::new(),
        analytics_file,
        session_tx,
        lister: FileListAdapter::new(config.explorer.max_entries),
        launcher,
        workspace_override,
    })
}

/// Honors `--conversation` and `--route`. A conversation route starts the
/// conversation it names.
fn apply_launch_location(
    app: &mut App,
    services: &Services,
    conversation: Option<String>,
    route: Option<String>,
) {
    let conversation = conversation.or_else(|| {
        route
            .as_deref()
            .and_then(conversation_id_from_route)
            .map(str::to_string)
    });
    match conversation {
        Some(id) => start_conversation(app, services, id),
        None => {
            if let Some(route) = route {
                app.set_route(route);
            }
        }
    }
}

fn start_conversation(app: &mut App, services: &Services, id: String) {
    let base = services.workspace_base();
    if let Err(err) = app.start_conversation(id, base.as_deref()) {
        tracing::warn!("failed to start conversation: {err}");
        app.notifier().error("conversation-start-error", &err.to_string());
    }
}

fn refresh_explorer(app: &mut App, lister: &FileListAdapter, state: AgentState) {
    let root = app.workspace_path().map(Path::to_path_buf);
    app.explorer_mut().refresh(state, root.as_deref(), lister);
}

fn run_command(app: &mut App, services: &mut Services, command: AppCommand) {
    match command {
        AppCommand::OpenSettings => {
            services.reload_settings(&mut app.notifier());
            let gate = services.new_gate(app.notifier());
            app.open_settings(&services.current_settings, gate);
        }
        AppCommand::NewConversation => {
            start_conversation(app, services, ConversationSession::generate_id());
        }
        AppCommand::RefreshExplorer => {
            let state = app.agent_state();
            refresh_explorer(app, &services.lister, state);
        }
        AppCommand::OpenVsCode => {
            let Some(link) = app.vscode_link() else {
                return;
            };
            let mut notifier = app.notifier();
            match services.launcher.as_mut() {
                Some(launcher) => open_vscode(&link, launcher, &mut notifier),
                None => notifier.error(
                    "open-vscode-error",
                    "Failed to switch to VS Code: no opener configured",
                ),
            }
        }
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    theme: &Theme,
    mut services: Services,
    session_rx: Receiver<SessionCommand>,
) -> io::Result<()> {
    while app.running {
        terminal.draw(|frame| ui::render(frame, &app, theme))?;

        let event = events::next_event()?;
        if let Some(command) = app.handle_event(event) {
            run_command(&mut app, &mut services, command);
        }

        if app.poll_settings() {
            services.reload_settings(&mut app.notifier());
        }

        for command in session_rx.try_iter().take(MAX_SESSION_COMMANDS_PER_LOOP) {
            match command {
                SessionCommand::EndSession => app.end_session(),
            }
        }

        for listing in services.lister.drain_events() {
            app.explorer_mut().on_listing(listing);
        }

        if let Some(state) = app.take_agent_state_change() {
            refresh_explorer(&mut app, &services.lister, state);
        }
    }
    Ok(())
}
