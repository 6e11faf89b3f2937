use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::notify::Notifier;
use crate::session::AgentState;

pub const DEFAULT_HEADER_LABEL: &str = "Workspace";
const IGNORED_DIRS: [&str; 3] = ["node_modules", "target", "__pycache__"];
const MAX_LISTING_EVENTS_PER_DRAIN: usize = 8;

/// Collapsible file-explorer panel.
#[derive(Debug, Clone)]
pub struct ExplorerPanel {
    is_open: bool,
    files: Vec<String>,
    error: Option<String>,
    selected: usize,
    generation: u64,
    loading: bool,
}

impl ExplorerPanel {
    pub fn new(is_open: bool) -> Self {
        Self {
            is_open,
            files: Vec::new(),
            error: None,
            selected: 0,
            generation: 0,
            loading: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn toggle(&mut self) {
        self.is_open = !self.is_open;
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        if !self.files.is_empty() {
            self.selected = (self.selected + 1).min(self.files.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Header text: the conversation path when open and known, the default
    /// label when open without one, nothing when collapsed.
    pub fn header_label(&self, workspace_path: Option<&Path>) -> Option<String> {
        if !self.is_open {
            return None;
        }
        Some(
            workspace_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| DEFAULT_HEADER_LABEL.to_string()),
        )
    }

    /// Requests a new listing unless the runtime is inactive. Returns the
    /// generation of the request when one was issued.
    pub fn refresh(
        &mut self,
        agent_state: AgentState,
        root: Option<&Path>,
        lister: &FileListAdapter,
    ) -> Option<u64> {
        if agent_state.is_runtime_inactive() {
            tracing::debug!(state = ?agent_state, "skipping explorer refresh: runtime inactive");
            return None;
        }
        let Some(root) = root else {
            self.files.clear();
            self.error = None;
            return None;
        };
        self.generation = self.generation.wrapping_add(1);
        self.loading = true;
        lister.fetch(self.generation, root.to_path_buf());
        Some(self.generation)
    }

    /// Forgets the listing and invalidates any request still in flight.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.files.clear();
        self.error = None;
        self.selected = 0;
        self.loading = false;
    }

    pub fn on_listing(&mut self, event: ListingEvent) {
        if event.generation != self.generation {
            tracing::debug!(
                stale = event.generation,
                current = self.generation,
                "dropping stale file listing"
            );
            return;
        }
        self.loading = false;
        match event.result {
            Ok(files) => {
                self.files = files;
                self.error = None;
                self.selected = self.selected.min(self.files.len().saturating_sub(1));
            }
            Err(message) => {
                self.files.clear();
                self.error = Some(message);
                self.selected = 0;
            }
        }
    }

    /// The VSCode button is enabled only while the runtime is active.
    pub fn vscode_enabled(&self, agent_state: AgentState) -> bool {
        self.is_open && !agent_state.is_runtime_inactive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEvent {
    pub generation: u64,
    pub result: Result<Vec<String>, String>,
}

/// Flat workspace listing, fetched on a worker thread.
pub struct FileListAdapter {
    max_entries: usize,
    event_tx: Sender<ListingEvent>,
    event_rx: Receiver<ListingEvent>,
}

impl FileListAdapter {
    pub fn new(max_entries: usize) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            max_entries,
            event_tx,
            event_rx,
        }
    }

    pub fn fetch(&self, generation: u64, root: PathBuf) {
        let tx = self.event_tx.clone();
        let max_entries = self.max_entries;
        thread::spawn(move || {
            let result = list_workspace_files(&root, max_entries).map_err(|err| {
                format!("Failed to list files in {}: {err}", root.display())
            });
            let _ = tx.send(ListingEvent { generation, result });
        });
    }

    pub fn drain_events(&self) -> Vec<ListingEvent> {
        let mut events = Vec::new();
        while events.len() < MAX_LISTING_EVENTS_PER_DRAIN {
            let Ok(event) = self.event_rx.try_recv() else {
                break;
            };
            events.push(event);
        }
        events
    }
}

/// Breadth-first listing of `root` as sorted relative paths. Directories end
/// with `/`; hidden entries and build/dependency directories are skipped.
pub fn list_workspace_files(root: &Path, max_entries: usize) -> io::Result<Vec<String>> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([root.to_path_buf()]);
    while let Some(dir) = queue.pop_front() {
        let mut entries = fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .collect::<Vec<_>>();
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            if out.len() >= max_entries {
                out.sort();
                return Ok(out);
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            let relative = path
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|_| name.to_string());
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if IGNORED_DIRS.contains(&name) {
                    continue;
                }
                out.push(format!("{relative}/"));
                queue.push_back(path);
            } else {
                out.push(relative);
            }
        }
    }
    out.sort();
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VsCodeLink {
    pub url: Option<String>,
    pub error: Option<String>,
}

pub fn resolve_vscode_link(agent_state: AgentState, workspace_path: Option<&Path>) -> VsCodeLink {
    if agent_state.is_runtime_inactive() {
        return VsCodeLink {
            url: None,
            error: Some(format!("runtime is {}", agent_state.label())),
        };
    }
    match workspace_path {
        Some(path) if path.is_dir() => VsCodeLink {
            url: Some(format!("vscode://file{}", absolute_display(path))),
            error: None,
        },
        Some(path) => VsCodeLink {
            url: None,
            error: Some(format!("{} does not exist", path.display())),
        },
        None => VsCodeLink {
            url: None,
            error: Some("no workspace is attached to this conversation".to_string()),
        },
    }
}

fn absolute_display(path: &Path) -> String {
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = absolute.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        text
    } else {
        format!("/{text}")
    }
}

pub trait EditorLauncher {
    fn open_url(&mut self, url: &str) -> io::Result<()>;
}

/// Launches a configured command line with the URL appended.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl EditorLauncher for CommandLauncher {
    fn open_url(&mut self, url: &str) -> io::Result<()> {
        Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }
}

/// Opens the link in the editor, or posts the link error as a toast.
pub fn open_vscode(link: &VsCodeLink, launcher: &mut dyn EditorLauncher, notifier: &mut dyn Notifier) {
    let toast_id = || {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("open-vscode-error-{millis}")
    };
    if let Some(url) = &link.url {
        if let Err(err) = launcher.open_url(url) {
            notifier.error(
                &toast_id(),
                &format!("Failed to switch to VS Code: {err}"),
            );
        }
    } else if let Some(error) = &link.error {
        notifier.error(&toast_id(), &format!("Failed to switch to VS Code: {error}"));
    }
}

#[cfg(test)]
#[path = "../tests/unit/explorer_tests.rs"]
mod tests;
