use super::*;

use std::time::{Duration, Instant};

use crate::notify::{ToastLevel, ToastQueue};

fn seed_workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    fs::create_dir_all(root.join("src/nested")).expect("mkdir");
    fs::create_dir_all(root.join("node_modules/pkg")).expect("mkdir");
    fs::create_dir_all(root.join(".git")).expect("mkdir");
    fs::write(root.join("README.md"), "hi").expect("write");
    fs::write(root.join("src/main.rs"), "fn main() {}").expect("write");
    fs::write(root.join("src/nested/lib.rs"), "").expect("write");
    fs::write(root.join("node_modules/pkg/index.js"), "").expect("write");
    fs::write(root.join(".env"), "SECRET=1").expect("write");
    dir
}

fn wait_for_listing(lister: &FileListAdapter) -> Vec<ListingEvent> {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut events = Vec::new();
    while Instant::now() < deadline && events.is_empty() {
        events.extend(lister.drain_events());
        std::thread::sleep(Duration::from_millis(10));
    }
    events
}

#[derive(Default)]
struct RecordingLauncher {
    opened: Vec<String>,
    fail: bool,
}

impl EditorLauncher for RecordingLauncher {
    fn open_url(&mut self, url: &str) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "code not installed"));
        }
        self.opened.push(url.to_string());
        Ok(())
    }
}

#[test]
fn listing_is_flat_sorted_and_skips_hidden_and_ignored() {
    let dir = seed_workspace();
    let files = list_workspace_files(dir.path(), 100).expect("listing");
    assert_eq!(
        files,
        vec!["README.md", "src/", "src/main.rs", "src/nested/", "src/nested/lib.rs"]
    );
}

#[test]
fn listing_respects_max_entries() {
    let dir = seed_workspace();
    let files = list_workspace_files(dir.path(), 2).expect("listing");
    assert_eq!(files.len(), 2);
}

#[test]
fn listing_missing_root_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(list_workspace_files(&dir.path().join("missing"), 10).is_err());
}

#[test]
fn header_label_prefers_workspace_path_when_open() {
    let mut panel = ExplorerPanel::new(true);
    assert_eq!(
        panel.header_label(Some(Path::new("/ws/c1"))).as_deref(),
        Some("/ws/c1")
    );
    assert_eq!(panel.header_label(None).as_deref(), Some("Workspace"));
    panel.toggle();
    assert_eq!(panel.header_label(Some(Path::new("/ws/c1"))), None);
}

#[test]
fn refresh_is_skipped_while_runtime_inactive() {
    let dir = seed_workspace();
    let lister = FileListAdapter::new(100);
    let mut panel = ExplorerPanel::new(true);
    for state in [AgentState::Init, AgentState::Loading, AgentState::Stopped, AgentState::Error] {
        assert!(panel.refresh(state, Some(dir.path()), &lister).is_none());
    }
    assert!(!panel.is_loading());
    std::thread::sleep(Duration::from_millis(50));
    assert!(lister.drain_events().is_empty());
}

#[test]
fn refresh_fetches_listing_when_running() {
    let dir = seed_workspace();
    let lister = FileListAdapter::new(100);
    let mut panel = ExplorerPanel::new(true);
    let generation = panel
        .refresh(AgentState::Running, Some(dir.path()), &lister)
        .expect("refresh should be issued");
    assert!(panel.is_loading());

    for event in wait_for_listing(&lister) {
        assert_eq!(event.generation, generation);
        panel.on_listing(event);
    }
    assert!(!panel.is_loading());
    assert!(panel.files().contains(&"src/main.rs".to_string()));
    assert!(panel.error().is_none());
}

#[test]
fn listing_error_replaces_tree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lister = FileListAdapter::new(100);
    let mut panel = ExplorerPanel::new(true);
    panel.refresh(AgentState::Running, Some(&dir.path().join("gone")), &lister);
    for event in wait_for_listing(&lister) {
        panel.on_listing(event);
    }
    assert!(panel.files().is_empty());
    assert!(
        panel
            .error()
            .is_some_and(|message| message.contains("Failed to list files"))
    );
}

#[test]
fn stale_listing_is_dropped() {
    let mut panel = ExplorerPanel::new(true);
    let lister = FileListAdapter::new(10);
    let dir = seed_workspace();
    panel.refresh(AgentState::Running, Some(dir.path()), &lister);
    panel.refresh(AgentState::Running, Some(dir.path()), &lister);

    panel.on_listing(ListingEvent {
        generation: 1,
        result: Ok(vec!["old.txt".to_string()]),
    });
    assert!(panel.files().is_empty());
    assert!(panel.is_loading());
}

#[test]
fn selection_stays_in_bounds() {
    let mut panel = ExplorerPanel::new(true);
    panel.select_next();
    assert_eq!(panel.selected(), 0);

    let lister = FileListAdapter::new(10);
    let dir = seed_workspace();
    let generation = panel
        .refresh(AgentState::Running, Some(dir.path()), &lister)
        .expect("refresh");
    panel.on_listing(ListingEvent {
        generation,
        result: Ok(vec!["a".to_string(), "b".to_string()]),
    });
    panel.select_next();
    panel.select_next();
    panel.select_next();
    assert_eq!(panel.selected(), 1);
    panel.select_prev();
    panel.select_prev();
    assert_eq!(panel.selected(), 0);
}

#[test]
fn vscode_button_enabled_only_when_open_and_active() {
    let mut panel = ExplorerPanel::new(true);
    assert!(panel.vscode_enabled(AgentState::Running));
    assert!(!panel.vscode_enabled(AgentState::Stopped));
    panel.toggle();
    assert!(!panel.vscode_enabled(AgentState::Running));
}

#[test]
fn vscode_link_uses_workspace_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let link = resolve_vscode_link(AgentState::Running, Some(dir.path()));
    assert!(link.error.is_none());
    let url = link.url.expect("url should be present");
    assert!(url.starts_with("vscode://file/"));
}

#[test]
fn vscode_link_reports_errors() {
    let inactive = resolve_vscode_link(AgentState::Stopped, None);
    assert!(inactive.url.is_none());
    assert!(inactive.error.is_some_and(|e| e.contains("stopped")));

    let missing = resolve_vscode_link(AgentState::Running, None);
    assert!(missing.error.is_some());

    let dir = tempfile::tempdir().expect("tempdir");
    let gone = resolve_vscode_link(AgentState::Running, Some(&dir.path().join("gone")));
    assert!(gone.error.is_some_and(|e| e.contains("does not exist")));
}

#[test]
fn open_vscode_launches_url() {
    let mut launcher = RecordingLauncher::default();
    let mut toasts = ToastQueue::default();
    let link = VsCodeLink {
        url: Some("vscode://file/ws".to_string()),
        error: None,
    };
    open_vscode(&link, &mut launcher, &mut toasts);
    assert_eq!(launcher.opened, vec!["vscode://file/ws"]);
    assert!(toasts.is_empty());
}

#[test]
fn open_vscode_error_becomes_timestamped_toast() {
    let mut launcher = RecordingLauncher::default();
    let mut toasts = ToastQueue::default();
    let link = VsCodeLink {
        url: None,
        error: Some("runtime is stopped".to_string()),
    };
    open_vscode(&link, &mut launcher, &mut toasts);

    assert!(launcher.opened.is_empty());
    let toast = toasts.toasts().next().expect("toast should be posted");
    assert!(toast.id.starts_with("open-vscode-error-"));
    assert_eq!(toast.level, ToastLevel::Error);
    assert!(toast.message.contains("runtime is stopped"));
}

#[test]
fn open_vscode_launch_failure_is_reported() {
    let mut launcher = RecordingLauncher {
        fail: true,
        ..RecordingLauncher::default()
    };
    let mut toasts = ToastQueue::default();
    let link = VsCodeLink {
        url: Some("vscode://file/ws".to_string()),
        error: None,
    };
    open_vscode(&link, &mut launcher, &mut toasts);
    assert_eq!(toasts.len(), 1);
}

#[test]
fn command_launcher_parses_command_line() {
    let launcher = CommandLauncher::from_command_line("code --open-url").expect("parse");
    assert_eq!(launcher.program, "code");
    assert_eq!(launcher.args, vec!["--open-url"]);
    assert!(CommandLauncher::from_command_line("   ").is_none());
}
