use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::artifact_io::{read_text_file_if_exists, write_text_file_atomic};
use crate::gate::{PersistenceFailure, SaveCompletion, SaveResult, SaveTicket, SettingsPersistence};
use crate::settings::{
    LLM_API_KEY, LLM_MODEL, MASKED_API_KEY, REMOTE_RUNTIME_RESOURCE_FACTOR, SettingsPayload,
    WORKSPACE_BASE,
};

const MAX_COMPLETIONS_PER_DRAIN: usize = 32;

/// JSON-file settings backend.
#[derive(Debug, Clone)]
pub struct SettingsFileStore {
    path: PathBuf,
}

impl SettingsFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored settings including the raw API key.
    pub fn load_stored(&self) -> io::Result<SettingsPayload> {
        match read_text_file_if_exists(&self.path)? {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(&text)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
            _ => Ok(SettingsPayload::new()),
        }
    }

    /// Stored settings as the form sees them: a present key is replaced by
    /// the masked placeholder.
    pub fn load_for_form(&self) -> io::Result<SettingsPayload> {
        let mut payload = self.load_stored()?;
        if payload.get(LLM_API_KEY).is_some_and(|key| !key.is_empty()) {
            payload.set(LLM_API_KEY, MASKED_API_KEY);
        } else {
            payload.remove(LLM_API_KEY);
        }
        Ok(payload)
    }

    pub fn save(&self, payload: &SettingsPayload) -> SaveResult {
        validate_settings(payload)?;
        let mut stored = self.load_stored().map_err(|err| {
            PersistenceFailure::new(format!("Could not read existing settings: {err}"))
        })?;
        for (key, value) in payload.iter() {
            if key == LLM_API_KEY && value == MASKED_API_KEY {
                continue;
            }
            stored.set(key, value);
        }
        let text = serde_json::to_string_pretty(&stored)
            .map_err(|err| PersistenceFailure::new(format!("Could not encode settings: {err}")))?;
        write_text_file_atomic(&self.path, &text).map_err(|err| {
            PersistenceFailure::new(format!(
                "Could not write {}: {err}",
                self.path.display()
            ))
        })
    }
}

pub fn validate_settings(payload: &SettingsPayload) -> SaveResult {
    if payload
        .get(LLM_MODEL)
        .is_none_or(|model| model.trim().is_empty())
    {
        return Err(PersistenceFailure::new("An LLM model must be selected"));
    }
    if let Some(factor) = payload.get(REMOTE_RUNTIME_RESOURCE_FACTOR) {
        match factor.trim().parse::<u32>() {
            Ok(value) if value > 0 => {}
            _ => {
                return Err(PersistenceFailure::new(format!(
                    "Runtime resource factor must be a positive integer, got '{factor}'"
                )));
            }
        }
    }
    if let Some(base) = payload.workspace_base()
        && !Path::new(base).is_absolute()
    {
        return Err(PersistenceFailure::new(format!(
            "Workspaces base directory must be an absolute path, got '{base}'"
        )));
    }
    Ok(())
}

/// Runs saves on a worker thread so the event loop never blocks on disk.
pub struct SettingsSaveAdapter {
    store: Arc<SettingsFileStore>,
    completion_tx: Sender<SaveCompletion>,
    completion_rx: Receiver<SaveCompletion>,
}

impl SettingsSaveAdapter {
    pub fn new(store: SettingsFileStore) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel();
        Self {
            store: Arc::new(store),
            completion_tx,
            completion_rx,
        }
    }

    pub fn drain_completions_limited(&self, max_completions: usize) -> Vec<SaveCompletion> {
        let mut completions = Vec::new();
        while completions.len() < max_completions {
            let Ok(completion) = self.completion_rx.try_recv() else {
                break;
            };
            completions.push(completion);
        }
        completions
    }
}

impl SettingsPersistence for SettingsSaveAdapter {
    fn save(&mut self, ticket: SaveTicket, payload: SettingsPayload) {
        let store = Arc::clone(&self.store);
        let tx = self.completion_tx.clone();
        thread::spawn(move || {
            let result = store.save(&payload);
            if let Err(failure) = &result {
                tracing::warn!(ticket = ticket.id(), "settings save failed: {failure}");
            }
            let _ = tx.send(SaveCompletion { ticket, result });
        });
    }

    fn drain_completions(&mut self) -> Vec<SaveCompletion> {
        self.drain_completions_limited(MAX_COMPLETIONS_PER_DRAIN)
    }
}

#[cfg(test)]
#[path = "../tests/unit/settings_store_tests.rs"]
mod tests;
