use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::artifact_io::{
    app_dir, expand_home, merge_toml_tables, parse_toml_table, read_text_file_if_exists,
    write_text_file_atomic,
};

pub const DEFAULT_CONFIG_TOML: &str = include_str!("default_config.toml");

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub analytics: AnalyticsConfig,
    pub logging: LoggingConfig,
    pub explorer: ExplorerConfig,
    pub vscode: VsCodeConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub settings_file: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub start_open: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VsCodeConfig {
    pub opener: String,
}

/// Identifiers offered by the model selector.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelsConfig {
    pub available: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_toml_str("").unwrap_or_else(|_| Self::emergency_fallback())
    }
}

impl AppConfig {
    pub fn default_path() -> io::Result<PathBuf> {
        Ok(app_dir()?.join("config.toml"))
    }

    /// Loads the user config layered over the embedded defaults. A missing
    /// file is created with the defaults so users have something to edit.
    pub fn load(path: Option<&Path>) -> io::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        let text = match read_text_file_if_exists(&path)? {
            Some(text) => text,
            None => {
                write_text_file_atomic(&path, DEFAULT_CONFIG_TOML)?;
                String::new()
            }
        };
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> io::Result<Self> {
        let mut merged = parse_toml_table(DEFAULT_CONFIG_TOML)?;
        merge_toml_tables(&mut merged, parse_toml_table(text)?);
        merged
            .try_into::<Self>()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    pub fn settings_file(&self) -> io::Result<PathBuf> {
        expand_home(&self.storage.settings_file)
    }

    pub fn analytics_file(&self) -> io::Result<PathBuf> {
        expand_home(&self.analytics.file)
    }

    pub fn log_file(&self) -> io::Result<PathBuf> {
        expand_home(&self.logging.file)
    }

    fn emergency_fallback() -> Self {
        Self {
            storage: StorageConfig {
                settings_file: "~/.agentdesk/settings.json".to_string(),
            },
            analytics: AnalyticsConfig {
                enabled: false,
                file: "~/.agentdesk/analytics.jsonl".to_string(),
            },
            logging: LoggingConfig {
                level: "warn".to_string(),
                file: "~/.agentdesk/agentdesk.log".to_string(),
            },
            explorer: ExplorerConfig {
                start_open: true,
                max_entries: 2000,
            },
            vscode: VsCodeConfig {
                opener: "code --open-url".to_string(),
            },
            models: ModelsConfig {
                available: vec!["openai/gpt-4o".to_string()],
            },
        }
    }
}
