use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

pub trait AnalyticsSink {
    fn record(&mut self, event: &str, fields: &BTreeMap<String, String>);
}

#[derive(Debug, Serialize)]
struct AnalyticsLine<'a> {
    event: &'a str,
    recorded_at_epoch_secs: u64,
    fields: &'a BTreeMap<String, String>,
}

/// Appends one JSON object per event to a local file.
#[derive(Debug, Clone)]
pub struct JsonlAnalyticsSink {
    path: PathBuf,
}

impl JsonlAnalyticsSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &str, fields: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = AnalyticsLine {
            event,
            recorded_at_epoch_secs: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            fields,
        };
        let mut text = serde_json::to_string(&line).map_err(io::Error::other)?;
        text.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(text.as_bytes())
    }
}

impl AnalyticsSink for JsonlAnalyticsSink {
    fn record(&mut self, event: &str, fields: &BTreeMap<String, String>) {
        if let Err(err) = self.append(event, fields) {
            tracing::warn!(
                path = %self.path.display(),
                "failed to record analytics event {event}: {err}"
            );
        }
    }
}

/// Used when analytics are disabled in config.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAnalytics;

impl AnalyticsSink for DisabledAnalytics {
    fn record(&mut self, event: &str, _fields: &BTreeMap<String, String>) {
        tracing::debug!("analytics disabled; dropping {event}");
    }
}
