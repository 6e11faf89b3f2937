use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const LLM_MODEL: &str = "LLM_MODEL";
pub const LLM_API_KEY: &str = "LLM_API_KEY";
pub const WORKSPACE_BASE: &str = "WORKSPACE_BASE";
pub const REMOTE_RUNTIME_RESOURCE_FACTOR: &str = "REMOTE_RUNTIME_RESOURCE_FACTOR";

/// Placeholder the backend reports in place of a stored API key.
pub const MASKED_API_KEY: &str = "**********";

pub const SETTINGS_SAVED_EVENT: &str = "settings_saved";

const CREDENTIAL_KEYS: [&str; 1] = [LLM_API_KEY];
const ANALYTICS_VALUE_KEYS: [&str; 2] = [LLM_MODEL, REMOTE_RUNTIME_RESOURCE_FACTOR];

/// One unit of user-editable settings, keyed by setting name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsPayload {
    values: BTreeMap<String, String>,
}

impl SettingsPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn llm_model(&self) -> Option<&str> {
        self.get(LLM_MODEL)
    }

    pub fn workspace_base(&self) -> Option<&str> {
        self.get(WORKSPACE_BASE).filter(|value| !value.trim().is_empty())
    }

    /// True when the stored key is reported back only as the masked placeholder.
    pub fn is_api_key_set(&self) -> bool {
        self.get(LLM_API_KEY) == Some(MASKED_API_KEY)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SettingsPayload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

pub fn is_credential_key(key: &str) -> bool {
    CREDENTIAL_KEYS.contains(&key)
}

/// Raw values captured from the settings form at submit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsFormFields {
    pub model: String,
    pub api_key_input: String,
    pub workspace_base_input: String,
    pub resource_factor: Option<String>,
}

/// Builds the payload the form submits.
///
/// An empty API key input while a key is already stored submits the masked
/// placeholder, which the store reads as "keep the existing key". An empty
/// input with no stored key submits an empty value, which clears it.
pub fn extract_settings(fields: &SettingsFormFields, api_key_already_set: bool) -> SettingsPayload {
    let mut payload = SettingsPayload::new().with(LLM_MODEL, fields.model.trim());

    let api_key = fields.api_key_input.trim();
    if api_key.is_empty() && api_key_already_set {
        payload.set(LLM_API_KEY, MASKED_API_KEY);
    } else {
        payload.set(LLM_API_KEY, api_key);
    }

    payload.set(WORKSPACE_BASE, fields.workspace_base_input.trim());

    if let Some(factor) = fields
        .resource_factor
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        payload.set(REMOTE_RUNTIME_RESOURCE_FACTOR, factor);
    }
    payload
}

/// Fields recorded with the `settings_saved` analytics event: the model, the
/// resource factor when present, and a `SET`/`UNSET` flag per credential.
/// Nothing else from the payload is sent.
pub fn analytics_fields(payload: &SettingsPayload) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for key in ANALYTICS_VALUE_KEYS {
        if let Some(value) = payload.get(key) {
            fields.insert(key.to_string(), value.to_string());
        }
    }
    for key in CREDENTIAL_KEYS {
        let present = payload.get(key).is_some_and(|value| !value.is_empty());
        fields.insert(
            key.to_string(),
            if present { "SET" } else { "UNSET" }.to_string(),
        );
    }
    fields
}

#[cfg(test)]
#[path = "../tests/unit/settings_tests.rs"]
mod tests;
