use crate::models::{ModelCatalog, ModelChoice};
use crate::settings::{
    REMOTE_RUNTIME_RESOURCE_FACTOR, SettingsFormFields, SettingsPayload, WORKSPACE_BASE,
    extract_settings,
};

pub const HIDDEN_KEY_PLACEHOLDER: &str = "<hidden>";
pub const WORKSPACE_BASE_PLACEHOLDER: &str = "e.g., /path/to/your/workspaces";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Model,
    ApiKey,
    WorkspaceBase,
    Save,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Model => FormField::ApiKey,
            FormField::ApiKey => FormField::WorkspaceBase,
            FormField::WorkspaceBase => FormField::Save,
            FormField::Save => FormField::Model,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Model => FormField::Save,
            FormField::ApiKey => FormField::Model,
            FormField::WorkspaceBase => FormField::ApiKey,
            FormField::Save => FormField::WorkspaceBase,
        }
    }
}

/// Editable state behind the settings modal.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    choices: Vec<ModelChoice>,
    selected_model: Option<usize>,
    api_key_input: String,
    workspace_base_input: String,
    resource_factor: Option<String>,
    key_already_set: bool,
    focus: FormField,
    error: Option<String>,
}

impl SettingsForm {
    /// Seeds the form from the settings the backend reports. The current
    /// model goes in first so it stays selectable and keeps its exact
    /// identifier.
    pub fn new(settings: &SettingsPayload, models: &[String]) -> Self {
        let current = settings.llm_model().map(str::trim).filter(|m| !m.is_empty());
        let catalog = ModelCatalog::organize(
            current
                .into_iter()
                .chain(models.iter().map(String::as_str)),
        );
        let selected_model = current
            .and_then(|model| catalog.position_of(model))
            .or(if catalog.is_empty() { None } else { Some(0) });
        Self {
            choices: catalog.choices(),
            selected_model,
            api_key_input: String::new(),
            workspace_base_input: settings.get(WORKSPACE_BASE).unwrap_or_default().to_string(),
            resource_factor: settings
                .get(REMOTE_RUNTIME_RESOURCE_FACTOR)
                .map(str::to_string),
            key_already_set: settings.is_api_key_set(),
            focus: FormField::Model,
            error: None,
        }
    }

    pub fn focus(&self) -> FormField {
        self.focus
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    pub fn model_choices(&self) -> &[ModelChoice] {
        &self.choices
    }

    pub fn selected_model_index(&self) -> Option<usize> {
        self.selected_model
    }

    pub fn selected_model(&self) -> Option<&ModelChoice> {
        self.selected_model.and_then(|idx| self.choices.get(idx))
    }

    pub fn select_prev_model(&mut self) {
        if let Some(idx) = self.selected_model.as_mut() {
            *idx = idx.saturating_sub(1);
        }
    }

    pub fn select_next_model(&mut self) {
        if let Some(idx) = self.selected_model.as_mut() {
            *idx = (*idx + 1).min(self.choices.len().saturating_sub(1));
        }
    }

    pub fn input_char(&mut self, ch: char) {
        match self.focus {
            FormField::ApiKey => self.api_key_input.push(ch),
            FormField::WorkspaceBase => self.workspace_base_input.push(ch),
            FormField::Model | FormField::Save => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            FormField::ApiKey => {
                self.api_key_input.pop();
            }
            FormField::WorkspaceBase => {
                self.workspace_base_input.pop();
            }
            FormField::Model | FormField::Save => {}
        }
    }

    pub fn is_key_set(&self) -> bool {
        self.key_already_set
    }

    pub fn api_key_placeholder(&self) -> &'static str {
        if self.key_already_set {
            HIDDEN_KEY_PLACEHOLDER
        } else {
            ""
        }
    }

    /// Input rendered as bullets; the key itself is never drawn.
    pub fn masked_api_key_input(&self) -> String {
        "•".repeat(self.api_key_input.chars().count())
    }

    pub fn workspace_base_input(&self) -> &str {
        &self.workspace_base_input
    }

    /// A model must be selected before the form can be saved.
    pub fn is_valid(&self) -> bool {
        self.selected_model().is_some()
    }

    pub fn fields(&self) -> SettingsFormFields {
        SettingsFormFields {
            model: self
                .selected_model()
                .map(|choice| choice.id.clone())
                .unwrap_or_default(),
            api_key_input: self.api_key_input.clone(),
            workspace_base_input: self.workspace_base_input.clone(),
            resource_factor: self.resource_factor.clone(),
        }
    }

    pub fn payload(&self) -> SettingsPayload {
        extract_settings(&self.fields(), self.key_already_set)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
