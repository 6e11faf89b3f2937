use std::collections::BTreeMap;

const OTHER_PROVIDER: &str = "other";

/// Model identifiers grouped by provider, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    providers: BTreeMap<String, Vec<CatalogEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogEntry {
    model: String,
    /// Identifier exactly as it was supplied, separator or not.
    id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub provider: String,
    pub model: String,
    /// Identifier as the backend expects it.
    pub id: String,
}

pub fn split_model_id(id: &str) -> (String, String) {
    let id = id.trim();
    if let Some((provider, model)) = id.split_once('/')
        && !provider.is_empty()
        && !model.is_empty()
    {
        return (provider.to_string(), model.to_string());
    }
    let provider = if id.starts_with("gpt-") || id.starts_with("o1") || id.starts_with("o3") {
        "openai"
    } else if id.starts_with("claude-") {
        "anthropic"
    } else {
        OTHER_PROVIDER
    };
    (provider.to_string(), id.to_string())
}

impl ModelCatalog {
    /// Groups identifiers by provider. When two identifiers name the same
    /// model, the first one supplied is kept.
    pub fn organize<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut providers: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
        for raw in models {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let (provider, model) = split_model_id(raw);
            providers.entry(provider).or_default().push(CatalogEntry {
                model,
                id: raw.to_string(),
            });
        }
        for entries in providers.values_mut() {
            entries.sort_by(|a, b| a.model.cmp(&b.model));
            entries.dedup_by(|later, earlier| later.model == earlier.model);
        }
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn models_for(&self, provider: &str) -> Vec<&str> {
        self.providers
            .get(provider)
            .map(|entries| entries.iter().map(|entry| entry.model.as_str()).collect())
            .unwrap_or_default()
    }

    /// Flat list in display order, used by the selector.
    pub fn choices(&self) -> Vec<ModelChoice> {
        let mut out = Vec::new();
        for (provider, entries) in &self.providers {
            for entry in entries {
                out.push(ModelChoice {
                    provider: provider.clone(),
                    model: entry.model.clone(),
                    id: entry.id.clone(),
                });
            }
        }
        out
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        let (provider, model) = split_model_id(id);
        self.choices()
            .iter()
            .position(|choice| choice.provider == provider && choice.model == model)
    }
}
