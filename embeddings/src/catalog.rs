//! Catalog of the embedding models the manager knows how to bind.

use serde::{Deserialize, Serialize};

/// Provider family a model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// In-process inference.
    Local,
    /// OpenAI-compatible embeddings API.
    Remote,
    /// Deterministic token hashing, no model weights.
    Mock,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Models available for in-process inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LocalModel {
    /// `all-MiniLM-L6-v2`
    #[default]
    #[serde(rename = "all-MiniLM-L6-v2")]
    AllMiniLmL6V2,
    /// `all-mpnet-base-v2`
    #[serde(rename = "all-mpnet-base-v2")]
    AllMpnetBaseV2,
    /// `paraphrase-multilingual-MiniLM-L12-v2`
    #[serde(rename = "paraphrase-multilingual-MiniLM-L12-v2")]
    ParaphraseMultilingualMiniLmL12V2,
}

impl LocalModel {
    pub const ALL: [LocalModel; 3] = [
        LocalModel::AllMiniLmL6V2,
        LocalModel::AllMpnetBaseV2,
        LocalModel::ParaphraseMultilingualMiniLmL12V2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "all-MiniLM-L6-v2",
            Self::AllMpnetBaseV2 => "all-mpnet-base-v2",
            Self::ParaphraseMultilingualMiniLmL12V2 => "paraphrase-multilingual-MiniLM-L12-v2",
        }
    }

    /// Look a model up by name, ignoring ASCII case and an optional
    /// `sentence-transformers/` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix("sentence-transformers/").unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|model| model.name().eq_ignore_ascii_case(name))
    }

    pub fn info(self) -> ModelInfo {
        match self {
            Self::AllMiniLmL6V2 => ModelInfo::known(
                384,
                "Fast and efficient, good for general use",
                "~80MB",
            ),
            Self::AllMpnetBaseV2 => {
                ModelInfo::known(768, "Higher quality embeddings, slower", "~420MB")
            }
            Self::ParaphraseMultilingualMiniLmL12V2 => {
                ModelInfo::known(384, "Multilingual support", "~420MB")
            }
        }
    }

    pub fn dimensions(self) -> usize {
        match self {
            Self::AllMiniLmL6V2 | Self::ParaphraseMultilingualMiniLmL12V2 => 384,
            Self::AllMpnetBaseV2 => 768,
        }
    }
}

impl std::fmt::Display for LocalModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Remote models with a known output size.
pub const REMOTE_MODELS: [(&str, usize, &str); 3] = [
    (
        "text-embedding-ada-002",
        1536,
        "OpenAI embedding model (requires API key)",
    ),
    (
        "text-embedding-3-small",
        1536,
        "OpenAI small embedding model (requires API key)",
    ),
    (
        "text-embedding-3-large",
        3072,
        "OpenAI large embedding model (requires API key)",
    ),
];

/// Default remote model.
pub const DEFAULT_REMOTE_MODEL: &str = "text-embedding-ada-002";

/// Output dimensionality of a remote model, if it is in the catalog.
pub fn remote_dimensions(model: &str) -> Option<usize> {
    REMOTE_MODELS
        .iter()
        .find(|(name, _, _)| *name == model)
        .map(|(_, dimensions, _)| *dimensions)
}

/// Descriptive record for a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Output dimensionality, `None` when the model is not in the catalog.
    pub dimensions: Option<usize>,

    /// Human-readable description.
    pub description: String,

    /// Approximate footprint.
    pub size: String,
}

impl ModelInfo {
    pub(crate) fn known(dimensions: usize, description: &str, size: &str) -> Self {
        Self {
            dimensions: Some(dimensions),
            description: description.to_string(),
            size: size.to_string(),
        }
    }

    /// Placeholder for a model the catalog does not describe.
    pub fn unknown(provider: ProviderKind, model: &str) -> Self {
        Self {
            dimensions: None,
            description: format!("{provider} model: {model}"),
            size: "unknown".to_string(),
        }
    }
}

/// One row of [`available_models`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub provider: ProviderKind,
    pub model: String,
    pub info: ModelInfo,
}

/// Look up a model by provider and name.
pub fn lookup(provider: ProviderKind, model: &str) -> Option<ModelInfo> {
    match provider {
        ProviderKind::Local => LocalModel::from_name(model).map(LocalModel::info),
        ProviderKind::Remote => REMOTE_MODELS
            .iter()
            .find(|(name, _, _)| *name == model)
            .map(|(_, dimensions, description)| {
                ModelInfo::known(*dimensions, description, "API-based")
            }),
        // Mock output size is chosen per binding
        ProviderKind::Mock => None,
    }
}

/// Every model in the catalog, local models first.
pub fn available_models() -> Vec<CatalogEntry> {
    let local = LocalModel::ALL.into_iter().map(|model| CatalogEntry {
        provider: ProviderKind::Local,
        model: model.name().to_string(),
        info: model.info(),
    });
    let remote = REMOTE_MODELS.iter().map(|(name, dimensions, description)| CatalogEntry {
        provider: ProviderKind::Remote,
        model: (*name).to_string(),
        info: ModelInfo::known(*dimensions, description, "API-based"),
    });
    local.chain(remote).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_local_model_lookup() {
        assert_eq!(
            LocalModel::from_name("all-minilm-l6-v2"),
            Some(LocalModel::AllMiniLmL6V2)
        );
        assert_eq!(
            LocalModel::from_name("sentence-transformers/all-mpnet-base-v2"),
            Some(LocalModel::AllMpnetBaseV2)
        );
        assert_eq!(LocalModel::from_name("bert-base-uncased"), None);
    }

    #[test]
    fn test_catalog_dimensions_agree() {
        for model in LocalModel::ALL {
            assert_eq!(model.info().dimensions, Some(model.dimensions()));
        }
        assert_eq!(remote_dimensions("text-embedding-3-large"), Some(3072));
        assert_eq!(remote_dimensions("nope"), None);
    }

    #[test]
    fn test_available_models_lists_both_providers() {
        let models = available_models();
        assert_eq!(models.len(), 6);
        assert!(models
            .iter()
            .any(|entry| entry.provider == ProviderKind::Local && entry.model == "all-MiniLM-L6-v2"));
        assert!(models
            .iter()
            .any(|entry| entry.provider == ProviderKind::Remote
                && entry.model == "text-embedding-ada-002"));
    }

    #[test]
    fn test_unknown_model_info() {
        assert_eq!(lookup(ProviderKind::Remote, "custom-embedder"), None);
        let info = ModelInfo::unknown(ProviderKind::Remote, "custom-embedder");
        assert_eq!(info.dimensions, None);
        assert_eq!(info.size, "unknown");
        assert_eq!(info.description, "remote model: custom-embedder");
    }
}
