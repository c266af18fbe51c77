//! Turning files into documents.
//!
//! Plain text files become one document per paragraph and JSON files one
//! document per entry. [`DocumentProcessor::process_path`] also cleans the
//! text and splits long documents into overlapping chunks.

use std::path::Path;

use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::document::{Metadata, MetadataValue, NewDocument, metadata};
use crate::error::{Result, RetrievalError};

/// Extensions the processor reads.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "json"];

/// Sentence endings searched for when picking a chunk boundary.
const SENTENCE_ENDINGS: [char; 3] = ['.', '!', '?'];

/// How far back from the chunk end a sentence boundary is searched for.
const BOUNDARY_LOOKBACK: usize = 100;

/// Reads supported files into documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    config: IngestConfig,
}

impl DocumentProcessor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Read a file or every supported file below a directory, then clean and
    /// chunk the text.
    pub fn process_path(&self, path: impl AsRef<Path>) -> Result<Vec<NewDocument>> {
        let path = path.as_ref();
        let raw = if path.is_dir() {
            self.process_directory(path)?
        } else {
            self.process_file(path)?
        };

        let mut documents = Vec::with_capacity(raw.len());
        for document in raw {
            let text = preprocess_text(&document.text, self.config.min_text_length);
            if text.is_empty() {
                continue;
            }

            let chunks = chunk_text(&text, self.config.chunk_size, self.config.overlap);
            if chunks.len() == 1 {
                documents.push(NewDocument {
                    text,
                    ..document
                });
                continue;
            }

            let base = document.metadata.unwrap_or_default();
            for (i, chunk) in chunks.into_iter().enumerate() {
                let mut meta = base.clone();
                meta.insert("chunk".to_string(), MetadataValue::from(i + 1));
                documents.push(NewDocument::new(chunk).with_metadata(meta));
            }
        }

        debug!("Prepared {} documents from {}", documents.len(), path.display());
        Ok(documents)
    }

    /// Read one file according to its extension.
    pub fn process_file(&self, path: &Path) -> Result<Vec<NewDocument>> {
        if !path.exists() {
            return Err(RetrievalError::FileNotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "txt" => self.process_text_file(path),
            "json" => self.process_json_file(path),
            other => {
                warn!("Unsupported file format {other:?}: {}", path.display());
                Ok(Vec::new())
            }
        }
    }

    /// Read every supported file below `dir`. Files that fail are logged and
    /// skipped.
    pub fn process_directory(&self, dir: &Path) -> Result<Vec<NewDocument>> {
        if !dir.exists() {
            return Err(RetrievalError::FileNotFound(dir.to_path_buf()));
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| is_supported(e.path()))
        {
            match self.process_file(entry.path()) {
                Ok(found) => documents.extend(found),
                Err(e) => error!("Error processing {}: {e}", entry.path().display()),
            }
        }
        Ok(documents)
    }

    /// One document per blank-line separated paragraph.
    pub fn process_text_file(&self, path: &Path) -> Result<Vec<NewDocument>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Ingest(format!("{}: {e}", path.display())))?;
        let source = file_stem(path);

        Ok(content
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .enumerate()
            .map(|(i, paragraph)| {
                NewDocument::new(paragraph).with_metadata(metadata([
                    ("source", MetadataValue::from(source.as_str())),
                    ("type", MetadataValue::from("text")),
                    ("paragraph", MetadataValue::from(i + 1)),
                ]))
            })
            .collect())
    }

    /// Accepts an array of strings or objects, an object with a `documents`
    /// array, or a single object. Objects carry their text in `text` or
    /// `content`.
    pub fn process_json_file(&self, path: &Path) -> Result<Vec<NewDocument>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Ingest(format!("{}: {e}", path.display())))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| RetrievalError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;
        let source = file_stem(path);

        let documents = match &value {
            serde_json::Value::Array(items) => json_items(items, &source),
            serde_json::Value::Object(object) => match object.get("documents") {
                Some(serde_json::Value::Array(items)) => json_items(items, &source),
                _ => json_object(object, &source, None).into_iter().collect(),
            },
            _ => Vec::new(),
        };
        Ok(documents)
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn json_items(items: &[serde_json::Value], source: &str) -> Vec<NewDocument> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
            serde_json::Value::String(text) if !text.is_empty() => Some(
                NewDocument::new(text.as_str()).with_metadata(base_json_metadata(source, Some(i))),
            ),
            serde_json::Value::Object(object) => json_object(object, source, Some(i)),
            _ => None,
        })
        .collect()
}

fn json_object(
    object: &serde_json::Map<String, serde_json::Value>,
    source: &str,
    index: Option<usize>,
) -> Option<NewDocument> {
    let text = ["text", "content"]
        .iter()
        .find_map(|key| object.get(*key).and_then(serde_json::Value::as_str))
        .filter(|t| !t.is_empty())?;

    let mut meta = base_json_metadata(source, index);
    for (key, value) in object {
        if key == "text" || key == "content" {
            continue;
        }
        if let Some(value) = MetadataValue::from_json(value) {
            meta.insert(key.clone(), value);
        }
    }
    Some(NewDocument::new(text).with_metadata(meta))
}

fn base_json_metadata(source: &str, index: Option<usize>) -> Metadata {
    let mut meta = metadata([("source", source), ("type", "json")]);
    if let Some(index) = index {
        meta.insert("index".to_string(), MetadataValue::from(index));
    }
    meta
}

/// Split `text` into chunks of about `chunk_size` characters, consecutive
/// chunks sharing `overlap` characters. A chunk ends after a `.`, `!` or `?`
/// when one is found in the last 100 characters (and not in the first half).
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_size = chunk_size.max(1);
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }
    let overlap = overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = start + chunk_size;

        if end < chars.len() {
            let floor = (start + chunk_size / 2).max(end.saturating_sub(BOUNDARY_LOOKBACK));
            if let Some(boundary) = (floor + 1..=end)
                .rev()
                .find(|&i| SENTENCE_ENDINGS.contains(&chars[i]))
            {
                end = boundary + 1;
            }
        }
        let end = end.min(chars.len());

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = (end - overlap).max(start + 1);
    }

    chunks
}

/// Collapse runs of whitespace; texts shorter than `min_length` characters
/// become empty.
pub fn preprocess_text(text: &str, min_length: usize) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() < min_length {
        return String::new();
    }
    text
}
