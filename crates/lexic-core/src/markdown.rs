//! Markdown documents with YAML frontmatter.
//!
//! Every artifact Lexic persists (decision extracts, synthetic case steps,
//! predictions, evaluations, summaries) is a markdown file that may start
//! with a YAML mapping between two `---` lines:
//!
//! ```text
//! ---
//! case_id: case_001_pl
//! step: qualification
//! ---
//!
//! # Prediction
//! ...
//! ```
//!
//! Content is trimmed on read, so `write` followed by `read` returns the
//! same metadata and the same (trimmed) content.

use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::CoreError;

const DELIMITER: &str = "---\n";

/// Frontmatter metadata. Ordered so rendered files are stable.
pub type Metadata = BTreeMap<String, YamlValue>;

/// A markdown document split into frontmatter and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub metadata: Metadata,
    pub content: String,
}

impl Document {
    pub fn new(metadata: Metadata, content: impl Into<String>) -> Self {
        Self {
            metadata,
            content: content.into(),
        }
    }

    /// Get a string metadata field.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Build a metadata map from string pairs.
pub fn metadata<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Metadata
where
    K: Into<String>,
    V: Into<YamlValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Split raw file text into frontmatter and body.
///
/// Text without a complete frontmatter block is returned as content with
/// empty metadata.
pub fn parse_markdown(text: &str) -> Result<Document, serde_yaml::Error> {
    if let Some(rest) = text.strip_prefix(DELIMITER) {
        let split = if let Some(body) = rest.strip_prefix(DELIMITER) {
            Some(("", body))
        } else {
            rest.find("\n---\n")
                .map(|idx| (&rest[..idx + 1], &rest[idx + 1 + DELIMITER.len()..]))
        };

        if let Some((yaml, body)) = split {
            let metadata: Option<Metadata> = serde_yaml::from_str(yaml)?;
            return Ok(Document {
                metadata: metadata.unwrap_or_default(),
                content: body.trim().to_string(),
            });
        }
    }

    Ok(Document {
        metadata: Metadata::new(),
        content: text.trim().to_string(),
    })
}

/// Render a document to file text.
pub fn render_markdown(metadata: &Metadata, content: &str) -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    if !metadata.is_empty() {
        out.push_str(DELIMITER);
        out.push_str(&serde_yaml::to_string(metadata)?);
        out.push_str(DELIMITER);
        out.push('\n');
    }
    out.push_str(content);
    Ok(out)
}

/// Read a markdown file with optional YAML frontmatter.
pub fn read_markdown(path: impl AsRef<Path>) -> Result<Document, CoreError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    parse_markdown(&text).map_err(|source| CoreError::Frontmatter {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a markdown file, creating parent directories as needed.
pub fn write_markdown(
    path: impl AsRef<Path>,
    metadata: &Metadata,
    content: &str,
) -> Result<(), CoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
    }
    let text = render_markdown(metadata, content)?;
    fs::write(path, text).map_err(|e| CoreError::io(path, e))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "Wrote markdown");
    Ok(())
}
