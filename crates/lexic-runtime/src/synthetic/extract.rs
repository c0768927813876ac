//! Court decision extraction.
//!
//! A source decision (`court_decisions/<id>.md` or `.txt`) becomes a
//! directory of structured documents:
//!
//! ```text
//! court_decisions/<id>/
//!   full_text.md  parties.md  facts_timeline.md  evidence.md
//!   legal_bases.md  arguments.md  considerations.md  judgment.md
//!   name_mapping.json
//! ```
//!
//! Work already on disk is reused, so an interrupted extraction resumes
//! where it stopped.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use lexic_core::case::NAME_MAPPING_FILE;
use lexic_core::{
    metadata, parse_output, read_markdown, write_markdown, CaseStore, DecisionDocument,
    OutputSchema,
};

use super::BatchReport;
use crate::client::LlmClient;
use crate::config::ModelRole;
use crate::prompts::{PromptCategory, PromptTemplate};
use crate::{LexicRuntime, RuntimeError};

/// Characters of facts and judgment shown to the name-mapping prompt.
const MAPPING_CONTEXT_CHARS: usize = 800;

/// What [`DecisionExtractor::extract_decision`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Every document was already on disk.
    Skipped,
    /// The listed documents were written.
    Extracted { written: Vec<DecisionDocument> },
}

/// Extracts structured documents from court decisions.
pub struct DecisionExtractor {
    store: CaseStore,
    client: LlmClient,
    extract_prompt: PromptTemplate,
    mapping_prompt: PromptTemplate,
}

impl DecisionExtractor {
    pub fn new(
        store: CaseStore,
        client: LlmClient,
        extract_prompt: PromptTemplate,
        mapping_prompt: PromptTemplate,
    ) -> Self {
        Self {
            store,
            client,
            extract_prompt,
            mapping_prompt,
        }
    }

    /// Extractor using the runtime's extraction model and prompts.
    pub fn from_runtime(runtime: &LexicRuntime) -> Result<Self, RuntimeError> {
        Ok(Self::new(
            runtime.store.clone(),
            runtime.client(ModelRole::Extraction),
            runtime.prompts.get(PromptCategory::Extraction, "extract_all")?.clone(),
            runtime.prompts.get(PromptCategory::Extraction, "name_mapping")?.clone(),
        ))
    }

    /// Extract one decision from `source` into `court_decisions/<decision_id>/`.
    pub async fn extract_decision(
        &self,
        source: &Path,
        decision_id: &str,
    ) -> Result<ExtractionOutcome, RuntimeError> {
        let full_text = self.load_or_write_full_text(source, decision_id)?;

        let missing: Vec<DecisionDocument> = DecisionDocument::extracted()
            .iter()
            .copied()
            .filter(|doc| !self.store.decision_file(decision_id, *doc).exists())
            .collect();
        if missing.is_empty() {
            tracing::info!(decision_id, "All documents already extracted, skipping");
            return Ok(ExtractionOutcome::Skipped);
        }

        tracing::info!(decision_id, missing = missing.len(), "Extracting decision");
        let messages = self.extract_prompt.render(&[("full_text", full_text.as_str())])?;
        let reply = self.client.complete(messages).await?;
        let value: Value = parse_output(OutputSchema::Extraction, &reply)?;

        let mut fields: BTreeMap<DecisionDocument, String> = DecisionDocument::extracted()
            .iter()
            .map(|doc| (*doc, field_text(&value, doc.key())))
            .collect();

        let mapping = self.load_or_create_mapping(decision_id, &fields).await?;
        for text in fields.values_mut() {
            *text = apply_name_mapping(text, &mapping);
        }
        for doc in [DecisionDocument::Parties, DecisionDocument::FactsTimeline] {
            if let Some(text) = fields.get_mut(&doc) {
                *text = bulletize(text);
            }
        }

        let source_file = file_name(source);
        let meta = metadata([
            ("decision_id", decision_id.to_string()),
            ("source_file", source_file),
            ("extraction_model", self.client.model().to_string()),
        ]);
        for doc in &missing {
            let body = fields.get(doc).map(String::as_str).unwrap_or_default();
            let path = self.store.decision_file(decision_id, *doc);
            write_markdown(&path, &meta, &format!("# {}\n\n{}", doc.title(), body))?;
            tracing::debug!(decision_id, document = doc.key(), "Saved extracted document");
        }

        tracing::info!(decision_id, written = missing.len(), "Decision extracted");
        Ok(ExtractionOutcome::Extracted { written: missing })
    }

    /// Extract every source decision, logging and continuing on failure.
    pub async fn extract_all_decisions(&self) -> Result<BatchReport, RuntimeError> {
        let sources = self.store.list_decision_sources()?;
        let mut report = BatchReport::default();
        if sources.is_empty() {
            tracing::warn!(dir = %self.store.decisions_dir().display(), "No decision sources found");
            return Ok(report);
        }

        tracing::info!(count = sources.len(), "Extracting decisions");
        for source in &sources {
            let Some(decision_id) = source.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.extract_decision(source, decision_id).await {
                Ok(_) => report.record_ok(decision_id),
                Err(e) => {
                    tracing::error!(decision_id, error = %e, "Extraction failed");
                    report.record_failure(decision_id, e);
                }
            }
        }
        Ok(report)
    }

    fn load_or_write_full_text(&self, source: &Path, decision_id: &str) -> Result<String, RuntimeError> {
        let path = self.store.decision_file(decision_id, DecisionDocument::FullText);
        if path.exists() {
            tracing::debug!(decision_id, "Reusing existing full text");
            return Ok(read_markdown(&path)?.content);
        }

        let text = read_markdown(source)?.content;
        let meta = metadata([
            ("decision_id", decision_id.to_string()),
            ("source_file", file_name(source)),
        ]);
        write_markdown(&path, &meta, &text)?;
        Ok(text)
    }

    async fn load_or_create_mapping(
        &self,
        decision_id: &str,
        fields: &BTreeMap<DecisionDocument, String>,
    ) -> Result<BTreeMap<String, String>, RuntimeError> {
        let path = self.store.decision_path(decision_id).join(NAME_MAPPING_FILE);
        let mapping_error = |message: String| RuntimeError::NameMapping {
            path: path.display().to_string(),
            message,
        };

        if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| mapping_error(e.to_string()))?;
            let mapping: BTreeMap<String, String> =
                serde_json::from_str(&raw).map_err(|e| mapping_error(e.to_string()))?;
            tracing::info!(decision_id, entities = mapping.len(), "Loaded name mapping");
            return Ok(mapping);
        }

        let get = |doc: DecisionDocument| fields.get(&doc).map(String::as_str).unwrap_or_default();
        let context = format!(
            "Faits: {}\nJugement: {}",
            truncate_chars(get(DecisionDocument::FactsTimeline), MAPPING_CONTEXT_CHARS),
            truncate_chars(get(DecisionDocument::Judgment), MAPPING_CONTEXT_CHARS),
        );
        let messages = self.mapping_prompt.render(&[
            ("parties", get(DecisionDocument::Parties)),
            ("context", context.as_str()),
        ])?;
        let reply = self.client.complete(messages).await?;
        let mapping = parse_name_mapping(&reply);

        let json = serde_json::to_string_pretty(&mapping).map_err(|e| mapping_error(e.to_string()))?;
        fs::write(&path, json).map_err(|e| RuntimeError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::info!(decision_id, entities = mapping.len(), "Created name mapping");
        Ok(mapping)
    }
}

/// Parse `ANON: REAL` lines. Lines without a colon or with an empty side
/// are ignored.
pub fn parse_name_mapping(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let (anon, real) = line.split_once(':')?;
            let (anon, real) = (anon.trim(), real.trim());
            (!anon.is_empty() && !real.is_empty()).then(|| (anon.to_string(), real.to_string()))
        })
        .collect()
}

/// Replace every anonymised name, longest first so that `B. SA` is not
/// clobbered by a shorter `B.`.
pub fn apply_name_mapping(text: &str, mapping: &BTreeMap<String, String>) -> String {
    let mut pairs: Vec<(&String, &String)> = mapping.iter().collect();
    pairs.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

    let mut out = text.to_string();
    for (anon, real) in pairs {
        out = out.replace(anon.as_str(), real);
    }
    out
}

/// One `- ` bullet per non-empty line.
fn bulletize(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("- {}", line.trim_start_matches(['-', ' '])))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A reply field as text. List fields are joined one item per line.
fn field_text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
