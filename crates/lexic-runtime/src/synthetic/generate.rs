//! Backwards generation of synthetic cases.
//!
//! Starting from an extracted decision, each case document is generated
//! from the ones before it, in file order: persona, client request,
//! initial facts, then the lawyer's ground-truth work products. Legal
//! bases, arguments, considerations and judgment are copied from the
//! decision itself.
//!
//! Files already on disk are loaded instead of regenerated, so a case can
//! be completed over several runs or one document at a time with a
//! [`DocFilter`].

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use lexic_core::{
    metadata, read_markdown, write_markdown, CaseDocument, CaseStore, DecisionDocument, Metadata,
    PartyRole,
};

use super::BatchReport;
use crate::client::LlmClient;
use crate::config::ModelRole;
use crate::prompts::{PromptCategory, PromptLibrary};
use crate::{LexicRuntime, RuntimeError};

/// Which numbered case documents to produce.
///
/// Documents outside the filter are never generated: they are loaded when
/// present and otherwise treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocFilter {
    numbers: Option<BTreeSet<String>>,
}

impl DocFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numbers: Some(numbers.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether `doc` should be produced. Unnumbered documents always are.
    pub fn includes(&self, doc: CaseDocument) -> bool {
        match (&self.numbers, doc.number()) {
            (Some(numbers), Some(number)) => numbers.contains(number),
            _ => true,
        }
    }
}

impl FromStr for DocFilter {
    type Err = String;

    /// Parse a comma-separated list such as `01,01b,03`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut numbers = BTreeSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if CaseDocument::from_number(part).is_none() {
                return Err(format!("Unknown document number '{}'", part));
            }
            numbers.insert(part.to_string());
        }
        if numbers.is_empty() {
            return Err("Empty document list".to_string());
        }
        Ok(Self {
            numbers: Some(numbers),
        })
    }
}

/// How a document gets its content when it has to be produced.
enum Source<'a> {
    Generate {
        prompt: &'static str,
        inputs: &'a [(&'a str, &'a str)],
    },
    Copy(&'a str),
}

/// Per-case state while a case is being written.
struct CaseWriter<'a> {
    store: &'a CaseStore,
    case_id: &'a str,
    filter: &'a DocFilter,
    meta: Metadata,
    written: Vec<CaseDocument>,
}

/// Generates synthetic cases from extracted decisions.
pub struct CaseGenerator {
    store: CaseStore,
    client: LlmClient,
    prompts: Arc<PromptLibrary>,
}

impl CaseGenerator {
    pub fn new(store: CaseStore, client: LlmClient, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            store,
            client,
            prompts,
        }
    }

    /// Generator using the runtime's generation model and prompts.
    pub fn from_runtime(runtime: &LexicRuntime) -> Self {
        Self::new(
            runtime.store.clone(),
            runtime.client(ModelRole::Generation),
            Arc::clone(&runtime.prompts),
        )
    }

    /// Generate (or complete) `case_id` from decision `decision_id`, with the
    /// client standing on `role`'s side. Returns the documents written.
    pub async fn generate_synthetic_case(
        &self,
        decision_id: &str,
        case_id: &str,
        role: PartyRole,
        filter: &DocFilter,
    ) -> Result<Vec<CaseDocument>, RuntimeError> {
        let decision: BTreeMap<DecisionDocument, String> = self
            .store
            .load_decision(decision_id)?
            .into_iter()
            .map(|(doc, text)| (doc, strip_heading(&text, doc.title()).to_string()))
            .collect();
        let part = |doc: DecisionDocument| decision.get(&doc).map(String::as_str).unwrap_or_default();
        let facts = part(DecisionDocument::FactsTimeline);
        let decision_context = format!(
            "{}\n\n{}\n\n{}",
            part(DecisionDocument::Parties),
            facts,
            part(DecisionDocument::Judgment)
        );
        let context = decision_context.as_str();
        let party_role = role.as_str();

        tracing::info!(decision_id, case_id, role = party_role, "Generating synthetic case");
        let mut case = CaseWriter {
            store: &self.store,
            case_id,
            filter,
            meta: metadata([
                ("case_id", case_id.to_string()),
                ("source_decision", decision_id.to_string()),
                ("party_role", party_role.to_string()),
                ("generated_at", Utc::now().to_rfc3339()),
                ("model", self.client.model().to_string()),
            ]),
            written: Vec::new(),
        };

        let source_note = format!("Source: {}", decision_id);
        self.produce(&mut case, CaseDocument::Metadata, Source::Copy(&source_note))
            .await?;

        let persona = self
            .produce(
                &mut case,
                CaseDocument::ClientPersona,
                Source::Generate {
                    prompt: "client_persona",
                    inputs: &[("decision_context", context), ("party_role", party_role)],
                },
            )
            .await?;

        self.produce(
            &mut case,
            CaseDocument::ClientRequest,
            Source::Generate {
                prompt: "client_request",
                inputs: &[
                    ("client_persona", persona.as_str()),
                    ("decision_context", context),
                    ("party_role", party_role),
                ],
            },
        )
        .await?;

        let initial_facts = self
            .produce(
                &mut case,
                CaseDocument::InitialFacts,
                Source::Generate {
                    prompt: "initial_facts",
                    inputs: &[
                        ("decision_context", facts),
                        ("client_persona", persona.as_str()),
                        ("party_role", party_role),
                    ],
                },
            )
            .await?;

        let qualification = self
            .produce(
                &mut case,
                CaseDocument::Qualification,
                Source::Generate {
                    prompt: "qualification",
                    inputs: &[
                        ("client_persona", persona.as_str()),
                        ("initial_facts", initial_facts.as_str()),
                        ("decision_context", context),
                    ],
                },
            )
            .await?;

        let initial_analysis = self
            .produce(
                &mut case,
                CaseDocument::InitialAnalysis,
                Source::Generate {
                    prompt: "initial_analysis",
                    inputs: &[
                        ("qualification", qualification.as_str()),
                        ("decision_legal_bases", part(DecisionDocument::LegalBases)),
                    ],
                },
            )
            .await?;

        let investigation_order = self
            .produce(
                &mut case,
                CaseDocument::InvestigationOrder,
                Source::Generate {
                    prompt: "investigation_order",
                    inputs: &[
                        ("initial_analysis", initial_analysis.as_str()),
                        ("decision_facts", facts),
                    ],
                },
            )
            .await?;

        let investigation_report = self
            .produce(
                &mut case,
                CaseDocument::InvestigationReport,
                Source::Generate {
                    prompt: "investigation_report",
                    inputs: &[
                        ("investigation_order", investigation_order.as_str()),
                        ("decision_facts", facts),
                    ],
                },
            )
            .await?;

        // The initial record predates the investigation.
        self.produce(
            &mut case,
            CaseDocument::InitialFactualRecord,
            Source::Generate {
                prompt: "factual_record",
                inputs: &[
                    ("initial_facts", initial_facts.as_str()),
                    ("investigation_report", ""),
                    ("decision_facts", facts),
                ],
            },
        )
        .await?;

        self.produce(
            &mut case,
            CaseDocument::FinalFactualRecord,
            Source::Generate {
                prompt: "factual_record",
                inputs: &[
                    ("initial_facts", initial_facts.as_str()),
                    ("investigation_report", investigation_report.as_str()),
                    ("decision_facts", facts),
                ],
            },
        )
        .await?;

        for (doc, from) in [
            (CaseDocument::LegalBases, DecisionDocument::LegalBases),
            (CaseDocument::LegalArguments, DecisionDocument::Arguments),
            (CaseDocument::Considerations, DecisionDocument::Considerations),
            (CaseDocument::Judgment, DecisionDocument::Judgment),
        ] {
            self.produce(&mut case, doc, Source::Copy(part(from))).await?;
        }

        self.produce(
            &mut case,
            CaseDocument::Recommendations,
            Source::Generate {
                prompt: "recommendations",
                inputs: &[
                    ("judgment", part(DecisionDocument::Judgment)),
                    ("considerations", part(DecisionDocument::Considerations)),
                    ("client_objectives", qualification.as_str()),
                ],
            },
        )
        .await?;

        tracing::info!(case_id, written = case.written.len(), "Synthetic case complete");
        Ok(case.written)
    }

    /// Generate a plaintiff and a defendant case for every extracted
    /// decision, numbering them `case_001`, `case_002`, ... in decision
    /// order. Failures are logged and the batch continues.
    pub async fn generate_all_synthetic_cases(
        &self,
        limit: Option<usize>,
        filter: &DocFilter,
    ) -> Result<BatchReport, RuntimeError> {
        let mut decisions = self.store.list_decisions()?;
        let mut report = BatchReport::default();
        if decisions.is_empty() {
            tracing::warn!(dir = %self.store.decisions_dir().display(), "No extracted decisions found");
            return Ok(report);
        }
        if let Some(limit) = limit {
            decisions.truncate(limit);
        }

        tracing::info!(decisions = decisions.len(), "Generating plaintiff and defendant cases");
        for (i, decision_id) in decisions.iter().enumerate() {
            let base = format!("case_{:03}", i + 1);
            for role in PartyRole::all() {
                let case_id = role.case_id(&base);
                match self
                    .generate_synthetic_case(decision_id, &case_id, *role, filter)
                    .await
                {
                    Ok(_) => report.record_ok(case_id),
                    Err(e) => {
                        tracing::error!(decision_id = %decision_id, case_id = %case_id, error = %e, "Case generation failed");
                        report.record_failure(case_id, e);
                    }
                }
            }
        }
        Ok(report)
    }

    /// Return the content of `doc`, producing and saving it if needed.
    async fn produce(
        &self,
        case: &mut CaseWriter<'_>,
        doc: CaseDocument,
        source: Source<'_>,
    ) -> Result<String, RuntimeError> {
        let path = case.store.case_file(case.case_id, doc);

        if !case.filter.includes(doc) {
            if !path.exists() {
                return Ok(String::new());
            }
            return load_body(&path, doc);
        }

        if path.exists() {
            tracing::debug!(case_id = case.case_id, document = doc.file_name(), "Already exists");
            return load_body(&path, doc);
        }

        let content = match source {
            Source::Copy(text) => text.to_string(),
            Source::Generate { prompt, inputs } => {
                let template = self.prompts.get(PromptCategory::Generation, prompt)?;
                let messages = template.render(inputs)?;
                let reply = self.client.complete(messages).await?;
                let reply = reply.trim().to_string();
                if reply.is_empty() {
                    tracing::warn!(case_id = case.case_id, document = doc.file_name(), "Empty generation");
                }
                reply
            }
        };

        write_markdown(&path, &case.meta, &format!("# {}\n\n{}", doc.title(), content))?;
        case.written.push(doc);
        tracing::info!(case_id = case.case_id, document = doc.file_name(), "Saved");
        Ok(content)
    }
}

fn load_body(path: &std::path::Path, doc: CaseDocument) -> Result<String, RuntimeError> {
    let loaded = read_markdown(path)?;
    Ok(strip_heading(&loaded.content, doc.title()).to_string())
}

/// Drop a leading `# <title>` line written alongside the content.
fn strip_heading<'a>(text: &'a str, title: &str) -> &'a str {
    text.strip_prefix("# ")
        .and_then(|rest| rest.strip_prefix(title))
        .filter(|rest| rest.is_empty() || rest.starts_with('\n'))
        .map(str::trim_start)
        .unwrap_or(text)
}
