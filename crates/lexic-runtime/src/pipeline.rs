//! The forward drafting pipeline, from client request to recommendations.
//!
//! Four phases run in sequence, each feeding the next:
//!
//! 1. intake: qualification, initial analysis
//! 2. investigation: investigation order, simulated client report, factual record
//! 3. legal analysis: legal basis, arguments
//! 4. final: considerations, predicted judgment, recommendations

use chrono::Utc;
use std::path::Path;

use lexic_core::{metadata, write_markdown, CaseDocument, CaseStore};

use crate::agents::{AgentError, AgentKind, AgentRegistry};
use crate::{LexicRuntime, RuntimeError};

/// Documents of a synthetic case the pipeline starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseInputs {
    pub client_request: String,
    pub client_persona: String,
    pub initial_facts: String,
}

impl CaseInputs {
    pub fn load(store: &CaseStore, case_id: &str) -> Result<Self, RuntimeError> {
        let load = |doc| -> Result<String, RuntimeError> {
            Ok(store.load_case_step(case_id, doc)?.content)
        };
        Ok(Self {
            client_request: load(CaseDocument::ClientRequest)?,
            client_persona: load(CaseDocument::ClientPersona)?,
            initial_facts: load(CaseDocument::InitialFacts)?,
        })
    }
}

/// Pipeline outputs in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutputs {
    entries: Vec<(&'static str, String)>,
}

impl PipelineOutputs {
    pub fn insert(&mut self, name: &'static str, content: String) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = content,
            None => self.entries.push((name, content)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(n, c)| (*n, c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn extend(&mut self, other: PipelineOutputs) {
        for (name, content) in other.entries {
            self.insert(name, content);
        }
    }
}

/// Runs the ten agents in pipeline order.
pub struct Pipeline {
    agents: AgentRegistry,
    predict_judgment: bool,
}

impl Pipeline {
    pub fn new(agents: AgentRegistry, predict_judgment: bool) -> Self {
        Self {
            agents,
            predict_judgment,
        }
    }

    pub fn from_runtime(runtime: &LexicRuntime) -> Result<Self, RuntimeError> {
        Ok(Self::new(
            AgentRegistry::from_runtime(runtime)?,
            runtime.config.predict_judgment,
        ))
    }

    async fn run(&self, kind: AgentKind, inputs: &[(&str, &str)]) -> Result<String, AgentError> {
        tracing::info!(agent = %kind, "Running agent");
        self.agents.get(kind)?.run(inputs).await
    }

    /// Qualification and initial analysis.
    pub async fn run_intake_to_analysis(&self, client_request: &str) -> Result<PipelineOutputs, AgentError> {
        let qualification = self
            .run(AgentKind::Qualification, &[("client_request", client_request)])
            .await?;
        let initial_analysis = self
            .run(AgentKind::InitialAnalysis, &[("qualification", qualification.as_str())])
            .await?;

        let mut out = PipelineOutputs::default();
        out.insert("qualification", qualification);
        out.insert("initial_analysis", initial_analysis);
        Ok(out)
    }

    /// Investigation order, simulated client report and factual record.
    pub async fn run_investigation_phase(
        &self,
        initial_analysis: &str,
        client_persona: &str,
        initial_facts: &str,
    ) -> Result<PipelineOutputs, AgentError> {
        let order = self
            .run(AgentKind::InvestigationOrder, &[("initial_analysis", initial_analysis)])
            .await?;
        let report = self
            .run(
                AgentKind::InvestigationReport,
                &[
                    ("investigation_order", order.as_str()),
                    ("client_persona", client_persona),
                    ("initial_facts", initial_facts),
                ],
            )
            .await?;
        let factual_record = self
            .run(
                AgentKind::FactualRecord,
                &[("initial_facts", initial_facts), ("investigation_report", report.as_str())],
            )
            .await?;

        let mut out = PipelineOutputs::default();
        out.insert("investigation_order", order);
        out.insert("investigation_report", report);
        out.insert("factual_record", factual_record);
        Ok(out)
    }

    /// Legal basis and arguments.
    pub async fn run_legal_analysis(&self, factual_record: &str) -> Result<PipelineOutputs, AgentError> {
        let legal_basis = self
            .run(AgentKind::LegalBasis, &[("factual_record", factual_record)])
            .await?;
        let arguments = self
            .run(
                AgentKind::Arguments,
                &[("factual_record", factual_record), ("legal_basis", legal_basis.as_str())],
            )
            .await?;

        let mut out = PipelineOutputs::default();
        out.insert("legal_basis", legal_basis);
        out.insert("legal_arguments", arguments);
        Ok(out)
    }

    /// Considerations, optional judgment prediction and recommendations.
    ///
    /// Without a predicted judgment, the considerations stand in for it.
    pub async fn run_final_phase(
        &self,
        legal_arguments: &str,
        factual_record: &str,
        client_objectives: &str,
    ) -> Result<PipelineOutputs, AgentError> {
        let considerations = self
            .run(
                AgentKind::Considerations,
                &[("arguments", legal_arguments), ("factual_record", factual_record)],
            )
            .await?;

        let judgment = if self.predict_judgment {
            Some(
                self.run(
                    AgentKind::Judgment,
                    &[("considerations", considerations.as_str()), ("factual_record", factual_record)],
                )
                .await?,
            )
        } else {
            None
        };

        let recommendations = self
            .run(
                AgentKind::Recommendations,
                &[
                    ("considerations", considerations.as_str()),
                    ("judgment", judgment.as_deref().unwrap_or(considerations.as_str())),
                    ("client_objectives", client_objectives),
                ],
            )
            .await?;

        let mut out = PipelineOutputs::default();
        out.insert("considerations", considerations);
        if let Some(judgment) = judgment {
            out.insert("judgment", judgment);
        }
        out.insert("recommendations", recommendations);
        Ok(out)
    }

    /// All four phases.
    pub async fn run_full_pipeline(&self, inputs: &CaseInputs) -> Result<PipelineOutputs, AgentError> {
        let mut outputs = self.run_intake_to_analysis(&inputs.client_request).await?;

        let investigation = self
            .run_investigation_phase(
                outputs.get("initial_analysis").unwrap_or_default(),
                &inputs.client_persona,
                &inputs.initial_facts,
            )
            .await?;
        let factual_record = investigation.get("factual_record").unwrap_or_default().to_string();
        outputs.extend(investigation);

        let legal = self.run_legal_analysis(&factual_record).await?;
        let arguments = legal.get("legal_arguments").unwrap_or_default().to_string();
        outputs.extend(legal);

        let qualification = outputs.get("qualification").unwrap_or_default().to_string();
        let last = self
            .run_final_phase(&arguments, &factual_record, &qualification)
            .await?;
        outputs.extend(last);

        Ok(outputs)
    }

    /// Run the pipeline on a stored case and write `pred_<name>.md` files to
    /// `output_dir`.
    pub async fn run_pipeline_on_case(
        &self,
        store: &CaseStore,
        case_id: &str,
        output_dir: &Path,
        model: &str,
    ) -> Result<PipelineOutputs, RuntimeError> {
        let inputs = CaseInputs::load(store, case_id)?;
        tracing::info!(
            case_id,
            client_request_chars = inputs.client_request.len(),
            initial_facts_chars = inputs.initial_facts.len(),
            "Running pipeline"
        );

        let outputs = self.run_full_pipeline(&inputs).await?;

        let meta = metadata([
            ("case_id", case_id.to_string()),
            ("run_at", Utc::now().to_rfc3339()),
            ("model", model.to_string()),
        ]);
        for (name, content) in outputs.iter() {
            let path = output_dir.join(format!("pred_{}.md", name));
            write_markdown(&path, &meta, content)?;
        }
        tracing::info!(case_id, outputs = outputs.len(), dir = %output_dir.display(), "Pipeline outputs saved");

        Ok(outputs)
    }
}
