//! Drafting agents.
//!
//! Each agent turns named input documents into one output document through
//! a single templated model call.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use lexic_core::EvalStep;

use crate::client::LlmClient;
use crate::config::ModelRole;
use crate::prompts::{PromptCategory, PromptLibrary, PromptTemplate};
use crate::LexicRuntime;

mod traits;

pub use traits::{Agent, AgentError, AgentKind};

/// An agent backed by its `agents/<kind>` prompt template.
pub struct PromptAgent {
    kind: AgentKind,
    template: PromptTemplate,
    client: LlmClient,
}

impl PromptAgent {
    pub fn new(kind: AgentKind, prompts: &PromptLibrary, client: LlmClient) -> Result<Self, AgentError> {
        let template = prompts.get(PromptCategory::Agents, kind.as_str())?.clone();
        Ok(Self {
            kind,
            template,
            client,
        })
    }
}

#[async_trait]
impl Agent for PromptAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn run(&self, inputs: &[(&str, &str)]) -> Result<String, AgentError> {
        let messages = self.template.render(inputs)?;
        let output = self.client.complete(messages).await?;
        let output = output.trim();
        if output.is_empty() {
            return Err(AgentError::EmptyOutput(self.kind));
        }
        tracing::debug!(agent = %self.kind, chars = output.len(), "Agent finished");
        Ok(output.to_string())
    }
}

/// The agents available to a runtime.
#[derive(Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentKind, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`PromptAgent`] per kind, using the runtime's agent model.
    pub fn from_runtime(runtime: &LexicRuntime) -> Result<Self, AgentError> {
        let mut registry = Self::new();
        for kind in AgentKind::all() {
            let agent = PromptAgent::new(*kind, &runtime.prompts, runtime.client(ModelRole::Agent))?;
            registry.register(Arc::new(agent));
        }
        Ok(registry)
    }

    /// Register an agent, replacing any agent of the same kind.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.kind(), agent);
    }

    pub fn get(&self, kind: AgentKind) -> Result<&Arc<dyn Agent>, AgentError> {
        self.agents.get(&kind).ok_or(AgentError::NotRegistered(kind))
    }

    /// The agent evaluated at `step`.
    pub fn for_step(&self, step: EvalStep) -> Result<&Arc<dyn Agent>, AgentError> {
        self.get(AgentKind::for_step(step))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{runtime, ScriptedProvider};

    #[test]
    fn test_step_mapping() {
        assert_eq!(AgentKind::for_step(EvalStep::Qualification), AgentKind::Qualification);
        assert_eq!(AgentKind::for_step(EvalStep::InitialAnalysis), AgentKind::InitialAnalysis);
        assert_eq!(AgentKind::for_step(EvalStep::FactualRecord), AgentKind::FactualRecord);
        assert_eq!(AgentKind::for_step(EvalStep::LegalArguments), AgentKind::Arguments);
        assert_eq!(AgentKind::for_step(EvalStep::Recommendations), AgentKind::Recommendations);
    }

    #[test]
    fn test_step_inputs_match_agent_inputs() {
        for step in EvalStep::all() {
            let agent_inputs = AgentKind::for_step(*step).inputs();
            let step_inputs: Vec<&str> = step.inputs().iter().map(|(name, _)| *name).collect();
            assert_eq!(agent_inputs, step_inputs.as_slice(), "{}", step);
        }
    }

    #[test]
    fn test_agent_inputs_match_templates() {
        let library = PromptLibrary::builtin();
        for kind in AgentKind::all() {
            let template = library.get(PromptCategory::Agents, kind.as_str()).unwrap();
            assert_eq!(template.input_names().collect::<Vec<_>>(), kind.inputs(), "{}", kind);
            assert_eq!(template.primary_output(), Some(kind.output()));
        }
    }

    #[tokio::test]
    async fn test_prompt_agent_runs_template() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(["  ## Rapport\n\n- Résumé  \n"]);
        let rt = runtime(dir.path(), provider.clone());
        let registry = AgentRegistry::from_runtime(&rt).unwrap();
        assert_eq!(registry.len(), 10);

        let agent = registry.for_step(EvalStep::Qualification).unwrap();
        let output = agent
            .run(&[("client_request", "Mon employeur ne me paie plus.")])
            .await
            .unwrap();

        assert_eq!(output, "## Rapport\n\n- Résumé");
        assert!(provider.user_message(0).contains("Mon employeur ne me paie plus."));
        assert_eq!(rt.usage.for_role(ModelRole::Agent).llm_calls, 1);
    }

    #[tokio::test]
    async fn test_empty_output_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(["   \n"]);
        let rt = runtime(dir.path(), provider);
        let registry = AgentRegistry::from_runtime(&rt).unwrap();

        let err = registry
            .get(AgentKind::LegalBasis)
            .unwrap()
            .run(&[("factual_record", "faits")])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyOutput(AgentKind::LegalBasis)));
    }

    #[tokio::test]
    async fn test_missing_input_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(["unused"]);
        let rt = runtime(dir.path(), provider.clone());
        let registry = AgentRegistry::from_runtime(&rt).unwrap();

        let err = registry
            .get(AgentKind::Arguments)
            .unwrap()
            .run(&[("factual_record", "faits")])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Prompt(_)));
        assert_eq!(provider.request_count(), 0);
    }
}
