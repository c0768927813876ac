//! Templated prompts shared by agents, generators, the extractor and the
//! judge.
//!
//! A template names its input and output fields with a short description
//! of each. Rendering produces a system message (shared preamble, task
//! description, answer format) and a user message with one section per
//! input field.
//!
//! Built-in templates can be replaced from a directory laid out as
//! `<category>/<name>.yaml`:
//!
//! ```yaml
//! description: |
//!   Analyser la demande du client...
//! input_fields:
//!   client_request:
//!     desc: Demande initiale du client
//! output_fields:
//!   qualification:
//!     desc: Rapport de qualification structuré
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::providers::ChatMessage;

mod builtin;

/// Shared opening of every system prompt.
pub const SYSTEM_PREAMBLE: &str = "Tu es un assistant juridique expérimenté qui rédige les pièces \
d'un dossier d'avocat. Réponds entièrement en français. Sois précis, factuel et structuré; \
utilise le format markdown (titres, listes à puces) lorsque c'est pertinent.";

/// Errors from prompt loading and rendering.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt not found: {category}/{name}")]
    NotFound {
        category: PromptCategory,
        name: String,
    },

    #[error("Prompt {prompt} is missing input field '{field}'")]
    MissingInput { prompt: String, field: String },

    #[error("Failed to read prompt override {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid prompt override {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Group a template belongs to, also its override subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PromptCategory {
    Agents,
    Generation,
    Extraction,
    Judge,
}

impl PromptCategory {
    pub fn all() -> &'static [PromptCategory] {
        &[
            PromptCategory::Agents,
            PromptCategory::Generation,
            PromptCategory::Extraction,
            PromptCategory::Judge,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptCategory::Agents => "agents",
            PromptCategory::Generation => "generation",
            PromptCategory::Extraction => "extraction",
            PromptCategory::Judge => "judge",
        }
    }
}

impl fmt::Display for PromptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the model is asked to shape its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// The answer is the single output field, as markdown.
    Markdown,
    /// The answer is a JSON object keyed by output field.
    Json,
}

/// A prompt with named input and output fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub name: String,
    pub category: PromptCategory,
    pub description: String,
    /// `(field, description)` in prompt order.
    pub inputs: Vec<(String, String)>,
    pub outputs: Vec<(String, String)>,
    pub format: OutputFormat,
}

impl PromptTemplate {
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|(name, _)| name.as_str())
    }

    /// Name of the first output field.
    pub fn primary_output(&self) -> Option<&str> {
        self.outputs.first().map(|(name, _)| name.as_str())
    }

    /// Render the system and user messages.
    ///
    /// Every declared input must be present in `values`. Extra values are
    /// ignored. Empty values are rendered as `_(vide)_`.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<Vec<ChatMessage>, PromptError> {
        let mut sections = Vec::with_capacity(self.inputs.len());
        for (field, desc) in &self.inputs {
            let value = values
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, value)| value.trim())
                .ok_or_else(|| PromptError::MissingInput {
                    prompt: self.name.clone(),
                    field: field.clone(),
                })?;
            let value = if value.is_empty() { "_(vide)_" } else { value };
            sections.push(format!("## {}\n_{}_\n\n{}", field, desc, value));
        }

        Ok(vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(sections.join("\n\n")),
        ])
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!("{}\n\n{}\n\n## Format de réponse\n\n", SYSTEM_PREAMBLE, self.description.trim());
        match self.format {
            OutputFormat::Markdown => {
                let (field, desc) = self
                    .outputs
                    .first()
                    .map(|(f, d)| (f.as_str(), d.as_str()))
                    .unwrap_or(("reponse", ""));
                prompt.push_str(&format!(
                    "Réponds uniquement avec le contenu de `{}`: {}\nN'ajoute ni préambule ni commentaire.",
                    field, desc
                ));
            }
            OutputFormat::Json => {
                prompt.push_str(
                    "Réponds uniquement avec un objet JSON valide contenant les clés suivantes:\n",
                );
                for (field, desc) in &self.outputs {
                    prompt.push_str(&format!("- `{}`: {}\n", field, desc));
                }
                prompt.push_str("N'ajoute aucun texte en dehors de l'objet JSON.");
            }
        }
        prompt
    }
}

#[derive(Debug, Deserialize)]
struct FieldSpec {
    desc: String,
}

#[derive(Debug, Deserialize)]
struct PromptFile {
    description: String,
    #[serde(default)]
    input_fields: serde_yaml::Mapping,
    #[serde(default)]
    output_fields: serde_yaml::Mapping,
}

fn parse_fields(mapping: serde_yaml::Mapping) -> Result<Vec<(String, String)>, serde_yaml::Error> {
    mapping
        .into_iter()
        .map(|(key, value)| {
            let name: String = serde_yaml::from_value(key)?;
            let spec: FieldSpec = serde_yaml::from_value(value)?;
            Ok((name, spec.desc))
        })
        .collect()
}

/// All templates known to a runtime, keyed by category and name.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    templates: BTreeMap<(PromptCategory, String), PromptTemplate>,
}

impl PromptLibrary {
    /// Library with only the built-in templates.
    pub fn builtin() -> Self {
        let mut library = Self::default();
        for template in builtin::templates() {
            library.insert(template);
        }
        library
    }

    pub fn insert(&mut self, template: PromptTemplate) {
        self.templates
            .insert((template.category, template.name.clone()), template);
    }

    pub fn get(&self, category: PromptCategory, name: &str) -> Result<&PromptTemplate, PromptError> {
        self.templates
            .get(&(category, name.to_string()))
            .ok_or_else(|| PromptError::NotFound {
                category,
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Apply `<dir>/<category>/<name>.yaml` overrides.
    ///
    /// Missing category directories are skipped. A file whose name matches a
    /// built-in template replaces it; other files add new templates.
    pub fn with_overrides(mut self, dir: &Path) -> Result<Self, PromptError> {
        for category in PromptCategory::all() {
            let category_dir = dir.join(category.as_str());
            if !category_dir.is_dir() {
                continue;
            }

            let entries = std::fs::read_dir(&category_dir).map_err(|source| PromptError::Io {
                path: category_dir.clone(),
                source,
            })?;
            let mut paths = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|source| PromptError::Io {
                    path: category_dir.clone(),
                    source,
                })?;
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
                    paths.push(path);
                }
            }
            paths.sort();

            for path in paths {
                let template = self.load_override(*category, &path)?;
                tracing::debug!(
                    category = %category,
                    name = %template.name,
                    path = %path.display(),
                    "Loaded prompt override"
                );
                self.insert(template);
            }
        }
        Ok(self)
    }

    fn load_override(&self, category: PromptCategory, path: &Path) -> Result<PromptTemplate, PromptError> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let yaml_err = |source| PromptError::Yaml {
            path: path.to_path_buf(),
            source,
        };
        let file: PromptFile = serde_yaml::from_str(&text).map_err(yaml_err)?;
        let inputs = parse_fields(file.input_fields).map_err(yaml_err)?;
        let outputs = parse_fields(file.output_fields).map_err(yaml_err)?;

        let format = if outputs.len() > 1 {
            OutputFormat::Json
        } else {
            self.get(category, &name)
                .map(|t| t.format)
                .unwrap_or(OutputFormat::Markdown)
        };

        Ok(PromptTemplate {
            name,
            category,
            description: file.description,
            inputs,
            outputs,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Role;

    #[test]
    fn test_builtin_library_complete() {
        let library = PromptLibrary::builtin();
        for name in [
            "qualification",
            "initial_analysis",
            "investigation_order",
            "investigation_report",
            "factual_record",
            "legal_basis",
            "arguments",
            "considerations",
            "judgment",
            "recommendations",
        ] {
            assert!(library.get(PromptCategory::Agents, name).is_ok(), "agents/{}", name);
        }
        for name in ["client_persona", "client_request", "initial_facts", "recommendations"] {
            assert!(library.get(PromptCategory::Generation, name).is_ok(), "generation/{}", name);
        }
        assert!(library.get(PromptCategory::Extraction, "extract_all").is_ok());
        assert!(library.get(PromptCategory::Extraction, "name_mapping").is_ok());
        assert!(library.get(PromptCategory::Judge, "evaluate_dimension").is_ok());
        assert!(library.get(PromptCategory::Judge, "identify_critical_errors").is_ok());
        assert_eq!(library.len(), 10 + 9 + 2 + 2);
    }

    #[test]
    fn test_output_formats() {
        let library = PromptLibrary::builtin();
        let fmt = |c, n| library.get(c, n).unwrap().format;
        assert_eq!(fmt(PromptCategory::Agents, "qualification"), OutputFormat::Markdown);
        assert_eq!(fmt(PromptCategory::Extraction, "extract_all"), OutputFormat::Json);
        assert_eq!(fmt(PromptCategory::Extraction, "name_mapping"), OutputFormat::Markdown);
        assert_eq!(fmt(PromptCategory::Judge, "evaluate_dimension"), OutputFormat::Json);
        assert_eq!(fmt(PromptCategory::Judge, "identify_critical_errors"), OutputFormat::Json);
    }

    #[test]
    fn test_render_sections_in_declared_order() {
        let library = PromptLibrary::builtin();
        let template = library.get(PromptCategory::Agents, "arguments").unwrap();
        let messages = template
            .render(&[("legal_basis", "Art. 97 CO"), ("factual_record", "Les faits")])
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with(SYSTEM_PREAMBLE));
        assert!(messages[0].content.contains("`arguments`"));

        let user = &messages[1].content;
        let facts = user.find("## factual_record").unwrap();
        let bases = user.find("## legal_basis").unwrap();
        assert!(facts < bases);
        assert!(user.contains("Art. 97 CO"));
    }

    #[test]
    fn test_render_missing_input() {
        let library = PromptLibrary::builtin();
        let template = library.get(PromptCategory::Agents, "arguments").unwrap();
        let err = template.render(&[("factual_record", "x")]).unwrap_err();
        assert!(matches!(err, PromptError::MissingInput { ref field, .. } if field == "legal_basis"));
    }

    #[test]
    fn test_render_empty_value_placeholder() {
        let library = PromptLibrary::builtin();
        let template = library.get(PromptCategory::Agents, "factual_record").unwrap();
        let messages = template
            .render(&[("initial_facts", "faits"), ("investigation_report", "  ")])
            .unwrap();
        assert!(messages[1].content.contains("_(vide)_"));
    }

    #[test]
    fn test_json_format_lists_keys() {
        let library = PromptLibrary::builtin();
        let template = library.get(PromptCategory::Judge, "evaluate_dimension").unwrap();
        let system = &template.system_prompt();
        assert!(system.contains("objet JSON"));
        assert!(system.contains("`score`"));
        assert!(system.contains("`explanation`"));
    }

    #[test]
    fn test_unknown_prompt() {
        let library = PromptLibrary::builtin();
        let err = library.get(PromptCategory::Judge, "nope").unwrap_err();
        assert_eq!(err.to_string(), "Prompt not found: judge/nope");
    }

    #[test]
    fn test_overrides_replace_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("agents")).unwrap();
        std::fs::write(
            dir.path().join("agents/qualification.yaml"),
            "description: Nouvelle consigne\ninput_fields:\n  client_request:\n    desc: La demande\n  notes:\n    desc: Notes internes\noutput_fields:\n  qualification:\n    desc: Le rapport\n",
        )
        .unwrap();

        let library = PromptLibrary::builtin().with_overrides(dir.path()).unwrap();
        let template = library.get(PromptCategory::Agents, "qualification").unwrap();

        assert_eq!(template.description, "Nouvelle consigne");
        assert_eq!(
            template.input_names().collect::<Vec<_>>(),
            vec!["client_request", "notes"]
        );
        assert_eq!(template.format, OutputFormat::Markdown);
        // Untouched templates survive.
        assert!(library.get(PromptCategory::Agents, "judgment").is_ok());
    }

    #[test]
    fn test_override_keeps_json_format_of_single_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("judge")).unwrap();
        std::fs::write(
            dir.path().join("judge/identify_critical_errors.yaml"),
            "description: Liste les erreurs\ninput_fields:\n  prediction:\n    desc: p\n  ground_truth:\n    desc: g\n  rubric:\n    desc: r\noutput_fields:\n  critical_errors:\n    desc: erreurs\n",
        )
        .unwrap();

        let library = PromptLibrary::builtin().with_overrides(dir.path()).unwrap();
        let template = library
            .get(PromptCategory::Judge, "identify_critical_errors")
            .unwrap();
        assert_eq!(template.format, OutputFormat::Json);
    }

    #[test]
    fn test_override_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("agents")).unwrap();
        std::fs::write(dir.path().join("agents/judgment.yaml"), "input_fields: [").unwrap();

        let err = PromptLibrary::builtin().with_overrides(dir.path()).unwrap_err();
        assert!(matches!(err, PromptError::Yaml { .. }));
    }
}
