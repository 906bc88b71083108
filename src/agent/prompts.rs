//! Prompt templates for both controllers.
//!
//! Built-in defaults can be replaced per template by dropping
//! `<name>.txt` or `<name>.md` into the configured prompts directory.
//! Placeholders are `{context}`, `{question}`, `{query}` and `{answer}`;
//! any other braces are left alone.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::core::errors::AgentResult;
use crate::rag::Passage;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";
const EMPTY_CONTEXT: &str = "No relevant context found.";

const DEFAULT_GENERATE: &str = "You are a helpful assistant that answers questions about LangGraph and LangChain.
Answer the user's question using only the documentation context below.
If the context does not contain the answer, say so plainly instead of guessing.
Include short code examples when the context provides them.

Context:
{context}";

const DEFAULT_EVALUATE: &str = "You are grading whether an answer is grounded in documentation.

Context:
{context}

Question: {question}

Answer: {answer}

An answer is grounded when every factual claim in it is supported by the context.
Respond ONLY with JSON in this format:
{\"is_grounded\": true, \"reasoning\": \"...\"}";

const DEFAULT_REFORMULATE: &str = "The documentation search below did not produce a well-supported answer.

Original question: {question}
Last search query: {query}

Previous answer:
{answer}

Retrieved context:
{context}

Rewrite the search query so it is more likely to retrieve the documentation needed
(use precise API names, class names and LangGraph / LangChain terminology).
Respond ONLY with JSON in this format:
{\"reformulated_query\": \"...\", \"reasoning\": \"...\"}";

const DEFAULT_SYSTEM: &str = "You are a helpful assistant that answers questions about LangGraph and LangChain.
You have two tools:
- search_documentation: searches the local LangGraph / LangChain documentation.
- web_search: searches the web for recent information not covered by the local docs.
Prefer search_documentation for API details. Use web_search for recent releases, issues or
anything the documentation does not cover. When you have enough information, answer
directly without calling a tool, and cite the sources you used.";

#[derive(Debug, Clone)]
pub struct PromptSet {
    pub generate: String,
    pub evaluate: String,
    pub reformulate: String,
    pub system: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            generate: DEFAULT_GENERATE.to_string(),
            evaluate: DEFAULT_EVALUATE.to_string(),
            reformulate: DEFAULT_REFORMULATE.to_string(),
            system: DEFAULT_SYSTEM.to_string(),
        }
    }
}

impl PromptSet {
    pub fn load(prompts_dir: Option<&Path>) -> AgentResult<Self> {
        let mut prompts = Self::default();
        let Some(dir) = prompts_dir else {
            return Ok(prompts);
        };

        for (name, slot) in [
            ("generate", &mut prompts.generate),
            ("evaluate", &mut prompts.evaluate),
            ("reformulate", &mut prompts.reformulate),
            ("system", &mut prompts.system),
        ] {
            if let Some(template) = read_template(dir, name)? {
                tracing::debug!("Loaded '{}' prompt from {}", name, dir.display());
                *slot = template;
            }
        }

        Ok(prompts)
    }
}

fn read_template(dir: &Path, name: &str) -> AgentResult<Option<String>> {
    for ext in ["txt", "md"] {
        let path = dir.join(format!("{}.{}", name, ext));
        if path.is_file() {
            return Ok(Some(fs::read_to_string(path)?));
        }
    }
    Ok(None)
}

/// Fill the named placeholders of `template` in a single pass.
///
/// Inserted values are never scanned again, so placeholder-like text inside
/// a passage or answer reaches the model verbatim. Names missing from
/// `values` are left as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{(context|question|answer|query)\}").expect("placeholder pattern is valid")
    })
}

/// Passages as one prompt block, best first.
pub fn format_context(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }
    passages
        .iter()
        .map(|p| format!("Source: {}\n{}", p.source_id, p.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_known_placeholders_only() {
        let out = render(
            "Q: {question}\nA: {answer}\n{\"is_grounded\": true}",
            &[("question", "What is a node?"), ("answer", "A step.")],
        );
        assert_eq!(out, "Q: What is a node?\nA: A step.\n{\"is_grounded\": true}");
    }

    #[test]
    fn inserted_values_are_not_rendered_again() {
        let passages = vec![Passage::new(
            r#"prompt = PromptTemplate.from_template("Answer {question} using {context}")"#,
            "prompts.md",
            0.9,
        )];
        let context = format_context(&passages);

        let out = render(
            &PromptSet::default().evaluate,
            &[
                ("context", context.as_str()),
                ("question", "How do I template?"),
                ("answer", "Write {context} and {question} in the template."),
            ],
        );

        assert!(out.contains(r#"from_template("Answer {question} using {context}")"#));
        assert!(out.contains("Answer: Write {context} and {question} in the template."));
        assert_eq!(out.matches("prompts.md").count(), 1);
    }

    #[test]
    fn unknown_names_are_left_alone() {
        assert_eq!(render("{query} {other}", &[]), "{query} {other}");
    }

    #[test]
    fn empty_context_has_placeholder_text() {
        assert_eq!(format_context(&[]), "No relevant context found.");
    }

    #[test]
    fn context_is_joined_with_separators() {
        let passages = vec![
            Passage::new("first", "a.md", 0.9),
            Passage::new("second", "b.md", 0.5),
        ];
        assert_eq!(
            format_context(&passages),
            "Source: a.md\nfirst\n\n---\n\nSource: b.md\nsecond"
        );
    }

    #[test]
    fn directory_overrides_single_templates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("generate.md"), "custom {context}").unwrap();

        let prompts = PromptSet::load(Some(dir.path())).unwrap();

        assert_eq!(prompts.generate, "custom {context}");
        assert_eq!(prompts.system, DEFAULT_SYSTEM);
    }
}
