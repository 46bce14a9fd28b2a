//! Versioned prompt templates.
//!
//! A template is a markdown file with YAML frontmatter naming and versioning
//! it, followed by the prompt body. The body must contain the `{context}` and
//! `{question}` slots; any other braces are kept verbatim.
//!
//! ```text
//! ---
//! name: financial_analyst
//! version: "1.0.0"
//! ---
//! You are a financial analyst assistant...
//!
//! Context:
//! {context}
//!
//! Question:
//! {question}
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SessionError};

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

const FINANCIAL_ANALYST: &str = include_str!("../templates/financial_analyst.md");

#[derive(Debug, Deserialize)]
struct TemplateFrontmatter {
    name: String,
    version: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Context,
    Question,
}

/// A parsed prompt template.
///
/// Rendering is a single pass over pre-split segments, so slot markers inside
/// the context or the question are never expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    version: String,
    description: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// The bundled financial-analyst template.
    pub fn financial_analyst() -> Result<Self> {
        Self::parse("financial_analyst.md", FINANCIAL_ANALYST)
    }

    /// Load a template from a markdown file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SessionError::Template { template: label.clone(), message: e.to_string() })?;
        Self::parse(&label, &content)
    }

    /// Parse template text. `label` identifies the source in errors.
    pub fn parse(label: &str, content: &str) -> Result<Self> {
        let invalid = |message: String| SessionError::Template { template: label.to_string(), message };

        let normalized = content.replace("\r\n", "\n");
        let mut lines = normalized.lines();

        if lines.next().unwrap_or_default().trim() != "---" {
            return Err(invalid("missing opening frontmatter delimiter (`---`)".into()));
        }

        let mut frontmatter_lines = Vec::new();
        let mut found_end = false;
        for line in lines.by_ref() {
            if line.trim() == "---" {
                found_end = true;
                break;
            }
            frontmatter_lines.push(line);
        }
        if !found_end {
            return Err(invalid("missing closing frontmatter delimiter (`---`)".into()));
        }

        let fm: TemplateFrontmatter = serde_yaml::from_str(&frontmatter_lines.join("\n"))
            .map_err(|e| invalid(format!("invalid frontmatter: {e}")))?;

        let name = fm.name.trim().to_string();
        if name.is_empty() {
            return Err(invalid("missing field `name`".into()));
        }
        let version = fm.version.trim().to_string();
        if version.is_empty() {
            return Err(invalid("missing field `version`".into()));
        }

        let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        let segments = split_slots(&body);
        for (slot, segment) in [(CONTEXT_SLOT, Segment::Context), (QUESTION_SLOT, Segment::Question)] {
            if !segments.contains(&segment) {
                return Err(invalid(format!("body has no {slot} slot")));
            }
        }

        Ok(Self { name, version, description: fm.description.trim().to_string(), segments })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Fill the slots.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Context => out.push_str(context),
                Segment::Question => out.push_str(question),
            }
        }
        out
    }
}

fn split_slots(body: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = body;
    loop {
        let next = [(CONTEXT_SLOT, Segment::Context), (QUESTION_SLOT, Segment::Question)]
            .into_iter()
            .filter_map(|(slot, segment)| rest.find(slot).map(|pos| (pos, slot.len(), segment)))
            .min_by_key(|(pos, _, _)| *pos);

        let Some((pos, len, segment)) = next else {
            if !rest.is_empty() {
                segments.push(Segment::Literal(rest.to_string()));
            }
            return segments;
        };
        if pos > 0 {
            segments.push(Segment::Literal(rest[..pos].to_string()));
        }
        segments.push(segment);
        rest = &rest[pos + len..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_template_parses_with_all_directives() {
        let template = PromptTemplate::financial_analyst().unwrap();
        assert_eq!(template.name(), "financial_analyst");
        assert_eq!(template.version(), "1.0.0");

        let prompt = template.render("CTX", "QUESTION");
        for directive in [
            "1. **Contextual Understanding**",
            "2. **Detail-Oriented**",
            "3. **Proactive Responses**",
            "4. **Comparisons and Trends**",
            "5. **Source Attribution**",
            "6. **Clarity and Formatting**",
        ] {
            assert!(prompt.contains(directive), "missing {directive}");
        }
        assert!(prompt.contains("🤔 Hmm, I cannot find the exact information in the P&L tables."));
        assert!(prompt.contains("Context:\nCTX"));
        assert!(prompt.contains("Question:\nQUESTION"));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn slots_in_inputs_are_not_expanded() {
        let template = PromptTemplate::parse("t", "---\nname: t\nversion: '1'\n---\nC={context} Q={question}").unwrap();
        assert_eq!(template.render("{question}", "{context}"), "C={question} Q={context}");
    }

    #[test]
    fn other_braces_are_literal() {
        let template =
            PromptTemplate::parse("t", "---\nname: t\nversion: '2'\n---\n{x} {context} {{ {question}").unwrap();
        assert_eq!(template.render("c", "q"), "{x} c {{ q");
    }

    #[test]
    fn missing_slot_is_rejected() {
        let err = PromptTemplate::parse("t", "---\nname: t\nversion: '1'\n---\nonly {context}").unwrap_err();
        assert!(matches!(err, SessionError::Template { ref message, .. } if message.contains("{question}")));
    }

    #[test]
    fn frontmatter_is_required() {
        assert!(PromptTemplate::parse("t", "{context} {question}").is_err());
        assert!(PromptTemplate::parse("t", "---\nname: t\n{context} {question}").is_err());
        assert!(PromptTemplate::parse("t", "---\nname: ''\nversion: '1'\n---\n{context}{question}").is_err());
    }

    #[tokio::test]
    async fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terse.md");
        std::fs::write(&path, "---\r\nname: terse\r\nversion: '0.1'\r\n---\r\n{context}\r\nQ: {question}\r\n").unwrap();

        let template = PromptTemplate::from_file(&path).await.unwrap();
        assert_eq!(template.name(), "terse");
        assert_eq!(template.render("ctx", "why?"), "ctx\nQ: why?");
    }
}
