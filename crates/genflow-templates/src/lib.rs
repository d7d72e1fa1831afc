//! # genflow-templates
//!
//! Prompt rendering for Genflow.
//!
//! The pipeline asks a [`PromptRenderer`] for a prompt string given a
//! template identifier and a context mapping. Template identifiers
//! follow `phase_<n>/<task>`. The bundled [`TemplateStore`] keeps
//! templates in memory and substitutes `{{key}}` placeholders;
//! anything fancier lives behind the same trait.

use async_trait::async_trait;
use genflow_core::{GenflowError, Result};
use std::collections::HashMap;

/// Renders a prompt from a template identifier and a context mapping
#[async_trait]
pub trait PromptRenderer: Send + Sync {
    /// Render one prompt
    ///
    /// Fails with `TemplateNotFound` for an unknown identifier and
    /// `Render` when the context leaves placeholders unresolved.
    async fn render(&self, template: &str, context: &HashMap<String, String>) -> Result<String>;
}

/// In-memory template store with `{{key}}` substitution
pub struct TemplateStore {
    templates: HashMap<String, String>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Register or replace one template
    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.templates.insert(name.into(), body.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Store pre-loaded with prompts for the standard five-phase plan
    pub fn with_default_templates() -> Self {
        let mut store = Self::new();

        // Phase 1: Framing
        store.insert(
            "phase_1/brainstorm_chatgpt",
            "Brainstorm angles, audiences, and differentiators for a {{doc_type}} \
             about \"{{topic}}\". Answer in {{language}}.",
        );
        store.insert(
            "phase_1/validate_claude",
            "Critically assess the viability of \"{{topic}}\" as a {{doc_type}} subject. \
             List risks and open questions. Answer in {{language}}.",
        );

        // Phase 2: Research
        store.insert(
            "phase_2/deep_search_gemini",
            "Research market size, competitors, and recent developments for \"{{topic}}\". \
             Cite sources. Answer in {{language}}.",
        );
        store.insert(
            "phase_2/fact_check_perplexity",
            "Fact-check the key claims one would make in a {{doc_type}} about \"{{topic}}\". \
             Flag anything unverifiable. Answer in {{language}}.",
        );

        // Phase 3: Strategy
        store.insert(
            "phase_3/swot_chatgpt",
            "Produce a SWOT analysis for \"{{topic}}\". Answer in {{language}}.",
        );
        store.insert(
            "phase_3/narrative_claude",
            "Draft the strategic narrative for a {{doc_type}} about \"{{topic}}\": \
             positioning, differentiation, and go-to-market logic. Answer in {{language}}.",
        );

        // Phase 4: Writing
        store.insert(
            "phase_4/business_plan_claude",
            "Write the full body of a {{doc_type}} about \"{{topic}}\", using the research \
             and strategy developed so far. Answer in {{language}}.",
        );
        store.insert(
            "phase_4/outline_chatgpt",
            "Produce a section-by-section outline for a {{doc_type}} about \"{{topic}}\". \
             Answer in {{language}}.",
        );
        store.insert(
            "phase_4/charts_gemini",
            "Propose charts and tables (with data placeholders) for a {{doc_type}} about \
             \"{{topic}}\". Answer in {{language}}.",
        );

        // Phase 5: Review
        store.insert(
            "phase_5/verify_perplexity",
            "Verify the factual claims in the draft {{doc_type}} about \"{{topic}}\". \
             Answer in {{language}}.",
        );
        store.insert(
            "phase_5/final_review_claude",
            "Review the draft {{doc_type}} about \"{{topic}}\" for structure, coherence, \
             and completeness. Answer in {{language}}.",
        );
        store.insert(
            "phase_5/polish_claude",
            "Polish the language of the {{doc_type}} about \"{{topic}}\" without changing \
             its substance. Answer in {{language}}.",
        );

        store
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::with_default_templates()
    }
}

#[async_trait]
impl PromptRenderer for TemplateStore {
    async fn render(&self, template: &str, context: &HashMap<String, String>) -> Result<String> {
        let body = self
            .templates
            .get(template)
            .ok_or_else(|| GenflowError::TemplateNotFound(template.to_string()))?;

        let mut rendered = body.clone();
        for (key, value) in context {
            rendered = rendered.replace(&format!("{{{{{}}}}}", key), value);
        }

        if let Some(start) = rendered.find("{{") {
            let tail: String = rendered[start..].chars().take(40).collect();
            return Err(GenflowError::Render(format!(
                "unresolved placeholder in template '{}': {}",
                template, tail
            )));
        }

        Ok(rendered)
    }
}

/// Template identifier for a task: `phase_<n>/<task>`
pub fn template_name(phase_number: u32, task: &str) -> String {
    format!("phase_{}/{}", phase_number, task)
}
