//! Static routing table: (phase, task, doc type) -> provider

use genflow_core::{DocumentType, GenflowError, ProviderId, Result, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One routing mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub phase: u32,
    pub task: TaskId,
    #[serde(default)]
    pub doc_type: DocumentType,
    /// Primary provider for this task
    pub provider: ProviderId,
    /// Optional single-level fallback provider
    #[serde(default)]
    pub fallback: Option<ProviderId>,
}

impl RoutingEntry {
    pub fn new(
        phase: u32,
        task: impl Into<TaskId>,
        doc_type: DocumentType,
        provider: impl Into<ProviderId>,
    ) -> Self {
        Self {
            phase,
            task: task.into(),
            doc_type,
            provider: provider.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<ProviderId>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

#[derive(Deserialize)]
struct RoutingFile {
    routes: Vec<RoutingEntry>,
}

/// Immutable routing table, loaded once at construction
pub struct RoutingTable {
    entries: HashMap<(u32, TaskId, DocumentType), RoutingEntry>,
}

impl RoutingTable {
    /// Build a table from entries, rejecting duplicates
    pub fn from_entries(entries: Vec<RoutingEntry>) -> Result<Self> {
        let mut map = HashMap::new();
        for entry in entries {
            let key = (entry.phase, entry.task.clone(), entry.doc_type);
            if map.insert(key, entry.clone()).is_some() {
                return Err(GenflowError::Config(format!(
                    "duplicate routing entry for phase {}, task '{}', doc type '{}'",
                    entry.phase, entry.task, entry.doc_type
                )));
            }
        }
        Ok(Self { entries: map })
    }

    /// Parse a table from TOML (`[[routes]]` entries)
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: RoutingFile = toml::from_str(content)
            .map_err(|e| GenflowError::Config(format!("invalid routing table: {}", e)))?;
        Self::from_entries(file.routes)
    }

    /// Look up the entry for one task
    pub fn lookup(&self, phase: u32, task: &str, doc_type: DocumentType) -> Option<&RoutingEntry> {
        self.entries.get(&(phase, task.to_string(), doc_type))
    }

    /// Load-time completeness check for one declared task
    pub fn ensure_covers(&self, phase: u32, task: &str, doc_type: DocumentType) -> Result<()> {
        if self.lookup(phase, task, doc_type).is_some() {
            Ok(())
        } else {
            Err(GenflowError::Config(format!(
                "routing table has no entry for phase {}, task '{}', doc type '{}'",
                phase, task, doc_type
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Built-in routing for the standard five-phase document plan
    ///
    /// Both document types use the same provider assignments. Primary
    /// and fallback pairs keep research tasks on search-capable
    /// providers and writing tasks on long-form providers.
    pub fn default_document_plan() -> Self {
        let assignments: &[(u32, &str, &str, &str)] = &[
            // Phase 1: Framing
            (1, "brainstorm_chatgpt", "chatgpt", "claude"),
            (1, "validate_claude", "claude", "chatgpt"),
            // Phase 2: Research
            (2, "deep_search_gemini", "gemini", "perplexity"),
            (2, "fact_check_perplexity", "perplexity", "gemini"),
            // Phase 3: Strategy
            (3, "swot_chatgpt", "chatgpt", "claude"),
            (3, "narrative_claude", "claude", "chatgpt"),
            // Phase 4: Writing
            (4, "business_plan_claude", "claude", "chatgpt"),
            (4, "outline_chatgpt", "chatgpt", "claude"),
            (4, "charts_gemini", "gemini", "claude"),
            // Phase 5: Review
            (5, "verify_perplexity", "perplexity", "gemini"),
            (5, "final_review_claude", "claude", "chatgpt"),
            (5, "polish_claude", "claude", "chatgpt"),
        ];

        let mut entries = Vec::new();
        for doc_type in [DocumentType::Bizplan, DocumentType::Rd] {
            for (phase, task, provider, fallback) in assignments {
                entries.push(
                    RoutingEntry::new(*phase, *task, doc_type, *provider).with_fallback(*fallback),
                );
            }
        }

        // Static assignments contain no duplicates
        Self::from_entries(entries).expect("default routing table is valid")
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::default_document_plan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_lookup() {
        let table = RoutingTable::default_document_plan();
        assert_eq!(table.len(), 24);

        let entry = table
            .lookup(2, "deep_search_gemini", DocumentType::Bizplan)
            .unwrap();
        assert_eq!(entry.provider, "gemini");
        assert_eq!(entry.fallback.as_deref(), Some("perplexity"));

        // Same task set is covered for the rd doc type
        assert!(table.lookup(2, "deep_search_gemini", DocumentType::Rd).is_some());
    }

    #[test]
    fn test_missing_entry() {
        let table = RoutingTable::default_document_plan();
        assert!(table.lookup(1, "deep_search_gemini", DocumentType::Bizplan).is_none());
        assert!(table.ensure_covers(9, "brainstorm_chatgpt", DocumentType::Bizplan).is_err());
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let entries = vec![
            RoutingEntry::new(1, "brainstorm_chatgpt", DocumentType::Bizplan, "chatgpt"),
            RoutingEntry::new(1, "brainstorm_chatgpt", DocumentType::Bizplan, "claude"),
        ];
        assert!(RoutingTable::from_entries(entries).is_err());
    }

    #[test]
    fn test_from_toml() {
        let table = RoutingTable::from_toml(
            r#"
[[routes]]
phase = 1
task = "brainstorm_chatgpt"
doc_type = "bizplan"
provider = "chatgpt"
fallback = "claude"

[[routes]]
phase = 1
task = "validate_claude"
doc_type = "bizplan"
provider = "claude"
"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        let entry = table.lookup(1, "validate_claude", DocumentType::Bizplan).unwrap();
        assert!(entry.fallback.is_none());
    }
}
