//! Pipeline plan: which tasks run in which phase

use genflow_core::{DocumentType, GenflowError, Result, TaskId};
use genflow_router::RoutingTable;

/// One phase: a name and an ordered task list
#[derive(Debug, Clone)]
pub struct PhasePlan {
    pub number: u32,
    pub name: String,
    /// Tasks in execution order; may be empty (phase is then skipped)
    pub tasks: Vec<TaskId>,
}

impl PhasePlan {
    pub fn new(number: u32, name: impl Into<String>, tasks: Vec<&str>) -> Self {
        Self {
            number,
            name: name.into(),
            tasks: tasks.into_iter().map(String::from).collect(),
        }
    }
}

/// The full ordered phase sequence for a pipeline
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    phases: Vec<PhasePlan>,
}

impl PipelinePlan {
    /// Build a plan; phases must be numbered 1..=N contiguously
    pub fn new(mut phases: Vec<PhasePlan>) -> Result<Self> {
        phases.sort_by_key(|p| p.number);
        for (idx, phase) in phases.iter().enumerate() {
            let expected = idx as u32 + 1;
            if phase.number != expected {
                return Err(GenflowError::Config(format!(
                    "phase numbering must be contiguous from 1; found {} where {} was expected",
                    phase.number, expected
                )));
            }
        }
        if phases.is_empty() {
            return Err(GenflowError::Config("pipeline plan has no phases".to_string()));
        }
        Ok(Self { phases })
    }

    pub fn total_phases(&self) -> u32 {
        self.phases.len() as u32
    }

    pub fn phase(&self, number: u32) -> Option<&PhasePlan> {
        self.phases.iter().find(|p| p.number == number)
    }

    pub fn phases(&self) -> &[PhasePlan] {
        &self.phases
    }

    /// Check that every declared task has a routing entry
    ///
    /// Run at startup so routing gaps surface as configuration errors
    /// instead of mid-pipeline task failures.
    pub fn validate_routing(&self, table: &RoutingTable, doc_types: &[DocumentType]) -> Result<()> {
        for phase in &self.phases {
            for task in &phase.tasks {
                for doc_type in doc_types {
                    table.ensure_covers(phase.number, task, *doc_type)?;
                }
            }
        }
        Ok(())
    }

    /// The standard five-phase document-generation plan
    pub fn default_document_plan() -> Self {
        let phases = vec![
            PhasePlan::new(1, "Phase 1: Framing", vec!["brainstorm_chatgpt", "validate_claude"]),
            PhasePlan::new(
                2,
                "Phase 2: Research",
                vec!["deep_search_gemini", "fact_check_perplexity"],
            ),
            PhasePlan::new(3, "Phase 3: Strategy", vec!["swot_chatgpt", "narrative_claude"]),
            PhasePlan::new(
                4,
                "Phase 4: Writing",
                vec!["business_plan_claude", "outline_chatgpt", "charts_gemini"],
            ),
            PhasePlan::new(
                5,
                "Phase 5: Review",
                vec!["verify_perplexity", "final_review_claude", "polish_claude"],
            ),
        ];
        // Static plan is contiguous by construction
        Self::new(phases).expect("default plan is valid")
    }
}

impl Default for PipelinePlan {
    fn default() -> Self {
        Self::default_document_plan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_shape() {
        let plan = PipelinePlan::default_document_plan();
        assert_eq!(plan.total_phases(), 5);
        assert_eq!(plan.phase(2).unwrap().tasks.len(), 2);
        assert_eq!(plan.phase(4).unwrap().tasks.len(), 3);
        assert!(plan.phase(6).is_none());
    }

    #[test]
    fn test_default_plan_fully_routed() {
        let plan = PipelinePlan::default_document_plan();
        let table = RoutingTable::default_document_plan();
        plan.validate_routing(&table, &[DocumentType::Bizplan, DocumentType::Rd])
            .unwrap();
    }

    #[test]
    fn test_non_contiguous_numbering_rejected() {
        let result = PipelinePlan::new(vec![
            PhasePlan::new(1, "one", vec![]),
            PhasePlan::new(3, "three", vec![]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_plan_rejected() {
        assert!(PipelinePlan::new(vec![]).is_err());
    }

    #[test]
    fn test_validate_routing_reports_gap() {
        let plan = PipelinePlan::new(vec![PhasePlan::new(1, "one", vec!["unrouted_task"])]).unwrap();
        let table = RoutingTable::default_document_plan();
        assert!(plan.validate_routing(&table, &[DocumentType::Bizplan]).is_err());
    }
}
