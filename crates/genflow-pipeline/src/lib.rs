//! # genflow-pipeline
//!
//! Phase execution and session state machine for Genflow.
//!
//! The [`PipelineOrchestrator`] drives a session phase by phase:
//! each phase's tasks run in declared order through the task router,
//! the aggregate outcome decides the state transition, and every
//! phase result plus a final session snapshot is handed to the
//! exporter. A failed phase stops the pipeline; results produced so
//! far are kept for diagnosis and resume.

mod executor;
mod orchestrator;
mod plan;

pub use executor::PhaseExecutor;
pub use orchestrator::PipelineOrchestrator;
pub use plan::{PhasePlan, PipelinePlan};
