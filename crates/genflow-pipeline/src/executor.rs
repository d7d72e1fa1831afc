//! Phase executor: run one phase's tasks and classify the outcome

use crate::plan::PhasePlan;
use genflow_core::{GenflowError, PhaseResult, PhaseStatus, Session, TaskResult};
use genflow_router::TaskRouter;
use genflow_templates::{template_name, PromptRenderer};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Executes all tasks of one phase, in declared order
///
/// Tasks run strictly sequentially; an empty task list yields a
/// `Skipped` phase without touching the router. A single failed task
/// fails the whole phase, but later tasks still run so their results
/// are available for diagnosis.
pub struct PhaseExecutor {
    router: Arc<TaskRouter>,
    renderer: Arc<dyn PromptRenderer>,
}

impl PhaseExecutor {
    pub fn new(router: Arc<TaskRouter>, renderer: Arc<dyn PromptRenderer>) -> Self {
        Self { router, renderer }
    }

    pub fn router(&self) -> &Arc<TaskRouter> {
        &self.router
    }

    /// Run one phase for a session
    pub async fn execute(
        &self,
        phase: &PhasePlan,
        session: &Session,
        cancel: &CancellationToken,
    ) -> PhaseResult {
        let result = PhaseResult::started(phase.number, phase.name.clone());

        if phase.tasks.is_empty() {
            tracing::info!(phase_number = phase.number, "Phase has no tasks, skipping");
            return result.finalize(PhaseStatus::Skipped);
        }

        tracing::info!(
            phase_number = phase.number,
            phase_name = %phase.name,
            task_count = phase.tasks.len(),
            "Starting phase"
        );

        let mut result = result;
        let mut failed = false;

        for task in &phase.tasks {
            // The provider recorded for failures that never reached a
            // provider call is the phase's nominal (primary) provider.
            let nominal = self
                .router
                .primary_for(phase.number, task, session.config.doc_type)
                .unwrap_or("unknown")
                .to_string();

            if cancel.is_cancelled() {
                result
                    .tasks
                    .push(TaskResult::failed(task, &nominal, "phase cancelled"));
                failed = true;
                break;
            }

            match self.run_task(phase.number, task, session, cancel).await {
                Ok(task_result) => {
                    if !task_result.success {
                        failed = true;
                    }
                    result.tasks.push(task_result);
                }
                Err(GenflowError::Cancelled(reason)) => {
                    result.tasks.push(TaskResult::failed(task, &nominal, reason));
                    failed = true;
                    break;
                }
                Err(error) => {
                    // Router-level configuration errors become failed
                    // task results rather than aborting the run.
                    tracing::error!(
                        phase_number = phase.number,
                        task = %task,
                        error = %error,
                        "Task failed before provider execution"
                    );
                    result
                        .tasks
                        .push(TaskResult::failed(task, &nominal, error.to_string()));
                    failed = true;
                }
            }
        }

        let status = if failed {
            PhaseStatus::Failed
        } else {
            PhaseStatus::Completed
        };

        tracing::info!(
            phase_number = phase.number,
            status = %status,
            "Phase finished"
        );

        result.finalize(status)
    }

    async fn run_task(
        &self,
        phase_number: u32,
        task: &str,
        session: &Session,
        cancel: &CancellationToken,
    ) -> genflow_core::Result<TaskResult> {
        let context = HashMap::from([
            ("topic".to_string(), session.config.topic.clone()),
            ("doc_type".to_string(), session.config.doc_type.to_string()),
            ("language".to_string(), session.config.language.clone()),
            ("task".to_string(), task.to_string()),
        ]);

        let prompt = self
            .renderer
            .render(&template_name(phase_number, task), &context)
            .await?;

        self.router
            .execute(phase_number, task, &prompt, session.config.doc_type, cancel)
            .await
    }
}
