//! Pipeline orchestrator: drives a session through its phases

use crate::executor::PhaseExecutor;
use crate::plan::PipelinePlan;
use genflow_core::{
    PhaseResult, PhaseStatus, PipelineConfig, PipelineState, Session,
};
use genflow_export::Exporter;
use genflow_router::TaskRouter;
use genflow_templates::PromptRenderer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Drives sessions phase by phase and persists their results
///
/// State transitions: `Idle -> Phase(1) -> ... -> Phase(N) ->
/// Completed`, with any failed phase moving the session to `Failed`
/// and stopping the run. Results accumulated before the failure are
/// kept on the session. After every phase the orchestrator exports
/// `phase{n}_results`; the full session snapshot is exported as
/// `pipeline_state` once the run ends, on success and failure alike.
pub struct PipelineOrchestrator {
    plan: PipelinePlan,
    executor: PhaseExecutor,
    exporter: Arc<dyn Exporter>,
    cancel: CancellationToken,
}

impl PipelineOrchestrator {
    pub fn new(
        plan: PipelinePlan,
        router: Arc<TaskRouter>,
        renderer: Arc<dyn PromptRenderer>,
        exporter: Arc<dyn Exporter>,
    ) -> Self {
        Self {
            plan,
            executor: PhaseExecutor::new(router, renderer),
            exporter,
            cancel: CancellationToken::new(),
        }
    }

    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// Token callers can use to stop the pipeline between tasks
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Create a fresh idle session for a run
    pub fn create_session(&self, config: PipelineConfig) -> Session {
        let session = Session::new(config);
        tracing::info!(
            session_id = %session.session_id,
            topic = %session.config.topic,
            doc_type = %session.config.doc_type,
            "Created session"
        );
        session
    }

    /// Execute a single phase without advancing session state
    ///
    /// A phase number outside the plan yields a skipped result.
    pub async fn execute_phase(&self, session: &Session, phase_number: u32) -> PhaseResult {
        match self.plan.phase(phase_number) {
            Some(phase) => self.executor.execute(phase, session, &self.cancel).await,
            None => {
                tracing::warn!(phase_number, "No such phase in plan, skipping");
                PhaseResult::started(phase_number, format!("Phase {}", phase_number))
                    .finalize(PhaseStatus::Skipped)
            }
        }
    }

    /// Run a full pipeline from a fresh session
    pub async fn run_pipeline(&self, config: PipelineConfig) -> Session {
        let session = self.create_session(config);
        self.run(session).await
    }

    /// Run a pre-created session from the first phase
    pub async fn run(&self, session: Session) -> Session {
        self.drive(session, 1).await
    }

    /// Resume a session from its first unfinished phase
    ///
    /// Completed sessions are returned unchanged. A failed session is
    /// reopened: the failed phase's result is dropped and that phase
    /// runs again.
    pub async fn resume(&self, mut session: Session) -> Session {
        if session.state == PipelineState::Completed {
            tracing::warn!(
                session_id = %session.session_id,
                "Session already completed, nothing to resume"
            );
            return session;
        }

        if session.state == PipelineState::Failed {
            session.results.retain(|r| r.status != PhaseStatus::Failed);
            session.phase = session.results.last().map(|r| r.phase_number).unwrap_or(0);
            session.state = match session.phase {
                0 => PipelineState::Idle,
                n => PipelineState::Phase(n),
            };
        }

        let start = session.phase + 1;
        tracing::info!(
            session_id = %session.session_id,
            start_phase = start,
            "Resuming session"
        );
        self.drive(session, start).await
    }

    async fn drive(&self, mut session: Session, start_phase: u32) -> Session {
        let total = self.plan.total_phases();

        for number in start_phase..=total {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    session_id = %session.session_id,
                    phase_number = number,
                    "Pipeline cancelled"
                );
                session.state = PipelineState::Failed;
                break;
            }

            let result = self.execute_phase(&session, number).await;
            let status = result.status;

            self.save(&format!("phase{}_results", number), &result);
            session.add_result(result);

            match status {
                PhaseStatus::Completed | PhaseStatus::Skipped => {
                    session.state = PipelineState::Phase(number);
                }
                PhaseStatus::Failed => {
                    tracing::error!(
                        session_id = %session.session_id,
                        phase_number = number,
                        "Phase failed, stopping pipeline"
                    );
                    session.state = PipelineState::Failed;
                    break;
                }
            }
        }

        if session.state != PipelineState::Failed {
            session.state = if session.phase == total {
                PipelineState::Completed
            } else {
                PipelineState::Failed
            };
        }

        tracing::info!(
            session_id = %session.session_id,
            state = %session.state,
            phases_attempted = session.results.len(),
            "Pipeline finished"
        );

        // The snapshot is written on every exit path so a failed run
        // stays inspectable and resumable.
        self.save("pipeline_state", &session);
        session
    }

    /// Best-effort export; failures are logged, never fatal
    fn save<T: serde::Serialize>(&self, name: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => {
                if let Err(error) = self.exporter.save(name, &value) {
                    tracing::warn!(name, error = %error, "Export failed");
                }
            }
            Err(error) => {
                tracing::warn!(name, error = %error, "Serializing export payload failed");
            }
        }
    }
}
