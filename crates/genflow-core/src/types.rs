//! Core type definitions for the Genflow pipeline

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Provider identifier (e.g. "chatgpt", "claude", "gemini")
pub type ProviderId = String;

/// Task identifier within a phase (e.g. "deep_search_gemini")
pub type TaskId = String;

/// Supported document types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Business plan
    #[default]
    Bizplan,
    /// Research document
    Rd,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bizplan => write!(f, "bizplan"),
            Self::Rd => write!(f, "rd"),
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bizplan" => Ok(Self::Bizplan),
            "rd" => Ok(Self::Rd),
            _ => Err(format!("Invalid document type: {}", s)),
        }
    }
}

/// Overall pipeline state
///
/// `Idle` is the initial state. `Phase(n)` is entered when phase `n`
/// completed or was skipped. `Completed` and `Failed` end a run;
/// a failed session may later be reopened by resume, which retries
/// the failed phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Idle,
    /// Phase `n` finished (completed or skipped)
    Phase(u32),
    Completed,
    Failed,
}

impl PipelineState {
    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Phase(n) => write!(f, "phase_{}", n),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for PipelineState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => {
                let number = other
                    .strip_prefix("phase_")
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| format!("Invalid pipeline state: {}", other))?;
                Ok(Self::Phase(number))
            }
        }
    }
}

// Serialized as the plain string form ("idle", "phase_3", ...) so the
// persisted snapshot stays readable and resumable by external tooling.
impl Serialize for PipelineState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PipelineState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Status of one executed phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Final recorded outcome of one task
///
/// Only the final outcome per task is retained: failed attempts that a
/// successful retry or fallback superseded are not recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task identifier
    pub task: TaskId,
    /// Provider that produced (or last attempted) this result
    pub provider: ProviderId,
    /// Generated content (empty on failure)
    pub content: String,
    /// Tokens consumed by the provider call
    pub tokens_used: u32,
    /// Provider response time in milliseconds
    pub response_time_ms: u64,
    pub success: bool,
    /// Error description when `success` is false
    pub error: Option<String>,
}

impl TaskResult {
    /// Successful task outcome
    pub fn ok(
        task: impl Into<TaskId>,
        provider: impl Into<ProviderId>,
        content: impl Into<String>,
        tokens_used: u32,
        response_time_ms: u64,
    ) -> Self {
        Self {
            task: task.into(),
            provider: provider.into(),
            content: content.into(),
            tokens_used,
            response_time_ms,
            success: true,
            error: None,
        }
    }

    /// Failed task outcome with an error description
    pub fn failed(
        task: impl Into<TaskId>,
        provider: impl Into<ProviderId>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task: task.into(),
            provider: provider.into(),
            content: String::new(),
            tokens_used: 0,
            response_time_ms: 0,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Result of one attempted phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_number: u32,
    pub phase_name: String,
    /// Final task outcomes, in declared task order
    pub tasks: Vec<TaskResult>,
    pub status: PhaseStatus,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, when the phase is finalized
    pub completed_at: Option<DateTime<Utc>>,
}

impl PhaseResult {
    /// Start a new phase result with no tasks recorded yet
    pub fn started(phase_number: u32, phase_name: impl Into<String>) -> Self {
        Self {
            phase_number,
            phase_name: phase_name.into(),
            tasks: Vec::new(),
            status: PhaseStatus::Completed,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Finalize the phase with its aggregate status
    pub fn finalize(mut self, status: PhaseStatus) -> Self {
        self.status = status;
        self.completed_at = Some(Utc::now());
        self
    }
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Document topic
    pub topic: String,
    #[serde(default)]
    pub doc_type: DocumentType,
    /// Template family (e.g. "default", "startup", "strategy")
    #[serde(default = "default_template_family")]
    pub template_family: String,
    /// Output language code
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_template_family() -> String {
    "default".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl PipelineConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            doc_type: DocumentType::default(),
            template_family: default_template_family(),
            language: default_language(),
        }
    }

    pub fn with_doc_type(mut self, doc_type: DocumentType) -> Self {
        self.doc_type = doc_type;
        self
    }

    pub fn with_template_family(mut self, family: impl Into<String>) -> Self {
        self.template_family = family.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// One end-to-end pipeline run
///
/// The serialized form is the persisted snapshot shape:
/// `{session_id, phase, state, results, config}`. Resume flows
/// reconstruct a session from exactly this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub config: PipelineConfig,
    /// Last attempted phase number (0 before any phase ran)
    pub phase: u32,
    pub state: PipelineState,
    /// One finalized result per attempted phase, in phase order
    pub results: Vec<PhaseResult>,
}

impl Session {
    /// Create a fresh session in the idle state
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            config,
            phase: 0,
            state: PipelineState::Idle,
            results: Vec::new(),
        }
    }

    /// Append a finalized phase result
    ///
    /// The phase counter only ever moves forward; appending a result
    /// for an earlier phase than the current one is a caller bug.
    pub fn add_result(&mut self, result: PhaseResult) {
        debug_assert!(result.phase_number > self.phase);
        self.phase = result.phase_number;
        self.results.push(result);
    }

    /// Phase result for a given phase number, if attempted
    pub fn result_for(&self, phase_number: u32) -> Option<&PhaseResult> {
        self.results
            .iter()
            .find(|r| r.phase_number == phase_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_state_round_trip() {
        for state in [
            PipelineState::Idle,
            PipelineState::Phase(3),
            PipelineState::Completed,
            PipelineState::Failed,
        ] {
            let text = state.to_string();
            let parsed: PipelineState = text.parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn test_pipeline_state_serde_as_string() {
        let json = serde_json::to_string(&PipelineState::Phase(2)).unwrap();
        assert_eq!(json, "\"phase_2\"");

        let state: PipelineState = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(state, PipelineState::Failed);
    }

    #[test]
    fn test_pipeline_state_invalid() {
        assert!("phase_".parse::<PipelineState>().is_err());
        assert!("running".parse::<PipelineState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Completed.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Idle.is_terminal());
        assert!(!PipelineState::Phase(1).is_terminal());
    }

    #[test]
    fn test_session_phase_advances() {
        let mut session = Session::new(PipelineConfig::new("Solar-powered ferries"));
        assert_eq!(session.phase, 0);
        assert_eq!(session.state, PipelineState::Idle);

        session.add_result(PhaseResult::started(1, "Phase 1").finalize(PhaseStatus::Completed));
        session.add_result(PhaseResult::started(2, "Phase 2").finalize(PhaseStatus::Skipped));

        assert_eq!(session.phase, 2);
        assert_eq!(session.results.len(), 2);
        assert!(session.result_for(1).is_some());
        assert!(session.result_for(3).is_none());
    }

    #[test]
    fn test_session_snapshot_shape() {
        let session = Session::new(PipelineConfig::new("Topic"));
        let value = serde_json::to_value(&session).unwrap();

        assert!(value.get("session_id").is_some());
        assert!(value.get("phase").is_some());
        assert_eq!(value["state"], "idle");
        assert!(value["results"].as_array().unwrap().is_empty());

        // Round-trips back into a Session
        let restored: Session = serde_json::from_value(value).unwrap();
        assert_eq!(restored.session_id, session.session_id);
    }

    #[test]
    fn test_phase_result_finalize_sets_completion() {
        let result = PhaseResult::started(1, "Phase 1: Framing");
        assert!(result.completed_at.is_none());

        let result = result.finalize(PhaseStatus::Failed);
        assert_eq!(result.status, PhaseStatus::Failed);
        assert!(result.completed_at.is_some());
    }

    #[test]
    fn test_document_type_parsing() {
        assert_eq!("bizplan".parse::<DocumentType>().unwrap(), DocumentType::Bizplan);
        assert_eq!("RD".parse::<DocumentType>().unwrap(), DocumentType::Rd);
        assert!("memo".parse::<DocumentType>().is_err());
    }
}
