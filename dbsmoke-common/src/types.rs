//! Common types used across dbsmoke components.

use serde::{Deserialize, Serialize};

/// Unique identifier for a submitted workspace run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl RunId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse lifecycle classification of a remote run.
///
/// The in-progress set (`PENDING`, `RUNNING`, `QUEUED`, `TERMINATING`)
/// keeps the poller waiting; anything else is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Pending,
    Running,
    Queued,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    /// Any lifecycle state this client does not recognize; treated as
    /// terminal so an unexpected state never wedges the poll loop.
    #[serde(other)]
    Other,
}

impl LifecycleState {
    /// Whether the poller should keep waiting on this state.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Running | Self::Queued | Self::Terminating
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Queued => "QUEUED",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::Skipped => "SKIPPED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Other => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained success/failure classification, available only once a
/// run has finished. Supersedes the lifecycle state in reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultState {
    Success,
    SuccessWithFailures,
    Failed,
    Timedout,
    Canceled,
    /// Any result state this client does not recognize. The status
    /// fetch still succeeds; reporting falls back to the lifecycle
    /// state, which carries more signal than a lost fetch.
    #[serde(other)]
    Other,
}

impl ResultState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::SuccessWithFailures => "SUCCESS_WITH_FAILURES",
            Self::Failed => "FAILED",
            Self::Timedout => "TIMEDOUT",
            Self::Canceled => "CANCELED",
            Self::Other => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ResultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered sequence of independent code fragments; order is execution
/// order. Never empty once it leaves the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    pub fragments: Vec<String>,
}

impl TestSpec {
    /// Build a spec from fragments. Returns `None` for an empty sequence,
    /// which is invalid and must trigger the generator fallback instead.
    pub fn new(fragments: Vec<String>) -> Option<Self> {
        if fragments.is_empty() {
            None
        } else {
            Some(Self { fragments })
        }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Live record of a submitted run, owned by the poller across its
/// polling loop and immutable once terminal or timed out.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: RunId,
    pub lifecycle_state: LifecycleState,
    pub result_state: Option<ResultState>,
    pub output_text: String,
    pub error_text: Option<String>,
}

impl RunRecord {
    pub fn new(run_id: RunId, initial_state: LifecycleState) -> Self {
        Self {
            run_id,
            lifecycle_state: initial_state,
            result_state: None,
            output_text: String::new(),
            error_text: None,
        }
    }

    /// Reported run status: the terminal result state when present,
    /// otherwise the (possibly still in-progress) lifecycle state. An
    /// unrecognized result state also falls back to the lifecycle
    /// state so a terminal run is never reported as UNKNOWN.
    pub fn reported_status(&self) -> String {
        match self.result_state {
            Some(ResultState::Other) | None => self.lifecycle_state.to_string(),
            Some(rs) => rs.to_string(),
        }
    }
}

/// Two-axis health classification produced by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Degraded => "DEGRADED",
            Self::Unhealthy => "UNHEALTHY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Risk axis of the analyzer verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Risk {
    Low,
    Medium,
    High,
    Unknown,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Verdict produced once by the analyzer, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub health: Health,
    pub risk: Risk,
    /// Free text the verdict was derived from (AI response or
    /// heuristic note).
    pub raw_text: String,
    /// Set when health or risk reached the highest severity; the calling
    /// pipeline gates downstream decisions on this.
    pub critical: bool,
}

impl AnalysisResult {
    pub fn new(health: Health, risk: Risk, raw_text: impl Into<String>) -> Self {
        let critical = matches!(health, Health::Unhealthy) || matches!(risk, Risk::High);
        Self {
            health,
            risk,
            raw_text: raw_text.into(),
            critical,
        }
    }

    /// Conservative verdict used when nothing was evaluable.
    pub fn unknown(note: impl Into<String>) -> Self {
        Self {
            health: Health::Unknown,
            risk: Risk::Unknown,
            raw_text: note.into(),
            critical: false,
        }
    }
}

/// Final externally visible record of one orchestrator invocation.
///
/// Created empty at process start, filled incrementally by each stage,
/// emitted exactly once at process end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub deploy_path: String,
    pub run_status: String,
    pub analysis: Option<AnalysisResult>,
    pub errors: Vec<String>,
}

impl InvocationOutcome {
    pub fn new() -> Self {
        Self {
            deploy_path: String::new(),
            run_status: "UNKNOWN".to_string(),
            analysis: None,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Whether the verdict should gate a calling pipeline.
    pub fn is_critical(&self) -> bool {
        self.analysis.as_ref().is_some_and(|a| a.critical)
    }
}

impl Default for InvocationOutcome {
    fn default() -> Self {
        Self::new()
    }
}
