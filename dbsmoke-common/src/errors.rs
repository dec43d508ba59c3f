//! Error taxonomy for the smoke-test pipeline.
//!
//! No stage error is ever fatal to the process: the pipeline driver maps
//! each variant to its recovery policy (fallback, skip, warn) and always
//! reaches the terminal reporting phase.

use thiserror::Error;

/// Per-stage errors threaded through the pipeline.
#[derive(Debug, Error)]
pub enum SmokeError {
    /// AI generation failed (network, auth, extraction, parse, or empty
    /// result). Always recovered via the fallback TestSpec.
    #[error("test generation failed: {0}")]
    Generation(String),

    /// Folder creation or artifact upload failed. The sole hard gate:
    /// execution stages are skipped and the run status becomes SKIPPED.
    #[error("deployment failed: {0}")]
    Deployment(String),

    /// Run submission rejected. Run status becomes ERROR; analysis still
    /// runs with empty output.
    #[error("run submission failed: {0}")]
    Submission(String),

    /// A status fetch inside the poll loop failed. Consumes a poll
    /// attempt without resetting the wait budget.
    #[error("run status fetch failed: {0}")]
    PollFetch(String),

    /// Output retrieval failed. Recovered with empty output.
    #[error("run output fetch failed: {0}")]
    OutputFetch(String),

    /// AI analysis failed. Always recovered via the deterministic
    /// heuristic.
    #[error("result analysis failed: {0}")]
    Analysis(String),

    /// Artifact deletion failed. Warning only, never escalated.
    #[error("artifact cleanup failed: {0}")]
    Cleanup(String),
}

impl SmokeError {
    /// Short category label used in the consolidated error list.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generation",
            Self::Deployment(_) => "deployment",
            Self::Submission(_) => "submission",
            Self::PollFetch(_) => "poll",
            Self::OutputFetch(_) => "output",
            Self::Analysis(_) => "analysis",
            Self::Cleanup(_) => "cleanup",
        }
    }
}
