//! Orchestrator configuration.
//!
//! All credentials and endpoints travel in explicit config structs passed
//! to each component at construction; there is no process-wide mutable
//! state. Bearer tokens are redacted from `Debug` output so they never
//! leak into logs.

use std::fmt;
use std::time::Duration;

/// Bearer credential wrapper with redacted Debug.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Remote workspace connection settings.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Base URL of the workspace, e.g. `https://adb-123.azuredatabricks.net`.
    pub host: String,
    pub token: Secret,
}

/// AI gateway connection settings.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Completion endpoint URL.
    pub endpoint: String,
    pub token: Secret,
    /// Model/deployment identifier sent with each request.
    pub deployment: String,
}

/// Poll cadence and budgets for the run poller.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Sleep between status fetches.
    pub interval: Duration,
    /// Total wait budget; the poller gives up (without error) once
    /// elapsed wait reaches this.
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_wait: Duration::from_secs(600),
        }
    }
}

impl PollConfig {
    /// Upper bound on fetches for a run that never terminates.
    pub fn max_fetches(&self) -> u32 {
        let interval = self.interval.as_secs().max(1);
        self.max_wait.as_secs().div_ceil(interval) as u32
    }
}

/// Full orchestrator configuration for one invocation.
#[derive(Debug, Clone)]
pub struct SmokeConfig {
    pub workspace: WorkspaceConfig,
    pub ai: AiConfig,
    /// Shared workspace folder the artifact is deployed under.
    pub shared_folder: String,
    /// Target environment label (e.g. "dev", "staging").
    pub target: String,
    /// Notebooks path, informational context for the generation prompt.
    pub notebooks_path: String,
    /// Repository path, informational context for the generation prompt.
    pub repo_path: String,
    pub poll: PollConfig,
    /// Per-call HTTP timeout, distinct from the poll budget.
    pub http_timeout: Duration,
}

impl SmokeConfig {
    pub const DEFAULT_SHARED_FOLDER: &'static str = "/Shared/smoke_tests";
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
}
