//! Pipeline driver: strict stage sequencing with per-stage recovery.
//!
//! Generator → Assembler → Deployer → Runner → Poller → Collector →
//! Analyzer → Cleanup. No stage failure is fatal; each degrades per the
//! error taxonomy and the driver always reaches the reporting phase.
//! Deployment failure is the sole hard gate: with nothing uploaded there
//! is nothing to execute, so runner, poller, collector and cleanup are
//! skipped and the run status becomes SKIPPED.

use chrono::Utc;
use tracing::{info, warn};

use crate::ai::CompletionApi;
use crate::analyzer::ResultAnalyzer;
use crate::artifact::{Artifact, DeployPath};
use crate::config::SmokeConfig;
use crate::errors::SmokeError;
use crate::generator::TestSpecGenerator;
use crate::poller::{CancelToken, RunPoller};
use crate::types::{InvocationOutcome, LifecycleState, RunId, RunRecord};
use crate::workspace::WorkspaceApi;

/// Overall status when deployment failed and execution never started.
pub const STATUS_SKIPPED: &str = "SKIPPED";
/// Overall status when run submission was rejected.
pub const STATUS_ERROR: &str = "ERROR";

/// Append a stage error to the consolidated list, tagged with its
/// category so a calling pipeline can filter entries programmatically.
fn record_stage_error(outcome: &mut InvocationOutcome, err: &SmokeError) {
    outcome.record_error(format!("[{}] {}", err.category(), err));
}

/// One-shot smoke-test pipeline over injected service seams.
pub struct SmokePipeline<'a> {
    workspace: &'a dyn WorkspaceApi,
    ai: &'a dyn CompletionApi,
    config: &'a SmokeConfig,
}

impl<'a> SmokePipeline<'a> {
    pub fn new(
        workspace: &'a dyn WorkspaceApi,
        ai: &'a dyn CompletionApi,
        config: &'a SmokeConfig,
    ) -> Self {
        Self {
            workspace,
            ai,
            config,
        }
    }

    /// Execute the full pipeline for one invocation.
    ///
    /// Always returns an outcome with a populated analysis verdict; the
    /// cancellation token is honored between poll fetches so an
    /// interrupted invocation still attempts cleanup.
    pub async fn run(&self, cancel: &mut CancelToken) -> InvocationOutcome {
        let mut outcome = InvocationOutcome::new();

        // Generator: never fails, degrades to the fallback suite.
        let generator = TestSpecGenerator::new(
            self.ai,
            &self.config.target,
            &self.config.notebooks_path,
            &self.config.repo_path,
        );
        let generated = generator.generate().await;
        if let Some(warning) = &generated.warning {
            record_stage_error(&mut outcome, warning);
        }

        // Assembler: pure, cannot fail on a non-empty spec.
        let artifact = Artifact::assemble(&generated.spec, &self.config.target);
        let deploy_path = DeployPath::new(&self.config.shared_folder, &self.config.target, Utc::now());
        outcome.deploy_path = deploy_path.as_str().to_string();
        info!(
            path = %deploy_path,
            cells = artifact.cell_count(),
            fallback = generated.used_fallback,
            "artifact assembled"
        );

        // Deployer: the sole hard gate.
        if let Err(err) = self.deploy(&artifact, &deploy_path).await {
            warn!(error = %err, "deployment failed; skipping execution");
            record_stage_error(&mut outcome, &err);
            outcome.run_status = STATUS_SKIPPED.to_string();
            self.analyze_into(&mut outcome, "").await;
            return outcome;
        }

        // Runner → Poller → Collector, each degrading independently.
        let output = match self.submit(&deploy_path).await {
            Ok(run_id) => {
                let record = self.seed_record(run_id).await;
                let report = RunPoller::new(self.workspace, self.config.poll)
                    .poll(record, cancel)
                    .await;
                if report.timed_out {
                    outcome.record_error(format!(
                        "poll budget exhausted; last state {}",
                        report.record.lifecycle_state
                    ));
                }
                if report.cancelled {
                    outcome.record_error("polling cancelled".to_string());
                }
                if report.fetch_failures > 0 {
                    record_stage_error(
                        &mut outcome,
                        &SmokeError::PollFetch(format!(
                            "{} transient fetch failure(s)",
                            report.fetch_failures
                        )),
                    );
                }
                outcome.run_status = report.record.reported_status();
                self.collect_output(&report.record, &mut outcome).await
            }
            Err(err) => {
                warn!(error = %err, "run submission failed");
                record_stage_error(&mut outcome, &err);
                outcome.run_status = STATUS_ERROR.to_string();
                String::new()
            }
        };

        // Analyzer: never fails, worst case UNKNOWN/UNKNOWN.
        let run_status = outcome.run_status.clone();
        self.analyze_into(&mut outcome, &output).await;
        info!(
            run_status = %run_status,
            critical = outcome.is_critical(),
            "verdict ready"
        );

        // Cleanup: best effort, warning only.
        if let Err(err) = self.workspace.delete(deploy_path.as_str()).await {
            let err = SmokeError::Cleanup(err.to_string());
            warn!(error = %err, path = %deploy_path, "cleanup failed");
            record_stage_error(&mut outcome, &err);
        }

        outcome
    }

    /// Ensure the shared folder exists (warning only on failure) and
    /// upload the artifact with overwrite semantics.
    async fn deploy(&self, artifact: &Artifact, path: &DeployPath) -> Result<(), SmokeError> {
        if let Err(err) = self.workspace.mkdirs(&self.config.shared_folder).await {
            // Not fatal by itself; a missing folder surfaces on upload.
            warn!(error = %err, folder = %self.config.shared_folder, "mkdirs failed");
        }
        self.workspace
            .import(path.as_str(), artifact.content())
            .await
            .map_err(|e| SmokeError::Deployment(e.to_string()))
    }

    async fn submit(&self, path: &DeployPath) -> Result<RunId, SmokeError> {
        let run_name = format!("smoke-{}-{}", self.config.target, path.timestamp());
        self.workspace
            .submit_run(&run_name, path.as_str())
            .await
            .map_err(|e| SmokeError::Submission(e.to_string()))
    }

    /// Seed the run record from a first status fetch; a failed seed
    /// fetch starts the poller from PENDING.
    async fn seed_record(&self, run_id: RunId) -> RunRecord {
        match self.workspace.get_run(&run_id).await {
            Ok(snapshot) => {
                let mut record = RunRecord::new(run_id, snapshot.lifecycle_state);
                record.result_state = snapshot.result_state;
                record
            }
            Err(err) => {
                warn!(error = %err, run_id = %run_id, "initial state fetch failed");
                RunRecord::new(run_id, LifecycleState::Pending)
            }
        }
    }

    /// Retrieve run output; non-fatal, empty output on failure.
    async fn collect_output(&self, record: &RunRecord, outcome: &mut InvocationOutcome) -> String {
        match self.workspace.get_run_output(&record.run_id).await {
            Ok(output) => output.combined_text(),
            Err(err) => {
                let err = SmokeError::OutputFetch(err.to_string());
                warn!(error = %err, run_id = %record.run_id, "output fetch failed");
                record_stage_error(outcome, &err);
                String::new()
            }
        }
    }

    async fn analyze_into(&self, outcome: &mut InvocationOutcome, output: &str) {
        let verdict = ResultAnalyzer::new(self.ai)
            .analyze(&outcome.run_status, output)
            .await;
        outcome.analysis = Some(verdict);
    }
}
