//! Remote workspace API: artifact storage and ephemeral job execution.
//!
//! `WorkspaceApi` is the seam the pipeline drives; `DatabricksClient` is
//! the production implementation over the workspace REST surface, and
//! tests substitute the scripted mock in [`crate::mock`].

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::WorkspaceConfig;
use crate::types::{LifecycleState, ResultState, RunId};

/// Errors from the workspace transport layer.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("workspace returned status {code}: {detail}")]
    Status { code: u16, detail: String },
}

/// Point-in-time run state as returned by a status fetch.
#[derive(Debug, Clone)]
pub struct RunStateSnapshot {
    pub lifecycle_state: LifecycleState,
    pub result_state: Option<ResultState>,
    pub state_message: Option<String>,
}

/// Textual output of a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Operations the orchestrator consumes from the workspace service.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Idempotent folder creation.
    async fn mkdirs(&self, path: &str) -> Result<(), WorkspaceError>;

    /// Idempotent artifact upload (SOURCE format, overwrite; last write
    /// wins).
    async fn import(&self, path: &str, content: &str) -> Result<(), WorkspaceError>;

    /// Submit an ephemeral single-node run referencing the artifact.
    async fn submit_run(&self, run_name: &str, notebook_path: &str)
        -> Result<RunId, WorkspaceError>;

    /// Fetch current run state.
    async fn get_run(&self, run_id: &RunId) -> Result<RunStateSnapshot, WorkspaceError>;

    /// Fetch run output and optional error text.
    async fn get_run_output(&self, run_id: &RunId) -> Result<RunOutput, WorkspaceError>;

    /// Idempotent artifact removal.
    async fn delete(&self, path: &str) -> Result<(), WorkspaceError>;
}

/// HTTP client for a Databricks-shaped workspace REST API.
pub struct DatabricksClient {
    http: reqwest::Client,
    config: WorkspaceConfig,
}

#[derive(Deserialize)]
struct SubmitResponse {
    run_id: u64,
}

#[derive(Deserialize)]
struct GetRunResponse {
    state: RunStateBody,
}

#[derive(Deserialize)]
struct RunStateBody {
    life_cycle_state: LifecycleState,
    #[serde(default)]
    result_state: Option<ResultState>,
    #[serde(default)]
    state_message: Option<String>,
}

#[derive(Deserialize)]
struct GetOutputResponse {
    #[serde(default)]
    notebook_output: Option<NotebookOutputBody>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct NotebookOutputBody {
    #[serde(default)]
    result: Option<String>,
}

impl DatabricksClient {
    pub fn new(
        config: WorkspaceConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, WorkspaceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.config.host.trim_end_matches('/'), endpoint)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, WorkspaceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(WorkspaceError::Status {
            code: status.as_u16(),
            detail,
        })
    }

    async fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<reqwest::Response, WorkspaceError> {
        let response = self
            .http
            .post(self.url(endpoint))
            .bearer_auth(self.config.token.expose())
            .json(&body)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn get(&self, endpoint: &str, run_id: &RunId) -> Result<reqwest::Response, WorkspaceError> {
        let response = self
            .http
            .get(self.url(endpoint))
            .bearer_auth(self.config.token.expose())
            .query(&[("run_id", run_id.as_u64())])
            .send()
            .await?;
        Self::check(response).await
    }
}

#[async_trait]
impl WorkspaceApi for DatabricksClient {
    async fn mkdirs(&self, path: &str) -> Result<(), WorkspaceError> {
        self.post("2.0/workspace/mkdirs", json!({ "path": path }))
            .await?;
        Ok(())
    }

    async fn import(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        self.post(
            "2.0/workspace/import",
            json!({
                "path": path,
                "format": "SOURCE",
                "language": "PYTHON",
                "content": encoded,
                "overwrite": true,
            }),
        )
        .await?;
        Ok(())
    }

    async fn submit_run(
        &self,
        run_name: &str,
        notebook_path: &str,
    ) -> Result<RunId, WorkspaceError> {
        // Minimal auto-terminating allocation: zero workers, local-mode
        // execution on the driver.
        let response = self
            .post(
                "2.1/jobs/runs/submit",
                json!({
                    "run_name": run_name,
                    "tasks": [{
                        "task_key": "smoke",
                        "notebook_task": { "notebook_path": notebook_path },
                        "new_cluster": {
                            "spark_version": "15.4.x-scala2.12",
                            "node_type_id": "Standard_DS3_v2",
                            "num_workers": 0,
                            "spark_conf": {
                                "spark.master": "local[*]",
                                "spark.databricks.cluster.profile": "singleNode",
                            },
                            "custom_tags": { "ResourceClass": "SingleNode" },
                        },
                    }],
                }),
            )
            .await?;
        let parsed: SubmitResponse = response.json().await?;
        Ok(RunId::new(parsed.run_id))
    }

    async fn get_run(&self, run_id: &RunId) -> Result<RunStateSnapshot, WorkspaceError> {
        let response = self.get("2.1/jobs/runs/get", run_id).await?;
        let parsed: GetRunResponse = response.json().await?;
        Ok(RunStateSnapshot {
            lifecycle_state: parsed.state.life_cycle_state,
            result_state: parsed.state.result_state,
            state_message: parsed.state.state_message,
        })
    }

    async fn get_run_output(&self, run_id: &RunId) -> Result<RunOutput, WorkspaceError> {
        let response = self.get("2.1/jobs/runs/get-output", run_id).await?;
        let parsed: GetOutputResponse = response.json().await?;
        Ok(RunOutput {
            result: parsed.notebook_output.and_then(|o| o.result),
            error: parsed.error,
        })
    }

    async fn delete(&self, path: &str) -> Result<(), WorkspaceError> {
        self.post("2.0/workspace/delete", json!({ "path": path }))
            .await?;
        Ok(())
    }
}

impl RunOutput {
    /// Result text with any error text appended after a visible
    /// separator.
    pub fn combined_text(&self) -> String {
        let mut text = self.result.clone().unwrap_or_default();
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            if !text.is_empty() {
                text.push_str("\n--- ERROR ---\n");
            } else {
                text.push_str("--- ERROR ---\n");
            }
            text.push_str(error);
        }
        text
    }
}
