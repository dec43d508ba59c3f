//! dbsmoke - deployment smoke-test orchestrator CLI.
//!
//! Runs one smoke-test invocation against a freshly deployed workspace
//! and prints the consolidated outcome as JSON on stdout. Exit codes:
//! 0 = HEALTHY or DEGRADED verdict, 1 = critical verdict or run error,
//! 2 = deployment skipped.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use dbsmoke_common::config::{AiConfig, Secret, SmokeConfig, WorkspaceConfig};
use dbsmoke_common::logging::init_logging;
use dbsmoke_common::pipeline::{SmokePipeline, STATUS_ERROR, STATUS_SKIPPED};
use dbsmoke_common::poller::cancel_pair;
use dbsmoke_common::types::InvocationOutcome;
use dbsmoke_common::{AiGatewayClient, DatabricksClient, PollConfig};

#[derive(Parser)]
#[command(name = "dbsmoke")]
#[command(author, version, about = "Deployment smoke-test orchestrator")]
struct Cli {
    /// Workspace base URL
    #[arg(long, env = "DATABRICKS_HOST")]
    workspace_host: String,

    /// Workspace bearer token
    #[arg(long, env = "DATABRICKS_TOKEN", hide_env_values = true)]
    workspace_token: String,

    /// AI completion endpoint URL
    #[arg(long, env = "DBSMOKE_AI_ENDPOINT")]
    ai_endpoint: String,

    /// AI bearer token
    #[arg(long, env = "DBSMOKE_AI_TOKEN", hide_env_values = true)]
    ai_token: String,

    /// AI model/deployment identifier
    #[arg(long, env = "DBSMOKE_AI_DEPLOYMENT", default_value = "gpt-4")]
    ai_deployment: String,

    /// Notebooks path, used as prompt context
    #[arg(long, default_value = "/Repos/notebooks")]
    notebooks_path: String,

    /// Target environment label
    #[arg(long, default_value = "dev")]
    target: String,

    /// Repository path, used as prompt context
    #[arg(long, default_value = ".")]
    repo_path: String,

    /// Workspace folder artifacts are deployed under
    #[arg(long, default_value = SmokeConfig::DEFAULT_SHARED_FOLDER)]
    shared_folder: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn exit_code(outcome: &InvocationOutcome) -> i32 {
    if outcome.run_status == STATUS_SKIPPED {
        return 2;
    }
    if outcome.is_critical() || outcome.run_status == STATUS_ERROR {
        return 1;
    }
    0
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { "debug" } else { "info" });

    let config = SmokeConfig {
        workspace: WorkspaceConfig {
            host: cli.workspace_host,
            token: Secret::new(cli.workspace_token),
        },
        ai: AiConfig {
            endpoint: cli.ai_endpoint,
            token: Secret::new(cli.ai_token),
            deployment: cli.ai_deployment,
        },
        shared_folder: cli.shared_folder,
        target: cli.target,
        notebooks_path: cli.notebooks_path,
        repo_path: cli.repo_path,
        poll: PollConfig::default(),
        http_timeout: SmokeConfig::DEFAULT_HTTP_TIMEOUT,
    };

    let workspace = DatabricksClient::new(config.workspace.clone(), config.http_timeout)
        .context("failed to build workspace client")?;
    let ai = AiGatewayClient::new(config.ai.clone(), config.http_timeout)
        .context("failed to build AI client")?;

    let (cancel_handle, mut cancel_token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing current stage and cleaning up");
            cancel_handle.cancel();
        }
    });

    info!(target = %config.target, "starting smoke-test invocation");
    let pipeline = SmokePipeline::new(&workspace, &ai, &config);
    let outcome = pipeline.run(&mut cancel_token).await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    std::process::exit(exit_code(&outcome));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbsmoke_common::types::{AnalysisResult, Health, Risk};

    fn outcome_with(status: &str, health: Health, risk: Risk) -> InvocationOutcome {
        let mut outcome = InvocationOutcome::new();
        outcome.run_status = status.to_string();
        outcome.analysis = Some(AnalysisResult::new(health, risk, "note"));
        outcome
    }

    #[test]
    fn test_exit_zero_for_healthy_and_degraded() {
        assert_eq!(exit_code(&outcome_with("SUCCESS", Health::Healthy, Risk::Low)), 0);
        assert_eq!(
            exit_code(&outcome_with(
                "SUCCESS_WITH_FAILURES",
                Health::Degraded,
                Risk::Medium
            )),
            0
        );
    }

    #[test]
    fn test_exit_one_for_critical_or_error() {
        assert_eq!(exit_code(&outcome_with("FAILED", Health::Unhealthy, Risk::High)), 1);
        assert_eq!(exit_code(&outcome_with("ERROR", Health::Unknown, Risk::Unknown)), 1);
    }

    #[test]
    fn test_exit_two_for_skipped_deployment() {
        // SKIPPED wins even though its heuristic verdict is critical.
        assert_eq!(
            exit_code(&outcome_with("SKIPPED", Health::Unhealthy, Risk::High)),
            2
        );
    }

    #[test]
    fn test_unresolved_timeout_is_not_failing() {
        // A run that never resolved keeps its last lifecycle state; the
        // verdict (not the state string) decides the exit code.
        let outcome = outcome_with("RUNNING", Health::Degraded, Risk::Medium);
        assert_eq!(exit_code(&outcome), 0);
    }

    #[test]
    fn test_cli_parses_full_argument_set() {
        let cli = Cli::try_parse_from([
            "dbsmoke",
            "--workspace-host",
            "https://adb.example",
            "--workspace-token",
            "dapi123",
            "--ai-endpoint",
            "https://ai.example/complete",
            "--ai-token",
            "sk-test",
            "--target",
            "staging",
        ])
        .unwrap();
        assert_eq!(cli.workspace_host, "https://adb.example");
        assert_eq!(cli.target, "staging");
        assert_eq!(cli.ai_deployment, "gpt-4");
        assert_eq!(cli.shared_folder, SmokeConfig::DEFAULT_SHARED_FOLDER);
    }
}
