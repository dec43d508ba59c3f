//! Shared library for dbsmoke, a deployment smoke-test orchestrator.
//!
//! One invocation generates a small smoke-test notebook (AI-backed, with
//! a deterministic fallback), deploys it to a remote workspace, executes
//! it as an ephemeral run, waits under a bounded poll budget, classifies
//! the result, and cleans up. The pipeline driver lives in [`pipeline`];
//! every remote surface is a trait seam so tests run against scripted
//! mocks.

#![forbid(unsafe_code)]

pub mod ai;
pub mod analyzer;
pub mod artifact;
pub mod config;
pub mod errors;
pub mod generator;
pub mod logging;
pub mod mock;
pub mod pipeline;
pub mod poller;
pub mod types;
pub mod workspace;

pub use ai::{AiGatewayClient, CompletionApi};
pub use artifact::{Artifact, DeployPath};
pub use config::{AiConfig, PollConfig, Secret, SmokeConfig, WorkspaceConfig};
pub use errors::SmokeError;
pub use pipeline::SmokePipeline;
pub use poller::{cancel_pair, CancelHandle, CancelToken};
pub use types::{AnalysisResult, Health, InvocationOutcome, Risk, RunId, TestSpec};
pub use workspace::{DatabricksClient, WorkspaceApi};
