//! Result classification: AI-backed with a deterministic heuristic.

use tracing::{debug, warn};

use crate::ai::{extract_text, CompletionApi};
use crate::types::{AnalysisResult, Health, Risk};

/// Classifies run status + output into a health/risk verdict.
///
/// Never errors: if the AI path fails or yields no recognizable tokens,
/// the deterministic heuristic keyed on the run status applies.
pub struct ResultAnalyzer<'a> {
    ai: &'a dyn CompletionApi,
}

impl<'a> ResultAnalyzer<'a> {
    pub fn new(ai: &'a dyn CompletionApi) -> Self {
        Self { ai }
    }

    fn prompt(run_status: &str, output: &str) -> String {
        format!(
            "A deployment smoke test finished with status '{run_status}'.\n\
             Its output follows:\n---\n{output}\n---\n\
             Classify environment health as one token of \
             HEALTHY, DEGRADED or UNHEALTHY, and risk as one token of \
             LOW, MEDIUM or HIGH. Reply with both tokens and a one-line \
             justification."
        )
    }

    /// Produce the verdict for this run.
    pub async fn analyze(&self, run_status: &str, output: &str) -> AnalysisResult {
        match self.try_ai_verdict(run_status, output).await {
            Ok(verdict) => verdict,
            Err(reason) => {
                warn!(reason = %reason, "analysis degraded to status heuristic");
                heuristic_verdict(run_status)
            }
        }
    }

    async fn try_ai_verdict(&self, run_status: &str, output: &str) -> Result<AnalysisResult, String> {
        let envelope = self
            .ai
            .complete(&Self::prompt(run_status, output))
            .await
            .map_err(|e| e.to_string())?;
        let text = extract_text(&envelope).map_err(|e| e.to_string())?;
        let (health, risk) =
            parse_tokens(&text).ok_or_else(|| "no health/risk tokens in response".to_string())?;
        debug!(health = health.as_str(), risk = risk.as_str(), "AI verdict accepted");
        Ok(AnalysisResult::new(health, risk, text))
    }
}

/// Scan free text for the first recognizable health and risk tokens.
///
/// DEGRADED and UNHEALTHY are checked before HEALTHY because "UNHEALTHY"
/// contains "HEALTHY" as a substring.
fn parse_tokens(text: &str) -> Option<(Health, Risk)> {
    let upper = text.to_uppercase();
    let health = if upper.contains("UNHEALTHY") {
        Health::Unhealthy
    } else if upper.contains("DEGRADED") {
        Health::Degraded
    } else if upper.contains("HEALTHY") {
        Health::Healthy
    } else {
        return None;
    };
    let risk = if upper.contains("HIGH") {
        Risk::High
    } else if upper.contains("MEDIUM") {
        Risk::Medium
    } else if upper.contains("LOW") {
        Risk::Low
    } else {
        return None;
    };
    Some((health, risk))
}

/// Deterministic fallback keyed on the terminal result state.
fn heuristic_verdict(run_status: &str) -> AnalysisResult {
    match run_status {
        "SUCCESS" => AnalysisResult::new(Health::Healthy, Risk::Low, "smoke test passed"),
        "SUCCESS_WITH_FAILURES" => AnalysisResult::new(
            Health::Degraded,
            Risk::Medium,
            "smoke test partially passed",
        ),
        "" | "UNKNOWN" => AnalysisResult::unknown("run status unavailable"),
        _ => AnalysisResult::new(Health::Unhealthy, Risk::High, "smoke test failed"),
    }
}
