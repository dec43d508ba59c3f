//! Scripted mock workspace for tests.
//!
//! No sockets are opened; behavior is scripted per operation through a
//! builder, and every call is recorded so tests can assert which stages
//! ran. Intended for unit and pipeline tests where a real workspace is
//! unavailable.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::{LifecycleState, ResultState, RunId};
use crate::workspace::{RunOutput, RunStateSnapshot, WorkspaceApi, WorkspaceError};

fn scripted_error(op: &str) -> WorkspaceError {
    WorkspaceError::Status {
        code: 500,
        detail: format!("mock: {op} scripted to fail"),
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<String>,
    imports: HashMap<String, String>,
    fetches: usize,
    next_run_id: u64,
}

/// Scripted in-memory implementation of [`WorkspaceApi`].
pub struct MockWorkspace {
    state: Mutex<MockState>,
    fail_mkdirs: bool,
    fail_import: bool,
    fail_submit: bool,
    /// Status fetches (1-based) that fail with a transient error.
    failing_fetches: Vec<usize>,
    fail_output: bool,
    fail_delete: bool,
    /// States returned by successive `get_run` calls; the last entry
    /// repeats once the script is exhausted.
    run_states: Vec<RunStateSnapshot>,
    output: RunOutput,
}

impl MockWorkspace {
    pub fn builder() -> MockWorkspaceBuilder {
        MockWorkspaceBuilder::default()
    }

    /// Operations invoked so far, in order (e.g. `"import"`, `"delete"`).
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().expect("mock state poisoned").calls.clone()
    }

    pub fn was_called(&self, op: &str) -> bool {
        self.calls().iter().any(|c| c == op)
    }

    /// Number of `get_run` fetches performed.
    pub fn fetch_count(&self) -> usize {
        self.state.lock().expect("mock state poisoned").fetches
    }

    /// Last content imported at `path`, if any.
    pub fn imported_content(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .imports
            .get(path)
            .cloned()
    }

    fn record(&self, op: &str) {
        self.state
            .lock()
            .expect("mock state poisoned")
            .calls
            .push(op.to_string());
    }
}

#[async_trait]
impl WorkspaceApi for MockWorkspace {
    async fn mkdirs(&self, _path: &str) -> Result<(), WorkspaceError> {
        self.record("mkdirs");
        if self.fail_mkdirs {
            return Err(scripted_error("mkdirs"));
        }
        Ok(())
    }

    async fn import(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        self.record("import");
        if self.fail_import {
            return Err(scripted_error("import"));
        }
        // Overwrite semantics: last write wins, repeat paths never error.
        self.state
            .lock()
            .expect("mock state poisoned")
            .imports
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn submit_run(
        &self,
        _run_name: &str,
        _notebook_path: &str,
    ) -> Result<RunId, WorkspaceError> {
        self.record("submit_run");
        if self.fail_submit {
            return Err(scripted_error("submit_run"));
        }
        let mut state = self.state.lock().expect("mock state poisoned");
        state.next_run_id += 1;
        Ok(RunId::new(state.next_run_id))
    }

    async fn get_run(&self, _run_id: &RunId) -> Result<RunStateSnapshot, WorkspaceError> {
        self.record("get_run");
        let index = {
            let mut state = self.state.lock().expect("mock state poisoned");
            state.fetches += 1;
            state.fetches
        };
        if self.failing_fetches.contains(&index) {
            return Err(scripted_error("get_run"));
        }
        let snapshot = self
            .run_states
            .get(index - 1)
            .or_else(|| self.run_states.last())
            .cloned()
            .unwrap_or(RunStateSnapshot {
                lifecycle_state: LifecycleState::Terminated,
                result_state: Some(ResultState::Success),
                state_message: None,
            });
        Ok(snapshot)
    }

    async fn get_run_output(&self, _run_id: &RunId) -> Result<RunOutput, WorkspaceError> {
        self.record("get_run_output");
        if self.fail_output {
            return Err(scripted_error("get_run_output"));
        }
        Ok(self.output.clone())
    }

    async fn delete(&self, _path: &str) -> Result<(), WorkspaceError> {
        self.record("delete");
        if self.fail_delete {
            return Err(scripted_error("delete"));
        }
        Ok(())
    }
}

/// Builder for [`MockWorkspace`].
#[derive(Default)]
pub struct MockWorkspaceBuilder {
    fail_mkdirs: bool,
    fail_import: bool,
    fail_submit: bool,
    failing_fetches: Vec<usize>,
    fail_output: bool,
    fail_delete: bool,
    run_states: Vec<RunStateSnapshot>,
    output: Option<RunOutput>,
}

impl MockWorkspaceBuilder {
    pub fn fail_mkdirs(mut self) -> Self {
        self.fail_mkdirs = true;
        self
    }

    pub fn fail_import(mut self) -> Self {
        self.fail_import = true;
        self
    }

    pub fn fail_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    /// Make the n-th status fetch (1-based) fail with a transient error.
    pub fn failing_fetch(mut self, n: usize) -> Self {
        self.failing_fetches.push(n);
        self
    }

    pub fn fail_output(mut self) -> Self {
        self.fail_output = true;
        self
    }

    pub fn fail_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Script the sequence of states returned by successive fetches.
    pub fn run_states(mut self, states: Vec<RunStateSnapshot>) -> Self {
        self.run_states = states;
        self
    }

    /// Shorthand: a run observed RUNNING for `polls - 1` fetches, then
    /// TERMINATED with the given result state.
    pub fn terminates_after(mut self, polls: usize, result: ResultState) -> Self {
        let mut states = vec![
            RunStateSnapshot {
                lifecycle_state: LifecycleState::Running,
                result_state: None,
                state_message: None,
            };
            polls.saturating_sub(1)
        ];
        states.push(RunStateSnapshot {
            lifecycle_state: LifecycleState::Terminated,
            result_state: Some(result),
            state_message: None,
        });
        self.run_states = states;
        self
    }

    /// Shorthand: a run that never leaves RUNNING.
    pub fn never_terminates(mut self) -> Self {
        self.run_states = vec![RunStateSnapshot {
            lifecycle_state: LifecycleState::Running,
            result_state: None,
            state_message: None,
        }];
        self
    }

    pub fn output_text(mut self, result: impl Into<String>) -> Self {
        self.output = Some(RunOutput {
            result: Some(result.into()),
            error: None,
        });
        self
    }

    pub fn output(mut self, output: RunOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> MockWorkspace {
        MockWorkspace {
            state: Mutex::new(MockState::default()),
            fail_mkdirs: self.fail_mkdirs,
            fail_import: self.fail_import,
            fail_submit: self.fail_submit,
            failing_fetches: self.failing_fetches,
            fail_output: self.fail_output,
            fail_delete: self.fail_delete,
            run_states: self.run_states,
            output: self.output.unwrap_or_default(),
        }
    }
}

/// AI stub that always fails with a gateway error; used to exercise the
/// deterministic fallbacks.
pub struct UnreachableAi;

#[async_trait]
impl crate::ai::CompletionApi for UnreachableAi {
    async fn complete(&self, _prompt: &str) -> Result<serde_json::Value, crate::ai::AiError> {
        Err(crate::ai::AiError::Status(503))
    }
}

/// AI stub that returns the same envelope for every call.
pub struct ScriptedAi(pub serde_json::Value);

#[async_trait]
impl crate::ai::CompletionApi for ScriptedAi {
    async fn complete(&self, _prompt: &str) -> Result<serde_json::Value, crate::ai::AiError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_import_last_write_wins() {
        let mock = MockWorkspace::builder().build();
        mock.import("/Shared/x", "first").await.unwrap();
        mock.import("/Shared/x", "second").await.unwrap();
        assert_eq!(mock.imported_content("/Shared/x").unwrap(), "second");
    }

    #[tokio::test]
    async fn test_scripted_states_repeat_last_entry() {
        let mock = MockWorkspace::builder()
            .terminates_after(2, ResultState::Success)
            .build();
        let id = RunId::new(1);
        assert!(mock.get_run(&id).await.unwrap().lifecycle_state.is_in_progress());
        assert_eq!(
            mock.get_run(&id).await.unwrap().result_state,
            Some(ResultState::Success)
        );
        // Script exhausted: the terminal state repeats.
        assert_eq!(
            mock.get_run(&id).await.unwrap().lifecycle_state,
            LifecycleState::Terminated
        );
    }

    #[tokio::test]
    async fn test_failing_fetch_is_positional() {
        let mock = MockWorkspace::builder()
            .never_terminates()
            .failing_fetch(2)
            .build();
        let id = RunId::new(1);
        assert!(mock.get_run(&id).await.is_ok());
        assert!(mock.get_run(&id).await.is_err());
        assert!(mock.get_run(&id).await.is_ok());
        assert_eq!(mock.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_calls_are_recorded_in_order() {
        let mock = MockWorkspace::builder().build();
        mock.mkdirs("/Shared").await.unwrap();
        mock.import("/Shared/x", "c").await.unwrap();
        mock.delete("/Shared/x").await.unwrap();
        assert_eq!(mock.calls(), vec!["mkdirs", "import", "delete"]);
        assert!(!mock.was_called("submit_run"));
    }
}
