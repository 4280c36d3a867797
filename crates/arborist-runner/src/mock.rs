//! Canned-response `RunnerAdapter` for executor/controller tests: a
//! `Mutex`-wrapped queue of responses plus a call log.

use crate::adapter::{RunnerAdapter, RunnerResult};
use arborist_core::shutdown::ShutdownSignal;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

pub struct MockRunnerAdapter {
    responses: Mutex<Vec<RunnerResult>>,
    calls: Mutex<Vec<String>>,
}

impl MockRunnerAdapter {
    pub fn new(responses: Vec<RunnerResult>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_succeeding(output: &str) -> Self {
        Self::new(vec![RunnerResult {
            success: true,
            output: output.to_string(),
            exit_code: Some(0),
            duration: Duration::from_millis(1),
            timed_out: false,
            cancelled: false,
        }])
    }

    pub fn always_failing(output: &str) -> Self {
        Self::new(vec![RunnerResult {
            success: false,
            output: output.to_string(),
            exit_code: Some(1),
            duration: Duration::from_millis(1),
            timed_out: false,
            cancelled: false,
        }])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunnerAdapter for MockRunnerAdapter {
    async fn run(
        &self,
        prompt_text: &str,
        _working_directory: &std::path::Path,
        _timeout_seconds: u64,
        _command_prefix: &[String],
        _environment: &[(String, String)],
        _cancel: Option<&ShutdownSignal>,
    ) -> RunnerResult {
        self.calls.lock().unwrap().push(prompt_text.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses
                .first()
                .cloned()
                .unwrap_or(RunnerResult {
                    success: false,
                    output: "no canned response configured".to_string(),
                    exit_code: None,
                    duration: Duration::from_millis(0),
                    timed_out: false,
                    cancelled: false,
                })
        }
    }
}
