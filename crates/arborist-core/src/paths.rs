//! Sidecar artifact path conventions from spec §6: log files named
//! `<task-id>_<step>_<iso_timestamp>.log`, report files named
//! `<task-id>_run_<iso_timestamp>.json`.

use std::path::{Path, PathBuf};

pub fn test_log_path(log_dir: &Path, task_id: &str, timestamp: &str) -> PathBuf {
    log_dir.join(format!("{task_id}_test_{timestamp}.log"))
}

pub fn review_log_path(log_dir: &Path, task_id: &str, timestamp: &str) -> PathBuf {
    log_dir.join(format!("{task_id}_review_{timestamp}.log"))
}

pub fn report_path(report_dir: &Path, task_id: &str, timestamp: &str) -> PathBuf {
    report_dir.join(format!("{task_id}_run_{timestamp}.json"))
}

/// Completion report schema: `{task_id, result, retries}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompletionReport {
    pub task_id: String,
    pub result: ReportResult,
    pub retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportResult {
    Pass,
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_conventional_paths() {
        let dir = Path::new("/repo/.arborist/logs");
        assert_eq!(
            test_log_path(dir, "T001", "2026-07-28T00-00-00Z"),
            PathBuf::from("/repo/.arborist/logs/T001_test_2026-07-28T00-00-00Z.log")
        );
        assert_eq!(
            review_log_path(dir, "T001", "2026-07-28T00-00-00Z"),
            PathBuf::from("/repo/.arborist/logs/T001_review_2026-07-28T00-00-00Z.log")
        );
    }

    #[test]
    fn report_serializes_with_lowercase_result() {
        let report = CompletionReport {
            task_id: "T001".into(),
            result: ReportResult::Pass,
            retries: 1,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"pass\""));
    }
}
