//! Typed view over the `Arborist-*` commit trailer set, parsed into
//! structured records rather than passed around as raw key/value strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STEP: &str = "Arborist-Step";
pub const RESULT: &str = "Arborist-Result";
pub const TEST: &str = "Arborist-Test";
pub const REVIEW: &str = "Arborist-Review";
pub const RETRY: &str = "Arborist-Retry";
pub const TEST_TYPE: &str = "Arborist-Test-Type";
pub const TEST_PASSED: &str = "Arborist-Test-Passed";
pub const TEST_FAILED: &str = "Arborist-Test-Failed";
pub const TEST_SKIPPED: &str = "Arborist-Test-Skipped";
pub const TEST_RUNTIME: &str = "Arborist-Test-Runtime";
pub const TEST_LOG: &str = "Arborist-Test-Log";
pub const REVIEW_LOG: &str = "Arborist-Review-Log";
pub const REPORT: &str = "Arborist-Report";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Implement,
    Test,
    Review,
    Complete,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Implement => "implement",
            Step::Test => "test",
            Step::Review => "review",
            Step::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "implement" => Some(Step::Implement),
            "test" => Some(Step::Test),
            "review" => Some(Step::Review),
            "complete" => Some(Step::Complete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pass" => Some(Outcome::Pass),
            "fail" => Some(Outcome::Fail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewVerdict {
    Approved,
    Rejected,
}

impl ReviewVerdict {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ReviewVerdict::Approved),
            "rejected" => Some(ReviewVerdict::Rejected),
            _ => None,
        }
    }
}

/// A typed view over one commit's trailer block. Unrecognized keys are kept
/// in `extra` rather than discarded, so `inspect` never silently drops a
/// future trailer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trailers {
    pub step: Option<Step>,
    pub result: Option<Outcome>,
    pub test: Option<Outcome>,
    pub review: Option<ReviewVerdict>,
    pub retry: Option<u32>,
    pub test_type: Option<String>,
    pub test_passed: Option<u32>,
    pub test_failed: Option<u32>,
    pub test_skipped: Option<u32>,
    pub test_runtime: Option<f64>,
    pub test_log: Option<String>,
    pub review_log: Option<String>,
    pub report: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl Trailers {
    /// Parse from a raw key/value mapping as extracted by the VCS adapter's
    /// trailer facility.
    pub fn from_map(raw: &BTreeMap<String, String>) -> Self {
        let mut t = Trailers::default();
        for (k, v) in raw {
            match k.as_str() {
                STEP => t.step = Step::parse(v),
                RESULT => t.result = Outcome::parse(v),
                TEST => t.test = Outcome::parse(v),
                REVIEW => t.review = ReviewVerdict::parse(v),
                RETRY => t.retry = v.parse().ok(),
                TEST_TYPE => t.test_type = Some(v.clone()),
                TEST_PASSED => t.test_passed = v.parse().ok(),
                TEST_FAILED => t.test_failed = v.parse().ok(),
                TEST_SKIPPED => t.test_skipped = v.parse().ok(),
                TEST_RUNTIME => t.test_runtime = v.parse().ok(),
                TEST_LOG => t.test_log = Some(v.clone()),
                REVIEW_LOG => t.review_log = Some(v.clone()),
                REPORT => t.report = Some(v.clone()),
                other => {
                    t.extra.insert(other.to_string(), v.clone());
                }
            }
        }
        t
    }

    /// Render back into the `Key: value` lines appended to a commit body,
    /// in the canonical key order from spec §3.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(s) = self.step {
            lines.push(format!("{STEP}: {}", s.as_str()));
        }
        if let Some(r) = self.result {
            lines.push(format!("{RESULT}: {}", outcome_str(r)));
        }
        if let Some(r) = self.test {
            lines.push(format!("{TEST}: {}", outcome_str(r)));
        }
        if let Some(r) = self.review {
            let s = match r {
                ReviewVerdict::Approved => "approved",
                ReviewVerdict::Rejected => "rejected",
            };
            lines.push(format!("{REVIEW}: {s}"));
        }
        if let Some(n) = self.retry {
            lines.push(format!("{RETRY}: {n}"));
        }
        if let Some(t) = &self.test_type {
            lines.push(format!("{TEST_TYPE}: {t}"));
        }
        if let Some(n) = self.test_passed {
            lines.push(format!("{TEST_PASSED}: {n}"));
        }
        if let Some(n) = self.test_failed {
            lines.push(format!("{TEST_FAILED}: {n}"));
        }
        if let Some(n) = self.test_skipped {
            lines.push(format!("{TEST_SKIPPED}: {n}"));
        }
        if let Some(n) = self.test_runtime {
            lines.push(format!("{TEST_RUNTIME}: {n}"));
        }
        if let Some(p) = &self.test_log {
            lines.push(format!("{TEST_LOG}: {p}"));
        }
        if let Some(p) = &self.review_log {
            lines.push(format!("{REVIEW_LOG}: {p}"));
        }
        if let Some(p) = &self.report {
            lines.push(format!("{REPORT}: {p}"));
        }
        for (k, v) in &self.extra {
            lines.push(format!("{k}: {v}"));
        }
        lines
    }
}

fn outcome_str(o: Outcome) -> &'static str {
    match o {
        Outcome::Pass => "pass",
        Outcome::Fail => "fail",
    }
}

/// Commit subject convention: `task(<id>): <free text>`.
pub fn task_subject_prefix(task_id: &str) -> String {
    format!("task({task_id}):")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_keys() {
        let mut raw = BTreeMap::new();
        raw.insert(STEP.to_string(), "implement".to_string());
        raw.insert(RESULT.to_string(), "pass".to_string());
        raw.insert(RETRY.to_string(), "2".to_string());

        let t = Trailers::from_map(&raw);
        assert_eq!(t.step, Some(Step::Implement));
        assert_eq!(t.result, Some(Outcome::Pass));
        assert_eq!(t.retry, Some(2));
        assert!(t.extra.is_empty());
    }

    #[test]
    fn preserves_unknown_keys_in_extra() {
        let mut raw = BTreeMap::new();
        raw.insert("Arborist-Future-Field".to_string(), "x".to_string());
        let t = Trailers::from_map(&raw);
        assert_eq!(t.extra.get("Arborist-Future-Field"), Some(&"x".to_string()));
    }

    #[test]
    fn subject_prefix_matches_convention() {
        assert_eq!(task_subject_prefix("T001"), "task(T001):");
    }
}
