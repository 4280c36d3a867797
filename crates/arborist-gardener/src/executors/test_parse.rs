//! Best-effort parsing of recognized test framework output, per spec §4.8.2
//! step 2: "if the output conforms to a recognized framework format" add
//! the parsed counts as trailers. An unrecognized format simply omits them
//! rather than failing the step -- parsing is enrichment, not a
//! precondition.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounts {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

fn cargo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"test result: \w+\. (\d+) passed; (\d+) failed; (\d+) ignored").unwrap()
    })
}

fn pytest_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+) passed(?:, (\d+) failed)?(?:, (\d+) skipped)?").unwrap()
    })
}

fn generic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*passed.*?(\d+)\s*failed.*?(\d+)\s*skipped").unwrap()
    })
}

pub fn parse(output: &str) -> Option<TestCounts> {
    if let Some(caps) = cargo_re().captures(output) {
        return Some(TestCounts {
            passed: caps[1].parse().unwrap_or(0),
            failed: caps[2].parse().unwrap_or(0),
            skipped: caps[3].parse().unwrap_or(0),
        });
    }
    if let Some(caps) = pytest_re().captures(output) {
        return Some(TestCounts {
            passed: caps[1].parse().unwrap_or(0),
            failed: caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
            skipped: caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
        });
    }
    if let Some(caps) = generic_re().captures(output) {
        return Some(TestCounts {
            passed: caps[1].parse().unwrap_or(0),
            failed: caps[2].parse().unwrap_or(0),
            skipped: caps[3].parse().unwrap_or(0),
        });
    }
    None
}
