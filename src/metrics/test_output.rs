//! Pass/fail counts from raw test runner output.
//!
//! Summary lines are preferred over per-test markers:
//! 1. cargo `test result:` lines, summed over every test binary
//! 2. the pytest `=== ... in 0.12s ===` summary (errors count as failures)
//! 3. generic `N failed` / `M passed` counts (jest, plain scripts)
//! 4. per-test markers: pytest `PASSED`/`FAILED`, cargo `... ok`/`FAILED`,
//!    go `--- PASS:`/`--- FAIL:`
//!
//! Empty output, `no tests ran`, output of a run killed by the sandbox
//! timeout, or output matching none of these is a parse error.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scaffold::tools::bash::TIMEOUT_NOTICE;

/// Counts recovered from one verification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub passed: u32,
    pub failed: u32,
    pub parse_error: bool,
}

impl VerificationRecord {
    pub fn new(passed: u32, failed: u32) -> Self {
        Self {
            passed,
            failed,
            parse_error: false,
        }
    }

    /// Record for output that could not be interpreted.
    pub fn unparsed() -> Self {
        Self {
            passed: 0,
            failed: 0,
            parse_error: true,
        }
    }
}

struct Patterns {
    cargo_summary: Regex,
    pytest_summary: Regex,
    pytest_count: Regex,
    generic_failed: Regex,
    generic_passed: Regex,
    pytest_marker: Regex,
    cargo_marker: Regex,
    go_marker: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            cargo_summary: Regex::new(r"test result: \w+\. (\d+) passed; (\d+) failed")?,
            pytest_summary: Regex::new(r"(?m)^=+ (.+?) in [\d.]+s(?: \([^)]*\))? =+\s*$")?,
            pytest_count: Regex::new(r"(\d+) (passed|failed|errors?)\b")?,
            generic_failed: Regex::new(r"\b(\d+) failed\b")?,
            generic_passed: Regex::new(r"\b(\d+) passed\b")?,
            pytest_marker: Regex::new(r"(?m)^\S+::\S+.*?\s(PASSED|FAILED|ERROR)\b")?,
            cargo_marker: Regex::new(r"(?m)^test \S+ \.\.\. (ok|FAILED)\s*$")?,
            go_marker: Regex::new(r"(?m)^\s*--- (PASS|FAIL):")?,
        })
    }

    fn parse(&self, text: &str) -> VerificationRecord {
        if text.trim().is_empty() || text.contains("no tests ran") {
            return VerificationRecord::unparsed();
        }
        // Counts from a killed run only cover the tests that finished.
        if text.contains(TIMEOUT_NOTICE) {
            return VerificationRecord::unparsed();
        }

        self.cargo(text)
            .or_else(|| self.pytest(text))
            .or_else(|| self.generic(text))
            .or_else(|| self.markers(text))
            .unwrap_or_else(VerificationRecord::unparsed)
    }

    fn cargo(&self, text: &str) -> Option<VerificationRecord> {
        let mut found = false;
        let mut record = VerificationRecord::default();
        for caps in self.cargo_summary.captures_iter(text) {
            found = true;
            record.passed += number(&caps[1]);
            record.failed += number(&caps[2]);
        }
        found.then_some(record)
    }

    fn pytest(&self, text: &str) -> Option<VerificationRecord> {
        let summary = self.pytest_summary.captures_iter(text).last()?;
        let mut record = VerificationRecord::default();
        for caps in self.pytest_count.captures_iter(&summary[1]) {
            match &caps[2] {
                "passed" => record.passed += number(&caps[1]),
                _ => record.failed += number(&caps[1]),
            }
        }
        Some(record)
    }

    fn generic(&self, text: &str) -> Option<VerificationRecord> {
        let failed = last_count(&self.generic_failed, text);
        let passed = last_count(&self.generic_passed, text);
        if failed.is_none() && passed.is_none() {
            return None;
        }
        Some(VerificationRecord::new(
            passed.unwrap_or(0),
            failed.unwrap_or(0),
        ))
    }

    fn markers(&self, text: &str) -> Option<VerificationRecord> {
        let mut record = VerificationRecord::default();
        let markers = [
            (&self.pytest_marker, "PASSED"),
            (&self.cargo_marker, "ok"),
            (&self.go_marker, "PASS"),
        ];
        for (pattern, pass_word) in markers {
            for caps in pattern.captures_iter(text) {
                if &caps[1] == pass_word {
                    record.passed += 1;
                } else {
                    record.failed += 1;
                }
            }
        }
        (record.passed + record.failed > 0).then_some(record)
    }
}

fn number(digits: &str) -> u32 {
    digits.parse().unwrap_or(0)
}

fn last_count(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures_iter(text)
        .last()
        .map(|caps| number(&caps[1]))
}

fn patterns() -> &'static Result<Patterns, regex::Error> {
    static PATTERNS: OnceLock<Result<Patterns, regex::Error>> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::compile)
}

/// Parse raw test output into pass/fail counts.
pub fn parse_test_output(text: &str) -> VerificationRecord {
    match patterns() {
        Ok(patterns) => patterns.parse(text),
        Err(e) => {
            warn!(error = %e, "Test output patterns failed to compile");
            VerificationRecord::unparsed()
        }
    }
}
