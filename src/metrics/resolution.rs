//! Resolution verdict and per-phase status labels.

use serde::{Deserialize, Serialize};

use super::test_output::VerificationRecord;

/// Whether the run turned a failing test into a passing one.
///
/// True iff the pre-fix run parsed and had at least one failure, and the
/// post-fix run parsed with no failures and at least one pass.
pub fn is_resolved(pre: &VerificationRecord, post: &VerificationRecord) -> bool {
    !pre.parse_error
        && !post.parse_error
        && pre.failed > 0
        && post.failed == 0
        && post.passed > 0
}

/// Outcome of the pre-fix run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreVerificationStatus {
    /// The bug reproduces: at least one test failed.
    FailureReproduced,
    /// Nothing failed before the fix.
    UnexpectedPass,
    ParseError,
    MissingLog,
}

impl PreVerificationStatus {
    /// Status of a pre-fix run; `None` means the log was never written.
    pub fn from_record(record: Option<&VerificationRecord>) -> Self {
        match record {
            None => Self::MissingLog,
            Some(r) if r.parse_error => Self::ParseError,
            Some(r) if r.failed > 0 => Self::FailureReproduced,
            Some(_) => Self::UnexpectedPass,
        }
    }
}

/// Outcome of the post-fix run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostVerificationStatus {
    /// No failures and at least one pass.
    Fixed,
    FailedFix,
    ParseError,
    MissingLog,
}

impl PostVerificationStatus {
    /// Status of a post-fix run; `None` means the log was never written.
    pub fn from_record(record: Option<&VerificationRecord>) -> Self {
        match record {
            None => Self::MissingLog,
            Some(r) if r.parse_error => Self::ParseError,
            Some(r) if r.failed == 0 && r.passed > 0 => Self::Fixed,
            Some(_) => Self::FailedFix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::parse_test_output;

    #[test]
    fn test_fail_to_pass_is_resolved() {
        let pre = parse_test_output("2 failed, 0 passed");
        let post = parse_test_output("0 failed, 2 passed");
        assert!(is_resolved(&pre, &post));
    }

    #[test]
    fn test_never_failed_is_not_resolved() {
        let pre = parse_test_output("0 failed, 2 passed");
        for post in ["0 failed, 2 passed", "1 failed, 1 passed", ""] {
            assert!(!is_resolved(&pre, &parse_test_output(post)));
        }
    }

    #[test]
    fn test_unparseable_post_is_not_resolved() {
        let pre = parse_test_output("2 failed, 0 passed");
        let post = parse_test_output("");
        assert!(post.parse_error);
        assert!(!is_resolved(&pre, &post));
    }

    #[test]
    fn test_timed_out_post_is_not_resolved() {
        let pre = parse_test_output("tests/t.py::test_a FAILED");
        let post = parse_test_output(
            "tests/t.py::test_a PASSED\nCommand timed out after 1800 seconds",
        );
        assert!(!is_resolved(&pre, &post));
        assert_eq!(
            PostVerificationStatus::from_record(Some(&post)),
            PostVerificationStatus::ParseError
        );
    }

    #[test]
    fn test_each_condition_flips_verdict() {
        let pre = VerificationRecord::new(0, 1);
        let post = VerificationRecord::new(3, 0);
        assert!(is_resolved(&pre, &post));

        assert!(!is_resolved(&VerificationRecord::new(0, 0), &post));
        assert!(!is_resolved(&pre, &VerificationRecord::new(3, 1)));
        assert!(!is_resolved(&pre, &VerificationRecord::new(0, 0)));
        assert!(!is_resolved(
            &VerificationRecord {
                parse_error: true,
                ..pre
            },
            &post
        ));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(
            PreVerificationStatus::from_record(Some(&VerificationRecord::new(0, 1))),
            PreVerificationStatus::FailureReproduced
        );
        assert_eq!(
            PreVerificationStatus::from_record(Some(&VerificationRecord::new(1, 0))),
            PreVerificationStatus::UnexpectedPass
        );
        assert_eq!(
            PreVerificationStatus::from_record(None),
            PreVerificationStatus::MissingLog
        );
        assert_eq!(
            PostVerificationStatus::from_record(Some(&VerificationRecord::unparsed())),
            PostVerificationStatus::ParseError
        );
        assert_eq!(
            PostVerificationStatus::from_record(Some(&VerificationRecord::new(2, 0))),
            PostVerificationStatus::Fixed
        );
        assert_eq!(
            PostVerificationStatus::from_record(Some(&VerificationRecord::new(0, 0))),
            PostVerificationStatus::FailedFix
        );
        assert_eq!(
            serde_json::to_value(PreVerificationStatus::FailureReproduced).unwrap(),
            "failure_reproduced"
        );
    }
}
