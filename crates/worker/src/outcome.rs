//! Submission outcome classification.
//!
//! The result page is matched against marker tables. An ambiguous page —
//! no marker, or conflicting markers — is never guessed: it becomes
//! NeedsReview and is queued for a human.

use serde::{Deserialize, Serialize};

/// Phrases that indicate the directory accepted the submission.
const SUCCESS_MARKERS: &[&str] = &[
    "thank you for your submission",
    "thank you for submitting",
    "successfully submitted",
    "submission received",
    "submission successful",
    "listing received",
    "has been added",
    "has been submitted",
    "pending review",
    "under review",
    "we will review your listing",
];

/// Phrases that indicate a deterministic rejection.
const ERROR_MARKERS: &[&str] = &[
    "already exists",
    "already listed",
    "duplicate listing",
    "duplicate entry",
    "invalid email",
    "invalid website",
    "missing required",
    "required field",
    "not accepted",
    "submission rejected",
    "could not be processed",
    "blocked",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Submitted,
    Rejected { reason: String },
    NeedsReview { reason: String },
}

/// Classify a result page by its visible text.
pub fn classify(page_text: &str) -> SubmissionOutcome {
    let text = page_text.to_lowercase();

    let success = SUCCESS_MARKERS.iter().find(|m| text.contains(*m));
    let error = ERROR_MARKERS.iter().find(|m| text.contains(*m));

    match (success, error) {
        (Some(_), None) => SubmissionOutcome::Submitted,
        (None, Some(marker)) => SubmissionOutcome::Rejected {
            reason: format!("page matched error marker '{marker}'"),
        },
        (Some(s), Some(e)) => SubmissionOutcome::NeedsReview {
            reason: format!("conflicting markers: success '{s}' and error '{e}'"),
        },
        (None, None) => SubmissionOutcome::NeedsReview {
            reason: "no known success or error markers on result page".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_markers_classify_as_submitted() {
        let page = "Thank you for your submission! Your listing will appear shortly.";
        assert_eq!(classify(page), SubmissionOutcome::Submitted);

        let page = "Your business has been added and is pending review.";
        assert!(matches!(
            classify(page),
            SubmissionOutcome::Submitted | SubmissionOutcome::NeedsReview { .. }
        ));
    }

    #[test]
    fn error_markers_classify_as_rejected() {
        let outcome = classify("Sorry, a listing with this website already exists.");
        match outcome {
            SubmissionOutcome::Rejected { reason } => {
                assert!(reason.contains("already exists"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn unknown_pages_need_review() {
        let outcome = classify("Welcome to our homepage. Lorem ipsum.");
        assert!(matches!(outcome, SubmissionOutcome::NeedsReview { .. }));
    }

    #[test]
    fn conflicting_markers_need_review() {
        let page = "Thank you for your submission. Note: invalid email address provided.";
        assert!(matches!(classify(page), SubmissionOutcome::NeedsReview { .. }));
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(
            classify("SUBMISSION RECEIVED — reference #42"),
            SubmissionOutcome::Submitted
        );
    }
}
