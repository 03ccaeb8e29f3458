//! Fill-plan execution in a headless-browser session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use listpilot_core::directory::Directory;
use listpilot_oracle::types::FillPlan;

use crate::browser::BrowserSession;
use crate::captcha::CaptchaSolver;
use crate::error::WorkerError;
use crate::outcome::{classify, SubmissionOutcome};

/// Standard selector the solved token is written into (reCAPTCHA-style forms).
const CAPTCHA_RESPONSE_SELECTOR: &str = "textarea[name='g-recaptcha-response']";

/// How much page text to keep in the audit log.
const PAGE_EXCERPT_LEN: usize = 500;

/// One automation step, recorded for the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Everything observed during one submission attempt. Captured on success
/// AND on failure — job-level aggregation always has complete information.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub directory_id: String,
    pub outcome: SubmissionOutcome,
    pub steps: Vec<StepRecord>,
    pub page_excerpt: String,
    /// PNG bytes; None only when the capture itself failed.
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
}

impl SubmissionReport {
    /// Structured response log for the result store.
    pub fn response_log(&self) -> serde_json::Value {
        serde_json::json!({
            "outcome": self.outcome,
            "steps": self.steps,
            "page_excerpt": self.page_excerpt,
            "screenshot_captured": self.screenshot.is_some(),
        })
    }
}

/// A transient failure, still carrying the partial audit report.
#[derive(Debug)]
pub struct SubmissionFailure {
    pub error: WorkerError,
    pub report: SubmissionReport,
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for SubmissionFailure {}

/// Executes fill plans in a browser session, classifying the result.
pub struct SubmissionRunner {
    browser: Arc<dyn BrowserSession>,
    captcha: Option<Arc<dyn CaptchaSolver>>,
}

struct Recorder {
    steps: Vec<StepRecord>,
}

impl Recorder {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn record(&mut self, step: &str, detail: impl Into<String>) {
        self.steps.push(StepRecord {
            step: step.to_string(),
            detail: detail.into(),
            at: Utc::now(),
        });
    }
}

impl SubmissionRunner {
    pub fn new(browser: Arc<dyn BrowserSession>, captcha: Option<Arc<dyn CaptchaSolver>>) -> Self {
        Self { browser, captcha }
    }

    /// Execute a fill plan end-to-end.
    ///
    /// Ok carries a classified report: structural rejections and ambiguous
    /// outcomes are terminal results, not errors. Err carries a transient
    /// [`WorkerError`] plus the partial report for the audit trail.
    pub async fn execute(
        &self,
        directory: &Directory,
        plan: &FillPlan,
    ) -> Result<SubmissionReport, SubmissionFailure> {
        let mut recorder = Recorder::new();

        match self.run_plan(directory, plan, &mut recorder).await {
            Ok(outcome) => {
                let page_excerpt = self.page_excerpt().await;
                let screenshot = self.capture_screenshot(&mut recorder).await;
                info!(directory = %directory.id, outcome = ?outcome, "Submission attempt finished");
                Ok(SubmissionReport {
                    directory_id: directory.id.clone(),
                    outcome,
                    steps: recorder.steps,
                    page_excerpt,
                    screenshot,
                })
            }
            Err(error) => {
                recorder.record("error", error.to_string());
                // Audit still gets whatever the page looked like at failure.
                let page_excerpt = self.page_excerpt().await;
                let screenshot = self.capture_screenshot(&mut recorder).await;
                warn!(directory = %directory.id, error = %error, "Submission attempt failed");
                Err(SubmissionFailure {
                    error,
                    report: SubmissionReport {
                        directory_id: directory.id.clone(),
                        outcome: SubmissionOutcome::NeedsReview {
                            reason: "attempt aborted before classification".into(),
                        },
                        steps: recorder.steps,
                        page_excerpt,
                        screenshot,
                    },
                })
            }
        }
    }

    async fn run_plan(
        &self,
        directory: &Directory,
        plan: &FillPlan,
        recorder: &mut Recorder,
    ) -> Result<SubmissionOutcome, WorkerError> {
        if plan.requires_login() {
            // No account automation in the pipeline; a human has to take it.
            recorder.record("obstacle", "directory requires login");
            return Ok(SubmissionOutcome::NeedsReview {
                reason: "directory requires an authenticated account".into(),
            });
        }

        self.browser.navigate(&directory.url).await?;
        recorder.record("navigate", directory.url.clone());

        for action in &plan.actions {
            self.browser.fill(&action.selector, &action.value).await?;
            recorder.record("fill", action.selector.clone());
        }

        if plan.expects_captcha() {
            match &self.captcha {
                Some(solver) => {
                    let token = solver.solve(&directory.url, None).await?;
                    self.browser.fill(CAPTCHA_RESPONSE_SELECTOR, &token).await?;
                    recorder.record("captcha", "token injected");
                }
                None => {
                    recorder.record("obstacle", "captcha present, no solver configured");
                    return Ok(SubmissionOutcome::NeedsReview {
                        reason: "captcha present but no solver configured".into(),
                    });
                }
            }
        }

        self.browser.click(&plan.submit_selector).await?;
        recorder.record("submit", plan.submit_selector.clone());

        let page_text = self.browser.page_text().await?;
        Ok(classify(&page_text))
    }

    async fn page_excerpt(&self) -> String {
        match self.browser.page_text().await {
            Ok(text) => {
                let mut excerpt: String = text.chars().take(PAGE_EXCERPT_LEN).collect();
                if text.len() > excerpt.len() {
                    excerpt.push('…');
                }
                excerpt
            }
            Err(_) => String::new(),
        }
    }

    async fn capture_screenshot(&self, recorder: &mut Recorder) -> Option<Vec<u8>> {
        match self.browser.screenshot().await {
            Ok(bytes) => {
                recorder.record("screenshot", format!("{} bytes", bytes.len()));
                Some(bytes)
            }
            Err(e) => {
                recorder.record("screenshot", format!("capture failed: {e}"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use listpilot_core::directory::DirectoryCatalog;
    use listpilot_core::profile::BusinessProfile;
    use listpilot_oracle::heuristic::HeuristicMapper;

    use super::*;

    /// Scripted browser: records commands, serves a fixed result page.
    struct MockBrowser {
        commands: Mutex<Vec<String>>,
        result_page: String,
        fail_navigation: bool,
    }

    impl MockBrowser {
        fn serving(result_page: &str) -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                result_page: result_page.to_string(),
                fail_navigation: false,
            }
        }

        fn broken() -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                result_page: String::new(),
                fail_navigation: true,
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrowserSession for MockBrowser {
        async fn navigate(&self, url: &str) -> Result<(), WorkerError> {
            if self.fail_navigation {
                return Err(WorkerError::Navigation("timed out after 30s".into()));
            }
            self.commands.lock().unwrap().push(format!("navigate {url}"));
            Ok(())
        }

        async fn fill(&self, selector: &str, _value: &str) -> Result<(), WorkerError> {
            self.commands.lock().unwrap().push(format!("fill {selector}"));
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<(), WorkerError> {
            self.commands.lock().unwrap().push(format!("click {selector}"));
            Ok(())
        }

        async fn page_text(&self) -> Result<String, WorkerError> {
            Ok(self.result_page.clone())
        }

        async fn screenshot(&self) -> Result<Vec<u8>, WorkerError> {
            Ok(vec![0x89, 0x50, 0x4e, 0x47])
        }
    }

    struct MockSolver;

    #[async_trait]
    impl CaptchaSolver for MockSolver {
        async fn solve(&self, _page_url: &str, _site_key: Option<&str>) -> Result<String, WorkerError> {
            Ok("solved-token".into())
        }
    }

    fn profile() -> BusinessProfile {
        BusinessProfile {
            business_name: "Acme".into(),
            website: "https://acme.test".into(),
            email: "hi@acme.test".into(),
            phone: Some("+1-555-0100".into()),
            ..Default::default()
        }
    }

    fn plain_directory() -> listpilot_core::directory::Directory {
        DirectoryCatalog::builtin()
            .directories
            .iter()
            .find(|d| !d.captcha)
            .cloned()
            .unwrap()
    }

    fn captcha_directory() -> listpilot_core::directory::Directory {
        DirectoryCatalog::builtin()
            .directories
            .iter()
            .find(|d| d.captcha)
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn successful_submission_is_classified_and_logged() {
        let browser = Arc::new(MockBrowser::serving("Thank you for your submission!"));
        let runner = SubmissionRunner::new(browser.clone(), None);
        let dir = plain_directory();
        let plan = HeuristicMapper::plan(&dir, &profile());

        let report = runner.execute(&dir, &plan).await.unwrap();

        assert_eq!(report.outcome, SubmissionOutcome::Submitted);
        assert!(report.screenshot.is_some());
        let commands = browser.commands();
        assert!(commands[0].starts_with("navigate "));
        assert!(commands.last().unwrap().starts_with("click "));
        assert!(report.steps.iter().any(|s| s.step == "submit"));

        let log = report.response_log();
        assert_eq!(log["screenshot_captured"], true);
        assert_eq!(log["outcome"]["result"], "submitted");
    }

    #[tokio::test]
    async fn structural_rejection_is_ok_not_err() {
        let browser = Arc::new(MockBrowser::serving("A listing with this website already exists."));
        let runner = SubmissionRunner::new(browser, None);
        let dir = plain_directory();
        let plan = HeuristicMapper::plan(&dir, &profile());

        let report = runner.execute(&dir, &plan).await.unwrap();
        assert!(matches!(report.outcome, SubmissionOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn captcha_without_solver_needs_review() {
        let browser = Arc::new(MockBrowser::serving("irrelevant"));
        let runner = SubmissionRunner::new(browser.clone(), None);
        let dir = captcha_directory();
        let plan = HeuristicMapper::plan(&dir, &profile());

        let report = runner.execute(&dir, &plan).await.unwrap();
        assert!(matches!(report.outcome, SubmissionOutcome::NeedsReview { .. }));
        // Never submitted blind past a captcha.
        assert!(!browser.commands().iter().any(|c| c.starts_with("click")));
    }

    #[tokio::test]
    async fn captcha_with_solver_injects_token_and_submits() {
        let browser = Arc::new(MockBrowser::serving("Submission received"));
        let runner = SubmissionRunner::new(browser.clone(), Some(Arc::new(MockSolver)));
        let dir = captcha_directory();
        let plan = HeuristicMapper::plan(&dir, &profile());

        let report = runner.execute(&dir, &plan).await.unwrap();

        assert_eq!(report.outcome, SubmissionOutcome::Submitted);
        let commands = browser.commands();
        assert!(commands
            .iter()
            .any(|c| c.contains("g-recaptcha-response")));
        assert!(commands.iter().any(|c| c.starts_with("click")));
    }

    #[tokio::test]
    async fn transient_failure_still_produces_audit_report() {
        let browser = Arc::new(MockBrowser::broken());
        let runner = SubmissionRunner::new(browser, None);
        let dir = plain_directory();
        let plan = HeuristicMapper::plan(&dir, &profile());

        let failure = runner.execute(&dir, &plan).await.unwrap_err();
        assert!(matches!(failure.error, WorkerError::Navigation(_)));
        assert!(failure.error.kind().is_retryable());
        assert!(failure.report.steps.iter().any(|s| s.step == "error"));
        // Screenshot of the broken state is still attempted and captured.
        assert!(failure.report.screenshot.is_some());
    }
}
