pub mod browser;
pub mod captcha;
pub mod error;
pub mod heartbeat;
pub mod monitor;
pub mod outcome;
pub mod submit;

pub use browser::{BrowserSession, RemoteBrowser, SimulatedBrowser};
pub use captcha::{CaptchaSolver, HttpCaptchaSolver};
pub use error::WorkerError;
pub use heartbeat::{worker_id, HeartbeatTask};
pub use monitor::StaleWorkerMonitor;
pub use outcome::{classify, SubmissionOutcome};
pub use submit::{StepRecord, SubmissionFailure, SubmissionReport, SubmissionRunner};
