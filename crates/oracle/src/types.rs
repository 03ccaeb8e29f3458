//! Fill-plan contract types.
//!
//! A fill plan is the typed boundary between the strongly-typed execution
//! core and the schema-less shapes of target-site forms: the oracle absorbs
//! the raw HTML world and emits only selector→value instructions.

use serde::{Deserialize, Serialize};

/// One field assignment: put `value` into the element at `selector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillAction {
    pub selector: String,
    pub value: String,
}

/// Known obstacles on a submission form the worker must handle or report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Obstacle {
    /// The form is protected by a CAPTCHA; forward to the solver.
    Captcha,
    /// Submission requires an authenticated account.
    RequiresLogin,
    /// The form spans multiple pages/steps.
    MultiStepForm,
    Other { note: String },
}

/// Ordered instructions for filling and submitting one directory form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillPlan {
    pub actions: Vec<FillAction>,
    pub submit_selector: String,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
}

impl FillPlan {
    pub fn expects_captcha(&self) -> bool {
        self.obstacles.iter().any(|o| matches!(o, Obstacle::Captcha))
    }

    pub fn requires_login(&self) -> bool {
        self.obstacles
            .iter()
            .any(|o| matches!(o, Obstacle::RequiresLogin))
    }
}
