//! Subtask verification against the observed UI state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::verifier_prompt;
use crate::env::Observation;
use crate::model::{Judge, JudgmentRequest};

use super::strip_code_fences;

/// Reason reported when no usable verdict could be obtained.
pub const FALLBACK_REASON: &str = "Could not get a valid verdict from the model.";

/// Outcome of verifying one subtask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub reason: String,
}

impl VerificationResult {
    /// Default result for steps where verification does not apply.
    pub fn skipped() -> Self {
        Self {
            passed: true,
            reason: "No verification performed.".to_string(),
        }
    }

    /// Fail-open result: the verdict was unobtainable, the run continues.
    fn fail_open() -> Self {
        Self {
            passed: true,
            reason: FALLBACK_REASON.to_string(),
        }
    }
}

/// Judges whether a subtask's effect is visible in the current UI.
///
/// Composed around an injected [`Judge`]; every call is stateless and
/// independent of prior verifications.
pub struct Verifier {
    judge: Arc<dyn Judge>,
}

impl Verifier {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    /// Verify one subtask against the current observation.
    ///
    /// A single judgment attempt is made. If the request fails or the
    /// response is not parseable JSON the verifier fails open: it returns
    /// `passed = true` with [`FALLBACK_REASON`] so a broken judge never
    /// blocks the run.
    pub async fn verify(&self, subtask: &str, observation: &Observation) -> VerificationResult {
        let prompt = verifier_prompt(subtask, &observation.describe_elements());

        let response = match self.judge.judge(JudgmentRequest::text(prompt)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Verifier judgment request failed: {}", e);
                return VerificationResult::fail_open();
            }
        };

        match parse_verdict(&response) {
            Some(result) => result,
            None => {
                tracing::warn!("Verifier response was not a JSON verdict: {}", response);
                VerificationResult::fail_open()
            }
        }
    }
}

/// Parse a `{"verdict": ..., "reason": ...}` object, tolerating code fences.
///
/// A JSON object with the verdict field missing counts as FAIL; anything
/// that is not a JSON object yields `None`.
fn parse_verdict(text: &str) -> Option<VerificationResult> {
    let cleaned = strip_code_fences(text);
    let json: Value = serde_json::from_str(&cleaned).ok()?;
    let object = json.as_object()?;

    let verdict = object
        .get("verdict")
        .and_then(Value::as_str)
        .unwrap_or("FAIL");
    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("No reason provided.")
        .to_string();

    Some(VerificationResult {
        passed: verdict.eq_ignore_ascii_case("PASS"),
        reason,
    })
}
