//! Post-hoc run analysis.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::supervisor_prompt;
use crate::model::{Judge, JudgmentRequest};

use super::strip_code_fences;
use super::trace::StepLogEntry;

/// The supervisor's evaluation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// "SUCCESS" or "FAILURE".
    pub overall_outcome: String,
    pub summary: String,
    /// Suggested sharper high-level goal prompt.
    pub prompt_improvements: String,
    /// Root-cause analysis of failures and detours.
    pub failure_analysis: String,
    /// A new, related test case worth adding.
    pub coverage_expansion: String,
}

/// Report or the error shape produced when analysis fails.
///
/// Serializes untagged: either the five report fields or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisReport {
    Report(Report),
    Failed { error: String },
}

impl AnalysisReport {
    pub fn as_report(&self) -> Option<&Report> {
        match self {
            AnalysisReport::Report(report) => Some(report),
            AnalysisReport::Failed { .. } => None,
        }
    }
}

/// Analyzes a complete test episode (logs and screenshots) and proposes
/// improvements.
pub struct Supervisor {
    judge: Arc<dyn Judge>,
}

impl Supervisor {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    /// Analyze the full trace and generate an evaluation report.
    ///
    /// Screenshots are attached as visual context, aligned by index with
    /// the log entries. Never fails: a broken judgment response yields
    /// [`AnalysisReport::Failed`] and the run's outcome is unaffected.
    pub async fn analyze(
        &self,
        goal: &str,
        trace: &[StepLogEntry],
        screenshots: &[String],
    ) -> AnalysisReport {
        tracing::info!(steps = trace.len(), "Supervisor analyzing test trace");

        let prompt = supervisor_prompt(goal, &render_transcript(trace));
        let request = JudgmentRequest::text(prompt).with_images(screenshots.to_vec());

        let response = match self.judge.judge(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Supervisor judgment request failed: {}", e);
                return AnalysisReport::Failed {
                    error: "Failed to generate a valid report from the model.".to_string(),
                };
            }
        };

        match serde_json::from_str::<Report>(&strip_code_fences(&response)) {
            Ok(report) => AnalysisReport::Report(report),
            Err(e) => {
                tracing::error!("Supervisor response was not a valid report: {}", e);
                AnalysisReport::Failed {
                    error: "Failed to generate a valid report from the model.".to_string(),
                }
            }
        }
    }
}

/// Render the step log as a numbered transcript for the analysis prompt.
fn render_transcript(trace: &[StepLogEntry]) -> String {
    trace
        .iter()
        .map(|entry| {
            format!(
                "Step {}: {}",
                entry.step,
                serde_json::to_string(entry).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedJudge {
        responses: Mutex<Vec<Result<String, ModelError>>>,
        last_request: Mutex<Option<JudgmentRequest>>,
    }

    impl ScriptedJudge {
        fn new(responses: Vec<Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Judge for ScriptedJudge {
        async fn judge(&self, request: JudgmentRequest) -> Result<String, ModelError> {
            *self.last_request.lock().unwrap() = Some(request);
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn sample_trace() -> Vec<StepLogEntry> {
        vec![
            StepLogEntry {
                step: 1,
                subtask: Some("open settings".to_string()),
                proposed_action: "{\"action_type\":\"click\",\"index\":0}".to_string(),
                verification_passed: true,
                verification_reason: "Settings visible".to_string(),
            },
            StepLogEntry {
                step: 2,
                subtask: Some("toggle wifi".to_string()),
                proposed_action: "{\"action_type\":\"click\",\"index\":3}".to_string(),
                verification_passed: false,
                verification_reason: "Toggle unchanged".to_string(),
            },
        ]
    }

    const REPORT_JSON: &str = r#"{
        "overall_outcome": "SUCCESS",
        "summary": "Wi-Fi was toggled off and on.",
        "prompt_improvements": "Specify the expected end state.",
        "failure_analysis": "Step 2 needed a replan after a missed tap.",
        "coverage_expansion": "Test Wi-Fi reconnection after toggling."
    }"#;

    #[tokio::test]
    async fn test_analyze_parses_report() {
        let judge = ScriptedJudge::new(vec![Ok(REPORT_JSON.to_string())]);
        let supervisor = Supervisor::new(judge.clone());

        let screenshots = vec!["aW1n".to_string(), "aW1n".to_string()];
        let report = supervisor
            .analyze("Test turning Wi-Fi on and off", &sample_trace(), &screenshots)
            .await;

        let report = report.as_report().expect("expected a parsed report");
        assert_eq!(report.overall_outcome, "SUCCESS");

        // Trace transcript and screenshots both reached the judge.
        let request = judge.last_request.lock().unwrap().clone().unwrap();
        assert!(request.prompt.contains("Step 1"));
        assert!(request.prompt.contains("toggle wifi"));
        assert_eq!(request.images_base64.len(), 2);
    }

    #[tokio::test]
    async fn test_analyze_parses_fenced_report() {
        let fenced = format!("```json\n{}\n```", REPORT_JSON);
        let supervisor = Supervisor::new(ScriptedJudge::new(vec![Ok(fenced)]));
        let report = supervisor.analyze("goal", &sample_trace(), &[]).await;
        assert!(report.as_report().is_some());
    }

    #[tokio::test]
    async fn test_malformed_response_yields_error_shape() {
        let supervisor =
            Supervisor::new(ScriptedJudge::new(vec![Ok("not a report".to_string())]));
        let report = supervisor.analyze("goal", &sample_trace(), &[]).await;

        assert_eq!(
            report,
            AnalysisReport::Failed {
                error: "Failed to generate a valid report from the model.".to_string()
            }
        );
        // Serializes as the documented error object.
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn test_request_error_yields_error_shape() {
        let supervisor = Supervisor::new(ScriptedJudge::new(vec![Err(ModelError::ApiError(
            "500".to_string(),
        ))]));
        let report = supervisor.analyze("goal", &sample_trace(), &[]).await;
        assert!(report.as_report().is_none());
    }

    #[test]
    fn test_analysis_report_deserializes_both_shapes() {
        let report: AnalysisReport = serde_json::from_str(REPORT_JSON).unwrap();
        assert!(report.as_report().is_some());

        let failed: AnalysisReport =
            serde_json::from_str(r#"{"error": "something broke"}"#).unwrap();
        assert_eq!(
            failed,
            AnalysisReport::Failed {
                error: "something broke".to_string()
            }
        );
    }
}
