//! Run trace and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supervisor::AnalysisReport;

/// One entry of the step log, appended per executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLogEntry {
    /// 1-based step index.
    pub step: u32,
    /// Subtask label the planner reported for this step.
    pub subtask: Option<String>,
    /// The executed device action, serialized.
    pub proposed_action: String,
    pub verification_passed: bool,
    pub verification_reason: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Terminal marker observed before the step budget ran out.
    Completed,
    /// Step budget exhausted without a terminal action. Not necessarily a
    /// goal failure, just out of budget.
    BudgetExhausted,
    /// A collaborator failed mid-run; the trace up to that point survives.
    ExecutionError(String),
}

impl RunOutcome {
    /// Whether the run reached the terminal marker.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Complete result of one QA run: outcome, step log, and the supervisor's
/// report when one was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub goal: String,
    pub outcome: RunOutcome,
    pub trace: Vec<StepLogEntry>,
    pub report: Option<AnalysisReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// Whether the run reached the terminal marker.
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}
