//! Agent module: the QA control loop and its three roles.

mod orchestrator;
mod planner;
mod supervisor;
mod trace;
mod verifier;

pub use orchestrator::{QaConfig, QaOrchestrator};
pub use planner::{ModelPlanner, Planner, PlannerError, ReplanSignal, StepInfo};
pub use supervisor::{AnalysisReport, Report, Supervisor};
pub use trace::{RunOutcome, RunResult, StepLogEntry};
pub use verifier::{VerificationResult, Verifier, FALLBACK_REASON};

/// Strip surrounding markdown code-fence markers from a model reply.
pub(crate) fn strip_code_fences(text: &str) -> String {
    let cleaned = text.trim().replace("```json", "").replace("```", "");
    cleaned.trim().to_string()
}
