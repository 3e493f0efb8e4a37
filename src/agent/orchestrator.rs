//! The QA run loop: Plan → Execute → Verify → Replan under a step budget.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::actions::{ActionTranslator, AgentAction};
use crate::env::{Observation, UiEnvironment};

use super::planner::{Planner, ReplanSignal};
use super::supervisor::Supervisor;
use super::trace::{RunOutcome, RunResult, StepLogEntry};
use super::verifier::{VerificationResult, Verifier};

/// Configuration for the QA orchestrator.
#[derive(Debug, Clone)]
pub struct QaConfig {
    /// Maximum number of steps before stopping.
    pub max_steps: u32,
    /// Pause between steps, giving the device UI time to settle.
    pub step_delay: Duration,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            step_delay: Duration::from_secs(2),
        }
    }
}

impl QaConfig {
    /// Set the step budget.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the inter-step settle delay.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

/// Drives one test run end-to-end: planning, translation, verification,
/// replanning, and the final supervisor analysis.
///
/// The loop is strictly sequential. No step begins before the previous
/// step's log entry is recorded and the new observation is captured.
pub struct QaOrchestrator {
    planner: Box<dyn Planner>,
    verifier: Verifier,
    supervisor: Supervisor,
    env: Box<dyn UiEnvironment>,
    translator: ActionTranslator,
    config: QaConfig,
}

impl QaOrchestrator {
    pub fn new(
        planner: Box<dyn Planner>,
        verifier: Verifier,
        supervisor: Supervisor,
        env: Box<dyn UiEnvironment>,
        config: QaConfig,
    ) -> Self {
        Self {
            planner,
            verifier,
            supervisor,
            env,
            translator: ActionTranslator::new(),
            config,
        }
    }

    /// Run one QA test toward the given goal.
    ///
    /// Always returns a [`RunResult`]: every failure mode is folded into the
    /// outcome, and the trace collected so far survives an early abort.
    pub async fn run(&mut self, goal: &str) -> RunResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, goal, "Starting QA run");

        let mut trace: Vec<StepLogEntry> = Vec::new();
        let mut screenshots: Vec<String> = Vec::new();

        let outcome = match self.env.reset() {
            Ok(state) => {
                self.run_loop(goal, state.into(), &mut trace, &mut screenshots)
                    .await
            }
            Err(e) => {
                tracing::error!("Environment reset failed: {}", e);
                RunOutcome::ExecutionError(format!("reset: {}", e))
            }
        };

        // The supervisor only ever sees a non-empty trace, and its result
        // never changes the run outcome.
        let report = if trace.is_empty() {
            None
        } else {
            Some(self.supervisor.analyze(goal, &trace, &screenshots).await)
        };

        self.env.close();

        let result = RunResult {
            run_id,
            goal: goal.to_string(),
            outcome,
            trace,
            report,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            %run_id,
            success = result.is_success(),
            steps = result.trace.len(),
            "QA run finished"
        );
        result
    }

    async fn run_loop(
        &mut self,
        goal: &str,
        mut observation: Observation,
        trace: &mut Vec<StepLogEntry>,
        screenshots: &mut Vec<String>,
    ) -> RunOutcome {
        let mut replan = ReplanSignal::default();

        for step in 1..=self.config.max_steps {
            // PLAN_EXECUTE: the planner sees the replan signal armed by the
            // previous step, if any.
            let (info, actions) = match self.planner.predict(goal, &observation, &replan).await {
                Ok(prediction) => prediction,
                Err(e) => {
                    tracing::error!(step, "Planner failed: {}", e);
                    return RunOutcome::ExecutionError(format!("planner: {}", e));
                }
            };
            replan.clear();

            if !info.thinking.is_empty() {
                tracing::debug!(step, thinking = %info.thinking, "Planner thinking");
            }

            // An empty action sequence means the planner is finished.
            let action = actions.into_iter().next().unwrap_or(AgentAction::Done);
            tracing::info!(
                step,
                subtask = info.subtask.as_deref().unwrap_or("<none>"),
                ?action,
                "Planner proposed action"
            );

            // VERIFY: only when there is a subtask and a non-terminal action.
            let verification = match &info.subtask {
                Some(subtask) if !action.is_terminal() => {
                    self.verifier.verify(subtask, &observation).await
                }
                _ => VerificationResult::skipped(),
            };
            tracing::info!(
                step,
                passed = verification.passed,
                reason = %verification.reason,
                "Verification"
            );

            // REPLAN_FLAG: arm the signal for the next planning call.
            if !verification.passed {
                let failed = info.subtask.clone().unwrap_or_default();
                tracing::warn!(step, subtask = %failed, "Verification failed, requesting replan");
                replan.trigger(failed);
            }

            // TERMINATE(success): the terminal step is not an executed step,
            // so it gets no trace entry.
            if action.is_terminal() {
                tracing::info!(step, "Terminal action proposed, goal reached");
                return RunOutcome::Completed;
            }

            let translation = self.translator.translate(&action, &observation.ui_elements);
            let device_action = match translation.device_action() {
                Some(device_action) => device_action.clone(),
                None => {
                    tracing::info!(step, "Translator returned terminal marker");
                    return RunOutcome::Completed;
                }
            };

            // ADVANCE: execute and capture the new observation.
            let new_state = match self.env.execute_action(&device_action) {
                Ok(Some(state)) => state,
                Ok(None) => match self.env.get_state() {
                    Ok(state) => state,
                    Err(e) => {
                        tracing::error!(step, "State capture failed: {}", e);
                        return RunOutcome::ExecutionError(e.to_string());
                    }
                },
                Err(e) => {
                    tracing::error!(step, ?device_action, "Action execution failed: {}", e);
                    return RunOutcome::ExecutionError(e.to_string());
                }
            };
            observation = new_state.into();

            // LOG: one entry per executed step, with the post-action
            // snapshot aligned by index.
            trace.push(StepLogEntry {
                step,
                subtask: info.subtask.clone(),
                proposed_action: serde_json::to_string(&device_action).unwrap_or_default(),
                verification_passed: verification.passed,
                verification_reason: verification.reason.clone(),
            });
            screenshots.push(observation.screenshot.base64_data.clone());

            if !self.config.step_delay.is_zero() {
                tokio::time::sleep(self.config.step_delay).await;
            }
        }

        tracing::warn!(max_steps = self.config.max_steps, "Step budget exhausted");
        RunOutcome::BudgetExhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ClickTarget, DeviceAction};
    use crate::adb::Screenshot;
    use crate::agent::planner::{PlannerError, StepInfo};
    use crate::env::{EnvError, EnvState, UiElement};
    use crate::model::{Judge, JudgmentRequest, ModelError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const PASS: &str = r#"{"verdict": "PASS", "reason": "looks right"}"#;
    const FAIL: &str = r#"{"verdict": "FAIL", "reason": "toggle unchanged"}"#;
    const REPORT: &str = r#"{
        "overall_outcome": "SUCCESS",
        "summary": "ok",
        "prompt_improvements": "none",
        "failure_analysis": "none",
        "coverage_expansion": "none"
    }"#;

    fn wifi_state() -> EnvState {
        EnvState {
            screenshot: Screenshot::new("c2NyZWVu".to_string(), 1080, 2400),
            ui_elements: vec![UiElement {
                text: Some("Wi-Fi".to_string()),
                bounds: Some((0, 0, 100, 100)),
                ..Default::default()
            }],
        }
    }

    fn click_wifi() -> AgentAction {
        AgentAction::Click {
            target: ClickTarget::Description("wi-fi".to_string()),
        }
    }

    /// Planner fake replaying a scripted (subtask, action) sequence and
    /// recording every replan signal it observed.
    struct ScriptedPlanner {
        steps: Vec<(Option<&'static str>, AgentAction)>,
        observed: Arc<Mutex<Vec<ReplanSignal>>>,
        cursor: usize,
    }

    impl ScriptedPlanner {
        fn new(
            steps: Vec<(Option<&'static str>, AgentAction)>,
        ) -> (Box<Self>, Arc<Mutex<Vec<ReplanSignal>>>) {
            let observed = Arc::new(Mutex::new(Vec::new()));
            (
                Box::new(Self {
                    steps,
                    observed: observed.clone(),
                    cursor: 0,
                }),
                observed,
            )
        }
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        async fn predict(
            &mut self,
            _instruction: &str,
            _observation: &Observation,
            replan: &ReplanSignal,
        ) -> Result<(StepInfo, Vec<AgentAction>), PlannerError> {
            self.observed.lock().unwrap().push(replan.clone());
            let (subtask, action) = self.steps[self.cursor].clone();
            self.cursor += 1;
            Ok((
                StepInfo {
                    subtask: subtask.map(str::to_string),
                    thinking: String::new(),
                },
                vec![action],
            ))
        }
    }

    /// Judge fake with canned responses and a call counter.
    struct CountingJudge {
        responses: Mutex<Vec<Result<String, ModelError>>>,
        calls: AtomicUsize,
        fallback: &'static str,
    }

    impl CountingJudge {
        fn new(responses: Vec<Result<String, ModelError>>, fallback: &'static str) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                fallback,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Judge for CountingJudge {
        async fn judge(&self, _request: JudgmentRequest) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(self.fallback.to_string())
            } else {
                responses.remove(0)
            }
        }
    }

    /// Environment fake recording executed actions, optionally failing on
    /// the nth execution (1-based).
    struct FakeEnv {
        executed: Arc<Mutex<Vec<DeviceAction>>>,
        fail_on_execution: Option<usize>,
        closed: Arc<AtomicUsize>,
    }

    impl FakeEnv {
        fn new() -> (Box<Self>, Arc<Mutex<Vec<DeviceAction>>>, Arc<AtomicUsize>) {
            Self::failing_on(None)
        }

        fn failing_on(
            fail_on_execution: Option<usize>,
        ) -> (Box<Self>, Arc<Mutex<Vec<DeviceAction>>>, Arc<AtomicUsize>) {
            let executed = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    executed: executed.clone(),
                    fail_on_execution,
                    closed: closed.clone(),
                }),
                executed,
                closed,
            )
        }
    }

    impl UiEnvironment for FakeEnv {
        fn reset(&mut self) -> Result<EnvState, EnvError> {
            Ok(wifi_state())
        }

        fn execute_action(&mut self, action: &DeviceAction) -> Result<Option<EnvState>, EnvError> {
            let mut executed = self.executed.lock().unwrap();
            executed.push(action.clone());
            if self.fail_on_execution == Some(executed.len()) {
                return Err(EnvError::ExecutionFailed("device went away".to_string()));
            }
            Ok(None)
        }

        fn get_state(&mut self) -> Result<EnvState, EnvError> {
            Ok(wifi_state())
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn orchestrator(
        planner: Box<dyn Planner>,
        env: Box<dyn UiEnvironment>,
        verifier_judge: Arc<CountingJudge>,
        supervisor_judge: Arc<CountingJudge>,
        max_steps: u32,
    ) -> QaOrchestrator {
        QaOrchestrator::new(
            planner,
            Verifier::new(verifier_judge),
            Supervisor::new(supervisor_judge),
            env,
            QaConfig::default()
                .with_max_steps(max_steps)
                .with_step_delay(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_wifi_scenario_with_replan() {
        // Step 2's verification fails, step 3 ends with the terminal marker.
        let (planner, observed) = ScriptedPlanner::new(vec![
            (Some("open settings"), click_wifi()),
            (Some("toggle wifi"), click_wifi()),
            (Some("toggle wifi"), AgentAction::Done),
        ]);
        let (env, executed, closed) = FakeEnv::new();
        let verifier_judge = CountingJudge::new(
            vec![Ok(PASS.to_string()), Ok(FAIL.to_string())],
            PASS,
        );
        let supervisor_judge = CountingJudge::new(vec![Ok(REPORT.to_string())], REPORT);

        let mut orchestrator = orchestrator(
            planner,
            env,
            verifier_judge.clone(),
            supervisor_judge.clone(),
            20,
        );
        let result = orchestrator.run("Test turning Wi-Fi on and off").await;

        assert!(result.is_success());
        assert_eq!(result.outcome, RunOutcome::Completed);

        // The terminal step is not an executed step.
        assert_eq!(result.trace.len(), 2);
        assert_eq!(executed.lock().unwrap().len(), 2);
        assert!(result.trace[0].verification_passed);
        assert!(!result.trace[1].verification_passed);
        assert_eq!(result.trace[1].verification_reason, "toggle unchanged");

        // The replan signal was visible exactly on the step after the
        // failed verdict, and cleared again afterwards.
        let observed = observed.lock().unwrap();
        assert_eq!(observed.len(), 3);
        assert!(!observed[0].is_set());
        assert!(!observed[1].is_set());
        assert!(observed[2].is_set());
        assert_eq!(observed[2].failed_subtask.as_deref(), Some("toggle wifi"));

        // Two verifications (terminal step skipped), one supervisor call.
        assert_eq!(verifier_judge.call_count(), 2);
        assert_eq!(supervisor_judge.call_count(), 1);
        assert!(result.report.unwrap().as_report().is_some());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_action_skips_verification() {
        let (planner, _) = ScriptedPlanner::new(vec![(Some("all done"), AgentAction::Done)]);
        let (env, executed, _) = FakeEnv::new();
        let verifier_judge = CountingJudge::new(vec![], PASS);
        let supervisor_judge = CountingJudge::new(vec![], REPORT);

        let mut orchestrator = orchestrator(
            planner,
            env,
            verifier_judge.clone(),
            supervisor_judge.clone(),
            20,
        );
        let result = orchestrator.run("goal").await;

        assert!(result.is_success());
        assert!(result.trace.is_empty());
        assert!(executed.lock().unwrap().is_empty());
        assert_eq!(verifier_judge.call_count(), 0);
        // Empty trace: the supervisor is never consulted.
        assert_eq!(supervisor_judge.call_count(), 0);
        assert!(result.report.is_none());
    }

    #[tokio::test]
    async fn test_missing_subtask_skips_verification() {
        let (planner, _) = ScriptedPlanner::new(vec![
            (None, AgentAction::Wait { seconds: 1.0 }),
            (None, AgentAction::Done),
        ]);
        let (env, _, _) = FakeEnv::new();
        let verifier_judge = CountingJudge::new(vec![], PASS);
        let supervisor_judge = CountingJudge::new(vec![], REPORT);

        let mut orchestrator = orchestrator(
            planner,
            env,
            verifier_judge.clone(),
            supervisor_judge.clone(),
            20,
        );
        let result = orchestrator.run("goal").await;

        assert_eq!(verifier_judge.call_count(), 0);
        assert_eq!(result.trace.len(), 1);
        assert!(result.trace[0].verification_passed);
        assert_eq!(
            result.trace[0].verification_reason,
            "No verification performed."
        );
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let (planner, _) = ScriptedPlanner::new(vec![
            (Some("keep scrolling"), AgentAction::Wait { seconds: 1.0 });
            3
        ]);
        let (env, _, _) = FakeEnv::new();
        let verifier_judge = CountingJudge::new(vec![], PASS);
        let supervisor_judge = CountingJudge::new(vec![], REPORT);

        let mut orchestrator = orchestrator(
            planner,
            env,
            verifier_judge.clone(),
            supervisor_judge.clone(),
            3,
        );
        let result = orchestrator.run("goal").await;

        assert_eq!(result.outcome, RunOutcome::BudgetExhausted);
        assert!(!result.is_success());
        assert_eq!(result.trace.len(), 3);
        assert_eq!(supervisor_judge.call_count(), 1);
    }

    #[tokio::test]
    async fn test_execution_error_preserves_trace() {
        let (planner, _) = ScriptedPlanner::new(vec![
            (Some("step one"), click_wifi()),
            (Some("step two"), click_wifi()),
            (Some("step three"), click_wifi()),
        ]);
        let (env, _, closed) = FakeEnv::failing_on(Some(2));
        let verifier_judge = CountingJudge::new(vec![], PASS);
        // The supervisor's judgment is garbled on top of the run failing.
        let supervisor_judge =
            CountingJudge::new(vec![Ok("no report here".to_string())], REPORT);

        let mut orchestrator = orchestrator(
            planner,
            env,
            verifier_judge.clone(),
            supervisor_judge.clone(),
            20,
        );
        let result = orchestrator.run("goal").await;

        assert!(matches!(result.outcome, RunOutcome::ExecutionError(_)));
        // The failed step never made it into the trace; the first did.
        assert_eq!(result.trace.len(), 1);
        // The collected trace still reaches the supervisor, whose broken
        // reply surfaces as the error shape without touching the outcome.
        assert_eq!(supervisor_judge.call_count(), 1);
        assert!(result.report.unwrap().as_report().is_none());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replan_signal_cleared_after_consumption() {
        // Fail at step 1; step 2 observes the armed signal, step 3 must see
        // it cleared again.
        let (planner, observed) = ScriptedPlanner::new(vec![
            (Some("toggle wifi"), click_wifi()),
            (Some("toggle wifi"), click_wifi()),
            (Some("toggle wifi"), AgentAction::Done),
        ]);
        let (env, _, _) = FakeEnv::new();
        let verifier_judge =
            CountingJudge::new(vec![Ok(FAIL.to_string()), Ok(PASS.to_string())], PASS);
        let supervisor_judge = CountingJudge::new(vec![], REPORT);

        let mut orchestrator = orchestrator(
            planner,
            env,
            verifier_judge.clone(),
            supervisor_judge.clone(),
            20,
        );
        let result = orchestrator.run("goal").await;

        assert!(result.is_success());
        let observed = observed.lock().unwrap();
        assert!(!observed[0].is_set());
        assert!(observed[1].is_set());
        assert!(!observed[2].is_set());
    }

    #[tokio::test]
    async fn test_unverifiable_verdict_fails_open() {
        let (planner, observed) = ScriptedPlanner::new(vec![
            (Some("toggle wifi"), click_wifi()),
            (Some("toggle wifi"), AgentAction::Done),
        ]);
        let (env, _, _) = FakeEnv::new();
        let verifier_judge = CountingJudge::new(vec![Ok("garbled".to_string())], PASS);
        let supervisor_judge = CountingJudge::new(vec![], REPORT);

        let mut orchestrator = orchestrator(
            planner,
            env,
            verifier_judge.clone(),
            supervisor_judge.clone(),
            20,
        );
        let result = orchestrator.run("goal").await;

        // Fail-open: the unparseable verdict counts as a pass and never
        // arms the replan signal.
        assert!(result.trace[0].verification_passed);
        assert!(!observed.lock().unwrap()[1].is_set());
    }
}
