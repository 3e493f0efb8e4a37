// Copyright 2025 ModerRAS
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # QA Agent
//!
//! AI-powered agent for automated Android UI testing.
//!
//! Three roles cooperate per test run:
//! - a **planner/executor** proposes one action per step toward a
//!   high-level test goal,
//! - a **verifier** judges whether each step's subtask actually took
//!   effect on screen, feeding failed verdicts back as replan requests,
//! - a **supervisor** analyzes the finished run and reports on efficiency,
//!   failures, and coverage gaps.
//!
//! The [`QaOrchestrator`] drives the Plan → Execute → Verify → Replan loop
//! under a step budget, collects the step log and screenshot trace, and
//! hands both to the supervisor at the end of the run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use qa_agent::{
//!     AndroidEnv, ModelClient, ModelConfig, ModelPlanner, QaConfig,
//!     QaOrchestrator, Supervisor, Verifier,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let planner = ModelPlanner::new(ModelClient::new(ModelConfig::default()));
//!     // A verdict is attempted exactly once per step.
//!     let verifier_client =
//!         Arc::new(ModelClient::new(ModelConfig::default().with_max_retries(0)));
//!     let supervisor_client = Arc::new(ModelClient::new(
//!         ModelConfig::default().with_model_name("gpt-4-vision-preview"),
//!     ));
//!
//!     let mut orchestrator = QaOrchestrator::new(
//!         Box::new(planner),
//!         Verifier::new(verifier_client),
//!         Supervisor::new(supervisor_client),
//!         Box::new(AndroidEnv::new()),
//!         QaConfig::default(),
//!     );
//!
//!     let result = orchestrator.run("Test turning Wi-Fi on and off").await;
//!     println!("Run successful: {}", result.is_success());
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod config;
pub mod env;
pub mod model;

pub use actions::{
    parse_action, ActionParseError, ActionTranslator, AgentAction, ClickTarget, DeviceAction,
    ScrollDirection, Translation,
};
pub use agent::{
    AnalysisReport, ModelPlanner, Planner, PlannerError, QaConfig, QaOrchestrator, Report,
    ReplanSignal, RunOutcome, RunResult, StepInfo, StepLogEntry, Supervisor, VerificationResult,
    Verifier,
};
pub use env::{AndroidEnv, EnvError, EnvState, Observation, UiElement, UiEnvironment};
pub use model::{Judge, JudgmentRequest, ModelClient, ModelConfig, ModelError, ModelResponse};
