//! Planning/execution collaborator seam and the model-backed planner.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::actions::{parse_action, AgentAction};
use crate::config::planner_system_prompt;
use crate::env::Observation;
use crate::model::{MessageBuilder, ModelClient, ModelError};

/// Planner errors.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Per-step info the planner reports alongside its actions.
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Short label for the current unit of work.
    pub subtask: Option<String>,
    /// The planner's reasoning, when exposed.
    pub thinking: String,
}

/// Replan request threaded through the loop.
///
/// Set by the orchestrator after a failed verdict, observed by the planner
/// on its next call, then cleared. Never ambient state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplanSignal {
    pub requires_replan: bool,
    pub failed_subtask: Option<String>,
}

impl ReplanSignal {
    /// Arm the signal for a failed subtask.
    pub fn trigger(&mut self, subtask: impl Into<String>) {
        self.requires_replan = true;
        self.failed_subtask = Some(subtask.into());
    }

    /// Reset to the unarmed state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_set(&self) -> bool {
        self.requires_replan
    }
}

/// Planning/execution collaborator interface.
///
/// Given the goal and the current observation, produce step info (carrying
/// the subtask label) and an ordered sequence of candidate actions. An empty
/// sequence means the planner considers the goal complete.
#[async_trait]
pub trait Planner: Send {
    async fn predict(
        &mut self,
        instruction: &str,
        observation: &Observation,
        replan: &ReplanSignal,
    ) -> Result<(StepInfo, Vec<AgentAction>), PlannerError>;
}

/// Model-backed planner keeping a running conversation per run.
///
/// Screenshots are dropped from older messages after each step so the
/// context stays bounded.
pub struct ModelPlanner {
    client: ModelClient,
    context: Vec<Value>,
}

impl ModelPlanner {
    pub fn new(client: ModelClient) -> Self {
        Self {
            client,
            context: Vec::new(),
        }
    }

    /// Clear the conversation for a new run.
    pub fn reset(&mut self) {
        self.context.clear();
    }

    /// Parse a planner answer into (subtask, action).
    ///
    /// The expected shape is a `subtask:` line followed by an `action:`
    /// line; a bare action call is accepted as a fallback.
    fn parse_reply(answer: &str) -> (Option<String>, Option<AgentAction>) {
        let mut subtask = None;
        let mut action = None;

        for line in answer.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("subtask:") {
                let label = rest.trim();
                if !label.is_empty() {
                    subtask = Some(label.to_string());
                }
            } else if let Some(rest) = line.strip_prefix("action:") {
                action = parse_action(rest).ok();
            }
        }

        if subtask.is_none() && action.is_none() {
            action = parse_action(answer).ok();
        }

        (subtask, action)
    }
}

#[async_trait]
impl Planner for ModelPlanner {
    async fn predict(
        &mut self,
        instruction: &str,
        observation: &Observation,
        replan: &ReplanSignal,
    ) -> Result<(StepInfo, Vec<AgentAction>), PlannerError> {
        let is_first = self.context.is_empty();
        if is_first {
            self.context.push(MessageBuilder::create_system_message(
                &planner_system_prompt(observation.screenshot.width, observation.screenshot.height),
            ));
        }

        let mut text = if is_first {
            format!("Test goal: {}", instruction)
        } else {
            "** Current screen **".to_string()
        };
        if replan.is_set() {
            let failed = replan
                .failed_subtask
                .as_deref()
                .unwrap_or("the previous subtask");
            text = format!(
                "Verification FAILED for subtask \"{}\". Regenerate your plan for this subtask instead of continuing the previous one.\n\n{}",
                failed, text
            );
        }

        self.context.push(MessageBuilder::create_user_message(
            &text,
            Some(&observation.screenshot.base64_data),
        ));

        let response = self.client.request(&self.context).await?;

        // Keep the context bounded: older screenshots add nothing.
        if let Some(last_msg) = self.context.last_mut() {
            MessageBuilder::remove_images_from_message(last_msg);
        }
        self.context
            .push(MessageBuilder::create_assistant_message(&response.raw_content));

        let (subtask, action) = Self::parse_reply(&response.answer);
        if action.is_none() {
            tracing::warn!("Unparseable planner reply, treating as done: {}", response.answer);
        }

        let info = StepInfo {
            subtask,
            thinking: response.thinking,
        };
        // An unparseable reply degrades to the terminal marker.
        Ok((info, vec![action.unwrap_or(AgentAction::Done)]))
    }
}
