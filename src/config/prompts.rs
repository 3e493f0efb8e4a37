//! Prompt templates for the planner, verifier, and supervisor roles.

use chrono::Local;

/// Planner/executor system prompt (without date header).
pub static PLANNER_SYSTEM_PROMPT: &str = r#"You are a mobile-UI QA agent. You are given a high-level test goal and, each step, a screenshot of the current screen. Work toward the goal one action at a time.

You must reply in exactly this format:
<think>{think}</think>
<answer>
subtask: {subtask}
action: {action}
</answer>

Where:
- {think} is a short explanation of why you chose this action.
- {subtask} is a short label for the unit of work this action belongs to, e.g. "open the settings app" or "turn Wi-Fi off".
- {action} is exactly one call from the list below.

Available actions:
- click("description of the element")  - click the element best matching the description
- click(x, y)                          - click at absolute pixel coordinates
- swipe(x1, y1, x2, y2)                - swipe from (x1, y1) to (x2, y2)
- scroll("up"|"down"|"left"|"right")   - scroll the screen
- type("text")                         - type text into the focused field
- wait(seconds)                        - wait for the screen to settle
- done()                               - the goal is fully accomplished

Rules:
- One action per reply, nothing after the closing </answer> tag.
- Keep the same subtask label across steps until that unit of work is complete.
- If you are told a subtask failed verification, produce a new plan for that subtask instead of repeating the previous action.
- Call done() only when the whole goal has been tested."#;

/// Verifier prompt, filled with the subtask under test and the rendered
/// UI element list.
pub fn verifier_prompt(subtask: &str, ui_elements: &str) -> String {
    format!(
        r#"You are a meticulous QA Verifier Agent. Your task is to determine if a given subgoal was successfully completed by analyzing the current state of the application's UI.

Based on the subgoal and the UI elements provided, you must conclude whether the action was a "PASS" or "FAIL".

**Subgoal to Verify:**
{subtask}

**Current UI State:**
{ui_elements}

**Analysis and Verdict:**
Review the UI state and determine if it reflects the successful completion of the subgoal. For example, if the subgoal was "turn Wi-Fi off", the UI state should contain a Wi-Fi toggle switch that is in the "off" or "unchecked" state.

Respond ONLY with a JSON object in the following format:
{{
  "verdict": "PASS" or "FAIL",
  "reason": "A brief explanation of your reasoning."
}}"#
    )
}

/// Supervisor prompt, filled with the test goal and the rendered step log.
pub fn supervisor_prompt(goal: &str, log_trace: &str) -> String {
    format!(
        r#"You are an expert QA Supervisor Agent. Your task is to analyze a completed test run, including the step-by-step logs and the corresponding UI screenshots.

Based on the full test trace, you will provide a comprehensive evaluation report.

**High-Level Goal of the Test:**
{goal}

**Full Test Log:**
{log_trace}

**Analysis Instructions:**
Review the entire test trace from start to finish. Pay attention to the following:
1.  **Efficiency:** Was the plan logical and direct? Were there any unnecessary or repeated steps?
2.  **Errors & Recovery:** Did the agent encounter any errors? If so, how well did it recover? Was the Verifier's verdict accurate?
3.  **Overall Success:** Did the agent successfully complete the high-level goal?

**Report Generation:**
Based on your analysis, generate a report in the following JSON format. Provide actionable and specific feedback.

{{
  "overall_outcome": "SUCCESS" or "FAILURE",
  "summary": "A brief, one-sentence summary of the test run.",
  "prompt_improvements": "Suggest a better or more specific high-level goal prompt to make the test more effective or less ambiguous.",
  "failure_analysis": "If the test failed or had issues, explain the root cause. For example, 'The agent failed to find the correct button on step 4 because the UI was slow to load.'",
  "coverage_expansion": "Suggest a new, related test case to expand the test coverage. For example, 'Test that Wi-Fi automatically reconnects after being toggled off and on.'"
}}"#
    )
}

/// Get the planner system prompt with current date and screen resolution.
pub fn planner_system_prompt(width: u32, height: u32) -> String {
    let today = Local::now().format("%B %d, %Y");
    format!(
        "Today's date is: {}\nCurrent screen resolution: {}x{} (width x height)\n{}",
        today, width, height, PLANNER_SYSTEM_PROMPT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_prompt_contains_inputs() {
        let prompt = verifier_prompt("turn Wi-Fi off", "- text=\"Wi-Fi\" checked=false");
        assert!(prompt.contains("turn Wi-Fi off"));
        assert!(prompt.contains("checked=false"));
        assert!(prompt.contains("\"verdict\""));
    }

    #[test]
    fn test_supervisor_prompt_contains_inputs() {
        let prompt = supervisor_prompt("Test Wi-Fi", "Step 1: {...}");
        assert!(prompt.contains("Test Wi-Fi"));
        assert!(prompt.contains("Step 1"));
        assert!(prompt.contains("coverage_expansion"));
    }

    #[test]
    fn test_planner_system_prompt_resolution() {
        let prompt = planner_system_prompt(1080, 2400);
        assert!(prompt.contains("1080x2400"));
        assert!(prompt.contains("done()"));
    }
}
