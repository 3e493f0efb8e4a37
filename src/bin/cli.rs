//! QA Agent - AI-powered Android UI testing
//!
//! This is the CLI entry point for the qa-agent tool.
//! Run with: cargo run --bin qa-agent -- "Test turning Wi-Fi on and off"

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use qa_agent::model::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};
use qa_agent::{
    AndroidEnv, ModelClient, ModelConfig, ModelPlanner, QaConfig, QaOrchestrator, RunResult,
    Supervisor, Verifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qa_agent=info".into()),
        )
        .init();

    // Get configuration from environment or use defaults
    let base_url =
        env::var("MODEL_BASE_URL").unwrap_or_else(|_| "http://localhost:8000/v1".to_string());
    let api_key = env::var("MODEL_API_KEY").unwrap_or_else(|_| "EMPTY".to_string());
    let model_name = env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4-turbo".to_string());
    let supervisor_model =
        env::var("SUPERVISOR_MODEL_NAME").unwrap_or_else(|_| "gpt-4-vision-preview".to_string());
    let device_id = env::var("ADB_DEVICE_ID").ok();

    let max_steps: u32 = env::var("QA_MAX_STEPS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);
    let step_delay: u64 = env::var("QA_STEP_DELAY_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);
    let output_dir = PathBuf::from(env::var("QA_OUTPUT_DIR").unwrap_or_else(|_| ".".to_string()));

    let max_retries: u32 = env::var("MODEL_MAX_RETRIES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_RETRIES);
    let retry_delay: u64 = env::var("MODEL_RETRY_DELAY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_RETRY_DELAY_SECS);

    // Test goal from arguments, or prompt for one
    let args: Vec<String> = env::args().skip(1).collect();
    let goal = if args.is_empty() {
        print!("Test goal: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        line.trim().to_string()
    } else {
        args.join(" ")
    };
    if goal.is_empty() {
        anyhow::bail!("No test goal given");
    }

    println!("🤖 QA Agent - AI-powered Android UI Testing");
    println!("================================================");
    println!("Model: {} @ {}", model_name, base_url);
    println!("Supervisor model: {}", supervisor_model);
    if let Some(ref id) = device_id {
        println!("Device: {}", id);
    }
    println!("Budget: {} steps, {}s settle delay", max_steps, step_delay);
    println!("Goal: {}", goal);
    println!("================================================\n");

    let planner_config = ModelConfig::default()
        .with_base_url(&base_url)
        .with_api_key(&api_key)
        .with_model_name(&model_name)
        .with_max_retries(max_retries)
        .with_retry_delay(retry_delay);

    // A verdict is attempted exactly once per step.
    let verifier_config = planner_config.clone().with_max_retries(0);

    let supervisor_config = planner_config
        .clone()
        .with_model_name(&supervisor_model)
        .with_max_retries(max_retries);

    let planner = ModelPlanner::new(ModelClient::new(planner_config));
    let verifier = Verifier::new(Arc::new(ModelClient::new(verifier_config)));
    let supervisor = Supervisor::new(Arc::new(ModelClient::new(supervisor_config)));
    let environment = AndroidEnv::with_device(device_id);

    let qa_config = QaConfig::default()
        .with_max_steps(max_steps)
        .with_step_delay(Duration::from_secs(step_delay));

    let mut orchestrator = QaOrchestrator::new(
        Box::new(planner),
        verifier,
        supervisor,
        Box::new(environment),
        qa_config,
    );

    let result = orchestrator.run(&goal).await;

    if let Some(report) = &result.report {
        println!("\n--- SUPERVISOR'S REPORT ---");
        println!("{}", serde_json::to_string_pretty(report)?);
        println!("---------------------------");
    }

    write_artifact(&output_dir, &result);

    println!(
        "\n--- Test {} ({} steps) ---",
        if result.is_success() {
            "Successful"
        } else {
            "Failed"
        },
        result.trace.len()
    );

    Ok(())
}

/// Persist the run result (step log + report) as a JSON artifact.
///
/// A write failure is logged but never changes the run outcome.
fn write_artifact(output_dir: &std::path::Path, result: &RunResult) {
    let path = output_dir.join(format!("qa-run-{}.json", result.run_id));
    match serde_json::to_string_pretty(result) {
        Ok(json) => {
            if let Err(e) = fs::write(&path, json) {
                tracing::error!("Failed to write run artifact {}: {}", path.display(), e);
            } else {
                println!("Run artifact written to {}", path.display());
            }
        }
        Err(e) => tracing::error!("Failed to serialize run result: {}", e),
    }
}
