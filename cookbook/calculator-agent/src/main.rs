//! calculator-agent: run one task through the ReAct loop with the calculator toolkit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use react_agent::{
    calculator_toolkit, init_tracing, Action, Agent, AgentHook, AppConfig, ChatCompletionsClient,
    LoopResult, Observation,
};

const DEFAULT_TASK: &str = "What is 123 plus 456 minus 789?";

#[derive(Debug, Parser)]
#[command(name = "calculator-agent")]
#[command(about = "Solve arithmetic tasks with a ReAct agent", version)]
struct Cli {
    /// Task for the agent
    task: Vec<String>,

    /// TOML configuration file (environment variables still override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum think/act cycles
    #[arg(long)]
    max_steps: Option<usize>,

    /// Model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Emit JSON logs instead of console progress
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Prints each step of the run to stdout.
struct ConsoleProgress;

#[async_trait]
impl AgentHook for ConsoleProgress {
    async fn on_step(&self, step: usize, _max_steps: usize) {
        println!("\n--- 🔄 Step {step} ---");
    }

    async fn after_model(&self, raw_response: &str) {
        println!("LLM Response:\n{raw_response}");
    }

    async fn before_tool_call(&self, action: &Action) {
        println!(
            "🛠️ Executing Tool: {} with args: {}",
            action.tool_name,
            serde_json::Value::Object(action.args.clone())
        );
    }

    async fn on_observation(&self, observation: &Observation) {
        if observation.is_error() {
            println!("❌ {}", observation.text());
        } else {
            println!("📢 {}", observation.text());
        }
    }
}

/// Console mode prints progress through the hook, so only warnings (retries,
/// tool errors) are logged unless more is asked for.
fn log_level(verbose: bool, json: bool) -> &'static str {
    match (verbose, json) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(log_level(cli.verbose, cli.json), cli.json)?;

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_env_or_file(path)?,
        None => AppConfig::from_env(),
    };
    if let Some(steps) = cli.max_steps {
        config.agent.max_steps = steps;
    }
    if let Some(model) = cli.model {
        config.model.model = model;
    }

    let client = ChatCompletionsClient::from_config(&config.model)?;
    let mut agent = Agent::new(Arc::new(client))
        .with_tools(calculator_toolkit())
        .with_config(&config);
    if !cli.json {
        agent = agent.with_hook(Arc::new(ConsoleProgress));
    }

    let task = if cli.task.is_empty() {
        DEFAULT_TASK.to_string()
    } else {
        cli.task.join(" ")
    };

    match agent.run(task).await? {
        result @ LoopResult::FinalAnswer(_) => println!("\n✅ {result}"),
        result => println!("\n❌ {result}"),
    }
    Ok(())
}
