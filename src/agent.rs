use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AgentError, Result};
use crate::hooks::AgentHook;
use crate::llm::LanguageModel;
use crate::memory::ConversationHistory;
use crate::message::{Message, Observation};
use crate::parser::{parse, Action, ParseResult, ACTION_END, ACTION_START, FINAL_ANSWER_MARKER};
use crate::tool::ToolRegistry;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopResult {
    FinalAnswer(String),
    Aborted(String),
    BudgetExhausted,
}

impl fmt::Display for LoopResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopResult::FinalAnswer(answer) => write!(f, "Agent Finished! Final Answer: {answer}"),
            LoopResult::Aborted(reason) => write!(f, "Agent failed: {reason}"),
            LoopResult::BudgetExhausted => f.write_str("Max steps reached without a final answer."),
        }
    }
}

/// Result of a run together with the transcript it produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub result: LoopResult,
    pub history: ConversationHistory,
    /// Model calls made, each one consuming a unit of the step budget.
    pub steps: usize,
}

/// A ReAct agent: think with the model, act through tools, observe, repeat.
///
/// Each call to [`Agent::run`] owns a fresh history, so one agent can serve
/// independent runs; the tool registry is only ever read.
pub struct Agent<M: LanguageModel> {
    model: Arc<M>,
    tools: ToolRegistry,
    system_prompt: Option<String>,
    max_steps: usize,
    /// Falls back to the model's own retry budget when unset.
    max_retries: Option<u32>,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl<M: LanguageModel> Agent<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            model,
            tools: ToolRegistry::new(),
            system_prompt: None,
            max_steps: 5,
            max_retries: None,
            hooks: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.max_steps = config.agent.max_steps.max(1);
        self.max_retries = Some(config.model.max_retries);
        if let Some(prompt) = &config.agent.system_prompt {
            self.system_prompt = Some(prompt.clone());
        }
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// The supplied system prompt, or the generated ReAct prompt.
    pub fn system_prompt(&self) -> String {
        self.system_prompt
            .clone()
            .unwrap_or_else(|| default_system_prompt(&self.tools))
    }

    /// Solve `task`. Only configuration errors are `Err`; every other failure
    /// ends the run with a [`LoopResult`].
    pub async fn run(&self, task: impl Into<String>) -> Result<LoopResult> {
        Ok(self.run_detailed(task).await?.result)
    }

    pub async fn run_detailed(&self, task: impl Into<String>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("agent_run", %run_id);
        self.drive(run_id, task.into()).instrument(span).await
    }

    async fn drive(&self, run_id: Uuid, task: String) -> Result<RunReport> {
        let system_prompt = self.system_prompt();
        let mut history = ConversationHistory::seeded(system_prompt.clone(), task);
        let max_retries = self
            .max_retries
            .unwrap_or_else(|| self.model.default_retries());
        let mut steps = 0;

        let result = loop {
            if steps >= self.max_steps {
                break LoopResult::BudgetExhausted;
            }
            steps += 1;
            tracing::info!(step = steps, max_steps = self.max_steps, "thinking");
            for hook in &self.hooks {
                hook.on_step(steps, self.max_steps).await;
            }

            let raw = match self
                .model
                .complete(&history, &system_prompt, max_retries)
                .await
            {
                Ok(raw) => raw,
                Err(err @ AgentError::Configuration(_)) => return Err(err),
                Err(err) => {
                    tracing::error!(error = %err, "model call failed");
                    break LoopResult::Aborted(err.to_string());
                }
            };
            tracing::debug!(response = %raw, "model response");
            for hook in &self.hooks {
                hook.after_model(&raw).await;
            }

            let observation = match parse(&raw) {
                ParseResult::FinalAnswer(answer) => break LoopResult::FinalAnswer(answer),
                ParseResult::Ambiguous => {
                    tracing::warn!("model output has neither an action nor a final answer");
                    break LoopResult::Aborted(
                        "model output contained neither an action nor a final answer".into(),
                    );
                }
                ParseResult::Action(action) => {
                    history.push(Message::assistant(raw));
                    self.dispatch(&action).await
                }
                ParseResult::InvalidAction { error, .. } => {
                    history.push(Message::assistant(raw));
                    Observation::error(error)
                }
            };

            if observation.is_error() {
                tracing::warn!(observation = %observation.text(), "tool execution error");
            } else {
                tracing::info!(observation = %observation.text(), "observation");
            }
            for hook in &self.hooks {
                hook.on_observation(&observation).await;
            }
            history.push(Message::observation(&observation));
        };

        tracing::info!(steps, result = %result, "run finished");
        for hook in &self.hooks {
            hook.on_finish(&result).await;
        }

        Ok(RunReport {
            run_id,
            result,
            history,
            steps,
        })
    }

    /// Execute `action` against the registry. Failures become error observations.
    pub async fn dispatch(&self, action: &Action) -> Observation {
        let args = Value::Object(action.args.clone());
        tracing::info!(tool = %action.tool_name, args = %args, "executing tool");
        for hook in &self.hooks {
            hook.before_tool_call(action).await;
        }
        match self.tools.call(&action.tool_name, &action.args).await {
            Ok(Value::String(text)) => Observation::success(text),
            Ok(value) => Observation::success(value),
            Err(err) => Observation::error(err),
        }
    }
}

/// ReAct instructions listing every registered tool.
pub fn default_system_prompt(tools: &ToolRegistry) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a calculator agent. Your goal is to complete the user's calculation.\n\
         You must follow the ReAct framework:\n\n",
    );
    prompt.push_str("## Output format\n");
    prompt.push_str("1. **Thought**: describe your reasoning, your plan and the tool you will use.\n");
    prompt.push_str(&format!(
        "2. **Action**: when a tool is needed, output JSON wrapped strictly in {ACTION_START} and {ACTION_END}.\n"
    ));
    prompt.push_str(
        "3. **Observation**: the tool result. Use it in your next Thought.\n\n",
    );
    prompt.push_str("## Rules\n");
    prompt.push_str(&format!(
        "- Once the task is complete, give the result after '{FINAL_ANSWER_MARKER}'.\n"
    ));
    prompt.push_str("- Every response must contain a Thought.\n");
    prompt.push_str("- Tool requests must follow the JSON Action format exactly.\n");
    prompt.push_str("- Never put an Action and a Final Answer in the same response.\n\n");

    prompt.push_str("## Available tools\n");
    if tools.is_empty() {
        prompt.push_str("No tools are available.\n");
    }
    for tool in tools.describe() {
        let args = tool
            .parameters
            .as_ref()
            .and_then(|params| params.get("properties").cloned())
            .unwrap_or_else(|| json!({}));
        let line = json!({
            "tool": tool.name,
            "description": tool.description,
            "args": args,
        });
        prompt.push_str(&format!("- {line}\n"));
    }

    prompt.push_str("\n## Example responses\n");
    prompt.push_str(&format!(
        "Thought: I need the sum of two numbers, so I will use add_numbers.\n\
         {ACTION_START}\n{{\"tool\": \"add_numbers\", \"args\": {{\"a\": 123, \"b\": 456}}}}\n{ACTION_END}\n\n"
    ));
    prompt.push_str(&format!(
        "Thought: I have the result and can answer now.\n\
         {FINAL_ANSWER_MARKER} 123 plus 456 is 579.\n"
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm::{ChatRole, StubModel};
    use crate::message::Role;
    use crate::tools::calculator_toolkit;

    const ADD_ACTION: &str = "Thought: add them.\n[ACTION_START]\n{\"tool\":\"add_numbers\",\"args\":{\"a\":123,\"b\":456}}\n[ACTION_END]";

    fn calculator_agent(model: Arc<StubModel>) -> Agent<StubModel> {
        Agent::new(model)
            .with_tools(calculator_toolkit())
            .with_system_prompt("You are a calculator.")
    }

    #[tokio::test]
    async fn returns_final_answer_without_tools() {
        let model = StubModel::new(vec!["Thought: easy.\nFinal Answer: 42".into()]);
        let agent = calculator_agent(model.clone());

        let report = agent.run_detailed("what is 6 * 7?").await.unwrap();

        assert_eq!(report.result, LoopResult::FinalAnswer("42".into()));
        assert_eq!(report.steps, 1);
        assert_eq!(report.history.len(), 2);
    }

    #[tokio::test]
    async fn executes_tool_then_answers() {
        let model = StubModel::new(vec![
            ADD_ACTION.into(),
            "Thought: got it.\nFinal Answer: 579".into(),
        ]);
        let agent = calculator_agent(model.clone());

        let report = agent.run_detailed("add 123 and 456").await.unwrap();

        assert_eq!(report.result, LoopResult::FinalAnswer("579".into()));
        assert_eq!(report.steps, 2);
        let roles: Vec<Role> = report.history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Observation]
        );
        assert_eq!(report.history.messages()[2].content, ADD_ACTION);
        assert_eq!(report.history.messages()[3].content, "Observation: 579");
    }

    #[tokio::test]
    async fn outbound_transcripts_start_with_one_system_message() {
        let model = StubModel::new(vec![
            ADD_ACTION.into(),
            ADD_ACTION.into(),
            "Final Answer: done".into(),
        ]);
        let agent = calculator_agent(model.clone());

        agent.run("add twice").await.unwrap();

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        for request in requests {
            assert_eq!(request[0].role, ChatRole::System);
            assert_eq!(request[0].content, "You are a calculator.");
            assert_eq!(
                request.iter().filter(|m| m.role == ChatRole::System).count(),
                1
            );
        }
        let last = model.requests().pop().unwrap();
        assert_eq!(last.len(), 6);
        assert_eq!(last[5].role, ChatRole::User);
        assert_eq!(last[5].content, "Observation: 579");
    }

    #[tokio::test]
    async fn unknown_tool_is_observed_and_the_loop_continues() {
        let model = StubModel::new(vec![
            "[ACTION_START]{\"tool\":\"multiply\",\"args\":{\"a\":2,\"b\":3}}[ACTION_END]".into(),
            "Final Answer: 6".into(),
        ]);
        let agent = calculator_agent(model.clone());

        let report = agent.run_detailed("multiply 2 and 3").await.unwrap();

        assert_eq!(report.result, LoopResult::FinalAnswer("6".into()));
        let observation = &report.history.messages()[3].content;
        assert!(observation.starts_with("Observation: Tool Execution Error:"));
        assert!(observation.contains("multiply"));
    }

    #[tokio::test]
    async fn malformed_payload_and_bad_arguments_are_observed() {
        let model = StubModel::new(vec![
            "[ACTION_START]{\"tool\": \"add_numbers\", \"args\": [1, 2]}[ACTION_END]".into(),
            "[ACTION_START]{\"tool\":\"add_numbers\",\"args\":{\"a\":1,\"c\":2}}[ACTION_END]".into(),
            "Final Answer: gave up".into(),
        ]);
        let agent = calculator_agent(model.clone());

        let report = agent.run_detailed("add").await.unwrap();

        assert_eq!(report.result, LoopResult::FinalAnswer("gave up".into()));
        let observations: Vec<&str> = report
            .history
            .iter()
            .filter(|m| m.role == Role::Observation)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(observations.len(), 2);
        assert!(observations[0].starts_with("Observation: Tool Execution Error:"));
        assert!(observations[0].contains("invalid action payload"));
        assert!(observations[1].contains("unexpected argument `c`"));
    }

    #[tokio::test]
    async fn budget_of_one_stops_after_one_cycle() {
        let model = StubModel::always(ADD_ACTION);
        let agent = calculator_agent(model.clone()).with_max_steps(1);

        let report = agent.run_detailed("loop forever").await.unwrap();

        assert_eq!(report.result, LoopResult::BudgetExhausted);
        assert_eq!(report.steps, 1);
        assert_eq!(model.requests().len(), 1);
        assert_eq!(report.history.len(), 4);
    }

    #[tokio::test]
    async fn default_budget_is_five_steps() {
        let model = StubModel::always(ADD_ACTION);
        let agent = calculator_agent(model.clone());

        assert_eq!(agent.run("loop").await.unwrap(), LoopResult::BudgetExhausted);
        assert_eq!(model.requests().len(), 5);
    }

    #[tokio::test]
    async fn ambiguous_output_aborts_without_another_model_call() {
        let model = StubModel::new(vec![
            "I believe the answer is 579.".into(),
            "Final Answer: never reached".into(),
        ]);
        let agent = calculator_agent(model.clone());

        let result = agent.run("add").await.unwrap();

        assert!(matches!(result, LoopResult::Aborted(_)));
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_model_error_text_aborts_the_run() {
        let model = StubModel::new(vec![
            "Error: API request failed (attempt 3/3): language model error: timed out".into(),
        ]);
        let agent = calculator_agent(model);

        let result = agent.run("add").await.unwrap();

        assert!(matches!(result, LoopResult::Aborted(_)));
    }

    #[tokio::test]
    async fn non_configuration_model_errors_abort_the_run() {
        let model = StubModel::new(vec![]);
        let agent = calculator_agent(model.clone());

        let report = agent.run_detailed("add").await.unwrap();

        match report.result {
            LoopResult::Aborted(reason) => assert!(reason.contains("ran out of scripted responses")),
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(report.steps, 1);
        assert_eq!(report.history.len(), 2);
    }

    #[tokio::test]
    async fn retry_budget_defaults_to_the_model() {
        struct CountingRetries {
            seen: Mutex<Vec<u32>>,
        }

        #[async_trait]
        impl LanguageModel for CountingRetries {
            async fn complete(
                &self,
                _history: &ConversationHistory,
                _system_prompt: &str,
                max_retries: u32,
            ) -> Result<String> {
                self.seen.lock().unwrap().push(max_retries);
                Ok("Final Answer: ok".into())
            }

            fn default_retries(&self) -> u32 {
                1
            }
        }

        let model = Arc::new(CountingRetries {
            seen: Mutex::new(Vec::new()),
        });
        Agent::new(model.clone()).run("a").await.unwrap();
        Agent::new(model.clone()).with_max_retries(4).run("b").await.unwrap();

        assert_eq!(*model.seen.lock().unwrap(), vec![1, 4]);
    }

    #[tokio::test]
    async fn configuration_errors_propagate() {
        struct Unconfigured;

        #[async_trait]
        impl LanguageModel for Unconfigured {
            async fn complete(
                &self,
                _history: &ConversationHistory,
                _system_prompt: &str,
                _max_retries: u32,
            ) -> Result<String> {
                Err(AgentError::Configuration("missing API key".into()))
            }
        }

        let agent = Agent::new(Arc::new(Unconfigured));
        let err = agent.run("anything").await.unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[tokio::test]
    async fn hooks_observe_progress() {
        #[derive(Default)]
        struct Recorder {
            events: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl AgentHook for Recorder {
            async fn on_step(&self, step: usize, _max_steps: usize) {
                self.events.lock().unwrap().push(format!("step {step}"));
            }

            async fn before_tool_call(&self, action: &Action) {
                self.events
                    .lock()
                    .unwrap()
                    .push(format!("tool {}", action.tool_name));
            }

            async fn on_observation(&self, observation: &Observation) {
                self.events.lock().unwrap().push(observation.text());
            }

            async fn on_finish(&self, result: &LoopResult) {
                self.events.lock().unwrap().push(result.to_string());
            }
        }

        let recorder = Arc::new(Recorder::default());
        let model = StubModel::new(vec![ADD_ACTION.into(), "Final Answer: 579".into()]);
        let agent = calculator_agent(model).with_hook(recorder.clone());

        agent.run("add").await.unwrap();

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                "step 1",
                "tool add_numbers",
                "Observation: 579",
                "step 2",
                "Agent Finished! Final Answer: 579",
            ]
        );
    }

    #[test]
    fn default_prompt_lists_tools_and_markers() {
        let prompt = default_system_prompt(&calculator_toolkit());

        assert!(prompt.contains("[ACTION_START]"));
        assert!(prompt.contains("[ACTION_END]"));
        assert!(prompt.contains("Final Answer:"));
        assert!(prompt.contains("\"tool\":\"add_numbers\""));
        assert!(prompt.contains("\"tool\":\"subtract_numbers\""));
        assert!(prompt.find("add_numbers").unwrap() < prompt.find("subtract_numbers").unwrap());
    }

    #[test]
    fn config_sets_budget_and_prompt() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 2;
        config.agent.system_prompt = Some("custom".into());
        config.model.max_retries = 1;

        let agent = Agent::new(StubModel::new(vec![])).with_config(&config);

        assert_eq!(agent.system_prompt(), "custom");
        assert_eq!(agent.max_steps, 2);
        assert_eq!(agent.max_retries, Some(1));
    }
}
