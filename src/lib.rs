//! A minimal reasoning + acting ("ReAct") agent loop.
//!
//! The crate provides:
//! - A language model abstraction (`LanguageModel`) and a retrying client for
//!   OpenAI-compatible chat-completions endpoints (`ChatCompletionsClient`).
//! - A tool interface (`Tool` and `ToolRegistry`) plus a calculator toolkit.
//! - An action parser that pulls `Final Answer:` text or a delimited JSON tool
//!   request out of free-form model output.
//! - An `Agent` that loops between the model and tools until it has a final
//!   answer, the output is unusable, or the step budget runs out.

mod agent;
mod config;
mod error;
mod hooks;
mod llm;
mod memory;
mod message;
pub mod parser;
pub mod retry;
mod telemetry;
mod tool;
pub mod tools;

pub use agent::{default_system_prompt, Agent, LoopResult, RunReport};
pub use config::{AgentConfig, AppConfig, ModelConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{AgentError, Result};
pub use hooks::AgentHook;
pub use llm::{
    build_request_messages, ChatCompletionsClient, ChatMessage, ChatRole, LanguageModel, StubModel,
};
pub use memory::ConversationHistory;
pub use message::{Message, Observation, Role};
pub use parser::{Action, ParseResult};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use telemetry::init_tracing;
pub use tool::{Arguments, Tool, ToolDescription, ToolRegistry};
pub use tools::calculator_toolkit;
