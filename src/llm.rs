//! Chat-completions client and the model abstraction the agent loop drives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::memory::ConversationHistory;
use crate::message::Role;
use crate::retry::{RetryFailure, RetryPolicy, Sleeper, TokioSleeper};

/// Roles the remote endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Minimal abstraction around a chat completion provider.
///
/// Transport failures never surface as `Err`: once retries are exhausted the
/// failure comes back as `Ok("Error: ...")` and flows through the action
/// parser like any other model text. `Err` is reserved for fatal conditions.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        history: &ConversationHistory,
        system_prompt: &str,
        max_retries: u32,
    ) -> Result<String>;

    /// Attempts per completion when the caller does not choose a budget.
    fn default_retries(&self) -> u32 {
        3
    }
}

/// Outbound transcript: `system_prompt` first, then every non-system turn in
/// order with observations folded into the user channel.
pub fn build_request_messages(
    history: &ConversationHistory,
    system_prompt: &str,
) -> Vec<ChatMessage> {
    let mut built = Vec::with_capacity(history.len());
    built.push(ChatMessage {
        role: ChatRole::System,
        content: system_prompt.to_string(),
    });
    for message in history.iter() {
        let role = match message.role {
            Role::System => continue,
            Role::User | Role::Observation => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        };
        built.push(ChatMessage {
            role,
            content: message.content.clone(),
        });
    }
    built
}

fn coalesce_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::LanguageModel(format!("rate limit exceeded ({status}): {body}"));
    }
    AgentError::LanguageModel(format!("request failed with {status}: {body}"))
}

/// Render a give-up as model text so the loop handles it uniformly.
fn degrade(failure: RetryFailure, max_attempts: u32) -> String {
    match failure.error {
        _ if failure.attempts == 0 => "Error: Maximum retry attempts exceeded.".to_string(),
        AgentError::MalformedResponse(detail) => {
            format!("Error: Failed to parse API response: {detail}")
        }
        err => format!(
            "Error: API request failed (attempt {}/{max_attempts}): {err}",
            failure.attempts
        ),
    }
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    backoff_unit: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl ChatCompletionsClient {
    /// Fails with [`AgentError::Configuration`] when no API key is configured.
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = cfg.require_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|err| AgentError::Configuration(format!("http client error: {err}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            max_retries: cfg.max_retries,
            backoff_unit: Duration::from_secs(1),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send_once(&self, request: &ChatRequest<'_>) -> Result<String> {
        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| AgentError::LanguageModel(format!("request error: {err}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| AgentError::LanguageModel(format!("response read error: {err}")))?;
        if !status.is_success() {
            return Err(coalesce_error(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|err| AgentError::MalformedResponse(format!("{err}")))?;
        let first = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::MalformedResponse("response has no choices".into()))?;
        let content = first.message.content.ok_or_else(|| {
            AgentError::MalformedResponse("choices[0].message.content is missing".into())
        })?;
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(
        &self,
        history: &ConversationHistory,
        system_prompt: &str,
        max_retries: u32,
    ) -> Result<String> {
        let messages = build_request_messages(history, system_prompt);
        let request = ChatRequest {
            model: &self.model,
            messages: &messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };
        tracing::debug!(
            endpoint = %self.endpoint(),
            messages = messages.len(),
            "sending chat completion"
        );

        let policy = RetryPolicy::new(max_retries).with_base_delay(self.backoff_unit);
        match policy
            .retry(self.sleeper.as_ref(), |_| self.send_once(&request))
            .await
        {
            Ok(text) => Ok(text),
            Err(failure) => {
                let text = degrade(failure, max_retries);
                tracing::error!(error = %text, "chat completion failed");
                Ok(text)
            }
        }
    }

    fn default_retries(&self) -> u32 {
        self.max_retries
    }
}

/// A deterministic model used for tests and demos.
///
/// Replays scripted responses in order and records every outbound transcript.
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
    repeat_last: bool,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            repeat_last: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A model that answers every request with `response`.
    pub fn always(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::from(vec![response.into()])),
            repeat_last: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Transcripts sent so far, one per `complete` call.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(
        &self,
        history: &ConversationHistory,
        system_prompt: &str,
        _max_retries: u32,
    ) -> Result<String> {
        self.requests
            .lock()
            .map_err(|_| AgentError::LanguageModel("stub model poisoned".into()))?
            .push(build_request_messages(history, system_prompt));

        let mut locked = self
            .responses
            .lock()
            .map_err(|_| AgentError::LanguageModel("stub model poisoned".into()))?;
        let next = if self.repeat_last && locked.len() == 1 {
            locked.front().cloned()
        } else {
            locked.pop_front()
        };
        next.ok_or_else(|| {
            AgentError::LanguageModel("StubModel ran out of scripted responses".into())
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
