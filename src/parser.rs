//! Extraction of final answers and tool requests from free-form model text.
//!
//! Parsing is two-phase: first locate a delimited action region, then decode
//! its payload. A region that cannot be decoded is reported as
//! [`ParseResult::InvalidAction`], distinct from text with no markers at all.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{AgentError, Result};
use crate::tool::Arguments;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
pub const ACTION_START: &str = "[ACTION_START]";
pub const ACTION_END: &str = "[ACTION_END]";

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub tool_name: String,
    pub args: Arguments,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    FinalAnswer(String),
    Action(Action),
    /// An action region was found but its payload is not a valid action.
    InvalidAction { payload: String, error: String },
    /// Neither a final answer nor an action region.
    Ambiguous,
}

#[derive(Deserialize)]
struct ActionPayload {
    tool: String,
    args: Arguments,
}

fn action_region() -> &'static Regex {
    static REGION: OnceLock<Regex> = OnceLock::new();
    REGION.get_or_init(|| {
        Regex::new(r"(?s)\[ACTION_START\](.*?)\[ACTION_END\]").expect("valid action regex")
    })
}

/// Classify model output. A final answer wins over any action region.
pub fn parse(text: &str) -> ParseResult {
    if let Some(answer) = final_answer(text) {
        return ParseResult::FinalAnswer(answer);
    }
    match locate_action(text) {
        None => ParseResult::Ambiguous,
        Some(payload) => match decode_action(payload) {
            Ok(action) => ParseResult::Action(action),
            Err(err) => ParseResult::InvalidAction {
                payload: payload.to_string(),
                error: err.to_string(),
            },
        },
    }
}

/// Everything after the first `Final Answer:` marker, trimmed.
pub fn final_answer(text: &str) -> Option<String> {
    text.split_once(FINAL_ANSWER_MARKER)
        .map(|(_, rest)| rest.trim().to_string())
}

/// The trimmed payload of the first `[ACTION_START]`..`[ACTION_END]` region.
pub fn locate_action(text: &str) -> Option<&str> {
    action_region()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Decode a located payload of the form `{"tool": "...", "args": {...}}`.
pub fn decode_action(payload: &str) -> Result<Action> {
    let decoded: ActionPayload = serde_json::from_str(payload)
        .map_err(|err| AgentError::Protocol(format!("invalid action payload: {err}")))?;
    Ok(Action {
        tool_name: decoded.tool,
        args: decoded.args,
    })
}
