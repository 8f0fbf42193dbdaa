use serde::{Deserialize, Serialize};

/// Who authored a message in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Tool output (or a tool error) fed back to the model.
    Observation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn observation(observation: &Observation) -> Self {
        Self {
            role: Role::Observation,
            content: observation.text(),
        }
    }
}

/// Result of a dispatched action, fed back to the model as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum Observation {
    Success(String),
    Error(String),
}

impl Observation {
    pub const PREFIX: &'static str = "Observation: ";
    pub const ERROR_PREFIX: &'static str = "Observation: Tool Execution Error: ";

    pub fn success(value: impl std::fmt::Display) -> Self {
        Observation::Success(value.to_string())
    }

    pub fn error(description: impl std::fmt::Display) -> Self {
        Observation::Error(description.to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Observation::Error(_))
    }

    /// The text appended to the history.
    pub fn text(&self) -> String {
        match self {
            Observation::Success(value) => format!("{}{value}", Self::PREFIX),
            Observation::Error(description) => format!("{}{description}", Self::ERROR_PREFIX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_formats() {
        assert_eq!(Observation::success(579).text(), "Observation: 579");
        let err = Observation::error("tool `nope` not registered");
        assert_eq!(
            err.text(),
            "Observation: Tool Execution Error: tool `nope` not registered"
        );
        assert!(err.is_error());
        assert!(!Observation::success("ok").is_error());
    }

    #[test]
    fn error_looking_tool_output_is_still_a_success() {
        let observation = Observation::success("Tool Execution Error: x");
        assert!(!observation.is_error());
        assert_eq!(
            observation.text(),
            "Observation: Tool Execution Error: x"
        );
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::observation(&Observation::success(1))).unwrap();
        assert_eq!(json, r#"{"role":"observation","content":"Observation: 1"}"#);
    }
}
