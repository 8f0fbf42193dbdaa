use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("tool `{0}` not registered")]
    ToolNotFound(String),

    #[error("invalid arguments for tool `{name}`: {message}")]
    ToolArguments { name: String, message: String },

    #[error("tool `{name}` invocation failed: {source}")]
    ToolInvocation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl AgentError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::LanguageModel(_))
    }

    pub fn arguments(name: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::ToolArguments {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_transient() {
        assert!(AgentError::LanguageModel("timeout".into()).is_transient());
        assert!(!AgentError::MalformedResponse("no choices".into()).is_transient());
        assert!(!AgentError::Configuration("missing key".into()).is_transient());
    }

    #[test]
    fn argument_errors_name_the_tool() {
        let err = AgentError::arguments("add_numbers", "missing `a`");
        assert_eq!(
            err.to_string(),
            "invalid arguments for tool `add_numbers`: missing `a`"
        );
    }
}
