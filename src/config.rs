use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ModelConfig {
    /// The configured API key, or a configuration error when it is missing or blank.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(AgentError::Configuration(
                "API key not found. Please set the DEEPSEEK_API_KEY environment variable.".into(),
            )),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Overrides the generated ReAct system prompt when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            system_prompt: None,
        }
    }
}

fn default_max_steps() -> usize {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AgentError::Configuration(format!("Failed to read {}: {err}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|err| AgentError::Configuration(format!("Failed to parse configuration: {err}")))
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(|key| env::var(key).ok());
        cfg
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env(|key| env::var(key).ok());
        Ok(cfg)
    }

    /// Apply overrides from `lookup`. Unparsable numbers are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("DEEPSEEK_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(url) = lookup("DEEPSEEK_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(model) = lookup("DEEPSEEK_MODEL") {
            self.model.model = model;
        }
        if let Some(steps) = lookup("REACT_AGENT_MAX_STEPS") {
            if let Ok(parsed) = steps.parse::<usize>() {
                self.agent.max_steps = parsed;
            }
        }
        if let Some(retries) = lookup("REACT_AGENT_MAX_RETRIES") {
            if let Ok(parsed) = retries.parse::<u32>() {
                self.model.max_retries = parsed;
            }
        }
        if let Some(timeout) = lookup("REACT_AGENT_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.model.request_timeout_secs = parsed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_endpoint() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.model.base_url, "https://api.deepseek.com/v1");
        assert_eq!(cfg.model.model, "deepseek-chat");
        assert_eq!(cfg.model.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.model.max_retries, 3);
        assert_eq!(cfg.agent.max_steps, 5);
    }

    #[test]
    fn loads_and_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[model]\nmodel='deepseek-reasoner'\nmax_retries=5\n[agent]\nmax_steps=8"
        )
        .unwrap();

        let mut cfg = AppConfig::from_file(file.path()).unwrap();
        cfg.apply_env(lookup_from(&[
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("REACT_AGENT_MAX_STEPS", "3"),
            ("REACT_AGENT_TIMEOUT_SECS", "not-a-number"),
        ]));

        assert_eq!(cfg.model.model, "deepseek-reasoner");
        assert_eq!(cfg.model.max_retries, 5);
        assert_eq!(cfg.model.request_timeout_secs, 30);
        assert_eq!(cfg.agent.max_steps, 3);
        assert_eq!(cfg.model.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn missing_or_blank_key_is_a_configuration_error() {
        let mut cfg = ModelConfig::default();
        assert!(matches!(
            cfg.require_api_key(),
            Err(AgentError::Configuration(_))
        ));
        cfg.api_key = Some("   ".into());
        assert!(matches!(
            cfg.require_api_key(),
            Err(AgentError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_toml_is_a_configuration_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[model\nmodel=").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(AgentError::Configuration(_))
        ));
    }
}
