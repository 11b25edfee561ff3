use std::time::Duration;

use super::deepseek::{DEEPSEEK_HOST, DEEPSEEK_MODEL};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Onir, a friendly AI assistant.";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct DeepSeekProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    /// Prepended as a system message unless the conversation already starts with one
    pub system_prompt: Option<String>,
    pub timeout: Duration,
}

impl DeepSeekProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: DEEPSEEK_HOST.to_string(),
            api_key: api_key.into(),
            model: DEEPSEEK_MODEL.to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for DeepSeekProviderConfig {
    fn default() -> Self {
        Self::new("")
    }
}
