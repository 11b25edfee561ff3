use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use onir::providers::{
    configs::{DeepSeekProviderConfig, DEFAULT_SYSTEM_PROMPT},
    deepseek::{DEEPSEEK_HOST, DEEPSEEK_MODEL},
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidEnvVar {
                env_var: to_env_var("server.host"),
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_host")]
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Used when a chat request does not carry its own key
    #[serde(default)]
    pub api_key: Option<String>,
    /// An empty prompt disables the system message
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            host: default_provider_host(),
            model: default_model(),
            api_key: None,
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    // Convert to the template the provider factory clones for each request
    pub fn to_config(&self) -> DeepSeekProviderConfig {
        let system_prompt = Some(self.system_prompt.trim().to_string()).filter(|p| !p.is_empty());
        DeepSeekProviderConfig::default()
            .with_host(self.host.clone())
            .with_model(self.model.clone())
            .with_system_prompt(system_prompt)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.host", default_provider_host())?
            .set_default("provider.model", default_model())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("ONIR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Settings>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Point at the variable that holds the bad value when we know it
                match &err {
                    config::ConfigError::Type {
                        key: Some(key), ..
                    } => Err(ConfigError::InvalidEnvVar {
                        env_var: to_env_var(key),
                        message: err.to_string(),
                    }),
                    _ => Err(ConfigError::Other(err)),
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_provider_host() -> String {
    DEEPSEEK_HOST.to_string()
}

fn default_model() -> String {
    DEEPSEEK_MODEL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_timeout_secs() -> u64 {
    600
}
