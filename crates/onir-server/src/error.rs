use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {env_var}: {message}")]
    InvalidEnvVar { env_var: String, message: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a configuration key like `provider.api_key` to the variable that sets it
pub fn to_env_var(field_path: &str) -> String {
    format!("ONIR_{}", field_path.replace('.', "__").to_uppercase())
}
