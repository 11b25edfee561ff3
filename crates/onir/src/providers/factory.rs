use super::{base::Provider, configs::DeepSeekProviderConfig, deepseek::DeepSeekProvider};
use crate::errors::ChatResult;

/// Builds a provider for a given API credential.
///
/// The broker creates one provider per request because the credential is
/// supplied by the caller with every chat.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, credential: &str) -> ChatResult<Box<dyn Provider>>;
}

pub struct DeepSeekFactory {
    template: DeepSeekProviderConfig,
}

impl DeepSeekFactory {
    /// `template.api_key` is ignored; every provider gets the credential passed to `create`.
    pub fn new(template: DeepSeekProviderConfig) -> Self {
        Self { template }
    }
}

impl ProviderFactory for DeepSeekFactory {
    fn create(&self, credential: &str) -> ChatResult<Box<dyn Provider>> {
        let config = DeepSeekProviderConfig {
            api_key: credential.to_string(),
            ..self.template.clone()
        };
        Ok(Box::new(DeepSeekProvider::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ChatError;

    #[test]
    fn test_factory_rejects_blank_credential() {
        let factory = DeepSeekFactory::new(DeepSeekProviderConfig::default());
        assert_eq!(factory.create("   ").err(), Some(ChatError::MissingCredential));
        assert!(factory.create("sk-test").is_ok());
    }

    #[test]
    fn test_factory_rejects_bad_host() {
        let factory =
            DeepSeekFactory::new(DeepSeekProviderConfig::default().with_host("not a url"));
        assert!(matches!(factory.create("sk-test"), Err(ChatError::Client(_))));
    }
}
