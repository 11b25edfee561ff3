use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generation options forwarded to the chat completion API as-is
///
/// Recognized keys are whatever the API accepts (`temperature`, `model`,
/// `max_tokens`, ...). Nothing here is validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationOptions(Map<String, Value>);

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The model requested by the caller, if any
    pub fn model(&self) -> Option<&str> {
        self.0.get("model").and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_pass_through() {
        let options: GenerationOptions =
            serde_json::from_value(json!({"temperature": 0.7, "model": "deepseek-reasoner"}))
                .unwrap();
        assert_eq!(options.model(), Some("deepseek-reasoner"));
        assert_eq!(options.get("temperature"), Some(&json!(0.7)));
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"temperature": 0.7, "model": "deepseek-reasoner"})
        );
    }
}
