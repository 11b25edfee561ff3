use anyhow::Result;
use dotenv::dotenv;
use futures::StreamExt;
use onir::{
    models::{event::StreamEvent, message::Message, options::GenerationOptions},
    providers::{
        configs::DeepSeekProviderConfig,
        factory::{DeepSeekFactory, ProviderFactory},
    },
};
use tokio_util::sync::CancellationToken;

fn load_env() {
    if let Ok(path) = dotenv() {
        println!("Loaded environment from {:?}", path);
    }
}

// Integration test against the real DeepSeek API
#[tokio::test]
async fn test_deepseek_provider() -> Result<()> {
    load_env();

    // Skip if credentials aren't available
    let Ok(api_key) = std::env::var("DEEPSEEK_API_KEY") else {
        println!("Skipping DeepSeek tests - credentials not configured");
        return Ok(());
    };

    let mut config = DeepSeekProviderConfig::default();
    if let Ok(host) = std::env::var("DEEPSEEK_HOST") {
        config = config.with_host(host);
    }
    if let Ok(model) = std::env::var("DEEPSEEK_MODEL") {
        config = config.with_model(model);
    }

    let provider = DeepSeekFactory::new(config).create(&api_key)?;
    let events: Vec<StreamEvent> = provider
        .stream(
            &[Message::user("Just say hello!")],
            &GenerationOptions::new().with("max_tokens", 16),
            CancellationToken::new(),
        )?
        .collect()
        .await;

    assert!(
        events
            .iter()
            .any(|event| matches!(event, StreamEvent::Chunk(_))),
        "Expected at least one chunk, got {:?}",
        events
    );
    assert_eq!(events.last(), Some(&StreamEvent::Complete));

    Ok(())
}
