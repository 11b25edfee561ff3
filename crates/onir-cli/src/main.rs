use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use onir::models::options::GenerationOptions;
use onir::providers::configs::DeepSeekProviderConfig;
use onir::providers::deepseek::{DEEPSEEK_HOST, DEEPSEEK_MODEL};
use onir::providers::factory::DeepSeekFactory;
use onir::Broker;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

mod prompt;
mod session;

use prompt::cliclack::CliclackPrompt;
use session::{Session, TurnOutcome};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// DeepSeek API key (can also be set via DEEPSEEK_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// API host (can also be set via DEEPSEEK_HOST environment variable)
    #[arg(long)]
    host: Option<String>,

    /// Model to use (can also be set via DEEPSEEK_MODEL environment variable)
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt sent ahead of the conversation, empty to disable
    #[arg(long)]
    system_prompt: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f64>,

    /// Extra generation option as key=value, the value is parsed as JSON when possible
    #[arg(short = 'o', long = "option", value_parser = parse_option)]
    options: Vec<(String, Value)>,

    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    prompt: Option<String>,
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in `{}`", raw));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

impl Cli {
    fn provider_config(&self) -> DeepSeekProviderConfig {
        let host = self
            .host
            .clone()
            .or_else(|| env::var("DEEPSEEK_HOST").ok())
            .unwrap_or_else(|| DEEPSEEK_HOST.to_string());
        let model = self
            .model
            .clone()
            .or_else(|| env::var("DEEPSEEK_MODEL").ok())
            .unwrap_or_else(|| DEEPSEEK_MODEL.to_string());

        let config = DeepSeekProviderConfig::default()
            .with_host(host)
            .with_model(model);
        match &self.system_prompt {
            Some(prompt) if prompt.trim().is_empty() => config.with_system_prompt(None),
            Some(prompt) => config.with_system_prompt(Some(prompt.clone())),
            None => config,
        }
    }

    fn api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| env::var("DEEPSEEK_API_KEY").ok())
            .context(
                "API key must be provided via --api-key or DEEPSEEK_API_KEY environment variable",
            )
    }

    fn generation_options(&self) -> GenerationOptions {
        let options = self
            .temperature
            .into_iter()
            .fold(GenerationOptions::new(), |options, temperature| {
                options.with("temperature", temperature)
            });
        self.options
            .iter()
            .fold(options, |options, (key, value)| {
                options.with(key.clone(), value.clone())
            })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with the streamed reply
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let api_key = cli.api_key()?;

    let factory = DeepSeekFactory::new(cli.provider_config());
    let (broker, rx) = Broker::new(Arc::new(factory));
    let broker = Arc::new(broker);

    let mut session = Session::new(broker.clone(), rx, Box::new(CliclackPrompt::new()), api_key)
        .with_options(cli.generation_options());

    match cli.prompt {
        Some(message) => match session.headless_start(message).await {
            TurnOutcome::Completed => Ok(()),
            TurnOutcome::Interrupted => Ok(()),
            TurnOutcome::Failed(message) => bail!(message),
        },
        None => {
            println!(
                "Onir CLI {}",
                style("- type \"exit\" to end the session").dim()
            );
            session.start().await?;
            broker.cancel_all();
            Ok(())
        }
    }
}
