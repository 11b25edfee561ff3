use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Url};
use tokio_util::sync::CancellationToken;

use super::base::{ChatStream, Provider};
use super::configs::DeepSeekProviderConfig;
use super::utils::{
    api_error_message, build_chat_payload, decode_stream_data, messages_to_openai_spec,
};
use crate::errors::{ChatError, ChatResult};
use crate::models::event::StreamEvent;
use crate::models::message::Message;
use crate::models::options::GenerationOptions;

pub const DEEPSEEK_HOST: &str = "https://api.deepseek.com";
pub const DEEPSEEK_MODEL: &str = "deepseek-chat";

pub struct DeepSeekProvider {
    client: Client,
    config: DeepSeekProviderConfig,
    url: Url,
}

impl DeepSeekProvider {
    pub fn new(config: DeepSeekProviderConfig) -> ChatResult<Self> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(ChatError::MissingCredential);
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| ChatError::InvalidCredential(e.to_string()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let url = Url::parse(&format!(
            "{}/chat/completions",
            config.host.trim_end_matches('/')
        ))
        .map_err(|e| ChatError::Client(format!("invalid host {:?}: {}", config.host, e)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ChatError::Client(e.to_string()))?;

        Ok(Self {
            client,
            config,
            url,
        })
    }
}

impl Provider for DeepSeekProvider {
    fn stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
        cancel: CancellationToken,
    ) -> ChatResult<ChatStream> {
        let model = options.model().unwrap_or(&self.config.model);
        let messages_spec =
            messages_to_openai_spec(messages, self.config.system_prompt.as_deref());
        let payload = build_chat_payload(model, messages_spec, options);
        let body =
            serde_json::to_vec(&payload).map_err(|e| ChatError::Serialization(e.to_string()))?;

        tracing::debug!(
            url = %self.url,
            model = %model,
            messages = messages.len(),
            "prepared chat request"
        );

        let request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .body(body);

        Ok(Box::pin(stream_completion(request, cancel)))
    }
}

/// Send the request and turn the SSE body into stream events.
///
/// Every await is raced against `cancel`; once it fires the stream ends
/// without yielding anything else and the response is dropped, which closes
/// the connection.
fn stream_completion(
    request: RequestBuilder,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    async_stream::stream! {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            response = request.send() => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("DeepSeek request failed: {}", e);
                yield StreamEvent::Error(ChatError::from(e).to_string());
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                body = response.text() => body.unwrap_or_default(),
            };
            let err = ChatError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            };
            tracing::error!("{}", err);
            yield StreamEvent::Error(err.to_string());
            return;
        }

        let mut events = response.bytes_stream().eventsource();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                next = events.next() => next,
            };

            match next {
                // The server closed the body without a [DONE] marker
                None => {
                    yield StreamEvent::Complete;
                    return;
                }
                Some(Err(e)) => {
                    tracing::error!("DeepSeek stream failed: {}", e);
                    yield StreamEvent::Error(ChatError::Transport(e.to_string()).to_string());
                    return;
                }
                Some(Ok(event)) => match decode_stream_data(&event.data) {
                    Ok(Some(event)) => {
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::error!("{}", e);
                        yield StreamEvent::Error(e.to_string());
                        return;
                    }
                },
            }
        }
    }
}
