//! vLLM chat-completion client

use crate::config::VllmConfig;
use crate::error::{Error, Result};
use crate::provider::types::*;
use futures::StreamExt;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

/// Client for an OpenAI-compatible chat-completions endpoint (vLLM)
#[derive(Clone)]
pub struct VllmClient {
    /// HTTP client
    client: Client,
    /// Base URL with any trailing slash stripped
    base_url: String,
    /// Model name sent with every request
    model: String,
    /// Sampling temperature
    temperature: f32,
    /// Max tokens per completion
    max_tokens: u32,
}

impl VllmClient {
    /// Create a new client from configuration
    pub fn new(config: &VllmConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!(
                "Bearer {}",
                config.api_key.expose_secret()
            ))
            .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(VllmClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// The configured model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Create a chat completion.
    ///
    /// With `stream = true` the server-sent chunks are accumulated into one
    /// whole response; callers always receive the complete message.
    pub async fn chat_completion(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
        stream: bool,
    ) -> Result<ChatCompletionResponse> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
            tools,
        };

        if stream {
            self.send_streaming_request(request).await
        } else {
            self.send_request(request).await
        }
    }

    /// Extract the first choice's message text.
    ///
    /// Fails with `ModelMalformed` when the response has no choices or the
    /// message carries no content.
    pub fn message_text(response: &ChatCompletionResponse) -> Result<String> {
        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| Error::ModelMalformed("response has no message content".to_string()))
    }

    /// Extract the first choice's native tool-call array (possibly empty)
    pub fn native_tool_calls(response: &ChatCompletionResponse) -> Vec<AssistantToolCall> {
        response
            .choices
            .first()
            .and_then(|c| c.message.tool_calls.clone())
            .unwrap_or_default()
    }

    async fn send_request(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!("Sending chat completion request: model={}", request.model);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            let body: ChatCompletionResponse = serde_json::from_str(&text)
                .map_err(|e| Error::ModelMalformed(format!("{}: {}", e, preview(&text))))?;

            if let Some(ref usage) = body.usage {
                info!(
                    "Chat completion: model={}, tokens={}",
                    body.model, usage.total_tokens
                );
            }

            Ok(body)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Model endpoint returned {}: {}", status, preview(&error_text));
            Err(Error::ModelError {
                status: status.as_u16(),
                message: extract_error_message(&error_text),
            })
        }
    }

    /// Send a streaming request and fold the SSE chunks into one response.
    async fn send_streaming_request(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::ModelError {
                status: status.as_u16(),
                message: extract_error_message(&error_text),
            });
        }

        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut byte_stream = response.bytes_stream();

        while let Some(bytes) = byte_stream.next().await {
            let bytes = bytes?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            // Process complete lines, keep the partial tail in the buffer
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data.trim() == "[DONE]" {
                    return accumulate_chunks(&chunks);
                }
                match serde_json::from_str::<ChatCompletionChunk>(data) {
                    Ok(chunk) => chunks.push(chunk),
                    Err(e) => debug!("Skipping unparseable SSE chunk: {}", e),
                }
            }
        }

        accumulate_chunks(&chunks)
    }
}

/// Fold streamed chunks into a whole `ChatCompletionResponse`.
fn accumulate_chunks(chunks: &[ChatCompletionChunk]) -> Result<ChatCompletionResponse> {
    if chunks.is_empty() {
        return Err(Error::ModelMalformed(
            "stream ended without any chunks".to_string(),
        ));
    }

    let mut content = String::new();
    let mut finish_reason = None;
    let mut tool_calls: Vec<AssistantToolCall> = Vec::new();

    for chunk in chunks {
        for choice in &chunk.choices {
            if let Some(ref delta) = choice.delta.content {
                content.push_str(delta);
            }
            if let Some(reason) = choice.finish_reason.clone() {
                finish_reason = Some(reason);
            }
            for delta in choice.delta.tool_calls.iter().flatten() {
                let index = delta.index as usize;
                while tool_calls.len() <= index {
                    tool_calls.push(AssistantToolCall {
                        id: String::new(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: String::new(),
                            arguments: String::new(),
                        },
                    });
                }
                let call = &mut tool_calls[index];
                if let Some(ref id) = delta.id {
                    call.id = id.clone();
                }
                if let Some(ref function) = delta.function {
                    if let Some(ref name) = function.name {
                        call.function.name = name.clone();
                    }
                    if let Some(ref arguments) = function.arguments {
                        call.function.arguments.push_str(arguments);
                    }
                }
            }
        }
    }

    Ok(ChatCompletionResponse {
        id: chunks[0].id.clone(),
        model: chunks[0].model.clone(),
        choices: vec![Choice {
            index: 0,
            message: Message {
                role: Role::Assistant,
                content: if content.is_empty() {
                    None
                } else {
                    Some(content)
                },
                tool_call_id: None,
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            },
            finish_reason,
        }],
        usage: None,
    })
}

/// Pull `error.message` out of a structured error body, or fall back to the
/// raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| preview(body))
}

fn preview(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= 300 {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(300).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_config() -> VllmConfig {
        VllmConfig {
            base_url: "http://localhost:8000/v1/".to_string(),
            model: "test-model".to_string(),
            api_key: SecretString::from("dummy"),
            temperature: 0.7,
            max_tokens: 2048,
            enable_function_calling: true,
        }
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = VllmClient::new(&test_config()).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn test_message_text_missing_content() {
        let response = ChatCompletionResponse {
            id: "x".into(),
            model: "m".into(),
            choices: vec![],
            usage: None,
        };
        assert!(matches!(
            VllmClient::message_text(&response),
            Err(Error::ModelMalformed(_))
        ));
    }

    #[test]
    fn test_extract_error_message_structured() {
        let body = r#"{"error": {"message": "model not found", "type": "invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body), "model not found");
        assert_eq!(extract_error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_accumulate_chunks_merges_content_and_calls() {
        let chunks: Vec<ChatCompletionChunk> = [
            r#"{"id":"c1","model":"m","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
            r#"{"id":"c1","model":"m","choices":[{"index":0,"delta":{"content":"lo"}}]}"#,
            r#"{"id":"c1","model":"m","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"grep","arguments":"{\"pat"}}]}}]}"#,
            r#"{"id":"c1","model":"m","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"tern\":\"x\"}"}}]},"finish_reason":"tool_calls"}]}"#,
        ]
        .iter()
        .map(|s| serde_json::from_str(s).unwrap())
        .collect();

        let response = accumulate_chunks(&chunks).unwrap();
        let message = &response.choices[0].message;
        assert_eq!(message.content.as_deref(), Some("Hello"));
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "grep");
        assert_eq!(calls[0].function.arguments, r#"{"pattern":"x"}"#);
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_accumulate_empty_stream_is_malformed() {
        assert!(matches!(
            accumulate_chunks(&[]),
            Err(Error::ModelMalformed(_))
        ));
    }
}
