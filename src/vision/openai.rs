//! OpenAI-compatible chat-completions client.
//!
//! Zhipu, Qwen (DashScope compatible mode) and OpenAI all accept the same
//! `POST {base_url}/chat/completions` body with a text part and a base64 data-URL image
//! part, so one client covers all three. The vendor only decides the defaults.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::VisionClient;
use crate::config::{ProviderKind, ProviderOptions};
use crate::error::{ReviewError, VisionError};

/// Blocking chat-completions client with vision input.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    kind: ProviderKind,
}

impl ChatCompletionsClient {
    pub fn new(
        kind: ProviderKind,
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ReviewError> {
        if api_key.trim().is_empty() {
            return Err(ReviewError::client_init(kind.name(), "missing API key"));
        }
        if model.trim().is_empty() {
            return Err(ReviewError::client_init(kind.name(), "missing model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| ReviewError::client_init(kind.name(), format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ReviewError::client_init(kind.name(), format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            kind,
        })
    }

    /// Build a client from the `[provider]` section, resolving the API key.
    pub fn from_options(opts: &ProviderOptions) -> Result<Self, ReviewError> {
        let api_key = opts.resolve_api_key().ok_or_else(|| {
            ReviewError::client_init(
                opts.kind.name(),
                format!("no API key: set provider.api_key or ${}", opts.api_key_env),
            )
        })?;
        Self::new(
            opts.kind,
            &api_key,
            opts.base_url(),
            opts.model(),
            Duration::from_secs(opts.timeout_secs),
        )
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Text-only round trip to check credentials and reachability.
    pub fn test_connection(&self) -> Result<String, VisionError> {
        let body = build_request_body(&self.model, "Reply with the single word OK.", None);
        self.send(&body)
    }

    fn send(&self, body: &ChatRequest<'_>) -> Result<String, VisionError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .map_err(|e| VisionError::Transient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status(status, text));
        }

        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| VisionError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| VisionError::MalformedResponse("response has no message content".to_string()))
    }
}

impl VisionClient for ChatCompletionsClient {
    fn complete(&self, prompt: &str, image_jpeg: &[u8]) -> Result<String, VisionError> {
        let data_url = format!(
            "data:image/jpeg;base64,{}",
            general_purpose::STANDARD.encode(image_jpeg)
        );
        let body = build_request_body(&self.model, prompt, Some(data_url));
        debug!(model = %self.model, image_bytes = image_jpeg.len(), "sending review request");
        self.send(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Map a non-success HTTP status onto retry-or-abort.
pub(crate) fn classify_status(status: StatusCode, body: String) -> VisionError {
    let code = status.as_u16();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        VisionError::Unauthorized { status: code, message: body }
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        VisionError::Transient(format!("HTTP {code}: {body}"))
    } else {
        VisionError::InvalidRequest { status: code, message: body }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

pub(crate) fn build_request_body<'a>(model: &'a str, prompt: &'a str, image_url: Option<String>) -> ChatRequest<'a> {
    let mut content = vec![ContentPart::Text { text: prompt }];
    if let Some(url) = image_url {
        content.push(ContentPart::ImageUrl {
            image_url: ImageUrl { url },
        });
    }
    ChatRequest {
        model,
        messages: vec![ChatMessage { role: "user", content }],
        temperature: 0.0,
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_has_text_then_image() {
        let body = build_request_body("glm-4v-flash", "look", Some("data:image/jpeg;base64,AAAA".into()));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "glm-4v-flash");
        assert_eq!(json["temperature"], 0.0);
        let content = &json["messages"][0]["content"];
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "look");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn text_only_body_for_ping() {
        let body = build_request_body("m", "ping", None);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new()),
            VisionError::Unauthorized { status: 401, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, String::new()),
            VisionError::Unauthorized { status: 403, .. }
        ));
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, String::new()),
            VisionError::InvalidRequest { status: 400, .. }
        ));
    }

    #[test]
    fn response_content_is_extracted() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
    }

    #[test]
    fn missing_key_fails_construction() {
        let opts = ProviderOptions {
            api_key: None,
            api_key_env: "CLIP_REVIEW_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ProviderOptions::default()
        };
        let err = ChatCompletionsClient::from_options(&opts).err().unwrap();
        assert!(matches!(err, ReviewError::ClientInit { .. }));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = ChatCompletionsClient::new(
            ProviderKind::Qwen,
            "sk-test",
            "https://example.invalid/v1/",
            "qwen-vl-plus",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.endpoint, "https://example.invalid/v1/chat/completions");
        assert_eq!(client.model(), "qwen-vl-plus");
    }
}
