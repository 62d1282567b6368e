//! Client for the hosted multimodal gateway (chat-completion shaped API).

pub mod fallback;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use fallback::{AttemptFailure, Success, run_with_fallback};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }
}

/// Request body minus the model, which the dispatcher fills per attempt.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub want_image: bool,
    pub quality: Option<String>,
}

impl ChatRequest {
    pub fn image(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            want_image: true,
            quality: None,
        }
    }

    pub fn text(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            want_image: false,
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    fn body<'a>(&'a self, model: &'a str) -> RequestBody<'a> {
        RequestBody {
            model,
            messages: &self.messages,
            modalities: self.want_image.then_some(&["image", "text"]),
            quality: self.quality.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    modalities: Option<&'static [&'static str; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<GatewayErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
    images: Option<Vec<ReplyImage>>,
}

#[derive(Debug, Deserialize)]
struct ReplyImage {
    image_url: Option<ImageUrl>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    message: Option<String>,
}

/// What a successful gateway call carried back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub text: Option<String>,
    pub image_url: Option<String>,
}

impl ChatReply {
    pub fn into_image(self) -> Result<String, AttemptFailure> {
        self.image_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AttemptFailure::MissingPayload("Nenhuma imagem retornada pela API".into()))
    }

    pub fn into_text(self) -> Result<String, AttemptFailure> {
        self.text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AttemptFailure::MissingPayload("Nenhum texto retornado pela API".into()))
    }
}

fn parse_reply(raw: &str) -> Result<ChatReply, AttemptFailure> {
    let payload: ChatCompletionResponse = serde_json::from_str(raw).map_err(|err| {
        AttemptFailure::MissingPayload(format!("resposta inválida do gateway: {err}"))
    })?;
    if let Some(message) = payload.error.and_then(|err| err.message) {
        return Err(AttemptFailure::MissingPayload(message));
    }
    let message = payload
        .choices
        .and_then(|choices| choices.into_iter().next())
        .and_then(|choice| choice.message);
    let Some(message) = message else {
        return Ok(ChatReply::default());
    };
    let image_url = message
        .images
        .and_then(|images| images.into_iter().next())
        .and_then(|image| image.image_url)
        .map(|image| image.url);
    Ok(ChatReply {
        text: message.content,
        image_url,
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// One call against one model; the seam the dispatcher and tests use.
#[async_trait]
pub trait ImageGateway: Send + Sync {
    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatReply, AttemptFailure>;
}

#[derive(Clone, Debug)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ImageGateway for GatewayClient {
    async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatReply, AttemptFailure> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request.body(model))
            .send()
            .await
            .map_err(|err| AttemptFailure::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AttemptFailure::Transport(err.to_string()))?;
        if !status.is_success() {
            tracing::debug!(model, status = status.as_u16(), body = %body, "gateway error body");
            return Err(AttemptFailure::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        parse_reply(&body)
    }
}
