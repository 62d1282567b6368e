pub mod character_assistant;
pub mod edit_image;
pub mod generate_gif;
pub mod generate_image;
pub mod list_gallery;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::store::AuthUser;
use crate::studio::Studio;

#[derive(Serialize)]
pub struct ToolResponse {
    pub url: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

pub use character_assistant::{CharacterAssistantRequest, character_assistant};
pub use edit_image::{EditImageRequest, edit_image};
pub use generate_gif::{GenerateGifRequest, generate_gif};
pub use generate_image::{GenerateImageRequest, generate_image};
pub use list_gallery::{ListGalleryRequest, list_gallery};

/// Resolves the caller from the session token every tool carries.
async fn authenticate(studio: &Studio, access_token: &str) -> Result<AuthUser, McpError> {
    Ok(studio.repository().authenticate(access_token).await?)
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string(value).map_err(|err| {
        McpError::internal_error(
            "serialize tool response failed",
            Some(serde_json::Value::String(err.to_string())),
        )
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn mime_type_for(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}
