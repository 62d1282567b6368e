use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::studio::{GenerateRequest, Studio};
use crate::tools::{ToolResponse, authenticate, json_result, mime_type_for};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImageRequest {
    #[schemars(description = "Token de sessão do usuário")]
    pub access_token: String,
    #[serde(flatten)]
    pub request: GenerateRequest,
}

pub async fn generate_image(
    studio: &Studio,
    Parameters(request): Parameters<GenerateImageRequest>,
) -> Result<CallToolResult, McpError> {
    let user = authenticate(studio, &request.access_token).await?;
    let image = studio.generate_image(&user, request.request).await?;
    json_result(&ToolResponse {
        mime_type: mime_type_for(&image.image_url).to_string(),
        url: image.image_url,
        name: format!("image-{}", image.id),
        text: "Imagem gerada e salva na galeria.".to_string(),
    })
}
