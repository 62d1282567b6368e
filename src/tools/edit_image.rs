use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::studio::{EditRequest, Studio};
use crate::tools::{ToolResponse, authenticate, json_result, mime_type_for};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditImageRequest {
    #[schemars(description = "Token de sessão do usuário")]
    pub access_token: String,
    #[schemars(description = "URL http(s) ou data URL da imagem a editar")]
    pub image_url: String,
    #[schemars(description = "Alterações desejadas")]
    pub edit_prompt: String,
}

pub async fn edit_image(
    studio: &Studio,
    Parameters(request): Parameters<EditImageRequest>,
) -> Result<CallToolResult, McpError> {
    let user = authenticate(studio, &request.access_token).await?;
    tracing::info!(user = %user.id, "edit requested over mcp");
    let outcome = studio
        .edit_image(EditRequest {
            image_url: request.image_url,
            edit_prompt: request.edit_prompt,
        })
        .await?;
    json_result(&ToolResponse {
        mime_type: mime_type_for(&outcome.edited_image_url).to_string(),
        url: outcome.edited_image_url,
        name: "edited-image".to_string(),
        text: format!("Imagem editada com {}.", outcome.model),
    })
}
