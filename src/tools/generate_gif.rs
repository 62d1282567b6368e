use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::studio::{GenerateRequest, Studio};
use crate::tools::{authenticate, json_result};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateGifRequest {
    #[schemars(description = "Token de sessão do usuário")]
    pub access_token: String,
    #[serde(flatten)]
    pub request: GenerateRequest,
}

pub async fn generate_gif(
    studio: &Studio,
    Parameters(request): Parameters<GenerateGifRequest>,
) -> Result<CallToolResult, McpError> {
    let user = authenticate(studio, &request.access_token).await?;
    let outcome = studio.generate_gif(&user, request.request).await?;
    json_result(&outcome)
}
