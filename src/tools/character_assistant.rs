use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::store::CharacterProfile;
use crate::studio::{AssistantRequest, Studio};
use crate::tools::{authenticate, json_result};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CharacterAssistantRequest {
    #[schemars(description = "Token de sessão do usuário")]
    pub access_token: String,
    #[schemars(description = "Pergunta ou pedido para o assistente")]
    pub message: String,
    #[schemars(description = "Personagem salvo a considerar (id)")]
    pub character_id: Option<String>,
    #[schemars(description = "Dados do personagem, quando ainda não foi salvo")]
    pub character_data: Option<CharacterProfile>,
}

pub async fn character_assistant(
    studio: &Studio,
    Parameters(request): Parameters<CharacterAssistantRequest>,
) -> Result<CallToolResult, McpError> {
    let user = authenticate(studio, &request.access_token).await?;
    let character_data = match request.character_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Some(studio.repository().get_character(&user, id).await?.profile),
        _ => request.character_data,
    };
    let reply = studio
        .character_assistant(AssistantRequest {
            message: request.message,
            character_data,
        })
        .await?;
    json_result(&reply)
}
