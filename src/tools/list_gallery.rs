use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::store::ArtifactKind;
use crate::studio::Studio;
use crate::tools::{authenticate, json_result};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListGalleryRequest {
    #[schemars(description = "Token de sessão do usuário")]
    pub access_token: String,
    #[schemars(description = "image, gif ou frames")]
    pub kind: ArtifactKind,
    #[schemars(description = "Apenas itens marcados como salvos")]
    #[serde(default)]
    pub saved_only: bool,
    #[schemars(description = "Quantidade máxima, padrão 20")]
    pub limit: Option<u32>,
}

pub async fn list_gallery(
    studio: &Studio,
    Parameters(request): Parameters<ListGalleryRequest>,
) -> Result<CallToolResult, McpError> {
    let user = authenticate(studio, &request.access_token).await?;
    let limit = request.limit.unwrap_or(20).max(1) as usize;
    let repository = studio.repository();
    let saved_only = request.saved_only;
    let rows = match request.kind {
        ArtifactKind::Image => {
            let rows = repository.list_images(&user).await?;
            to_values(rows.into_iter().filter(|row| !saved_only || row.saved), limit)?
        }
        ArtifactKind::Gif => {
            let rows = repository.list_gifs(&user).await?;
            to_values(rows.into_iter().filter(|row| !saved_only || row.saved), limit)?
        }
        ArtifactKind::Frames => {
            let rows = repository.list_frames(&user).await?;
            to_values(rows.into_iter().filter(|row| !saved_only || row.saved), limit)?
        }
    };
    json_result(&rows)
}

fn to_values<T: serde::Serialize>(
    rows: impl Iterator<Item = T>,
    limit: usize,
) -> Result<Vec<serde_json::Value>, McpError> {
    rows.take(limit)
        .map(|row| {
            serde_json::to_value(row).map_err(|err| {
                McpError::internal_error(
                    "serialize gallery row failed",
                    Some(serde_json::Value::String(err.to_string())),
                )
            })
        })
        .collect()
}
