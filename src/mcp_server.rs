use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::studio::Studio;
use crate::tools::{
    CharacterAssistantRequest, EditImageRequest, GenerateGifRequest, GenerateImageRequest,
    ListGalleryRequest,
};

#[derive(Clone)]
pub struct StudioServer {
    tool_router: ToolRouter<Self>,
    studio: Arc<Studio>,
}

impl StudioServer {
    pub fn new(studio: Arc<Studio>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            studio,
        }
    }
}

#[tool_router]
impl StudioServer {
    #[tool(
        description = "Gera uma imagem a partir do prompt, gênero, filtros e estilo, e salva na galeria do usuário. Avise que pode demorar; mostre o resultado com ![](url)"
    )]
    async fn generate_image(
        &self,
        Parameters(request): Parameters<GenerateImageRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::generate_image(&self.studio, Parameters(request)).await
    }

    #[tool(
        description = "Gera os quadros de uma animação curta (GIF) e salva o primeiro quadro na galeria. Avise que pode demorar"
    )]
    async fn generate_gif(
        &self,
        Parameters(request): Parameters<GenerateGifRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::generate_gif(&self.studio, Parameters(request)).await
    }

    #[tool(
        description = "Edita uma imagem com precisão cirúrgica, alterando apenas o que foi pedido. Mostre o resultado com ![](url)"
    )]
    async fn edit_image(
        &self,
        Parameters(request): Parameters<EditImageRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::edit_image(&self.studio, Parameters(request)).await
    }

    #[tool(description = "Sugere descrições visuais detalhadas para um personagem")]
    async fn character_assistant(
        &self,
        Parameters(request): Parameters<CharacterAssistantRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::character_assistant(&self.studio, Parameters(request)).await
    }

    #[tool(description = "Lista imagens, GIFs ou sequências de quadros da galeria do usuário, mais recentes primeiro")]
    async fn list_gallery(
        &self,
        Parameters(request): Parameters<ListGalleryRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::list_gallery(&self.studio, Parameters(request)).await
    }
}

#[tool_handler]
impl ServerHandler for StudioServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Ferramentas de geração e edição de imagens. Toda chamada precisa do access_token da sessão do usuário."
                    .into(),
            ),
            ..Default::default()
        }
    }
}
