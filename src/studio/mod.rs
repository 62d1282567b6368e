//! Request orchestration: validation, moderation, prompt rendering, model
//! fallback, artifact caching and persistence for each generation flow.

pub mod validation;

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{LocalFileStorage, materialize_image_url};
use crate::config::GenerationSettings;
use crate::error::{StudioError, StudioResult};
use crate::gateway::{ChatMessage, ChatRequest, ImageGateway, run_with_fallback};
use crate::prompt::moderation::find_blocked_term;
use crate::prompt::style::{enhance_gif_prompt, enhance_image_prompt, frame_prompt};
use crate::prompt::{Gender, PromptRequest};
use crate::store::{
    AuthUser, CharacterProfile, GeneratedFrames, GeneratedGif, GeneratedImage, NewFrames, NewGif,
    NewImage, Repository,
};

pub use validation::validate_image_source;

const EDIT_SYSTEM_PROMPT: &str = "Você é um editor de imagens avançado com precisão cirúrgica. Siga estas regras críticas:
1. ALTERAÇÕES PRECISAS: Faça APENAS as modificações explicitamente solicitadas. Se pedirem \"mudar para gordo\", altere SOMENTE o tipo físico, mantendo tudo mais idêntico.
2. PRESERVAÇÃO TOTAL: Mantenha 100% de:
   - Identidade facial (rosto, traços, cor da pele)
   - Características não mencionadas (cabelo, olhos, roupas, acessórios)
   - Qualidade visual (resolução, iluminação, cores, textura)
   - Composição e enquadramento da cena
   - Fundo e contexto ambiental
3. CONSISTÊNCIA: A pessoa editada deve ser reconhecível como a mesma pessoa, apenas com as alterações específicas aplicadas.
4. QUALIDADE: Mantenha alta fidelidade visual. Nada de artefatos, distorções ou perda de qualidade.
5. NATURALIDADE: As alterações devem parecer naturais e coerentes com o resto da imagem.";

const ASSISTANT_SYSTEM_PROMPT: &str = "Você é um assistente especializado em criar prompts detalhados para geração de imagens de personagens.
Ajude o usuário a criar descrições visuais ricas e detalhadas baseadas nas informações do personagem fornecidas.
Seja criativo e sugira detalhes visuais como expressões faciais, poses, roupas, iluminação e cenário.

IMPORTANTE:
- Permita qualquer tipo de pose ou posição corporal (sentado, deitado, de pé, agachado, dançando, etc.)
- SEMPRE inclua descrições de roupas apropriadas para os personagens
- NUNCA sugira ou permita nudez, conteúdo explícito ou inadequado
- Todos os personagens devem estar vestidos de forma apropriada";

const UNDEFINED: &str = "Não definido";

fn default_style() -> String {
    "photorealistic".to_string()
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_quality() -> String {
    "high".to_string()
}

/// Image or GIF generation form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub prompt: PromptRequest,
    /// photorealistic, fantasy, anime, linear, art-linear-x or concept
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_quality")]
    pub quality: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramesRequest {
    pub character_id: String,
    /// What the character does across the sequence.
    pub prompt: String,
    #[serde(default = "default_style")]
    pub style: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub image_url: String,
    pub edit_prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    pub message: String,
    #[serde(default)]
    pub character_data: Option<CharacterProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GifOutcome {
    pub gif: GeneratedGif,
    pub frames: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub edited_image_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub suggestion: String,
    pub model: String,
}

fn moderate(text: &str) -> StudioResult<()> {
    match find_blocked_term(text) {
        Some(term) => {
            warn!(term, "prompt blocked by moderation");
            Err(StudioError::ContentBlocked {
                term: term.to_string(),
            })
        }
        None => Ok(()),
    }
}

fn gender_label(gender: Gender) -> &'static str {
    match gender {
        Gender::None => UNDEFINED,
        Gender::Male => "male",
        Gender::Female => "female",
    }
}

fn or_undefined(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(UNDEFINED)
}

fn assistant_system_prompt(character: Option<&CharacterProfile>) -> String {
    let Some(character) = character else {
        return ASSISTANT_SYSTEM_PROMPT.to_string();
    };
    let age = character.age.map(|age| age.to_string());
    format!(
        "{ASSISTANT_SYSTEM_PROMPT}\n\nInformações do personagem atual:\n\
- Nome: {}\n- Gênero: {}\n- Cor do cabelo: {}\n- Cor dos olhos: {}\n- Idade: {}\n- Tipo de corpo: {}\n",
        or_undefined(Some(&character.name)),
        gender_label(character.gender),
        or_undefined(character.hair_color.as_deref()),
        or_undefined(character.eye_color.as_deref()),
        or_undefined(age.as_deref()),
        or_undefined(character.body_type.as_deref()),
    )
}

pub struct Studio {
    gateway: Arc<dyn ImageGateway>,
    repository: Repository,
    storage: Arc<LocalFileStorage>,
    settings: GenerationSettings,
}

impl Studio {
    pub fn new(
        gateway: Arc<dyn ImageGateway>,
        repository: Repository,
        storage: Arc<LocalFileStorage>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            gateway,
            repository,
            storage,
            settings,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// One image through the image model list, cached if it came back inline.
    async fn render_image(&self, request: &ChatRequest) -> StudioResult<String> {
        let success = run_with_fallback(&self.settings.image_models, |model| async move {
            self.gateway.chat(&model, request).await?.into_image()
        })
        .await?;
        materialize_image_url(&self.storage, &success.value).await
    }

    /// `count` frames rendered one after another from the same enhanced prompt.
    async fn render_sequence(&self, enhanced: &str, count: usize) -> StudioResult<Vec<String>> {
        let mut frames = Vec::with_capacity(count);
        for index in 0..count {
            let request = ChatRequest::image(vec![ChatMessage::user(frame_prompt(enhanced, index))]);
            frames.push(self.render_image(&request).await?);
            info!(frame = index + 1, total = count, "frame generated");
        }
        Ok(frames)
    }

    pub async fn generate_image(&self, user: &AuthUser, request: GenerateRequest) -> StudioResult<GeneratedImage> {
        let base = request
            .prompt
            .base_text()
            .ok_or_else(|| StudioError::invalid("Prompt é obrigatório"))?
            .to_string();
        let rendered = request.prompt.render();
        moderate(&rendered)?;

        info!(user = %user.id, style = %request.style, "generating image");
        let enhanced = enhance_image_prompt(&rendered, &request.style);
        let image_url = self
            .render_image(&ChatRequest::image(vec![ChatMessage::user(enhanced)]))
            .await?;

        self.repository
            .insert_image(&NewImage {
                user_id: user.id.clone(),
                prompt: base,
                style: request.style,
                aspect_ratio: request.aspect_ratio,
                quality: request.quality,
                image_url,
            })
            .await
    }

    pub async fn generate_gif(&self, user: &AuthUser, request: GenerateRequest) -> StudioResult<GifOutcome> {
        let base = request
            .prompt
            .base_text()
            .ok_or_else(|| StudioError::invalid("Prompt é obrigatório"))?
            .to_string();
        let rendered = request.prompt.render();
        moderate(&rendered)?;

        let count = self.settings.gif_frame_count;
        info!(user = %user.id, style = %request.style, frames = count, "generating gif");
        let enhanced = enhance_gif_prompt(&rendered, &request.style);
        let frames = self.render_sequence(&enhanced, count).await?;
        let gif_url = frames
            .first()
            .cloned()
            .ok_or_else(|| StudioError::Internal("no frames generated".into()))?;

        let gif = self
            .repository
            .insert_gif(&NewGif {
                user_id: user.id.clone(),
                prompt: base,
                style: request.style,
                aspect_ratio: request.aspect_ratio,
                quality: request.quality,
                gif_url,
            })
            .await?;
        Ok(GifOutcome { gif, frames })
    }

    pub async fn generate_frames(&self, user: &AuthUser, request: FramesRequest) -> StudioResult<GeneratedFrames> {
        let action = validation::required(&request.prompt, "Prompt é obrigatório")?.to_string();
        let character = self
            .repository
            .get_character(user, request.character_id.trim())
            .await?;
        let subject = format!("{}, {action}", character.profile.describe());
        moderate(&subject)?;

        let count = self.settings.frame_sequence_count;
        info!(user = %user.id, character = %character.id, frames = count, "generating frame sequence");
        let enhanced = enhance_image_prompt(&subject, &request.style);
        let frame_urls = self.render_sequence(&enhanced, count).await?;

        self.repository
            .insert_frames(&NewFrames {
                user_id: user.id.clone(),
                character_id: Some(character.id),
                prompt: action,
                frame_urls,
            })
            .await
    }

    pub async fn edit_image(&self, request: EditRequest) -> StudioResult<EditOutcome> {
        let source = validate_image_source(&request.image_url)?;
        let edit_prompt = validation::required(&request.edit_prompt, "Descreva a edição desejada")?;
        moderate(edit_prompt)?;

        info!(edit = %edit_prompt, "editing image");
        let instruction = format!(
            "Aplique estas modificações de forma precisa e cirúrgica: {edit_prompt}\n\n\
IMPORTANTE: Faça APENAS estas alterações. Todo o resto da imagem deve permanecer idêntico ao original."
        );
        let chat = ChatRequest::image(vec![
            ChatMessage::system(EDIT_SYSTEM_PROMPT),
            ChatMessage::user_with_image(instruction, source),
        ])
        .with_quality("high");

        let success = run_with_fallback(&self.settings.image_models, |model| {
            let chat = &chat;
            async move { self.gateway.chat(&model, chat).await?.into_image() }
        })
        .await?;
        let edited_image_url = materialize_image_url(&self.storage, &success.value).await?;
        Ok(EditOutcome {
            edited_image_url,
            model: success.model,
        })
    }

    pub async fn character_assistant(&self, request: AssistantRequest) -> StudioResult<AssistantReply> {
        let message = validation::required(&request.message, "Mensagem é obrigatória")?;
        let chat = ChatRequest::text(vec![
            ChatMessage::system(assistant_system_prompt(request.character_data.as_ref())),
            ChatMessage::user(message),
        ]);
        let success = run_with_fallback(&self.settings.text_models, |model| {
            let chat = &chat;
            async move { self.gateway.chat(&model, chat).await?.into_text() }
        })
        .await?;
        Ok(AssistantReply {
            suggestion: success.value,
            model: success.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::gateway::{AttemptFailure, ChatReply};
    use crate::prompt::FilterSelection;
    use crate::store::{ArtifactKind, MemoryStore};

    const TOKEN: &str = "session-token";
    const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    /// Answers calls from a script, in order, and records what was asked.
    #[derive(Default)]
    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<ChatReply, AttemptFailure>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<ChatReply, AttemptFailure>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageGateway for ScriptedGateway {
        async fn chat(&self, model: &str, request: &ChatRequest) -> Result<ChatReply, AttemptFailure> {
            let messages = serde_json::to_string(&request.messages).unwrap();
            self.calls.lock().unwrap().push((model.to_string(), messages));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(image("https://cdn.example.com/default.png")))
        }
    }

    fn image(url: &str) -> ChatReply {
        ChatReply {
            text: None,
            image_url: Some(url.to_string()),
        }
    }

    fn status(code: u16) -> AttemptFailure {
        AttemptFailure::Status {
            status: code,
            message: None,
        }
    }

    struct Harness {
        studio: Studio,
        gateway: Arc<ScriptedGateway>,
        user: AuthUser,
        _cache: tempfile::TempDir,
    }

    async fn harness(name: &str, replies: Vec<Result<ChatReply, AttemptFailure>>) -> Harness {
        let gateway = Arc::new(ScriptedGateway::new(replies));
        let store = Arc::new(MemoryStore::new().with_user(TOKEN, "user-1"));
        let repository = Repository::new(store);
        let user = repository.authenticate(TOKEN).await.unwrap();
        let cache = tempfile::Builder::new().prefix(name).tempdir().unwrap();
        let storage = Arc::new(LocalFileStorage::new(
            cache.path().to_path_buf(),
            "http://localhost:3000/cache".into(),
        ));
        let settings = GenerationSettings {
            image_models: vec!["model-a".into(), "model-b".into()],
            text_models: vec!["text-a".into()],
            gif_frame_count: 3,
            frame_sequence_count: 2,
        };
        let studio = Studio::new(gateway.clone(), repository, storage, settings);
        Harness {
            studio,
            gateway,
            user,
            _cache: cache,
        }
    }

    fn generate(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: PromptRequest {
                prompt: prompt.to_string(),
                ..Default::default()
            },
            style: "anime".into(),
            aspect_ratio: "1:1".into(),
            quality: "high".into(),
        }
    }

    #[tokio::test]
    async fn generated_image_keeps_base_prompt_and_sends_enhanced_one() {
        let h = harness("image", vec![Ok(image("https://cdn.example.com/fox.png"))]).await;
        let mut request = generate("  a red fox  ");
        request.prompt.filters = FilterSelection::new().with("lighting", "golden hour");

        let row = h.studio.generate_image(&h.user, request).await.unwrap();
        assert_eq!(row.prompt, "a red fox");
        assert_eq!(row.image_url, "https://cdn.example.com/fox.png");
        assert_eq!(row.user_id, "user-1");
        assert!(!row.saved);

        let calls = h.gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "model-a");
        assert!(calls[0].1.contains("a red fox, lighting: golden hour"));
        assert!(calls[0].1.contains("no nudity"));
        assert!(calls[0].1.contains("anime style"));

        let listed = h.studio.repository().list_images(&h.user).await.unwrap();
        assert_eq!(listed, vec![row]);
    }

    #[tokio::test]
    async fn blocked_prompt_never_reaches_gateway() {
        let h = harness("blocked", vec![]).await;
        let err = h
            .studio
            .generate_image(&h.user, generate("a naked statue"))
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::ContentBlocked { .. }));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_prompt_is_invalid() {
        let h = harness("blank", vec![]).await;
        let err = h.studio.generate_image(&h.user, generate("   ")).await.unwrap_err();
        assert!(matches!(err, StudioError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn falls_back_and_caches_inline_images() {
        let h = harness("fallback", vec![Err(status(500)), Ok(image(PIXEL_PNG))]).await;
        let row = h.studio.generate_image(&h.user, generate("a lighthouse")).await.unwrap();

        let models: Vec<String> = h.gateway.calls().into_iter().map(|(model, _)| model).collect();
        assert_eq!(models, vec!["model-a", "model-b"]);
        assert!(row.image_url.starts_with("http://localhost:3000/cache/generated/"));
        assert!(row.image_url.ends_with(".png"));
    }

    #[tokio::test]
    async fn payment_required_on_every_model_persists_nothing() {
        let h = harness("credits", vec![Err(status(402)), Err(status(402))]).await;
        let err = h.studio.generate_image(&h.user, generate("a castle")).await.unwrap_err();
        assert!(matches!(err, StudioError::PaymentRequired));
        assert_eq!(h.gateway.calls().len(), 2);
        assert!(h.studio.repository().list_images(&h.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn payment_required_on_first_model_falls_back() {
        let h = harness(
            "credits-fallback",
            vec![Err(status(402)), Ok(image("https://cdn.example.com/castle.png"))],
        )
        .await;
        let row = h.studio.generate_image(&h.user, generate("a castle")).await.unwrap();
        assert_eq!(row.image_url, "https://cdn.example.com/castle.png");
        let models: Vec<String> = h.gateway.calls().into_iter().map(|(model, _)| model).collect();
        assert_eq!(models, vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn gif_uses_first_frame_and_returns_all() {
        let h = harness(
            "gif",
            vec![
                Ok(image("https://cdn.example.com/1.png")),
                Ok(image("https://cdn.example.com/2.png")),
                Ok(image("https://cdn.example.com/3.png")),
            ],
        )
        .await;
        let outcome = h.studio.generate_gif(&h.user, generate("a waving girl")).await.unwrap();
        assert_eq!(outcome.frames.len(), 3);
        assert_eq!(outcome.gif.gif_url, "https://cdn.example.com/1.png");
        assert_eq!(outcome.gif.prompt, "a waving girl");

        let calls = h.gateway.calls();
        assert!(calls[0].1.contains("Frame 1 of animated sequence."));
        assert!(calls[2].1.contains("Frame 3 of animated sequence."));
        assert!(calls[0].1.contains("Create an animated GIF"));
    }

    #[tokio::test]
    async fn frames_need_an_owned_character() {
        let h = harness("frames", vec![]).await;
        let missing = FramesRequest {
            character_id: "nope".into(),
            prompt: "running".into(),
            style: default_style(),
        };
        let err = h.studio.generate_frames(&h.user, missing).await.unwrap_err();
        assert!(matches!(err, StudioError::NotFound(_)));

        let character = h
            .studio
            .repository()
            .save_character(
                &h.user,
                CharacterProfile {
                    name: "Rui".into(),
                    gender: Gender::Male,
                    hair_color: Some("black".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let request = FramesRequest {
            character_id: character.id.clone(),
            prompt: "running on the beach".into(),
            style: default_style(),
        };
        let frames = h.studio.generate_frames(&h.user, request).await.unwrap();
        assert_eq!(frames.frame_urls.len(), 2);
        assert_eq!(frames.character_id.as_deref(), Some(character.id.as_str()));
        assert_eq!(frames.prompt, "running on the beach");
        assert!(h.gateway.calls()[0].1.contains("Rui, male, man"));

        let listed = h.studio.repository().list_frames(&h.user).await.unwrap();
        assert_eq!(listed.len(), 1);
        h.studio
            .repository()
            .set_saved(&h.user, ArtifactKind::Frames, &frames.id, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn edit_sends_source_image_with_surgical_instructions() {
        let h = harness("edit", vec![Ok(image("https://cdn.example.com/edited.png"))]).await;
        let outcome = h
            .studio
            .edit_image(EditRequest {
                image_url: "https://cdn.example.com/original.png".into(),
                edit_prompt: "make the sky purple".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.edited_image_url, "https://cdn.example.com/edited.png");
        assert_eq!(outcome.model, "model-a");

        let sent = &h.gateway.calls()[0].1;
        assert!(sent.contains("precisão cirúrgica"));
        assert!(sent.contains("make the sky purple"));
        assert!(sent.contains("https://cdn.example.com/original.png"));
    }

    #[tokio::test]
    async fn edit_rejects_non_web_sources() {
        let h = harness("edit-invalid", vec![]).await;
        let err = h
            .studio
            .edit_image(EditRequest {
                image_url: "file:///etc/passwd".into(),
                edit_prompt: "anything".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidInput(_)));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn assistant_embeds_character_and_uses_text_models() {
        let reply = ChatReply {
            text: Some("  Try a windswept cliff at dusk.  ".into()),
            image_url: None,
        };
        let h = harness("assistant", vec![Ok(reply)]).await;
        let answer = h
            .studio
            .character_assistant(AssistantRequest {
                message: "ideias de cenário?".into(),
                character_data: Some(CharacterProfile {
                    name: "Lia".into(),
                    gender: Gender::Female,
                    ..Default::default()
                }),
            })
            .await
            .unwrap();
        assert_eq!(answer.suggestion, "Try a windswept cliff at dusk.");

        let calls = h.gateway.calls();
        assert_eq!(calls[0].0, "text-a");
        assert!(calls[0].1.contains("- Nome: Lia"));
        assert!(calls[0].1.contains("- Cor do cabelo: Não definido"));
    }

    #[test]
    fn generate_request_reads_ui_field_names() {
        let request: GenerateRequest = serde_json::from_value(serde_json::json!({
            "prompt": "a cat",
            "gender": "female",
            "filters": {"hairColor": "red"},
            "outputType": "gif",
            "aspectRatio": "9:16"
        }))
        .unwrap();
        assert_eq!(request.prompt.gender, Gender::Female);
        assert_eq!(request.aspect_ratio, "9:16");
        assert_eq!(request.style, "photorealistic");
        assert_eq!(request.quality, "high");
    }
}
