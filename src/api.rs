//! HTTP surface: generation endpoints, gallery and album CRUD, characters and
//! the custom filter option store.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, StatusCode, header, request::Parts},
    routing::{MethodRouter, delete, get, patch, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};

use crate::error::{StudioError, StudioResult};
use crate::filters::{CustomFilter, FilterDocument, FilterStore};
use crate::store::{
    Album, AlbumItem, ArtifactKind, AuthUser, Character, CharacterProfile, ContentType,
    GeneratedFrames, GeneratedGif, GeneratedImage,
};
use crate::studio::{AssistantRequest, EditRequest, FramesRequest, GenerateRequest, Studio};

#[derive(Clone)]
pub struct AppState {
    pub studio: Arc<Studio>,
    pub filters: Arc<FilterStore>,
}

/// The authenticated owner of the request, resolved from `Authorization: Bearer`.
pub struct Owner(pub AuthUser);

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    let raw = value?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for Owner {
    type Rejection = StudioError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts.headers.get(header::AUTHORIZATION)).ok_or(StudioError::Unauthorized)?;
        let user = state.studio.repository().authenticate(token).await?;
        tracing::debug!(
            user_id = %user.id,
            email = user.email.as_deref().unwrap_or("-"),
            "request authenticated"
        );
        Ok(Owner(user))
    }
}

/// `Json` whose rejections use the `{error, kind}` body.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = StudioError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| StudioError::invalid(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/functions/v1/generate-image", post(generate_image))
        .route("/functions/v1/generate-gif", post(generate_gif))
        .route("/functions/v1/generate-frames", post(generate_frames))
        .route("/functions/v1/edit-image", post(edit_image))
        .route("/functions/v1/character-ai-assistant", post(character_assistant))
        .route("/api/images", get(list_images))
        .route("/api/images/{id}", artifact_item(ArtifactKind::Image))
        .route("/api/gifs", get(list_gifs))
        .route("/api/gifs/{id}", artifact_item(ArtifactKind::Gif))
        .route("/api/frames", get(list_frames))
        .route("/api/frames/{id}", artifact_item(ArtifactKind::Frames))
        .route("/api/albums", get(list_albums).post(create_album))
        .route("/api/albums/{id}", patch(update_album).delete(delete_album))
        .route("/api/albums/{id}/items", get(list_album_items).post(add_album_item))
        .route("/api/albums/{id}/items/{item_id}", delete(remove_album_item))
        .route("/api/characters", get(list_characters).post(save_character))
        .route("/api/characters/{id}", delete(delete_character))
        .route("/api/filters/options", get(filter_options))
        .route("/api/filters/options/{key}", post(add_filter_option).delete(remove_filter_option))
        .route("/api/filters/custom", get(list_custom_filters).post(add_custom_filter))
        .route("/api/filters/custom/{name}", delete(remove_custom_filter))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct ImageResponse {
    success: bool,
    image: GeneratedImage,
}

#[derive(Serialize)]
struct GifResponse {
    success: bool,
    gif: GeneratedGif,
    frames: Vec<String>,
}

#[derive(Serialize)]
struct FramesResponse {
    success: bool,
    frames: GeneratedFrames,
}

async fn generate_image(
    State(state): State<AppState>,
    Owner(user): Owner,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> StudioResult<Json<ImageResponse>> {
    let image = state.studio.generate_image(&user, request).await?;
    Ok(Json(ImageResponse { success: true, image }))
}

async fn generate_gif(
    State(state): State<AppState>,
    Owner(user): Owner,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> StudioResult<Json<GifResponse>> {
    let outcome = state.studio.generate_gif(&user, request).await?;
    Ok(Json(GifResponse {
        success: true,
        gif: outcome.gif,
        frames: outcome.frames,
    }))
}

async fn generate_frames(
    State(state): State<AppState>,
    Owner(user): Owner,
    ApiJson(request): ApiJson<FramesRequest>,
) -> StudioResult<Json<FramesResponse>> {
    let frames = state.studio.generate_frames(&user, request).await?;
    Ok(Json(FramesResponse { success: true, frames }))
}

async fn edit_image(
    State(state): State<AppState>,
    Owner(user): Owner,
    ApiJson(request): ApiJson<EditRequest>,
) -> StudioResult<Json<Value>> {
    tracing::info!(user = %user.id, "edit requested");
    let outcome = state.studio.edit_image(request).await?;
    Ok(Json(serde_json::to_value(outcome)?))
}

async fn character_assistant(
    State(state): State<AppState>,
    Owner(_user): Owner,
    ApiJson(request): ApiJson<AssistantRequest>,
) -> StudioResult<Json<Value>> {
    let reply = state.studio.character_assistant(request).await?;
    Ok(Json(serde_json::to_value(reply)?))
}

async fn list_images(State(state): State<AppState>, Owner(user): Owner) -> StudioResult<Json<Vec<GeneratedImage>>> {
    Ok(Json(state.studio.repository().list_images(&user).await?))
}

async fn list_gifs(State(state): State<AppState>, Owner(user): Owner) -> StudioResult<Json<Vec<GeneratedGif>>> {
    Ok(Json(state.studio.repository().list_gifs(&user).await?))
}

async fn list_frames(State(state): State<AppState>, Owner(user): Owner) -> StudioResult<Json<Vec<GeneratedFrames>>> {
    Ok(Json(state.studio.repository().list_frames(&user).await?))
}

#[derive(Debug, Deserialize)]
struct SavedPatch {
    saved: bool,
}

async fn set_saved(
    kind: ArtifactKind,
    state: AppState,
    user: AuthUser,
    id: String,
    patch: SavedPatch,
) -> StudioResult<StatusCode> {
    state
        .studio
        .repository()
        .set_saved(&user, kind, &id, patch.saved)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_artifact(kind: ArtifactKind, state: AppState, user: AuthUser, id: String) -> StudioResult<StatusCode> {
    state.studio.repository().delete_artifact(&user, kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn artifact_item(kind: ArtifactKind) -> MethodRouter<AppState> {
    patch(
        move |State(state): State<AppState>,
              Owner(user): Owner,
              Path(id): Path<String>,
              ApiJson(body): ApiJson<SavedPatch>| async move { set_saved(kind, state, user, id, body).await },
    )
    .delete(
        move |State(state): State<AppState>, Owner(user): Owner, Path(id): Path<String>| async move {
            delete_artifact(kind, state, user, id).await
        },
    )
}

#[derive(Debug, Deserialize)]
struct AlbumBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

async fn list_albums(State(state): State<AppState>, Owner(user): Owner) -> StudioResult<Json<Vec<Album>>> {
    Ok(Json(state.studio.repository().list_albums(&user).await?))
}

async fn create_album(
    State(state): State<AppState>,
    Owner(user): Owner,
    ApiJson(body): ApiJson<AlbumBody>,
) -> StudioResult<(StatusCode, Json<Album>)> {
    let album = state
        .studio
        .repository()
        .create_album(&user, &body.name, body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(album)))
}

async fn update_album(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AlbumBody>,
) -> StudioResult<Json<Album>> {
    let album = state
        .studio
        .repository()
        .update_album(&user, &id, &body.name, body.description)
        .await?;
    Ok(Json(album))
}

async fn delete_album(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(id): Path<String>,
) -> StudioResult<StatusCode> {
    state.studio.repository().delete_album(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AlbumItemBody {
    content_id: String,
    content_type: ContentType,
}

async fn list_album_items(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(id): Path<String>,
) -> StudioResult<Json<Vec<AlbumItem>>> {
    Ok(Json(state.studio.repository().list_album_items(&user, &id).await?))
}

async fn add_album_item(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AlbumItemBody>,
) -> StudioResult<(StatusCode, Json<AlbumItem>)> {
    let item = state
        .studio
        .repository()
        .add_album_item(&user, &id, &body.content_id, body.content_type)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn remove_album_item(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path((id, item_id)): Path<(String, String)>,
) -> StudioResult<StatusCode> {
    state
        .studio
        .repository()
        .remove_album_item(&user, &id, &item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_characters(State(state): State<AppState>, Owner(user): Owner) -> StudioResult<Json<Vec<Character>>> {
    Ok(Json(state.studio.repository().list_characters(&user).await?))
}

async fn save_character(
    State(state): State<AppState>,
    Owner(user): Owner,
    ApiJson(profile): ApiJson<CharacterProfile>,
) -> StudioResult<(StatusCode, Json<Character>)> {
    let character = state.studio.repository().save_character(&user, profile).await?;
    Ok((StatusCode::CREATED, Json(character)))
}

async fn delete_character(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(id): Path<String>,
) -> StudioResult<StatusCode> {
    state.studio.repository().delete_character(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct OptionBody {
    value: String,
}

#[derive(Debug, Deserialize)]
struct CategoryQuery {
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomFilterBody {
    name: String,
    value: String,
    category: String,
}

#[derive(Serialize)]
struct NamedCustomFilter {
    name: String,
    #[serde(flatten)]
    filter: CustomFilter,
}

async fn filter_options(State(state): State<AppState>, Owner(user): Owner) -> Json<FilterDocument> {
    Json(state.filters.snapshot(&user.id).await)
}

async fn add_filter_option(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(key): Path<String>,
    ApiJson(body): ApiJson<OptionBody>,
) -> StudioResult<Json<Value>> {
    let added = state.filters.add_option(&user.id, &key, &body.value).await?;
    let options = state.filters.options(&user.id, &key).await;
    Ok(Json(json!({ "added": added, "options": options })))
}

async fn remove_filter_option(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(key): Path<String>,
    Query(body): Query<OptionBody>,
) -> StudioResult<Json<Value>> {
    let removed = state.filters.remove_option(&user.id, &key, &body.value).await?;
    let options = state.filters.options(&user.id, &key).await;
    Ok(Json(json!({ "removed": removed, "options": options })))
}

async fn list_custom_filters(
    State(state): State<AppState>,
    Owner(user): Owner,
    Query(query): Query<CategoryQuery>,
) -> Json<Vec<NamedCustomFilter>> {
    let entries = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => state.filters.custom_filters_in(&user.id, category).await,
        None => state.filters.snapshot(&user.id).await.custom_filters.into_iter().collect(),
    };
    Json(
        entries
            .into_iter()
            .map(|(name, filter)| NamedCustomFilter { name, filter })
            .collect(),
    )
}

async fn add_custom_filter(
    State(state): State<AppState>,
    Owner(user): Owner,
    ApiJson(body): ApiJson<CustomFilterBody>,
) -> StudioResult<StatusCode> {
    state
        .filters
        .add_custom_filter(&user.id, &body.name, &body.value, &body.category)
        .await?;
    Ok(StatusCode::CREATED)
}

async fn remove_custom_filter(
    State(state): State<AppState>,
    Owner(user): Owner,
    Path(name): Path<String>,
) -> StudioResult<StatusCode> {
    if !state.filters.remove_custom_filter(&user.id, &name).await? {
        return Err(StudioError::NotFound(format!("filtro {name}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::response::IntoResponse;
    use tempfile::TempDir;

    use super::*;
    use crate::cache::LocalFileStorage;
    use crate::config::GenerationSettings;
    use crate::gateway::{AttemptFailure, ChatReply, ChatRequest, ImageGateway};
    use crate::prompt::Gender;
    use crate::store::{MemoryStore, Repository};

    struct FixedGateway;

    #[async_trait]
    impl ImageGateway for FixedGateway {
        async fn chat(&self, _model: &str, _request: &ChatRequest) -> Result<ChatReply, AttemptFailure> {
            Ok(ChatReply {
                text: Some("ok".into()),
                image_url: Some("https://cdn.example.com/out.png".into()),
            })
        }
    }

    struct Fixture {
        state: AppState,
        user: AuthUser,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryStore::new()
                .with_user("t", "owner")
                .with_user("other-token", "other-owner"),
        );
        let repository = Repository::new(store);
        let user = repository.authenticate("t").await.unwrap();
        let storage = Arc::new(LocalFileStorage::new(
            dir.path().join("cache"),
            "http://localhost/cache".into(),
        ));
        let studio = Studio::new(Arc::new(FixedGateway), repository, storage, GenerationSettings::default());
        let filters = FilterStore::open(&dir.path().join("prefs")).await.unwrap();
        let state = AppState {
            studio: Arc::new(studio),
            filters: Arc::new(filters),
        };
        Fixture {
            state,
            user,
            _dir: dir,
        }
    }

    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let header = HeaderValue::from_static("Bearer abc.def");
        assert_eq!(bearer_token(Some(&header)), Some("abc.def"));
        let lower = HeaderValue::from_static("bearer xyz");
        assert_eq!(bearer_token(Some(&lower)), Some("xyz"));
        assert_eq!(bearer_token(Some(&HeaderValue::from_static("Basic abc"))), None);
        assert_eq!(bearer_token(Some(&HeaderValue::from_static("Bearer   "))), None);
        assert_eq!(bearer_token(None), None);
    }

    #[tokio::test]
    async fn generate_image_returns_saved_row() {
        let Fixture { state, user, _dir } = fixture().await;
        let request: GenerateRequest = serde_json::from_value(json!({"prompt": "a fox"})).unwrap();
        let Json(response) = generate_image(State(state.clone()), Owner(user.clone()), ApiJson(request))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.image.image_url, "https://cdn.example.com/out.png");

        let Json(images) = list_images(State(state), Owner(user)).await.unwrap();
        assert_eq!(images.len(), 1);
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found_response() {
        let Fixture { state, user, _dir } = fixture().await;
        let err = delete_artifact(ArtifactKind::Gif, state, user, "nope".into())
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn album_lifecycle() {
        let Fixture { state, user, _dir } = fixture().await;
        let (status, Json(album)) = create_album(
            State(state.clone()),
            Owner(user.clone()),
            ApiJson(AlbumBody {
                name: "Viagem".into(),
                description: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let body: AlbumItemBody =
            serde_json::from_value(json!({"content_id": "img-1", "content_type": "image"})).unwrap();
        add_album_item(State(state.clone()), Owner(user.clone()), Path(album.id.clone()), ApiJson(body))
            .await
            .unwrap();
        let Json(items) = list_album_items(State(state.clone()), Owner(user.clone()), Path(album.id.clone()))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);

        delete_album(State(state.clone()), Owner(user.clone()), Path(album.id.clone()))
            .await
            .unwrap();
        let Json(albums) = list_albums(State(state), Owner(user)).await.unwrap();
        assert!(albums.is_empty());
    }

    #[tokio::test]
    async fn character_without_gender_is_bad_request() {
        let Fixture { state, user, _dir } = fixture().await;
        let profile = CharacterProfile {
            name: "Sem gênero".into(),
            gender: Gender::None,
            ..Default::default()
        };
        let err = save_character(State(state), Owner(user), ApiJson(profile))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn filter_options_and_custom_filters() {
        let Fixture { state, user, _dir } = fixture().await;
        let Json(added) = add_filter_option(
            State(state.clone()),
            Owner(user.clone()),
            Path("hairColor".into()),
            ApiJson(OptionBody { value: "teal".into() }),
        )
        .await
        .unwrap();
        assert_eq!(added["added"], json!(true));
        assert_eq!(added["options"], json!(["teal"]));

        add_custom_filter(
            State(state.clone()),
            Owner(user.clone()),
            ApiJson(CustomFilterBody {
                name: "neon".into(),
                value: "neon glow".into(),
                category: "lighting".into(),
            }),
        )
        .await
        .unwrap();
        let Json(listed) = list_custom_filters(
            State(state.clone()),
            Owner(user.clone()),
            Query(CategoryQuery {
                category: Some("lighting".into()),
            }),
        )
        .await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "neon");

        let err = remove_custom_filter(State(state), Owner(user), Path("missing".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::NotFound(_)));
    }

    #[tokio::test]
    async fn filter_routes_require_a_token_and_are_scoped_per_owner() {
        let Fixture { state, _dir, .. } = fixture().await;
        let base = serve(state).await;
        let client = reqwest::Client::new();

        let anonymous = client
            .get(format!("{base}/api/filters/options"))
            .send()
            .await
            .unwrap();
        assert_eq!(anonymous.status(), reqwest::StatusCode::UNAUTHORIZED);

        let added = client
            .post(format!("{base}/api/filters/options/pose"))
            .bearer_auth("t")
            .json(&json!({"value": "kneeling"}))
            .send()
            .await
            .unwrap();
        assert_eq!(added.status(), reqwest::StatusCode::OK);

        let own: Value = client
            .get(format!("{base}/api/filters/options"))
            .bearer_auth("t")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(own["options"]["pose"], json!(["kneeling"]));

        let other: Value = client
            .get(format!("{base}/api/filters/options"))
            .bearer_auth("other-token")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(other["options"], json!({}));
    }
}
