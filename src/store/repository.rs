use std::sync::Arc;

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::error::{StudioError, StudioResult};
use crate::prompt::Gender;
use crate::store::{
    Album, AlbumItem, AlbumPatch, ArtifactKind, AuthUser, Character, CharacterProfile,
    ContentType, GeneratedFrames, GeneratedGif, GeneratedImage, NewAlbum, NewAlbumItem,
    NewCharacter, NewFrames, NewGif, NewImage, Table, TableStore, eq,
};

/// Typed, owner-scoped operations over a [`TableStore`].
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn TableStore>,
}

fn decode<T: DeserializeOwned>(table: Table, row: Value) -> StudioResult<T> {
    serde_json::from_value(row)
        .map_err(|err| StudioError::Store(format!("{table}: malformed row: {err}")))
}

fn decode_all<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> StudioResult<Vec<T>> {
    rows.into_iter().map(|row| decode(table, row)).collect()
}

fn trimmed_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Repository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn authenticate(&self, token: &str) -> StudioResult<AuthUser> {
        let token = token.trim();
        if token.is_empty() {
            return Err(StudioError::Unauthorized);
        }
        self.store.authenticate(token).await
    }

    async fn insert_row<N: Serialize, R: DeserializeOwned>(&self, table: Table, row: &N) -> StudioResult<R> {
        let stored = self.store.insert(table, serde_json::to_value(row)?).await?;
        tracing::info!(table = %table, "row inserted");
        decode(table, stored)
    }

    async fn owned_rows<R: DeserializeOwned>(&self, table: Table, user: &AuthUser) -> StudioResult<Vec<R>> {
        let rows = self.store.select(table, &[eq("user_id", user.id.as_str())]).await?;
        decode_all(table, rows)
    }

    pub async fn insert_image(&self, image: &NewImage) -> StudioResult<GeneratedImage> {
        self.insert_row(Table::GeneratedImages, image).await
    }

    pub async fn insert_gif(&self, gif: &NewGif) -> StudioResult<GeneratedGif> {
        self.insert_row(Table::GeneratedGifs, gif).await
    }

    pub async fn insert_frames(&self, frames: &NewFrames) -> StudioResult<GeneratedFrames> {
        self.insert_row(Table::GeneratedFrames, frames).await
    }

    pub async fn list_images(&self, user: &AuthUser) -> StudioResult<Vec<GeneratedImage>> {
        self.owned_rows(Table::GeneratedImages, user).await
    }

    pub async fn list_gifs(&self, user: &AuthUser) -> StudioResult<Vec<GeneratedGif>> {
        self.owned_rows(Table::GeneratedGifs, user).await
    }

    pub async fn list_frames(&self, user: &AuthUser) -> StudioResult<Vec<GeneratedFrames>> {
        self.owned_rows(Table::GeneratedFrames, user).await
    }

    /// Marks an artifact as kept (or not) in the gallery.
    pub async fn set_saved(&self, user: &AuthUser, kind: ArtifactKind, id: &str, saved: bool) -> StudioResult<()> {
        let table = kind.table();
        let touched = self
            .store
            .update(
                table,
                &[eq("id", id), eq("user_id", user.id.as_str())],
                json!({ "saved": saved }),
            )
            .await?;
        if touched.is_empty() {
            return Err(StudioError::NotFound(format!("{table} {id}")));
        }
        Ok(())
    }

    pub async fn delete_artifact(&self, user: &AuthUser, kind: ArtifactKind, id: &str) -> StudioResult<()> {
        let table = kind.table();
        let removed = self
            .store
            .delete(table, &[eq("id", id), eq("user_id", user.id.as_str())])
            .await?;
        if removed == 0 {
            return Err(StudioError::NotFound(format!("{table} {id}")));
        }
        tracing::info!(table = %table, id, "artifact deleted");
        Ok(())
    }

    pub async fn create_album(&self, user: &AuthUser, name: &str, description: Option<String>) -> StudioResult<Album> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StudioError::invalid("Nome do álbum é obrigatório"));
        }
        let album = NewAlbum {
            user_id: user.id.clone(),
            name: name.to_string(),
            description: trimmed_optional(description),
        };
        self.insert_row(Table::Albums, &album).await
    }

    pub async fn list_albums(&self, user: &AuthUser) -> StudioResult<Vec<Album>> {
        self.owned_rows(Table::Albums, user).await
    }

    async fn owned_album(&self, user: &AuthUser, album_id: &str) -> StudioResult<Album> {
        let rows = self
            .store
            .select(Table::Albums, &[eq("id", album_id), eq("user_id", user.id.as_str())])
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StudioError::NotFound(format!("álbum {album_id}")))?;
        decode(Table::Albums, row)
    }

    pub async fn update_album(
        &self,
        user: &AuthUser,
        album_id: &str,
        name: &str,
        description: Option<String>,
    ) -> StudioResult<Album> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StudioError::invalid("Nome do álbum é obrigatório"));
        }
        let patch = AlbumPatch {
            name: name.to_string(),
            description: trimmed_optional(description),
            updated_at: Utc::now(),
        };
        let touched = self
            .store
            .update(
                Table::Albums,
                &[eq("id", album_id), eq("user_id", user.id.as_str())],
                serde_json::to_value(&patch)?,
            )
            .await?;
        let row = touched
            .into_iter()
            .next()
            .ok_or_else(|| StudioError::NotFound(format!("álbum {album_id}")))?;
        decode(Table::Albums, row)
    }

    pub async fn delete_album(&self, user: &AuthUser, album_id: &str) -> StudioResult<()> {
        let removed = self
            .store
            .delete(Table::Albums, &[eq("id", album_id), eq("user_id", user.id.as_str())])
            .await?;
        if removed == 0 {
            return Err(StudioError::NotFound(format!("álbum {album_id}")));
        }
        Ok(())
    }

    pub async fn add_album_item(
        &self,
        user: &AuthUser,
        album_id: &str,
        content_id: &str,
        content_type: ContentType,
    ) -> StudioResult<AlbumItem> {
        let album = self.owned_album(user, album_id).await?;
        let content_id = content_id.trim();
        if content_id.is_empty() {
            return Err(StudioError::invalid("Conteúdo é obrigatório"));
        }
        let item = NewAlbumItem {
            album_id: album.id,
            content_id: content_id.to_string(),
            content_type,
        };
        self.insert_row(Table::AlbumItems, &item).await
    }

    pub async fn list_album_items(&self, user: &AuthUser, album_id: &str) -> StudioResult<Vec<AlbumItem>> {
        let album = self.owned_album(user, album_id).await?;
        let rows = self
            .store
            .select(Table::AlbumItems, &[eq("album_id", album.id)])
            .await?;
        decode_all(Table::AlbumItems, rows)
    }

    pub async fn remove_album_item(&self, user: &AuthUser, album_id: &str, item_id: &str) -> StudioResult<()> {
        let album = self.owned_album(user, album_id).await?;
        let removed = self
            .store
            .delete(Table::AlbumItems, &[eq("id", item_id), eq("album_id", album.id)])
            .await?;
        if removed == 0 {
            return Err(StudioError::NotFound(format!("item {item_id}")));
        }
        Ok(())
    }

    pub async fn save_character(&self, user: &AuthUser, profile: CharacterProfile) -> StudioResult<Character> {
        if profile.name.trim().is_empty() {
            return Err(StudioError::invalid("Nome do personagem é obrigatório"));
        }
        if profile.gender == Gender::None {
            return Err(StudioError::invalid("Gênero do personagem deve ser male ou female"));
        }
        let character = NewCharacter {
            user_id: user.id.clone(),
            profile,
        };
        self.insert_row(Table::Characters, &character).await
    }

    pub async fn list_characters(&self, user: &AuthUser) -> StudioResult<Vec<Character>> {
        self.owned_rows(Table::Characters, user).await
    }

    pub async fn get_character(&self, user: &AuthUser, id: &str) -> StudioResult<Character> {
        let rows = self
            .store
            .select(Table::Characters, &[eq("id", id), eq("user_id", user.id.as_str())])
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StudioError::NotFound(format!("personagem {id}")))?;
        decode(Table::Characters, row)
    }

    pub async fn delete_character(&self, user: &AuthUser, id: &str) -> StudioResult<()> {
        let removed = self
            .store
            .delete(Table::Characters, &[eq("id", id), eq("user_id", user.id.as_str())])
            .await?;
        if removed == 0 {
            return Err(StudioError::NotFound(format!("personagem {id}")));
        }
        Ok(())
    }
}
