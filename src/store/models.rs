use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::prompt::Gender;
use crate::store::Table;

/// Hosted `saved` columns are nullable; an absent or null flag means unsaved.
fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    pub style: String,
    pub aspect_ratio: String,
    pub quality: String,
    pub image_url: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub saved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewImage {
    pub user_id: String,
    pub prompt: String,
    pub style: String,
    pub aspect_ratio: String,
    pub quality: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedGif {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    pub style: String,
    pub aspect_ratio: String,
    pub quality: String,
    pub gif_url: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub saved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGif {
    pub user_id: String,
    pub prompt: String,
    pub style: String,
    pub aspect_ratio: String,
    pub quality: String,
    pub gif_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFrames {
    pub id: String,
    pub user_id: String,
    pub character_id: Option<String>,
    pub prompt: String,
    pub frame_urls: Vec<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub saved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFrames {
    pub user_id: String,
    pub character_id: Option<String>,
    pub prompt: String,
    pub frame_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAlbum {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumPatch {
    pub name: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// What an album item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Image,
    Gif,
    Frames,
    Character,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumItem {
    pub id: String,
    pub album_id: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAlbumItem {
    pub album_id: String,
    pub content_id: String,
    pub content_type: ContentType,
}

/// Generated artifacts shown in the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Gif,
    Frames,
}

impl ArtifactKind {
    pub fn table(self) -> Table {
        match self {
            Self::Image => Table::GeneratedImages,
            Self::Gif => Table::GeneratedGifs,
            Self::Frames => Table::GeneratedFrames,
        }
    }
}

/// The descriptive attributes of a character, without identity or timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterProfile {
    pub name: String,
    #[serde(default)]
    pub family_name: Option<String>,
    pub gender: Gender,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub hair_type: Option<String>,
    #[serde(default)]
    pub hair_length: Option<String>,
    #[serde(default)]
    pub hair_color: Option<String>,
    #[serde(default)]
    pub eye_color: Option<String>,
    #[serde(default)]
    pub facial_expression: Option<String>,
    #[serde(default)]
    pub facial_details: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
    #[serde(default)]
    pub breast_size: Option<String>,
    #[serde(default)]
    pub butt_size: Option<String>,
    #[serde(default)]
    pub musculature: Option<String>,
}

impl CharacterProfile {
    /// Comma separated visual description used when generating frames.
    pub fn describe(&self) -> String {
        let full_name = match self.family_name.as_deref().filter(|name| !name.trim().is_empty()) {
            Some(family) => format!("{} {family}", self.name.trim()),
            None => self.name.trim().to_string(),
        };
        let mut parts = vec![full_name];
        match self.gender {
            Gender::Male => parts.push("male, man".to_string()),
            Gender::Female => parts.push("female, woman".to_string()),
            Gender::None => {}
        }
        if let Some(age) = self.age {
            parts.push(format!("{age} years old"));
        }
        let labelled = [
            ("hair type", &self.hair_type),
            ("hair length", &self.hair_length),
            ("hair color", &self.hair_color),
            ("eye color", &self.eye_color),
            ("facial expression", &self.facial_expression),
            ("facial details", &self.facial_details),
            ("body type", &self.body_type),
        ];
        for (label, value) in labelled {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                parts.push(format!("{label}: {value}"));
            }
        }
        let gated = match self.gender {
            Gender::Female => vec![("breast size", &self.breast_size), ("butt size", &self.butt_size)],
            Gender::Male => vec![("musculature", &self.musculature)],
            Gender::None => Vec::new(),
        };
        for (label, value) in gated {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                parts.push(format!("{label}: {value}"));
            }
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub profile: CharacterProfile,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCharacter {
    pub user_id: String,
    #[serde(flatten)]
    pub profile: CharacterProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_description_skips_empty_fields_and_gates_by_gender() {
        let profile = CharacterProfile {
            name: "Lia".into(),
            family_name: Some("Moreau".into()),
            gender: Gender::Female,
            age: Some(27),
            hair_color: Some("copper".into()),
            eye_color: Some("  ".into()),
            musculature: Some("bulky".into()),
            butt_size: Some("medium".into()),
            ..Default::default()
        };
        assert_eq!(
            profile.describe(),
            "Lia Moreau, female, woman, 27 years old, hair color: copper, butt size: medium"
        );
    }

    #[test]
    fn character_row_flattens_profile() {
        let raw = serde_json::json!({
            "id": "c1",
            "user_id": "u1",
            "name": "Rui",
            "gender": "male",
            "age": 40,
            "created_at": "2025-03-01T10:00:00+00:00",
            "updated_at": "2025-03-01T10:00:00.123456+00:00"
        });
        let character: Character = serde_json::from_value(raw).unwrap();
        assert_eq!(character.profile.name, "Rui");
        assert_eq!(character.profile.gender, Gender::Male);
        assert_eq!(character.profile.age, Some(40));
        assert!(character.profile.hair_color.is_none());
    }

    #[test]
    fn character_row_tolerates_null_timestamps() {
        let raw = serde_json::json!({
            "id": "c2",
            "user_id": "u1",
            "name": "Ana",
            "gender": "female",
            "created_at": null,
            "updated_at": null
        });
        let character: Character = serde_json::from_value(raw).unwrap();
        assert_eq!(character.profile.name, "Ana");
        assert!(character.created_at.is_none());
        assert!(character.updated_at.is_none());
    }

    #[test]
    fn null_or_missing_saved_flag_reads_as_unsaved() {
        let image: GeneratedImage = serde_json::from_value(serde_json::json!({
            "id": "i1",
            "user_id": "u1",
            "prompt": "a fox",
            "style": "anime",
            "aspect_ratio": "1:1",
            "quality": "high",
            "image_url": "https://cdn.example.com/fox.png",
            "saved": null,
            "created_at": "2025-03-01T10:00:00+00:00"
        }))
        .unwrap();
        assert!(!image.saved);

        let gif: GeneratedGif = serde_json::from_value(serde_json::json!({
            "id": "g1",
            "user_id": "u1",
            "prompt": "a wave",
            "style": "anime",
            "aspect_ratio": "1:1",
            "quality": "high",
            "gif_url": "https://cdn.example.com/wave.png",
            "created_at": "2025-03-01T10:00:00+00:00"
        }))
        .unwrap();
        assert!(!gif.saved);

        let frames: GeneratedFrames = serde_json::from_value(serde_json::json!({
            "id": "f1",
            "user_id": "u1",
            "character_id": null,
            "prompt": "a jump",
            "frame_urls": ["https://cdn.example.com/1.png"],
            "saved": true,
            "created_at": "2025-03-01T10:00:00+00:00"
        }))
        .unwrap();
        assert!(frames.saved);
    }
}
