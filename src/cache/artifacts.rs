//! Turns gateway image payloads into URLs the gallery can keep.
//!
//! The gateway answers either with a hosted URL or with inline `data:` URLs.
//! Inline images are written to the cache, keyed by content hash, and replaced
//! by their public `/cache` URL.

use base64::{Engine as _, engine::general_purpose};

use crate::cache::{LocalFileStorage, compute_hash, get_extension_from_mime_type};
use crate::error::{StudioError, StudioResult};

const GENERATED_DIR: &str = "generated";

struct InlineImage {
    bytes: Vec<u8>,
    mime_type: String,
}

fn parse_data_url(url: &str) -> Option<StudioResult<InlineImage>> {
    let rest = url.strip_prefix("data:")?;
    let Some((header, payload)) = rest.split_once(',') else {
        return Some(Err(invalid_payload("data URL sem separador")));
    };
    let Some(declared_mime) = header.strip_suffix(";base64") else {
        return Some(Err(invalid_payload("data URL sem codificação base64")));
    };
    let bytes = match general_purpose::STANDARD.decode(payload.trim()) {
        Ok(bytes) => bytes,
        Err(err) => return Some(Err(invalid_payload(&format!("base64 inválido: {err}")))),
    };
    let mime_type = match image::guess_format(&bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) if declared_mime.starts_with("image/") => declared_mime.to_string(),
        Err(_) => return Some(Err(invalid_payload("conteúdo não é uma imagem"))),
    };
    Some(Ok(InlineImage { bytes, mime_type }))
}

fn invalid_payload(reason: &str) -> StudioError {
    StudioError::GenerationFailed {
        attempts: 1,
        last_error: format!("Imagem inválida retornada pela API: {reason}"),
    }
}

/// Returns a URL that stays valid after the response is gone.
pub async fn materialize_image_url(storage: &LocalFileStorage, url: &str) -> StudioResult<String> {
    let Some(inline) = parse_data_url(url.trim()) else {
        return Ok(url.trim().to_string());
    };
    let inline = inline?;
    let ext = get_extension_from_mime_type(&inline.mime_type);
    let key = format!("{GENERATED_DIR}/{}.{ext}", compute_hash(&inline.bytes));
    let already_cached = storage
        .exists(&key)
        .await
        .map_err(|err| StudioError::Internal(format!("cache lookup failed: {err}")))?;
    if !already_cached {
        storage
            .put(&key, &inline.bytes)
            .await
            .map_err(|err| StudioError::Internal(format!("cache write failed: {err}")))?;
        tracing::debug!(key = %key, bytes = inline.bytes.len(), "cached inline image");
    }
    Ok(storage.get_public_url(&key))
}
