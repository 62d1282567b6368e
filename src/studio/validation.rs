use url::Url;

use crate::error::{StudioError, StudioResult};

/// Accepts an `http(s)` URL or an inline `data:image/...` URL as an edit source.
pub fn validate_image_source(raw: &str) -> StudioResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StudioError::invalid("URL da imagem é obrigatória"));
    }
    if trimmed.starts_with("data:") {
        return if trimmed.starts_with("data:image/") && trimmed.contains(";base64,") {
            Ok(trimmed.to_string())
        } else {
            Err(StudioError::invalid("data URL deve conter uma imagem em base64"))
        };
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| StudioError::invalid(format!("URL da imagem inválida: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        scheme => Err(StudioError::invalid(format!(
            "Apenas http ou https são permitidos (protocolo atual: {scheme})"
        ))),
    }
}

/// Trimmed text, or `InvalidInput` with `message` when nothing is left.
pub fn required<'a>(value: &'a str, message: &str) -> StudioResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StudioError::invalid(message));
    }
    Ok(trimmed)
}
