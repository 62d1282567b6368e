use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::storage::normalize_scheme;
use crate::error::{StudioError, StudioResult};

const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1";
const DEFAULT_IMAGE_MODELS: &[&str] = &[
    "google/gemini-2.5-flash-image-preview",
    "google/gemini-2.5-pro-image-preview",
    "google/gemini-2.5-flash-lite-image-preview",
];
const DEFAULT_TEXT_MODELS: &[&str] = &["google/gemini-2.5-flash"];
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FRAME_COUNT: usize = 4;
const MAX_FRAME_COUNT: usize = 12;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;
const APP_DIR: &str = "prompt-studio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_key: String,
}

/// Knobs the generation flows read on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub image_models: Vec<String>,
    pub text_models: Vec<String>,
    pub gif_frame_count: usize,
    pub frame_sequence_count: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            image_models: DEFAULT_IMAGE_MODELS.iter().map(|m| m.to_string()).collect(),
            text_models: DEFAULT_TEXT_MODELS.iter().map(|m| m.to_string()).collect(),
            gif_frame_count: DEFAULT_FRAME_COUNT,
            frame_sequence_count: DEFAULT_FRAME_COUNT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub gateway_url: String,
    pub gateway_api_key: String,
    pub supabase: Option<SupabaseSettings>,
    pub port: u16,
    pub secret_key: Option<String>,
    pub cache_dir: PathBuf,
    pub cache_base_url: String,
    pub prefs_dir: PathBuf,
    pub http_timeout: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
    pub generation: GenerationSettings,
}

/// Reads one variable; blank values count as absent.
struct Source<F>(F);

impl<F: Fn(&str) -> Option<String>> Source<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str, default: T) -> StudioResult<T> {
        match self.get(name) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|_| StudioError::Config(format!("{name} has invalid value {raw:?}"))),
            None => Ok(default),
        }
    }

    fn list(&self, name: &str, default: &[&str]) -> Vec<String> {
        match self.get(name) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            None => default.iter().map(|item| item.to_string()).collect(),
        }
    }
}

impl Settings {
    pub fn from_env() -> StudioResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StudioResult<Self> {
        let source = Source(lookup);

        let gateway_api_key = source
            .get("AI_GATEWAY_API_KEY")
            .ok_or_else(|| StudioError::Config("AI_GATEWAY_API_KEY not configured".into()))?;
        let gateway_url = source
            .get("AI_GATEWAY_URL")
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());

        let supabase = match (source.get("SUPABASE_URL"), source.get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_key)) => Some(SupabaseSettings { url, service_key }),
            (None, None) => None,
            _ => {
                return Err(StudioError::Config(
                    "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set together".into(),
                ));
            }
        };

        let port = source.parsed("STUDIO_PORT", DEFAULT_PORT)?;
        let generation = GenerationSettings {
            image_models: source.list("IMAGE_MODELS", DEFAULT_IMAGE_MODELS),
            text_models: source.list("TEXT_MODELS", DEFAULT_TEXT_MODELS),
            gif_frame_count: source.parsed("GIF_FRAME_COUNT", DEFAULT_FRAME_COUNT)?,
            frame_sequence_count: source.parsed("FRAME_SEQUENCE_COUNT", DEFAULT_FRAME_COUNT)?,
        };
        if generation.image_models.is_empty() || generation.text_models.is_empty() {
            return Err(StudioError::Config("model lists must not be empty".into()));
        }
        for (name, count) in [
            ("GIF_FRAME_COUNT", generation.gif_frame_count),
            ("FRAME_SEQUENCE_COUNT", generation.frame_sequence_count),
        ] {
            if count == 0 || count > MAX_FRAME_COUNT {
                return Err(StudioError::Config(format!(
                    "{name} must be between 1 and {MAX_FRAME_COUNT}"
                )));
            }
        }

        let log_format = match source.get("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(StudioError::Config(format!("LOG_FORMAT {other:?} is not text or json")));
            }
        };

        let bind_address = format!("0.0.0.0:{port}");
        Ok(Self {
            gateway_url,
            gateway_api_key,
            supabase,
            port,
            secret_key: source.get("SECRET_KEY"),
            cache_dir: source
                .get("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_dir(dirs::cache_dir())),
            cache_base_url: resolve_cache_base_url(
                source.get("CACHE_URL"),
                source.get("DOMAIN"),
                &bind_address,
            ),
            prefs_dir: source
                .get("PREFS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_dir(dirs::config_dir())),
            http_timeout: Duration::from_secs(
                source.parsed("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            ),
            log_level: source.get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            generation,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Prefixes `path` with the secret segment when one is configured.
    pub fn secret_path(&self, path: &str) -> String {
        match self.secret_key.as_deref() {
            Some(secret) => format!("/{secret}{path}"),
            None => path.to_string(),
        }
    }
}

fn default_dir(base: Option<PathBuf>) -> PathBuf {
    let mut dir = base.unwrap_or_else(|| PathBuf::from("."));
    dir.push(APP_DIR);
    dir
}

fn resolve_cache_base_url(cache_url: Option<String>, domain: Option<String>, bind_address: &str) -> String {
    if let Some(cache_url) = cache_url {
        return format!("{}/cache", cache_url.trim_end_matches('/'));
    }
    let raw_domain = domain.unwrap_or_else(|| bind_address.to_string());
    let trimmed = raw_domain.trim_end_matches('/');
    let base = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    format!("{}/cache", normalize_scheme(&base))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> StudioResult<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_lookup(move |name| vars.get(name).cloned())
    }

    #[test]
    fn gateway_key_is_required() {
        let err = settings(&[]).unwrap_err();
        assert!(matches!(err, StudioError::Config(message) if message.contains("AI_GATEWAY_API_KEY")));
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let settings = settings(&[("AI_GATEWAY_API_KEY", "k")]).unwrap();
        assert_eq!(settings.gateway_url, DEFAULT_GATEWAY_URL);
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.generation, GenerationSettings::default());
        assert!(settings.supabase.is_none());
        assert_eq!(settings.log_format, LogFormat::Text);
        assert_eq!(settings.cache_base_url, "http://0.0.0.0:3000/cache");
        assert_eq!(settings.secret_path("/mcp"), "/mcp");
    }

    #[test]
    fn model_lists_are_comma_separated() {
        let settings = settings(&[
            ("AI_GATEWAY_API_KEY", "k"),
            ("IMAGE_MODELS", " a/one , ,b/two "),
        ])
        .unwrap();
        assert_eq!(settings.generation.image_models, vec!["a/one", "b/two"]);
    }

    #[test]
    fn supabase_needs_both_values() {
        let err = settings(&[("AI_GATEWAY_API_KEY", "k"), ("SUPABASE_URL", "https://x")]).unwrap_err();
        assert!(matches!(err, StudioError::Config(_)));

        let settings = settings(&[
            ("AI_GATEWAY_API_KEY", "k"),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ])
        .unwrap();
        assert_eq!(settings.supabase.unwrap().service_key, "service");
    }

    #[test]
    fn invalid_numbers_are_errors_not_defaults() {
        assert!(settings(&[("AI_GATEWAY_API_KEY", "k"), ("STUDIO_PORT", "eighty")]).is_err());
        assert!(settings(&[("AI_GATEWAY_API_KEY", "k"), ("GIF_FRAME_COUNT", "0")]).is_err());
    }

    #[test]
    fn cache_url_and_secret_path() {
        let settings = settings(&[
            ("AI_GATEWAY_API_KEY", "k"),
            ("DOMAIN", "http://https://studio.example.com/"),
            ("SECRET_KEY", "s3cret"),
        ])
        .unwrap();
        assert_eq!(settings.cache_base_url, "https://studio.example.com/cache");
        assert_eq!(settings.secret_path("/mcp"), "/s3cret/mcp");
    }
}
