use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;

/// Flat key/value file store whose keys are also served under a public base URL.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf, base_url: String) -> Self {
        Self {
            base_dir,
            base_url: normalize_scheme(base_url.trim_end_matches('/')),
        }
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve_path(key);
        match fs::metadata(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn get_public_url(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        format!("{}/{key}", self.base_url)
    }

    pub fn resolve_path(&self, key: &str) -> PathBuf {
        let normalized = key.trim_start_matches('/');
        self.base_dir.join(Path::new(normalized))
    }
}

/// Collapses doubled schemes such as `http://https://host` left by misconfigured env values.
pub fn normalize_scheme(raw: &str) -> String {
    let mut base = raw.to_string();
    loop {
        let before = base.clone();
        for (doubled, single) in [
            ("http://http://", "http://"),
            ("https://https://", "https://"),
            ("http://https://", "https://"),
            ("https://http://", "http://"),
        ] {
            if base.starts_with(doubled) {
                base = base.replacen(doubled, single, 1);
            }
        }
        if base == before {
            return base;
        }
    }
}
