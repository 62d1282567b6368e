//! User-defined filter options, kept per owner in a single JSON document.
//!
//! The document is read once when the store opens. Every mutation works on a
//! copy, writes it to a temporary file, renames it over the document, and only
//! then replaces the in-memory state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

use crate::error::{StudioError, StudioResult};

const FILE_NAME: &str = "custom_filters.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFilter {
    pub value: String,
    pub category: String,
}

/// One owner's added options and named custom filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDocument {
    #[serde(default)]
    pub options: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub custom_filters: BTreeMap<String, CustomFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct FilterBook {
    #[serde(default)]
    owners: BTreeMap<String, FilterDocument>,
}

#[derive(Debug)]
pub struct FilterStore {
    path: PathBuf,
    book: Mutex<FilterBook>,
}

fn required(field: &str, value: &str) -> StudioResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StudioError::invalid(format!("{field} é obrigatório")));
    }
    Ok(trimmed.to_string())
}

impl FilterStore {
    /// Opens the store in `dir`, starting empty when no document exists yet.
    pub async fn open(dir: &Path) -> StudioResult<Self> {
        let path = dir.join(FILE_NAME);
        let book = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(book) => book,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unreadable filter document, starting empty");
                    FilterBook::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => FilterBook::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            book: Mutex::new(book),
        })
    }

    async fn persist(&self, book: &FilterBook) -> StudioResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(book)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, payload).await?;
        fs::rename(&staging, &self.path).await?;
        debug!(path = %self.path.display(), "filter document saved");
        Ok(())
    }

    /// Applies `change` to a copy of `owner`'s document. Nothing is written
    /// when it reports no change, and memory is untouched when the write fails.
    async fn commit<F>(&self, owner: &str, change: F) -> StudioResult<bool>
    where
        F: FnOnce(&mut FilterDocument) -> bool,
    {
        let mut book = self.book.lock().await;
        let mut next = book.clone();
        if !change(next.owners.entry(owner.to_string()).or_default()) {
            return Ok(false);
        }
        next.owners.retain(|_, document| *document != FilterDocument::default());
        self.persist(&next).await?;
        *book = next;
        Ok(true)
    }

    /// Adds `value` to `owner`'s options for `key`. Returns `false` when it was already present.
    pub async fn add_option(&self, owner: &str, key: &str, value: &str) -> StudioResult<bool> {
        let key = required("filtro", key)?;
        let value = required("valor", value)?;
        self.commit(owner, |document| {
            let options = document.options.entry(key).or_default();
            if options.contains(&value) {
                return false;
            }
            options.push(value);
            true
        })
        .await
    }

    pub async fn remove_option(&self, owner: &str, key: &str, value: &str) -> StudioResult<bool> {
        self.commit(owner, |document| {
            let Some(options) = document.options.get_mut(key.trim()) else {
                return false;
            };
            let before = options.len();
            options.retain(|option| option != value.trim());
            if options.len() == before {
                return false;
            }
            if options.is_empty() {
                document.options.remove(key.trim());
            }
            true
        })
        .await
    }

    pub async fn options(&self, owner: &str, key: &str) -> Vec<String> {
        let book = self.book.lock().await;
        book.owners
            .get(owner)
            .and_then(|document| document.options.get(key.trim()))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn snapshot(&self, owner: &str) -> FilterDocument {
        let book = self.book.lock().await;
        book.owners.get(owner).cloned().unwrap_or_default()
    }

    /// Inserts or replaces the named custom filter.
    pub async fn add_custom_filter(
        &self,
        owner: &str,
        name: &str,
        value: &str,
        category: &str,
    ) -> StudioResult<()> {
        let name = required("nome", name)?;
        let filter = CustomFilter {
            value: required("valor", value)?,
            category: required("categoria", category)?,
        };
        self.commit(owner, |document| {
            document.custom_filters.insert(name, filter.clone()) != Some(filter)
        })
        .await?;
        Ok(())
    }

    pub async fn remove_custom_filter(&self, owner: &str, name: &str) -> StudioResult<bool> {
        self.commit(owner, |document| document.custom_filters.remove(name.trim()).is_some())
            .await
    }

    pub async fn custom_filters_in(&self, owner: &str, category: &str) -> Vec<(String, CustomFilter)> {
        let book = self.book.lock().await;
        let Some(document) = book.owners.get(owner) else {
            return Vec::new();
        };
        document
            .custom_filters
            .iter()
            .filter(|(_, filter)| filter.category == category)
            .map(|(name, filter)| (name.clone(), filter.clone()))
            .collect()
    }
}
