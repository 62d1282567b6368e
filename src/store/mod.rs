//! Persistence adapter over the hosted tables.
//!
//! [`TableStore`] is the raw row interface (JSON in, JSON out) with two
//! backends: the hosted PostgREST/GoTrue service and an in-process store.
//! [`Repository`] layers the typed, owner-scoped operations on top.

pub mod memory;
pub mod models;
pub mod repository;
pub mod supabase;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StudioResult;

pub use memory::MemoryStore;
pub use models::*;
pub use repository::Repository;
pub use supabase::SupabaseStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    GeneratedImages,
    GeneratedGifs,
    GeneratedFrames,
    Albums,
    AlbumItems,
    Characters,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::GeneratedImages => "generated_images",
            Self::GeneratedGifs => "generated_gifs",
            Self::GeneratedFrames => "generated_frames",
            Self::Albums => "albums",
            Self::AlbumItems => "album_items",
            Self::Characters => "characters",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: &'static str,
    pub value: String,
}

pub fn eq(column: &'static str, value: impl Into<String>) -> Filter {
    Filter {
        column,
        value: value.into(),
    }
}

impl Filter {
    /// Whether `row` holds this filter's value in its column.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(self.column) {
            Some(Value::String(value)) => *value == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// Row-level operations against the hosted tables.
///
/// `select` returns rows newest first. `update` and `delete` report the rows
/// they touched so callers can tell "not found" from success.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn authenticate(&self, token: &str) -> StudioResult<AuthUser>;

    async fn insert(&self, table: Table, row: Value) -> StudioResult<Value>;

    async fn select(&self, table: Table, filters: &[Filter]) -> StudioResult<Vec<Value>>;

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> StudioResult<Vec<Value>>;

    async fn delete(&self, table: Table, filters: &[Filter]) -> StudioResult<usize>;
}
