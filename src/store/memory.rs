//! In-process [`TableStore`], used when no hosted backend is configured and in tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::cache::compute_hash;
use crate::error::{StudioError, StudioResult};
use crate::store::{AuthUser, Filter, Table, TableStore, eq};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
    users: Mutex<HashMap<String, AuthUser>>,
    sequence: AtomicU64,
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

fn created_at(row: &Value) -> &str {
    row.get("created_at").and_then(Value::as_str).unwrap_or_default()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` as a session for a user with id `user_id`.
    pub fn with_user(self, token: &str, user_id: &str) -> Self {
        self.lock_users().insert(
            token.to_string(),
            AuthUser {
                id: user_id.to_string(),
                email: None,
            },
        );
        self
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, HashMap<Table, Vec<Value>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_users(&self) -> std::sync::MutexGuard<'_, HashMap<String, AuthUser>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(&self, table: Table) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let hash = compute_hash(format!("{table}:{nanos}:{seq}").as_bytes());
        format!(
            "{}-{}-{}-{}-{}",
            &hash[0..8],
            &hash[8..12],
            &hash[12..16],
            &hash[16..20],
            &hash[20..32]
        )
    }

    fn defaults(&self, table: Table) -> Map<String, Value> {
        let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true));
        let mut defaults = Map::new();
        defaults.insert("id".into(), Value::String(self.next_id(table)));
        defaults.insert("created_at".into(), now.clone());
        match table {
            Table::GeneratedImages | Table::GeneratedGifs | Table::GeneratedFrames => {
                defaults.insert("saved".into(), Value::Bool(false));
            }
            Table::Albums | Table::Characters => {
                defaults.insert("updated_at".into(), now);
            }
            Table::AlbumItems => {}
        }
        defaults
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn authenticate(&self, token: &str) -> StudioResult<AuthUser> {
        self.lock_users()
            .get(token)
            .cloned()
            .ok_or(StudioError::Unauthorized)
    }

    async fn insert(&self, table: Table, row: Value) -> StudioResult<Value> {
        let Value::Object(fields) = row else {
            return Err(StudioError::Store(format!("{table}: row must be an object")));
        };
        let mut stored = self.defaults(table);
        stored.extend(fields.into_iter().filter(|(_, value)| !value.is_null()));
        let stored = Value::Object(stored);
        self.lock_tables().entry(table).or_default().push(stored.clone());
        Ok(stored)
    }

    async fn select(&self, table: Table, filters: &[Filter]) -> StudioResult<Vec<Value>> {
        let tables = self.lock_tables();
        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| created_at(b).cmp(created_at(a)));
        Ok(rows)
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> StudioResult<Vec<Value>> {
        let Value::Object(patch) = patch else {
            return Err(StudioError::Store(format!("{table}: patch must be an object")));
        };
        let mut tables = self.lock_tables();
        let mut touched = Vec::new();
        for row in tables.entry(table).or_default().iter_mut() {
            if !matches_all(row, filters) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            touched.push(row.clone());
        }
        Ok(touched)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> StudioResult<usize> {
        let mut tables = self.lock_tables();
        let rows = tables.entry(table).or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .drain(..)
            .partition(|row| matches_all(row, filters));
        *rows = kept;

        // album_items.album_id references albums.id with ON DELETE CASCADE
        if table == Table::Albums {
            let items = tables.entry(Table::AlbumItems).or_default();
            for album in &removed {
                if let Some(album_id) = album.get("id").and_then(Value::as_str) {
                    let filter = eq("album_id", album_id);
                    items.retain(|item| !filter.matches(item));
                }
            }
        }
        Ok(removed.len())
    }
}
