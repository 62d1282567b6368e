//! [`TableStore`] backed by the hosted database (PostgREST) and auth (GoTrue) APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{StudioError, StudioResult};
use crate::store::{AuthUser, Filter, Table, TableStore};

#[derive(Clone, Debug)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: Option<String>,
}

fn filter_query(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| (filter.column.to_string(), format!("eq.{}", filter.value)))
        .collect()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("msg"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

async fn read_rows(table: Table, response: Response) -> StudioResult<Vec<Value>> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| StudioError::Store(format!("{table}: {err}")))?;
    if !status.is_success() {
        return Err(StudioError::Store(format!(
            "{table}: {status} {}",
            error_message(&body)
        )));
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(&body)? {
        Value::Array(rows) => Ok(rows),
        row @ Value::Object(_) => Ok(vec![row]),
        other => Err(StudioError::Store(format!("{table}: unexpected body {other}"))),
    }
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, table: Table, request: RequestBuilder) -> StudioResult<Vec<Value>> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| StudioError::Store(format!("{table}: {err}")))?;
        read_rows(table, response).await
    }
}

#[async_trait]
impl TableStore for SupabaseStore {
    async fn authenticate(&self, token: &str) -> StudioResult<AuthUser> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| StudioError::Store(format!("auth: {err}")))?;
        match response.status() {
            status if status.is_success() => {
                let user: UserResponse = response
                    .json()
                    .await
                    .map_err(|err| StudioError::Store(format!("auth: {err}")))?;
                Ok(AuthUser {
                    id: user.id,
                    email: user.email,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StudioError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StudioError::Store(format!(
                    "auth: {status} {}",
                    error_message(&body)
                )))
            }
        }
    }

    async fn insert(&self, table: Table, row: Value) -> StudioResult<Value> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        self.send(table, request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StudioError::Store(format!("{table}: insert returned no row")))
    }

    async fn select(&self, table: Table, filters: &[Filter]) -> StudioResult<Vec<Value>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .query(&filter_query(filters));
        self.send(table, request).await
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> StudioResult<Vec<Value>> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&filter_query(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        self.send(table, request).await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> StudioResult<usize> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&filter_query(filters))
            .header("Prefer", "return=representation");
        Ok(self.send(table, request).await?.len())
    }
}
