use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{NewTask, Task, TaskId},
    error::ApiError,
    protocol::ListQuery,
};
use tracing::debug;
use url::Url;

use crate::error::NetworkError;

pub const PUBLIC_MOCK_API: &str = "https://jsonplaceholder.typicode.com";

const MAX_ERROR_BODY_CHARS: usize = 200;

/// CRUD calls against a `/todos` collection resource.
#[async_trait]
pub trait TodoApi: Send + Sync {
    async fn list(&self, limit: Option<u32>) -> Result<Vec<Task>, NetworkError>;
    async fn create(&self, task: &NewTask) -> Result<Task, NetworkError>;
    async fn update(&self, task: &Task) -> Result<Task, NetworkError>;
    async fn delete(&self, id: &TaskId) -> Result<(), NetworkError>;
}

pub struct HttpTodoApi {
    http: Client,
    base_url: Url,
}

impl HttpTodoApi {
    pub fn new(base_url: &str) -> Result<Self, NetworkError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NetworkError::ClientSetup)?;
        Ok(Self { http, base_url })
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, NetworkError> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, id: Option<&TaskId>) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("todos");
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }
        url
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<Vec<u8>, NetworkError> {
        debug!(%method, %url, "sending todo request");
        let transport = |source| NetworkError::Transport {
            method: method.clone(),
            url: url.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        if !status.is_success() {
            return Err(NetworkError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl TodoApi for HttpTodoApi {
    async fn list(&self, limit: Option<u32>) -> Result<Vec<Task>, NetworkError> {
        let url = self.endpoint(None);
        let request = self.http.get(url.clone()).query(&ListQuery::limited(limit));
        let body = self.execute(Method::GET, &url, request).await?;
        decode(Method::GET, &url, &body)
    }

    async fn create(&self, task: &NewTask) -> Result<Task, NetworkError> {
        let url = self.endpoint(None);
        let request = self.http.post(url.clone()).json(task);
        let body = self.execute(Method::POST, &url, request).await?;
        decode(Method::POST, &url, &body)
    }

    async fn update(&self, task: &Task) -> Result<Task, NetworkError> {
        let url = self.endpoint(Some(&task.id));
        let request = self.http.put(url.clone()).json(task);
        let body = self.execute(Method::PUT, &url, request).await?;
        decode(Method::PUT, &url, &body)
    }

    async fn delete(&self, id: &TaskId) -> Result<(), NetworkError> {
        let url = self.endpoint(Some(id));
        let request = self.http.delete(url.clone());
        // the response body is ignored; mock APIs answer with `{}`
        self.execute(Method::DELETE, &url, request).await?;
        Ok(())
    }
}

/// Accepts absolute http(s) urls that can carry a path.
fn parse_base_url(raw: &str) -> Result<Url, NetworkError> {
    let invalid = |reason: String| NetworkError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let parsed = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.cannot_be_a_base() {
        return Err(invalid("url cannot carry a path".to_string()));
    }
    Ok(parsed)
}

fn decode<T: DeserializeOwned>(method: Method, url: &Url, body: &[u8]) -> Result<T, NetworkError> {
    serde_json::from_slice(body).map_err(|source| NetworkError::Decode {
        method,
        url: url.to_string(),
        source,
    })
}

fn error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    if let Ok(api_error) = serde_json::from_slice::<ApiError>(body) {
        return api_error.message;
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    text.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
