//! Platform client trait and its HTTP implementation.

use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::payload::{Credential, Execution, ExecutionFilter, Page, RemoteWorkflow, WorkflowPayload};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-n8n-api-key");

/// Operations the builder needs from the remote platform.
///
/// Implementations must be safe to share between sessions.
#[async_trait]
pub trait WorkflowPlatform: Send + Sync {
    /// Creates a workflow and returns it with its assigned id.
    async fn create_workflow(
        &self,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, Report<PlatformError>>;

    /// Replaces an existing workflow.
    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, Report<PlatformError>>;

    async fn activate_workflow(&self, id: &str) -> Result<RemoteWorkflow, Report<PlatformError>>;

    async fn deactivate_workflow(&self, id: &str)
    -> Result<RemoteWorkflow, Report<PlatformError>>;

    async fn delete_workflow(&self, id: &str) -> Result<(), Report<PlatformError>>;

    async fn get_workflow(&self, id: &str) -> Result<RemoteWorkflow, Report<PlatformError>>;

    async fn list_workflows(&self) -> Result<Vec<RemoteWorkflow>, Report<PlatformError>>;

    async fn list_credentials(&self) -> Result<Vec<Credential>, Report<PlatformError>>;

    async fn get_execution(&self, id: &str) -> Result<Execution, Report<PlatformError>>;

    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<Execution>, Report<PlatformError>>;
}

/// REST client for the platform's public API.
#[derive(Clone)]
pub struct HttpPlatformClient {
    http: reqwest::Client,
    api_root: String,
}

impl HttpPlatformClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the base URL is empty or the API key
    /// cannot be sent as a header.
    pub fn new(config: &PlatformConfig) -> Result<Self, Report<PlatformError>> {
        if config.base_url.trim().is_empty() {
            return Err(PlatformError::InvalidConfig {
                reason: "base_url is empty".to_string(),
            }
            .into());
        }

        let mut headers = HeaderMap::new();
        let api_key =
            HeaderValue::from_str(&config.api_key).map_err(|e| PlatformError::InvalidConfig {
                reason: format!("api key is not a valid header value: {e}"),
            })?;
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| PlatformError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_root: config.api_root(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_root)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, Report<PlatformError>> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, endpoint, "platform request failed");
            if e.is_timeout() {
                PlatformError::Timeout {
                    endpoint: endpoint.to_string(),
                }
            } else {
                PlatformError::ConnectionFailed {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint, status = %status, body = %body, "platform returned error");
            let error = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Unauthorized {
                    endpoint: endpoint.to_string(),
                },
                StatusCode::NOT_FOUND => PlatformError::NotFound {
                    resource: endpoint.to_string(),
                },
                _ => PlatformError::RequestFailed {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    body,
                },
            };
            return Err(error.into());
        }

        let value = response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        Ok(value)
    }

    async fn collect_pages<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, Report<PlatformError>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut request = self.http.get(self.url(path));
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor)]);
            }
            let page: Page<T> = self.send(request, path).await?;
            items.extend(page.data);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!(path, count = items.len(), "collected pages");
        Ok(items)
    }
}

#[async_trait]
impl WorkflowPlatform for HttpPlatformClient {
    #[instrument(skip(self, payload), fields(workflow = %payload.name, nodes = payload.nodes.len()))]
    async fn create_workflow(
        &self,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, Report<PlatformError>> {
        let request = self.http.post(self.url("/workflows")).json(payload);
        let workflow: RemoteWorkflow = self.send(request, "/workflows").await?;
        debug!(workflow_id = %workflow.id, "workflow created");
        Ok(workflow)
    }

    #[instrument(skip(self, payload), fields(workflow = %payload.name))]
    async fn update_workflow(
        &self,
        id: &str,
        payload: &WorkflowPayload,
    ) -> Result<RemoteWorkflow, Report<PlatformError>> {
        let path = format!("/workflows/{id}");
        let request = self.http.put(self.url(&path)).json(payload);
        self.send(request, &path).await
    }

    #[instrument(skip(self))]
    async fn activate_workflow(&self, id: &str) -> Result<RemoteWorkflow, Report<PlatformError>> {
        let path = format!("/workflows/{id}/activate");
        self.send(self.http.post(self.url(&path)), &path).await
    }

    #[instrument(skip(self))]
    async fn deactivate_workflow(
        &self,
        id: &str,
    ) -> Result<RemoteWorkflow, Report<PlatformError>> {
        let path = format!("/workflows/{id}/deactivate");
        self.send(self.http.post(self.url(&path)), &path).await
    }

    #[instrument(skip(self))]
    async fn delete_workflow(&self, id: &str) -> Result<(), Report<PlatformError>> {
        let path = format!("/workflows/{id}");
        let _deleted: JsonValue = self.send(self.http.delete(self.url(&path)), &path).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_workflow(&self, id: &str) -> Result<RemoteWorkflow, Report<PlatformError>> {
        let path = format!("/workflows/{id}");
        self.send(self.http.get(self.url(&path)), &path).await
    }

    #[instrument(skip(self))]
    async fn list_workflows(&self) -> Result<Vec<RemoteWorkflow>, Report<PlatformError>> {
        self.collect_pages("/workflows").await
    }

    #[instrument(skip(self))]
    async fn list_credentials(&self) -> Result<Vec<Credential>, Report<PlatformError>> {
        self.collect_pages("/credentials").await
    }

    #[instrument(skip(self))]
    async fn get_execution(&self, id: &str) -> Result<Execution, Report<PlatformError>> {
        let path = format!("/executions/{id}");
        let request = self
            .http
            .get(self.url(&path))
            .query(&[("includeData", "true")]);
        self.send(request, &path).await
    }

    #[instrument(skip(self))]
    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<Execution>, Report<PlatformError>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(workflow_id) = &filter.workflow_id {
            query.push(("workflowId", workflow_id.clone()));
        }
        if let Some(status) = &filter.status {
            query.push(("status", status.clone()));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }
        if filter.include_data {
            query.push(("includeData", "true".to_string()));
        }

        let request = self.http.get(self.url("/executions")).query(&query);
        let page: Page<Execution> = self.send(request, "/executions").await?;
        Ok(page.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_base_url() {
        let result = HttpPlatformClient::new(&PlatformConfig::new("  ", "key"));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unprintable_api_key() {
        let result = HttpPlatformClient::new(&PlatformConfig::new("http://localhost:5678", "bad\nkey"));
        assert!(result.is_err());
    }

    #[test]
    fn urls_are_rooted_at_api_prefix() {
        let client = HttpPlatformClient::new(&PlatformConfig::new("http://localhost:5678", "key"))
            .expect("client");
        assert_eq!(
            client.url("/workflows/abc/activate"),
            "http://localhost:5678/api/v1/workflows/abc/activate"
        );
    }

    #[tokio::test]
    async fn unreachable_platform_is_a_connection_failure() {
        let mut config = PlatformConfig::new("http://127.0.0.1:9", "key");
        config.timeout_seconds = 2;
        let client = HttpPlatformClient::new(&config).expect("client");
        let result = client.list_workflows().await;
        assert!(result.is_err());
    }
}
