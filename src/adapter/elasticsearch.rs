//! Elasticsearch-compatible REST client backing the index publisher.

use crate::error::{AppError, IndexError};
use crate::port::SearchEngine;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Placeholder substituted with the index name in the existence-query template.
pub const INDEX_PLACEHOLDER: &str = "{}";
pub const DEFAULT_INDEX_QUERY_ENDPOINT: &str = "/_cat/indices/{}";

const ALREADY_EXISTS: &str = "resource_already_exists_exception";

#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub index_query_endpoint: String,
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

pub struct ElasticsearchClient {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    index_query_endpoint: String,
}

impl ElasticsearchClient {
    pub fn new(config: ElasticsearchConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout.min(Duration::from_secs(10)))
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| AppError::Init {
                component: "search engine client",
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: format!("{}://{}:{}", config.scheme, config.host, config.port),
            username: config.username,
            password: config.password,
            index_query_endpoint: config.index_query_endpoint,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn index_query_url(&self, index: &str) -> String {
        format!(
            "{}{}",
            self.base_url,
            self.index_query_endpoint.replace(INDEX_PLACEHOLDER, index)
        )
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        index: &str,
    ) -> Result<Response, IndexError> {
        self.with_auth(request)
            .send()
            .await
            .map_err(|source| IndexError::Transport {
                operation,
                index: index.to_string(),
                source,
            })
    }

    async fn check_exists(&self, index: &str) -> Result<bool, IndexError> {
        let request = self
            .client
            .get(self.index_query_url(index))
            .header(ACCEPT, "application/json");
        let response = self.send(request, "index query", index).await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(rejected(response, "index query", index).await),
        }
    }

    async fn create(&self, index: &str) -> Result<(), IndexError> {
        let request = self.client.put(format!("{}/{}", self.base_url, index));
        let response = self.send(request, "index creation", index).await?;

        if response.status().is_success() {
            return Ok(());
        }
        let err = rejected(response, "index creation", index).await;
        let created_concurrently = matches!(
            &err,
            IndexError::Rejected { status: 400, body, .. } if body.contains(ALREADY_EXISTS)
        );
        if created_concurrently {
            debug!(index, "Index was created concurrently");
            return Ok(());
        }
        Err(err)
    }

    async fn submit_bulk(&self, index: &str, body: String) -> Result<Value, IndexError> {
        let request = self
            .client
            .post(format!("{}/{}/_bulk", self.base_url, index))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let response = self.send(request, "bulk", index).await?;

        if !response.status().is_success() {
            return Err(rejected(response, "bulk", index).await);
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| IndexError::Decode {
                operation: "bulk",
                index: index.to_string(),
                message: e.to_string(),
            })
    }
}

async fn rejected(response: Response, operation: &'static str, index: &str) -> IndexError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    IndexError::Rejected {
        operation,
        index: index.to_string(),
        status,
        body,
    }
}

impl SearchEngine for ElasticsearchClient {
    fn index_exists<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, IndexError>> + Send + 'a>> {
        Box::pin(self.check_exists(index))
    }

    fn create_index<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), IndexError>> + Send + 'a>> {
        Box::pin(self.create(index))
    }

    fn bulk<'a>(
        &'a self,
        index: &'a str,
        body: String,
    ) -> Pin<Box<dyn Future<Output = Result<Value, IndexError>> + Send + 'a>> {
        Box::pin(self.submit_bulk(index, body))
    }
}
