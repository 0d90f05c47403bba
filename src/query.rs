use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::QueryConfig;
use crate::models::{QueryRequest, QueryResponse};

/// Client for the upstream retrieval service that answers questions and
/// translates source documents.
#[derive(Clone)]
pub struct QueryClient {
    client: Client,
    base_url: String,
    k: usize,
    rerank: bool,
}

impl QueryClient {
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            k: config.k,
            rerank: config.rerank,
        }
    }

    pub async fn query(&self, question: &str) -> Result<QueryResponse> {
        let url = format!("{}/query/", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&QueryRequest {
                query: question.to_string(),
                k: self.k,
                rerank: self.rerank,
            })
            .send()
            .await
            .context("failed to call query endpoint")?;

        if response.status() != StatusCode::OK {
            anyhow::bail!("query endpoint returned {}", response.status());
        }

        response
            .json::<QueryResponse>()
            .await
            .context("failed to decode query endpoint response")
    }

    /// Forwards a translation request untouched and hands back the upstream
    /// status and body.
    pub async fn translate(&self, body: &Value) -> Result<(StatusCode, Value)> {
        let url = format!("{}/translate", self.base_url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("failed to call translate endpoint")?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .context("failed to decode translate endpoint response")?;
        Ok((status, body))
    }
}
