use std::future::Future;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{ChatReply, ChatRequest, TranslateRequest, TranslateResponse};

pub trait ChatTransport {
    fn send(&self, message: String) -> impl Future<Output = Result<ChatReply>>;
}

pub trait TranslationTransport {
    fn translate(
        &self,
        request: TranslateRequest,
    ) -> impl Future<Output = Result<TranslateResponse>>;
}

/// Talks to the front server's `/api/chat` and `/api/translate` endpoints.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        require_success: bool,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to call {url}"))?;

        let status = response.status();
        if require_success && !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{path} returned {status}: {}", body.trim());
        }

        response
            .json::<R>()
            .await
            .with_context(|| format!("failed to decode {path} response ({status})"))
    }
}

impl ChatTransport for HttpTransport {
    // Failed chats come back as a non-2xx status with a JSON body that still
    // decodes into `ChatReply { success: false, .. }`.
    async fn send(&self, message: String) -> Result<ChatReply> {
        self.post_json("/api/chat", &ChatRequest { message }, false).await
    }
}

impl TranslationTransport for HttpTransport {
    async fn translate(&self, request: TranslateRequest) -> Result<TranslateResponse> {
        self.post_json("/api/translate", &request, true).await
    }
}
