use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const APOLOGY_MESSAGE: &str = "I apologize, but I encountered an error. Please try again.";

pub type DocumentTable = BTreeMap<String, DocumentRef>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub is_from_user: bool,
    pub sent_at: DateTime<Utc>,
    /// Original user text carried by the apology message of a failed round trip.
    pub retry_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
}

impl DocumentRef {
    /// The url as shown in a popup: scheme and one trailing slash removed.
    pub fn display_url(&self) -> &str {
        let url = self
            .url
            .strip_prefix("https://")
            .or_else(|| self.url.strip_prefix("http://"))
            .unwrap_or(&self.url);
        url.strip_suffix('/').unwrap_or(url)
    }
}

/// Key of the document cited by the one-based citation `number`.
pub fn document_key(number: u32) -> Option<String> {
    number.checked_sub(1).map(|index| format!("DOC:{index}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<DocumentTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatReply {
    pub fn answered(response: String, docs: DocumentTable) -> Self {
        Self {
            success: true,
            response: Some(response),
            docs: Some(docs),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            docs: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub question: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateResponse {
    #[serde(default)]
    pub translations: Option<Vec<Translation>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_lang: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub k: usize,
    pub rerank: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub docs: DocumentTable,
}
