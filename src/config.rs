use std::env;

#[derive(Clone, Debug)]
pub struct QueryConfig {
    pub base_url: String,
    pub k: usize,
    pub rerank: bool,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub query: QueryConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("CITECHAT_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            query: QueryConfig {
                base_url: env::var("CITECHAT_QUERY_URL")
                    .unwrap_or_else(|_| "http://localhost:8888".to_string()),
                k: env::var("CITECHAT_QUERY_K")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                rerank: env::var("CITECHAT_RERANK")
                    .ok()
                    .and_then(|v| parse_flag(&v))
                    .unwrap_or(true),
            },
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
