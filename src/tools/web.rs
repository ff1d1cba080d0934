//! web_search 工具：Brave Search API
//!
//! 仅在配置了 Brave API key 时暴露；返回精简后的结果列表（title / url / description）。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{input_schema, parse_args};
use crate::tools::{Tool, ToolError};

pub const DEFAULT_BRAVE_BASE_URL: &str = "https://api.search.brave.com";

#[derive(Debug, Deserialize, JsonSchema)]
struct WebSearchArgs {
    /// 搜索关键词
    query: String,
    /// 返回结果数量（1-20）
    count: Option<u32>,
}

/// Brave 搜索工具
pub struct WebSearchTool {
    client: Client,
    api_key: String,
    base_url: String,
    default_count: u32,
}

impl WebSearchTool {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout_secs: u64,
        default_count: u32,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BRAVE_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_count: default_count.clamp(1, 20),
        }
    }
}

/// 只保留模型需要的字段
fn simplify_results(body: &Value) -> Value {
    let results = body["web"]["results"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|r| {
                    json!({
                        "title": r["title"].as_str().unwrap_or_default(),
                        "url": r["url"].as_str().unwrap_or_default(),
                        "description": r["description"].as_str().unwrap_or_default(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Value::Array(results)
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web with Brave Search and return titles, URLs and snippets"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<WebSearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: WebSearchArgs = parse_args(args)?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".into()));
        }
        let count = args.count.unwrap_or(self.default_count).clamp(1, 20);

        let resp = self
            .client
            .get(format!("{}/res/v1/web/search", self.base_url))
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query.to_string()), ("count", count.to_string())])
            .send()
            .await
            .map_err(|e| ToolError::Http(format!("brave search: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ToolError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ToolError::Http(format!("brave search body: {e}")))?;
        Ok(simplify_results(&body))
    }
}
