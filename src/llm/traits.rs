//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：一次调用对应多步循环中的一个推理步，
//! complete（非流式）与 complete_stream（流式增量）。多步循环与步数上限在 agent::generation。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{stream, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::memory::{Message, ToolCall};

/// 模型调用失败；Api 保留上游原始错误作为 source，供 tool choice 拒绝检测查看一层 cause
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("{message}")]
    Api {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported LLM provider: {0} (expected one of: openai, mock)")]
    UnsupportedProvider(String),
}

impl LlmError {
    pub fn api(message: impl Into<String>) -> Self {
        LlmError::Api {
            message: message.into(),
            source: None,
        }
    }

    pub fn wrapped(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LlmError::Api {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Tool choice 指令：auto（模型自行决定）、required、none 或强制某个工具
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ToolChoiceRepr", into = "ToolChoiceRepr")]
pub enum ToolChoice {
    Auto,
    Required,
    None,
    Tool(String),
}

/// 配置中的写法："auto" / "required" / "none" 或 { type = "tool", toolName = "web_search" }
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ToolChoiceRepr {
    Mode(String),
    Tool {
        #[serde(rename = "type")]
        kind: String,
        #[serde(rename = "toolName", alias = "name")]
        name: String,
    },
}

impl TryFrom<ToolChoiceRepr> for ToolChoice {
    type Error = String;

    fn try_from(repr: ToolChoiceRepr) -> Result<Self, Self::Error> {
        match repr {
            ToolChoiceRepr::Mode(mode) => match mode.as_str() {
                "auto" => Ok(ToolChoice::Auto),
                "required" => Ok(ToolChoice::Required),
                "none" => Ok(ToolChoice::None),
                other => Err(format!("unknown tool choice: {other}")),
            },
            ToolChoiceRepr::Tool { kind, name } if kind == "tool" => Ok(ToolChoice::Tool(name)),
            ToolChoiceRepr::Tool { kind, .. } => Err(format!("unknown tool choice type: {kind}")),
        }
    }
}

impl From<ToolChoice> for ToolChoiceRepr {
    fn from(choice: ToolChoice) -> Self {
        match choice {
            ToolChoice::Auto => ToolChoiceRepr::Mode("auto".into()),
            ToolChoice::Required => ToolChoiceRepr::Mode("required".into()),
            ToolChoice::None => ToolChoiceRepr::Mode("none".into()),
            ToolChoice::Tool(name) => ToolChoiceRepr::Tool {
                kind: "tool".into(),
                name,
            },
        }
    }
}

/// 暴露给模型的工具描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 单步请求：system 文本、到目前为止的对话、可用工具、tool choice
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: Option<ToolChoice>,
}

/// 单步非流式响应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
    /// 按 文本 -> 工具调用 顺序展开为分片流
    pub fn into_chunks(self) -> ChunkStream {
        let mut chunks = Vec::with_capacity(self.tool_calls.len() + 1);
        if !self.content.is_empty() {
            chunks.push(Ok(ModelChunk::Text(self.content)));
        }
        chunks.extend(self.tool_calls.into_iter().map(|c| Ok(ModelChunk::ToolCall(c))));
        Box::pin(stream::iter(chunks))
    }
}

/// 流式增量：文本片段，或一个已组装完整的工具调用
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    Text(String),
    ToolCall(ToolCall),
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ModelChunk, LlmError>> + Send>>;

/// LLM 客户端 trait：一次调用 = 一个推理步
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError>;

    /// 流式完成；默认实现退化为一次 complete 后展开为分片
    async fn complete_stream(&self, request: &ModelRequest) -> Result<ChunkStream, LlmError> {
        Ok(self.complete(request).await?.into_chunks())
    }
}
