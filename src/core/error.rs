//! Agent 错误类型
//!
//! 终止性错误直接返回调用方：配置缺失、工具失败、幻觉工具、模型调用失败。
//! 唯一的本地恢复是 agent::fallback 对 tool choice 拒绝的一次性降级重试。

use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::ToolError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Tool {tool} failed: {source}")]
    ToolExecutionFailed {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// 必需的身份参数（如 bot_id）在工具执行时缺失；不重试
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 把工具执行错误归类：身份缺失属于配置错误，其余为工具失败
    pub fn from_tool(tool: &str, err: ToolError) -> Self {
        match err {
            ToolError::MissingIdentity(field) => {
                AgentError::ConfigError(format!("{field} is required (tool {tool})"))
            }
            other => AgentError::ToolExecutionFailed {
                tool: tool.to_string(),
                source: other,
            },
        }
    }
}
