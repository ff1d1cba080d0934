//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use traits::{
    ChunkStream, LlmClient, LlmError, ModelChunk, ModelRequest, ModelResponse, ToolChoice,
    ToolSpec,
};

/// 按 [llm].provider 创建客户端：openai 走 OpenAI 兼容端点（base_url 可指向任意兼容服务），mock 用于离线调试
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    match cfg.llm.provider.trim() {
        "mock" => {
            tracing::info!("Using mock LLM client");
            Ok(Arc::new(MockLlmClient))
        }
        "openai" => {
            tracing::info!(model = %cfg.llm.model, "Using OpenAI-compatible client");
            Ok(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                cfg.llm.api_key.as_deref(),
            )))
        }
        other => Err(LlmError::UnsupportedProvider(other.to_string())),
    }
}
