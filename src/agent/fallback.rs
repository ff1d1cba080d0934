//! Tool choice 拒绝降级
//!
//! 两个状态：Direct（使用调用方给出的 tool choice）与 Relaxed（改用 auto）。
//! 模型调用失败且错误信息（或其下一层 source）命中拒绝特征时，Direct -> Relaxed，整个调用从头重来一次；
//! 其余错误原样上抛。每次调用最多转换一次，没有 Relaxed -> Direct。

use std::error::Error as _;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::ToolChoice;

/// 内置的拒绝特征（各家端点的报错文本，并不完整）
pub const DEFAULT_REJECTION_SIGNATURES: [&str; 3] = [
    "Tool choice must be auto",
    "tool_choice",
    "No endpoints found that support the provided",
];

/// 拒绝特征列表（可配置）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    signatures: Vec<String>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REJECTION_SIGNATURES.iter().map(|s| s.to_string()))
    }
}

impl FallbackPolicy {
    /// 空白特征会被丢弃（空串会匹配任何错误）
    pub fn new(signatures: impl IntoIterator<Item = String>) -> Self {
        Self {
            signatures: signatures
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect(),
        }
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    fn matches(&self, text: &str) -> bool {
        self.signatures.iter().any(|s| text.contains(s.as_str()))
    }

    /// 只检查模型调用错误：自身信息，再看一层 source
    pub fn is_rejection(&self, err: &AgentError) -> bool {
        let AgentError::Llm(llm) = err else {
            return false;
        };
        if self.matches(&llm.to_string()) {
            return true;
        }
        llm.source()
            .map(|cause| self.matches(&cause.to_string()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    Direct,
    Relaxed,
}

impl FallbackState {
    /// 有 tool choice 时从 Direct 开始，否则只有 Relaxed 这一条路径
    pub fn initial(requested: Option<&ToolChoice>) -> Self {
        if requested.is_some() {
            FallbackState::Direct
        } else {
            FallbackState::Relaxed
        }
    }

    /// 当前状态下发送给模型的 tool choice
    pub fn directive(self, requested: Option<&ToolChoice>) -> Option<ToolChoice> {
        match self {
            FallbackState::Direct => requested.cloned(),
            FallbackState::Relaxed => requested.map(|_| ToolChoice::Auto),
        }
    }

    /// 判断本次失败是否触发降级；触发时切换到 Relaxed 并返回 true
    pub fn relax_on(&mut self, policy: &FallbackPolicy, err: &AgentError) -> bool {
        if *self == FallbackState::Direct && policy.is_rejection(err) {
            tracing::warn!(error = %err, "tool choice rejected, falling back to auto");
            *self = FallbackState::Relaxed;
            return true;
        }
        false
    }
}

/// 阻塞调用的降级包装：attempt 接收本次应使用的 tool choice，最多被调用两次
pub async fn run_with_fallback<T, F, Fut>(
    policy: &FallbackPolicy,
    requested: Option<&ToolChoice>,
    mut attempt: F,
) -> Result<T, AgentError>
where
    F: FnMut(Option<ToolChoice>) -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut state = FallbackState::initial(requested);
    loop {
        match attempt(state.directive(requested)).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !state.relax_on(policy, &e) {
                    return Err(e);
                }
            }
        }
    }
}
