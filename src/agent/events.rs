//! 生成过程事件：用于流式展示文本增量、工具调用与结果

use serde::Serialize;
use serde_json::Value;

use crate::agent::TurnResult;

/// 单个流式事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 推理步开始（从 1 计）
    StepStart { step: usize, max_steps: usize },
    /// 回复文本增量
    TextDelta { text: String },
    /// 模型请求调用工具
    ToolCall {
        id: String,
        tool: String,
        args: Value,
    },
    /// 工具返回
    ToolResult {
        id: String,
        tool: String,
        result: Value,
    },
    /// 推理步结束；tool_calls 为 0 表示本轮结束
    StepFinish { step: usize, tool_calls: usize },
    /// 端点拒绝强制 tool choice，本次调用以 auto 重新开始
    ToolChoiceRelaxed { reason: String },
    /// 本轮结束，携带最终结果
    Finish { result: TurnResult },
}
