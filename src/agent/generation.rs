//! 多步生成循环
//!
//! 一步 = 一次模型调用 + 按顺序执行该步请求的全部工具调用。
//! 模型不再请求工具或达到 max_steps 时结束；达到上限不是错误，直接返回已产生的消息。
//! 每一步开始前重新调用 system 钩子，让本轮中途启用的技能在下一步可见。
//!
//! 循环只处理「历史快照 + 本次已产生的消息」，不写对话存储；提交由 Agent 在成功后完成。

use futures_util::{Stream, StreamExt};
use serde_json::Value;

use crate::agent::AgentEvent;
use crate::core::AgentError;
use crate::llm::{LlmClient, ModelChunk, ModelRequest, ToolChoice, ToolSpec};
use crate::memory::{Message, ToolCall};
use crate::tools::ToolExecutor;

/// 每步重新生成 system 文本
pub type SystemHook<'a> = &'a (dyn Fn() -> String + Send + Sync);

/// 一次生成所需的全部输入
pub struct GenerationRequest<'a> {
    pub llm: &'a dyn LlmClient,
    pub executor: &'a ToolExecutor,
    pub history: &'a [Message],
    pub system: SystemHook<'a>,
    pub max_steps: usize,
    pub tool_choice: Option<ToolChoice>,
}

impl GenerationRequest<'_> {
    fn step_bound(&self) -> usize {
        self.max_steps.max(1)
    }

    fn model_request(&self, tools: &[ToolSpec], produced: &[Message]) -> ModelRequest {
        ModelRequest {
            system: (self.system)(),
            messages: self.history.iter().chain(produced).cloned().collect(),
            tools: tools.to_vec(),
            tool_choice: self.tool_choice.clone(),
        }
    }
}

/// 流式生成的输出：过程事件，最后一项为本次产生的全部消息
#[derive(Debug)]
pub enum GenerationItem {
    Event(AgentEvent),
    Done(Vec<Message>),
}

/// 工具结果写入 tool 消息的文本形式
pub fn render_tool_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 阻塞形式：返回本次产生的消息（assistant / tool，按产生顺序）
pub async fn run(req: GenerationRequest<'_>) -> Result<Vec<Message>, AgentError> {
    let tools = req.executor.registry().specs();
    let max_steps = req.step_bound();
    let mut produced: Vec<Message> = Vec::new();

    for step in 1..=max_steps {
        let request = req.model_request(&tools, &produced);
        tracing::debug!(step, max_steps, messages = request.messages.len(), "generation step");
        let response = req.llm.complete(&request).await?;

        let calls = response.tool_calls;
        produced.push(Message::assistant_with_tool_calls(
            response.content,
            calls.clone(),
        ));
        if calls.is_empty() {
            return Ok(produced);
        }
        for call in &calls {
            let value = req.executor.execute(call).await?;
            produced.push(Message::tool_result(call.id.clone(), render_tool_output(&value)));
        }
    }

    tracing::info!(max_steps, "step bound reached, returning last produced content");
    Ok(produced)
}

/// 流式形式：逐步产出事件，成功时最后一项为 Done；出错时以 Err 结束
pub fn run_stream<'a>(
    req: GenerationRequest<'a>,
) -> impl Stream<Item = Result<GenerationItem, AgentError>> + Send + 'a {
    async_stream::stream! {
        let tools = req.executor.registry().specs();
        let max_steps = req.step_bound();
        let mut produced: Vec<Message> = Vec::new();

        for step in 1..=max_steps {
            yield Ok(GenerationItem::Event(AgentEvent::StepStart { step, max_steps }));

            let request = req.model_request(&tools, &produced);
            let mut chunks = match req.llm.complete_stream(&request).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    yield Err(AgentError::from(e));
                    return;
                }
            };
            let mut text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(ModelChunk::Text(delta)) => {
                        text.push_str(&delta);
                        yield Ok(GenerationItem::Event(AgentEvent::TextDelta { text: delta }));
                    }
                    Ok(ModelChunk::ToolCall(call)) => {
                        yield Ok(GenerationItem::Event(AgentEvent::ToolCall {
                            id: call.id.clone(),
                            tool: call.name.clone(),
                            args: call.arguments.clone(),
                        }));
                        calls.push(call);
                    }
                    Err(e) => {
                        yield Err(AgentError::from(e));
                        return;
                    }
                }
            }

            produced.push(Message::assistant_with_tool_calls(text, calls.clone()));
            for call in &calls {
                let value = match req.executor.execute(call).await {
                    Ok(value) => value,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                produced.push(Message::tool_result(call.id.clone(), render_tool_output(&value)));
                yield Ok(GenerationItem::Event(AgentEvent::ToolResult {
                    id: call.id.clone(),
                    tool: call.name.clone(),
                    result: value,
                }));
            }
            yield Ok(GenerationItem::Event(AgentEvent::StepFinish { step, tool_calls: calls.len() }));

            if calls.is_empty() {
                break;
            }
            if step == max_steps {
                tracing::info!(max_steps, "step bound reached, returning last produced content");
            }
        }

        yield Ok(GenerationItem::Done(produced));
    }
}
