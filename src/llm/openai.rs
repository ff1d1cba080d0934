//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 OpenAI、OpenRouter、DashScope、自建代理等。
//! 负责 Message/ToolSpec/ToolChoice 与 API 类型互转，流式时按 index 拼装分片的工具调用。

use std::collections::BTreeMap;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionNamedToolChoice,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionName, FunctionObjectArgs,
};
use async_openai::Client;
use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use crate::llm::{
    ChunkStream, LlmClient, LlmError, ModelChunk, ModelRequest, ModelResponse, ToolChoice,
};
use crate::memory::{Message, Role, ToolCall};

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    fn build_request(
        &self,
        request: &ModelRequest,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.messages.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()?
                .into(),
        );
        for m in &request.messages {
            messages.push(to_openai_message(m)?);
        }

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(|spec| {
                    ChatCompletionToolArgs::default()
                        .r#type(ChatCompletionToolType::Function)
                        .function(
                            FunctionObjectArgs::default()
                                .name(&spec.name)
                                .description(&spec.description)
                                .parameters(spec.parameters.clone())
                                .build()?,
                        )
                        .build()
                })
                .collect::<Result<Vec<ChatCompletionTool>, OpenAIError>>()?;
            args.tools(tools);
            if let Some(choice) = &request.tool_choice {
                args.tool_choice(to_openai_tool_choice(choice));
            }
        }
        if stream {
            args.stream(true);
        }
        args.build()
    }
}

fn to_openai_message(m: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let message = match m.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(m.content.clone())
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(m.content.clone())
            .build()?
            .into(),
        Role::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if !m.content.is_empty() {
                args.content(m.content.clone());
            }
            if !m.tool_calls.is_empty() {
                args.tool_calls(
                    m.tool_calls
                        .iter()
                        .map(|c| ChatCompletionMessageToolCall {
                            id: c.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: c.name.clone(),
                                arguments: c.arguments.to_string(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            args.build()?.into()
        }
        Role::Tool => ChatCompletionRequestToolMessageArgs::default()
            .content(m.content.clone())
            .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
            .build()?
            .into(),
    };
    Ok(message)
}

fn to_openai_tool_choice(choice: &ToolChoice) -> ChatCompletionToolChoiceOption {
    match choice {
        ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
        ToolChoice::Required => ChatCompletionToolChoiceOption::Required,
        ToolChoice::None => ChatCompletionToolChoiceOption::None,
        ToolChoice::Tool(name) => {
            ChatCompletionToolChoiceOption::Named(ChatCompletionNamedToolChoice {
                r#type: ChatCompletionToolType::Function,
                function: FunctionName { name: name.clone() },
            })
        }
    }
}

/// API 错误保留 provider 原文作为 message，原始错误作为 source
fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::Reqwest(e) => LlmError::Network(e.to_string()),
        OpenAIError::ApiError(api) => {
            let message = api.message.clone();
            LlmError::wrapped(message, OpenAIError::ApiError(api))
        }
        other => LlmError::wrapped(other.to_string(), other),
    }
}

fn parse_arguments(raw: &str) -> Result<Value, LlmError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| LlmError::InvalidResponse(format!("tool arguments: {e}: {raw}")))
}

fn from_openai_tool_call(call: ChatCompletionMessageToolCall) -> Result<ToolCall, LlmError> {
    let arguments = parse_arguments(&call.function.arguments)?;
    Ok(ToolCall::new(call.id, call.function.name, arguments))
}

/// 流式分片中尚未拼装完成的工具调用
#[derive(Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingCall {
    fn finish(self) -> Result<ToolCall, LlmError> {
        let id = if self.id.is_empty() {
            format!("call_{}", uuid::Uuid::new_v4().simple())
        } else {
            self.id
        };
        Ok(ToolCall::new(id, self.name, parse_arguments(&self.arguments)?))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let req = self.build_request(request, false).map_err(map_openai_error)?;
        let response = self
            .client
            .chat()
            .create(req)
            .await
            .map_err(map_openai_error)?;

        let Some(choice) = response.choices.into_iter().next() else {
            return Err(LlmError::InvalidResponse("no choices".to_string()));
        };
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(from_openai_tool_call)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn complete_stream(&self, request: &ModelRequest) -> Result<ChunkStream, LlmError> {
        let req = self.build_request(request, true).map_err(map_openai_error)?;
        let mut upstream = self
            .client
            .chat()
            .create_stream(req)
            .await
            .map_err(map_openai_error)?;

        // 非 2xx 时 SSE 层只报告状态码，丢掉 provider 的错误正文；
        // 首个分片前就失败时改用非流式请求重放一次，取回带原文的 ApiError
        let first = upstream.next().await;
        if let Some(Err(OpenAIError::StreamError(reason))) = &first {
            tracing::warn!(reason = %reason, "stream rejected before first chunk, replaying without streaming");
            return Ok(self.complete(request).await?.into_chunks());
        }
        let mut upstream = futures_util::stream::iter(first).chain(upstream);

        Ok(Box::pin(stream! {
            let mut pending: BTreeMap<u32, PendingCall> = BTreeMap::new();
            while let Some(item) = upstream.next().await {
                let response = match item {
                    Ok(response) => response,
                    Err(e) => {
                        yield Err(map_openai_error(e));
                        return;
                    }
                };
                for choice in response.choices {
                    if let Some(text) = choice.delta.content {
                        if !text.is_empty() {
                            yield Ok(ModelChunk::Text(text));
                        }
                    }
                    for chunk in choice.delta.tool_calls.unwrap_or_default() {
                        let entry = pending.entry(chunk.index).or_default();
                        if let Some(id) = chunk.id {
                            entry.id = id;
                        }
                        if let Some(function) = chunk.function {
                            if let Some(name) = function.name {
                                entry.name.push_str(&name);
                            }
                            if let Some(arguments) = function.arguments {
                                entry.arguments.push_str(&arguments);
                            }
                        }
                    }
                }
            }
            for (_, call) in pending {
                yield call.finish().map(ModelChunk::ToolCall);
            }
        }))
    }
}
