//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! - MockLlmClient：取最后一条 User 消息回显为文本，便于本地跑通整条链路
//! - ScriptedLlmClient：按脚本逐步返回响应并记录每次请求，供确定性测试使用

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, ModelRequest, ModelResponse};
use crate::memory::Role;

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(ModelResponse::text(format!("Echo from Mock: {last_user}")))
    }
}

type Responder = Box<dyn Fn(&ModelRequest, usize) -> Result<ModelResponse, LlmError> + Send + Sync>;

/// 脚本化客户端：responder 接收 (请求, 第几次调用) 决定返回
pub struct ScriptedLlmClient {
    responder: Responder,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedLlmClient {
    pub fn new(
        responder: impl Fn(&ModelRequest, usize) -> Result<ModelResponse, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 依次返回给定响应；用完后返回 InvalidResponse
    pub fn from_responses(responses: Vec<ModelResponse>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_, _| {
            queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string()))
        })
    }

    /// 每次都返回同一个响应（如永远请求工具调用）
    pub fn repeating(response: ModelResponse) -> Self {
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// 到目前为止收到的全部请求（按调用顺序）
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let index = {
            let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.responder)(request, index)
    }
}
