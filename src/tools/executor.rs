//! 工具执行器
//!
//! 持有本轮的 ToolRegistry 与观察者：按名查找工具（找不到即 HallucinatedTool），
//! 执行前后报告给 ToolObserver，失败时转为 AgentError 原样上抛。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::AgentError;
use crate::memory::ToolCall;
use crate::observability::ToolObserver;
use crate::tools::ToolRegistry;

/// 工具执行器：一轮一个，生成循环按模型给出的顺序逐个执行
pub struct ToolExecutor {
    registry: ToolRegistry,
    observer: Arc<dyn ToolObserver>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, observer: Arc<dyn ToolObserver>) -> Self {
        Self { registry, observer }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行一次工具调用；观察者看到的结果与返回值一致
    pub async fn execute(&self, call: &ToolCall) -> Result<Value, AgentError> {
        let Some(tool) = self.registry.get(&call.name) else {
            tracing::warn!(tool = %call.name, available = ?self.registry.tool_names(), "model requested unknown tool");
            return Err(AgentError::HallucinatedTool(call.name.clone()));
        };

        self.observer.on_call(&call.name, &call.arguments);
        let start = Instant::now();
        match tool.execute(call.arguments.clone()).await {
            Ok(value) => {
                self.observer
                    .on_result(&call.name, &call.arguments, &value, start.elapsed());
                Ok(value)
            }
            Err(e) => {
                self.observer
                    .on_error(&call.name, &call.arguments, &e, start.elapsed());
                Err(AgentError::from_tool(&call.name, e))
            }
        }
    }
}
