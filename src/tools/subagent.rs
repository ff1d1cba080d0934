//! call_subagent 工具：把一个子任务委派给临时构建的子代理
//!
//! 子代理沿用父级的模型客户端、后端凭据与观察者，权限为父级权限去掉 subagent（不可再委派），
//! 不强制 tool choice；结果只回传最终文本与子代理启用的技能。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::agent::{Agent, AgentAction, AgentInput, AgentParams, SubagentProfile};
use crate::llm::LlmClient;
use crate::observability::ToolObserver;
use crate::tools::schema::{input_schema, parse_args};
use crate::tools::{BackendClient, Tool, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
struct CallSubagentArgs {
    /// 子代理名称（决定其角色）
    name: String,
    /// 子代理职责描述
    description: Option<String>,
    /// 交给子代理完成的任务
    query: String,
}

pub struct CallSubagentTool {
    params: AgentParams,
    llm: Arc<dyn LlmClient>,
    backend: BackendClient,
    observer: Arc<dyn ToolObserver>,
}

impl CallSubagentTool {
    /// parent 为父级参数；子代理参数由此派生
    pub fn new(
        parent: &AgentParams,
        llm: Arc<dyn LlmClient>,
        backend: BackendClient,
        observer: Arc<dyn ToolObserver>,
    ) -> Self {
        Self {
            params: child_params(parent),
            llm,
            backend,
            observer,
        }
    }
}

fn child_params(parent: &AgentParams) -> AgentParams {
    let mut params = parent.clone();
    params.allowed.retain(|a| *a != AgentAction::Subagent);
    params.tool_choice = None;
    params.use_skills.clear();
    params
}

#[async_trait]
impl Tool for CallSubagentTool {
    fn name(&self) -> &str {
        "call_subagent"
    }

    fn description(&self) -> &str {
        "Delegate a self-contained task to a named subagent and get its final answer"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<CallSubagentArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: CallSubagentArgs = parse_args(args)?;
        let name = args.name.trim();
        if name.is_empty() {
            return Err(ToolError::InvalidArguments("name must not be empty".into()));
        }

        let mut child = Agent::new(self.params.clone(), self.llm.clone(), self.backend.clone())
            .with_observer(self.observer.clone());
        let profile = SubagentProfile::new(name, args.description);
        let result = child
            .ask_as_subagent(AgentInput::query(args.query), profile)
            .await
            .map_err(|e| ToolError::Subagent(Box::new(e)))?;

        Ok(json!({
            "name": name,
            "text": result.final_text(),
            "skills": result.skills,
        }))
    }
}
