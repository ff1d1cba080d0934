//! search_memory 工具：用自然语言检索上下文窗口之外的历史记忆

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{input_schema, parse_args};
use crate::tools::{BackendClient, Tool, ToolContext, ToolError};

const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchMemoryArgs {
    bot_id: Option<String>,
    /// 自然语言查询
    query: String,
    /// 最多返回条数
    limit: Option<u32>,
}

pub struct SearchMemoryTool {
    backend: BackendClient,
    context: ToolContext,
}

impl SearchMemoryTool {
    pub fn new(backend: BackendClient, context: ToolContext) -> Self {
        Self { backend, context }
    }
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn name(&self) -> &str {
        "search_memory"
    }

    fn description(&self) -> &str {
        "Search past memories with natural language"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<SearchMemoryArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: SearchMemoryArgs = parse_args(args)?;
        let bot_id = self.context.resolve_bot_id(args.bot_id.as_deref())?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".into()));
        }
        let mut body = json!({
            "query": query,
            "limit": args.limit.unwrap_or(DEFAULT_LIMIT).max(1),
        });
        if let Some(session_id) = &self.context.session_id {
            body["session_id"] = json!(session_id);
        }
        self.backend
            .post(&format!("/bots/{bot_id}/memory/search"), &body)
            .await
    }
}
