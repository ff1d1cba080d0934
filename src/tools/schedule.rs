//! 定时任务工具：查询 / 删除 / 创建（cron 语法）
//!
//! 持久化与触发由后端负责；触发后经 Agent::trigger_schedule 回到对话。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{input_schema, parse_args};
use crate::tools::{BackendClient, Tool, ToolContext, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
struct GetSchedulesArgs {
    bot_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RemoveScheduleArgs {
    bot_id: Option<String>,
    /// 定时任务 ID
    id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateScheduleArgs {
    bot_id: Option<String>,
    /// 任务名称
    name: String,
    /// 任务描述
    #[serde(default)]
    description: String,
    /// Cron 表达式，例如 "0 9 * * *"
    pattern: String,
    /// 触发时发送给你的自然语言指令
    command: String,
    /// 最多触发次数；只执行一次时设为 1
    #[serde(alias = "maxCalls")]
    max_calls: Option<u32>,
}

#[derive(Clone)]
struct ScheduleApi {
    backend: BackendClient,
    context: ToolContext,
}

impl ScheduleApi {
    fn schedules_path(&self, bot_id: Option<&str>) -> Result<String, ToolError> {
        let bot_id = self.context.resolve_bot_id(bot_id)?;
        Ok(format!("/bots/{bot_id}/schedules"))
    }
}

pub struct GetSchedulesTool(ScheduleApi);
pub struct RemoveScheduleTool(ScheduleApi);
pub struct ScheduleTool(ScheduleApi);

/// 构建全部定时任务工具
pub fn schedule_tools(backend: BackendClient, context: ToolContext) -> Vec<std::sync::Arc<dyn Tool>> {
    let api = ScheduleApi { backend, context };
    vec![
        std::sync::Arc::new(GetSchedulesTool(api.clone())),
        std::sync::Arc::new(RemoveScheduleTool(api.clone())),
        std::sync::Arc::new(ScheduleTool(api)),
    ]
}

#[async_trait]
impl Tool for GetSchedulesTool {
    fn name(&self) -> &str {
        "get_schedules"
    }

    fn description(&self) -> &str {
        "Get the list of schedules"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<GetSchedulesArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: GetSchedulesArgs = parse_args(args)?;
        let path = self.0.schedules_path(args.bot_id.as_deref())?;
        let schedules = self.0.backend.get(&path, &[]).await?;
        Ok(json!({ "success": true, "schedules": schedules }))
    }
}

#[async_trait]
impl Tool for RemoveScheduleTool {
    fn name(&self) -> &str {
        "remove_schedule"
    }

    fn description(&self) -> &str {
        "Remove a schedule by id"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<RemoveScheduleArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: RemoveScheduleArgs = parse_args(args)?;
        let path = self.0.schedules_path(args.bot_id.as_deref())?;
        let id = args.id.trim();
        if id.is_empty() {
            return Err(ToolError::InvalidArguments("id must not be empty".into()));
        }
        self.0.backend.delete(&format!("{path}/{id}")).await
    }
}

#[async_trait]
impl Tool for ScheduleTool {
    fn name(&self) -> &str {
        "schedule"
    }

    fn description(&self) -> &str {
        "Schedule a natural language command with Cron syntax"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<CreateScheduleArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: CreateScheduleArgs = parse_args(args)?;
        let path = self.0.schedules_path(args.bot_id.as_deref())?;
        if args.pattern.split_whitespace().count() < 5 {
            return Err(ToolError::InvalidArguments(format!(
                "pattern `{}` is not a cron expression",
                args.pattern
            )));
        }
        if args.max_calls == Some(0) {
            return Err(ToolError::InvalidArguments("max_calls must be at least 1".into()));
        }
        self.0
            .backend
            .post(
                &path,
                &json!({
                    "name": args.name,
                    "description": args.description,
                    "pattern": args.pattern,
                    "command": args.command,
                    "max_calls": args.max_calls,
                }),
            )
            .await
    }
}
