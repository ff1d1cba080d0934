//! send_message 工具：通过后端向平台上的某个目标发送消息
//!
//! platform / target 缺省时取身份上下文中的当前平台与回复目标。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{input_schema, parse_args};
use crate::tools::{BackendClient, Tool, ToolContext, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
struct SendMessageArgs {
    /// 消息正文
    message: String,
    /// 目标平台，缺省为当前平台
    platform: Option<String>,
    /// 平台上的接收方 ID，缺省为当前回复目标
    target: Option<String>,
    bot_id: Option<String>,
}

pub struct SendMessageTool {
    backend: BackendClient,
    context: ToolContext,
}

impl SendMessageTool {
    pub fn new(backend: BackendClient, context: ToolContext) -> Self {
        Self { backend, context }
    }
}

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message to a user or group on a platform"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<SendMessageArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: SendMessageArgs = parse_args(args)?;
        let bot_id = self.context.resolve_bot_id(args.bot_id.as_deref())?;
        let platform = args
            .platform
            .or_else(|| self.context.current_platform.clone())
            .ok_or_else(|| ToolError::InvalidArguments("platform is required".into()))?;
        let target = args
            .target
            .or_else(|| self.context.reply_target.clone())
            .ok_or_else(|| ToolError::InvalidArguments("target is required".into()))?;

        self.backend
            .post(
                &format!("/bots/{bot_id}/messages"),
                &json!({
                    "platform": platform,
                    "target": target,
                    "message": args.message,
                }),
            )
            .await
    }
}
