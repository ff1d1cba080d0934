//! 联系人工具：搜索 / 创建 / 更新 / 签发绑定令牌 / 绑定平台身份
//!
//! 五个工具共享同一个后端客户端与身份上下文；bot_id 取参数或上下文，缺失时不发请求直接报错。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::tools::schema::{input_schema, parse_args};
use crate::tools::{BackendClient, Tool, ToolContext, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
struct ContactSearchArgs {
    bot_id: Option<String>,
    /// 按名称或别名模糊搜索；为空时列出全部
    query: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ContactFields {
    display_name: Option<String>,
    alias: Option<String>,
    tags: Option<Vec<String>>,
    status: Option<String>,
    metadata: Option<Map<String, Value>>,
}

impl ContactFields {
    fn to_body(&self) -> Value {
        json!({
            "display_name": self.display_name,
            "alias": self.alias,
            "tags": self.tags,
            "status": self.status,
            "metadata": self.metadata,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ContactCreateArgs {
    bot_id: Option<String>,
    #[serde(flatten)]
    fields: ContactFields,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ContactUpdateArgs {
    bot_id: Option<String>,
    contact_id: String,
    #[serde(flatten)]
    fields: ContactFields,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ContactBindTokenArgs {
    bot_id: Option<String>,
    contact_id: String,
    target_platform: Option<String>,
    target_external_id: Option<String>,
    /// 令牌有效期（秒）
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ContactBindArgs {
    bot_id: Option<String>,
    contact_id: String,
    platform: String,
    external_id: String,
    bind_token: String,
}

fn require_contact_id(id: &str) -> Result<&str, ToolError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ToolError::InvalidArguments("contact_id must not be empty".into()));
    }
    Ok(id)
}

/// 联系人工具共享状态
#[derive(Clone)]
struct ContactApi {
    backend: BackendClient,
    context: ToolContext,
}

impl ContactApi {
    fn contacts_path(&self, bot_id: Option<&str>) -> Result<String, ToolError> {
        let bot_id = self.context.resolve_bot_id(bot_id)?;
        Ok(format!("/bots/{bot_id}/contacts"))
    }
}

pub struct ContactSearchTool(ContactApi);
pub struct ContactCreateTool(ContactApi);
pub struct ContactUpdateTool(ContactApi);
pub struct ContactBindTokenTool(ContactApi);
pub struct ContactBindTool(ContactApi);

/// 构建全部联系人工具
pub fn contact_tools(backend: BackendClient, context: ToolContext) -> Vec<std::sync::Arc<dyn Tool>> {
    let api = ContactApi { backend, context };
    vec![
        std::sync::Arc::new(ContactSearchTool(api.clone())),
        std::sync::Arc::new(ContactCreateTool(api.clone())),
        std::sync::Arc::new(ContactUpdateTool(api.clone())),
        std::sync::Arc::new(ContactBindTokenTool(api.clone())),
        std::sync::Arc::new(ContactBindTool(api)),
    ]
}

#[async_trait]
impl Tool for ContactSearchTool {
    fn name(&self) -> &str {
        "contact_search"
    }

    fn description(&self) -> &str {
        "Search contacts by name or alias"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<ContactSearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ContactSearchArgs = parse_args(args)?;
        let path = self.0.contacts_path(args.bot_id.as_deref())?;
        let query = args.query.as_deref().map(str::trim).unwrap_or_default();
        if query.is_empty() {
            self.0.backend.get(&path, &[]).await
        } else {
            self.0.backend.get(&path, &[("q", query.to_string())]).await
        }
    }
}

#[async_trait]
impl Tool for ContactCreateTool {
    fn name(&self) -> &str {
        "contact_create"
    }

    fn description(&self) -> &str {
        "Create a contact"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<ContactCreateArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ContactCreateArgs = parse_args(args)?;
        let path = self.0.contacts_path(args.bot_id.as_deref())?;
        self.0.backend.post(&path, &args.fields.to_body()).await
    }
}

#[async_trait]
impl Tool for ContactUpdateTool {
    fn name(&self) -> &str {
        "contact_update"
    }

    fn description(&self) -> &str {
        "Update a contact"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<ContactUpdateArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ContactUpdateArgs = parse_args(args)?;
        let path = self.0.contacts_path(args.bot_id.as_deref())?;
        let contact_id = require_contact_id(&args.contact_id)?;
        self.0
            .backend
            .patch(&format!("{path}/{contact_id}"), &args.fields.to_body())
            .await
    }
}

#[async_trait]
impl Tool for ContactBindTokenTool {
    fn name(&self) -> &str {
        "contact_bind_token"
    }

    fn description(&self) -> &str {
        "Issue a one-time bind token for a contact"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<ContactBindTokenArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ContactBindTokenArgs = parse_args(args)?;
        let path = self.0.contacts_path(args.bot_id.as_deref())?;
        let contact_id = require_contact_id(&args.contact_id)?;
        self.0
            .backend
            .post(
                &format!("{path}/{contact_id}/bind_token"),
                &json!({
                    "target_platform": args.target_platform,
                    "target_external_id": args.target_external_id,
                    "ttl_seconds": args.ttl_seconds,
                }),
            )
            .await
    }
}

#[async_trait]
impl Tool for ContactBindTool {
    fn name(&self) -> &str {
        "contact_bind"
    }

    fn description(&self) -> &str {
        "Bind a contact to a platform identity using a bind token"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<ContactBindArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ContactBindArgs = parse_args(args)?;
        let path = self.0.contacts_path(args.bot_id.as_deref())?;
        let contact_id = require_contact_id(&args.contact_id)?;
        self.0
            .backend
            .post(
                &format!("{path}/{contact_id}/bind"),
                &json!({
                    "platform": args.platform,
                    "external_id": args.external_id,
                    "bind_token": args.bind_token,
                }),
            )
            .await
    }
}
