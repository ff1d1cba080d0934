//! 身份上下文：当前 bot、会话、平台与联系人，注入到需要身份的工具与 system prompt

use serde::{Deserialize, Serialize};

use crate::tools::ToolError;

/// 一次会话的身份信息；字段均可缺省，由具体工具决定哪些是必需的
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolContext {
    pub bot_id: Option<String>,
    pub session_id: Option<String>,
    pub current_platform: Option<String>,
    pub reply_target: Option<String>,
    pub session_token: Option<String>,
    pub contact_id: Option<String>,
    pub contact_name: Option<String>,
    pub contact_alias: Option<String>,
    pub user_id: Option<String>,
}

impl ToolContext {
    /// 参数中显式给出的 bot_id 优先，否则取上下文；空白视为缺失
    pub fn resolve_bot_id(&self, explicit: Option<&str>) -> Result<String, ToolError> {
        let non_blank = |id: &str| {
            let id = id.trim();
            (!id.is_empty()).then(|| id.to_string())
        };
        explicit
            .and_then(non_blank)
            .or_else(|| self.bot_id.as_deref().and_then(non_blank))
            .ok_or(ToolError::MissingIdentity("bot_id"))
    }
}
