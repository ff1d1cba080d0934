//! Agent 对外数据类型：权限类别、输入、结果、定时任务描述、子代理描述

use serde::{Deserialize, Serialize};

use crate::memory::Message;

/// 允许的能力类别；未列出的类别不会暴露任何工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    WebSearch,
    Message,
    Contact,
    Subagent,
    Schedule,
    Skill,
    Memory,
}

impl AgentAction {
    pub const ALL: [AgentAction; 7] = [
        AgentAction::WebSearch,
        AgentAction::Message,
        AgentAction::Contact,
        AgentAction::Subagent,
        AgentAction::Schedule,
        AgentAction::Skill,
        AgentAction::Memory,
    ];
}

/// 一次调用的输入：调用方补充的历史消息 + 本轮用户问题
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    #[serde(default)]
    pub messages: Vec<Message>,
    pub query: String,
}

impl AgentInput {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            query: query.into(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }
}

/// 一次调用的结果：本轮用户消息 + 模型产生的消息，以及当前已启用技能名
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub messages: Vec<Message>,
    pub skills: Vec<String>,
}

impl TurnResult {
    /// 最后一条 assistant 文本（没有则为空串）
    pub fn final_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::memory::Role::Assistant && !m.content.is_empty())
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// 已触发的定时任务描述（持久化与 cron 计算在外部）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// cron 表达式
    pub pattern: String,
    /// 触发时交给 Agent 执行的自然语言指令
    pub command: String,
    #[serde(default, alias = "maxCalls", skip_serializing_if = "Option::is_none")]
    pub max_calls: Option<u32>,
}

/// 子代理身份
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubagentProfile {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SubagentProfile {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }
}

/// 子代理调用使用的对话历史
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationHistory {
    /// 与父级共享同一个 ConversationStore（读取并追加）
    #[default]
    Shared,
    /// 只看到本次调用的输入，产生的消息不写回父级历史
    Isolated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actions_serialize_snake_case() {
        let v = serde_json::to_value(AgentAction::WebSearch).unwrap();
        assert_eq!(v, json!("web_search"));
        let a: AgentAction = serde_json::from_value(json!("subagent")).unwrap();
        assert_eq!(a, AgentAction::Subagent);
    }

    #[test]
    fn test_schedule_accepts_camel_case_max_calls() {
        let s: Schedule = serde_json::from_value(json!({
            "name": "daily",
            "pattern": "0 9 * * *",
            "command": "say good morning",
            "maxCalls": 1
        }))
        .unwrap();
        assert_eq!(s.max_calls, Some(1));
        assert!(s.description.is_empty());
    }

    #[test]
    fn test_final_text_skips_tool_call_only_messages() {
        let result = TurnResult {
            messages: vec![
                Message::user("q"),
                Message::assistant("answer"),
                Message::assistant_with_tool_calls("", vec![]),
            ],
            skills: vec![],
        };
        assert_eq!(result.final_text(), "answer");
    }
}
