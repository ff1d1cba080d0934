//! 能力集合组装
//!
//! 由权限列表、技能目录/启用状态与委派上下文决定本轮暴露给模型的工具。
//! 每轮重新组装，不缓存；未被允许的类别完全不出现。

use std::sync::Arc;

use crate::agent::{AgentAction, AgentParams};
use crate::llm::LlmClient;
use crate::observability::ToolObserver;
use crate::skills::{AgentSkill, SharedSkills};
use crate::tools::{
    contact_tools, schedule_tools, BackendClient, CallSubagentTool, SearchMemoryTool,
    SendMessageTool, ToolRegistry, UseSkillTool, WebSearchTool,
};

/// 组装所需的全部协作者
pub struct CapabilityContext<'a> {
    pub params: &'a AgentParams,
    pub skills: &'a SharedSkills,
    pub llm: &'a Arc<dyn LlmClient>,
    pub backend: &'a BackendClient,
    pub observer: &'a Arc<dyn ToolObserver>,
}

/// 每个类别贡献的工具名
pub fn category_tools(action: AgentAction) -> &'static [&'static str] {
    match action {
        AgentAction::WebSearch => &["web_search"],
        AgentAction::Message => &["send_message"],
        AgentAction::Contact => &[
            "contact_search",
            "contact_create",
            "contact_update",
            "contact_bind_token",
            "contact_bind",
        ],
        AgentAction::Subagent => &["call_subagent"],
        AgentAction::Schedule => &["get_schedules", "remove_schedule", "schedule"],
        AgentAction::Skill => &["use_skill"],
        AgentAction::Memory => &["search_memory"],
    }
}

pub fn assemble(ctx: &CapabilityContext<'_>) -> ToolRegistry {
    let params = ctx.params;
    let allowed = |action: AgentAction| params.allowed.contains(&action);
    let mut registry = ToolRegistry::new();

    if allowed(AgentAction::Skill) {
        let shared = ctx.skills.clone();
        registry.register(UseSkillTool::new(
            params.skills.clone(),
            Arc::new(move |skill: &AgentSkill| shared.enable(skill.clone())),
        ));
    }

    if allowed(AgentAction::Schedule) {
        for tool in schedule_tools(ctx.backend.clone(), params.identity.clone()) {
            registry.register_arc(tool);
        }
    }

    if allowed(AgentAction::WebSearch) {
        match &params.search {
            Some(search) => registry.register(WebSearchTool::new(
                search.api_key.clone(),
                search.base_url.clone(),
                search.timeout_secs,
                search.count,
            )),
            None => tracing::debug!("web_search allowed but no search key configured"),
        }
    }

    if allowed(AgentAction::Subagent) {
        registry.register(CallSubagentTool::new(
            params,
            ctx.llm.clone(),
            ctx.backend.clone(),
            ctx.observer.clone(),
        ));
    }

    if allowed(AgentAction::Memory) {
        registry.register(SearchMemoryTool::new(
            ctx.backend.clone(),
            params.identity.clone(),
        ));
    }

    if allowed(AgentAction::Message) {
        registry.register(SendMessageTool::new(
            ctx.backend.clone(),
            params.identity.clone(),
        ));
    }

    if allowed(AgentAction::Contact) {
        for tool in contact_tools(ctx.backend.clone(), params.identity.clone()) {
            registry.register_arc(tool);
        }
    }

    tracing::debug!(tools = ?registry.tool_names(), "capabilities assembled");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::SearchSettings;
    use crate::llm::MockLlmClient;
    use crate::observability::TracingObserver;
    use std::collections::BTreeSet;

    fn names_for(params: &AgentParams) -> BTreeSet<String> {
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient);
        let observer: Arc<dyn ToolObserver> = Arc::new(TracingObserver);
        let backend = BackendClient::new("http://127.0.0.1:9", None, 1);
        let skills = SharedSkills::default();
        assemble(&CapabilityContext {
            params,
            skills: &skills,
            llm: &llm,
            backend: &backend,
            observer: &observer,
        })
        .tool_names()
        .into_iter()
        .collect()
    }

    fn expected(actions: &[AgentAction]) -> BTreeSet<String> {
        actions
            .iter()
            .flat_map(|a| category_tools(*a).iter().map(|s| s.to_string()))
            .collect()
    }

    fn with_search(allowed: Vec<AgentAction>) -> AgentParams {
        AgentParams {
            allowed,
            search: Some(SearchSettings::new("brave-key")),
            ..AgentParams::default()
        }
    }

    #[test]
    fn test_key_set_is_union_of_permitted_categories() {
        let all = AgentAction::ALL;
        // 每个单类别、全部类别，以及每个「去掉一个类别」的组合
        let mut cases: Vec<Vec<AgentAction>> = all.iter().map(|a| vec![*a]).collect();
        cases.push(all.to_vec());
        for skip in all {
            cases.push(all.iter().copied().filter(|a| *a != skip).collect());
        }
        cases.push(Vec::new());

        for allowed in cases {
            let params = with_search(allowed.clone());
            assert_eq!(names_for(&params), expected(&allowed), "allowed = {allowed:?}");
        }
    }

    #[test]
    fn test_web_search_requires_key() {
        let params = AgentParams {
            allowed: vec![AgentAction::WebSearch, AgentAction::Memory],
            search: None,
            ..AgentParams::default()
        };
        let names = names_for(&params);
        assert!(!names.contains("web_search"));
        assert!(names.contains("search_memory"));
    }
}
