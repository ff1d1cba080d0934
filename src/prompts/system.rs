//! 主代理的 system prompt
//!
//! 每个推理步都会重新生成一次：use_skill 在本轮中启用的技能必须出现在下一步的 system 中。

use chrono::{DateTime, FixedOffset};

use crate::agent::AgentAction;
use crate::prompts::{quote, time_header};
use crate::skills::AgentSkill;
use crate::tools::ToolContext;

/// system prompt 的全部输入
#[derive(Debug, Clone)]
pub struct SystemPromptParams<'a> {
    pub now: DateTime<FixedOffset>,
    pub locale: &'a str,
    pub language: &'a str,
    /// 直接加载进上下文的历史时长（分钟）
    pub max_context_load_time: u32,
    pub platforms: &'a [String],
    pub current_platform: Option<&'a str>,
    pub allowed: &'a [AgentAction],
    pub skills: &'a [AgentSkill],
    pub enabled_skills: &'a [AgentSkill],
    pub identity: &'a ToolContext,
}

impl SystemPromptParams<'_> {
    fn allows(&self, action: AgentAction) -> bool {
        self.allowed.contains(&action)
    }
}

pub fn system_prompt(p: &SystemPromptParams<'_>) -> String {
    let mut sections = vec![
        format!(
            "---\n{}\nlanguage: {}\n---",
            time_header(&p.now, p.locale),
            p.language
        ),
        "You are a personal housekeeper assistant, able to manage the master's daily affairs."
            .to_string(),
    ];

    sections.push(format!(
        "**Context**\n- Conversations from the last {} minutes are loaded directly into your context.",
        p.max_context_load_time
    ));

    if !p.platforms.is_empty() || p.current_platform.is_some() {
        let mut s = String::from("**Platforms**");
        if !p.platforms.is_empty() {
            s.push_str(&format!("\n- Available platforms: {}", p.platforms.join(", ")));
        }
        if let Some(current) = p.current_platform {
            s.push_str(&format!("\n- You are currently talking on: {current}"));
        }
        sections.push(s);
    }

    if let Some(identity) = identity_section(p.identity) {
        sections.push(identity);
    }

    if p.allows(AgentAction::Memory) {
        sections.push(format!(
            "**Memory**\n- You can use {} to search for past memories with natural language.",
            quote("search_memory")
        ));
    }

    if p.allows(AgentAction::Schedule) {
        sections.push(format!(
            "**Schedule**\n\
             - We use **Cron Syntax** to schedule tasks.\n\
             - You can use {} to get the list of schedules.\n\
             - You can use {} to remove a schedule by id.\n\
             - You can use {} to schedule a task.\n  \
             + The {} is the natural language command sent back to you when the schedule fires.\n  \
             + Set {} to 1 to run the task only once.",
            quote("get_schedules"),
            quote("remove_schedule"),
            quote("schedule"),
            quote("command"),
            quote("max_calls"),
        ));
    }

    if p.allows(AgentAction::Message) {
        sections.push(format!(
            "**Messaging**\n- You can use {} to send a message to a target on a platform.",
            quote("send_message")
        ));
    }

    if p.allows(AgentAction::Contact) {
        sections.push(format!(
            "**Contacts**\n- Use {} before creating a contact, so you do not create duplicates.\n\
             - Use {} and {} to link a contact to a platform identity.",
            quote("contact_search"),
            quote("contact_bind_token"),
            quote("contact_bind"),
        ));
    }

    if p.allows(AgentAction::Subagent) {
        sections.push(format!(
            "**Subagents**\n- You can use {} to delegate a self-contained task to a named subagent.",
            quote("call_subagent")
        ));
    }

    if p.allows(AgentAction::Skill) && !p.skills.is_empty() {
        let list = p
            .skills
            .iter()
            .map(|s| format!("- {}", s.summary()))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!(
            "**Skills**\nUse {} to enable a skill when it is relevant to the task.\n{}",
            quote("use_skill"),
            list
        ));
    }

    if !p.enabled_skills.is_empty() {
        let enabled = p
            .enabled_skills
            .iter()
            .map(|s| format!("### {}\n{}", s.name, s.content.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!("**Enabled skills**\n{enabled}"));
    }

    sections.join("\n\n")
}

fn identity_section(identity: &ToolContext) -> Option<String> {
    let fields = [
        ("session-id", &identity.session_id),
        ("contact-id", &identity.contact_id),
        ("contact-name", &identity.contact_name),
        ("contact-alias", &identity.contact_alias),
        ("user-id", &identity.user_id),
    ];
    let lines: Vec<String> = fields
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("- {k}: {v}")))
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(format!("**Current session**\n{}", lines.join("\n")))
}
