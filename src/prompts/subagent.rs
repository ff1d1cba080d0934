//! 子代理的 system prompt：只包含时间与委派身份，不带主代理的平台/联系人上下文

use chrono::{DateTime, FixedOffset};

use crate::prompts::time_header;

pub fn subagent_system(
    now: &DateTime<FixedOffset>,
    locale: &str,
    name: &str,
    description: Option<&str>,
) -> String {
    let mut out = format!(
        "---\n{}\n---\nYou are a subagent named \"{name}\", called by another agent to complete one task.\n",
        time_header(now, locale)
    );
    if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
        out.push_str(&format!("Your responsibility: {description}\n"));
    }
    out.push_str(
        "Focus on the task you are given. Use tools when they help, \
         and finish with a concise answer the calling agent can use directly.",
    );
    out
}
