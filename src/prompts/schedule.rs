//! 定时任务触发时合成的用户消息

use chrono::{DateTime, FixedOffset};

use crate::agent::Schedule;
use crate::prompts::{quote, time_header};

/// 把已触发的定时任务渲染成一条用户消息
pub fn schedule_prompt(schedule: &Schedule, now: &DateTime<FixedOffset>, locale: &str) -> String {
    let max_calls = match schedule.max_calls {
        Some(n) => n.to_string(),
        None => "unlimited".to_string(),
    };
    let mut out = format!(
        "---\n{}\n---\n** This is a scheduled task automatically sent to you by the system, not a message from the user **\n\n",
        time_header(now, locale)
    );
    out.push_str(&format!("schedule-name: {}\n", schedule.name));
    if !schedule.description.is_empty() {
        out.push_str(&format!("schedule-description: {}\n", schedule.description));
    }
    if let Some(id) = &schedule.id {
        out.push_str(&format!("schedule-id: {id}\n"));
    }
    out.push_str(&format!("pattern: {}\n", schedule.pattern));
    out.push_str(&format!("max-calls: {max_calls}\n"));
    out.push_str(&format!(
        "\nExecute the {} below now:\n\n{}",
        quote("command"),
        schedule.command
    ));
    out
}
