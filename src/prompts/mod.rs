//! Prompt 生成
//!
//! 全部是显式参数的纯函数（当前时间由调用方传入），便于每步重算与测试。

pub mod schedule;
pub mod subagent;
pub mod system;

use chrono::{DateTime, FixedOffset};

pub use schedule::schedule_prompt;
pub use subagent::subagent_system;
pub use system::{system_prompt, SystemPromptParams};

/// 时间头：日期、星期、时间与 locale
pub fn time_header(now: &DateTime<FixedOffset>, locale: &str) -> String {
    format!(
        "date: {}\nweekday: {}\ntime: {}\nlocale: {}",
        now.format("%Y-%m-%d"),
        now.format("%A"),
        now.format("%H:%M:%S %:z"),
        locale
    )
}

/// 在 prompt 中引用工具名 / 字段名
pub fn quote(s: &str) -> String {
    format!("`{s}`")
}

#[cfg(test)]
pub(crate) fn fixed_now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2026-10-16T09:00:00+08:00").unwrap()
}
