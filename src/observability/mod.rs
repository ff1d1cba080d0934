//! 可观测性：日志初始化与工具调用观察者
//!
//! 每次工具执行前后，ToolExecutor 会把 {工具名, 输入} 与 {结果 | 错误} 报告给 ToolObserver；
//! 观察者只读，不改变调用结果或错误。

use std::time::Duration;

use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::tools::ToolError;

/// 日志：默认 info，可通过 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

/// 工具调用观察者
pub trait ToolObserver: Send + Sync {
    fn on_call(&self, tool: &str, input: &Value);

    fn on_result(&self, tool: &str, input: &Value, result: &Value, elapsed: Duration);

    fn on_error(&self, tool: &str, input: &Value, error: &ToolError, elapsed: Duration);
}

/// 默认观察者：调用前 debug 日志，结束后输出结构化审计日志（JSON）
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ToolObserver for TracingObserver {
    fn on_call(&self, tool: &str, input: &Value) {
        tracing::debug!(tool = %tool, args = %args_preview(input), "tool call");
    }

    fn on_result(&self, tool: &str, input: &Value, _result: &Value, elapsed: Duration) {
        audit(tool, input, "ok", elapsed);
    }

    fn on_error(&self, tool: &str, input: &Value, error: &ToolError, elapsed: Duration) {
        audit(tool, input, "error", elapsed);
        tracing::error!(tool = %tool, error = %error, "tool failed");
    }
}

fn audit(tool: &str, input: &Value, outcome: &str, elapsed: Duration) {
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": tool,
        "ok": outcome == "ok",
        "outcome": outcome,
        "duration_ms": elapsed.as_millis() as u64,
        "args_preview": args_preview(input),
    });
    tracing::info!(audit = %audit, "tool");
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
