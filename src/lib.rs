//! Concierge - Rust 个人管家智能体
//!
//! 模块划分：
//! - **agent**: 编排引擎（ask / stream / 子代理 / 定时任务触发）、能力组装、多步生成循环、tool choice 降级
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 只追加的对话存储
//! - **observability**: 日志初始化与工具调用观察者
//! - **prompts**: system prompt、子代理 prompt、定时任务消息
//! - **skills**: 技能目录加载与已启用技能集合
//! - **tools**: Tool trait、注册表、执行器与各类工具（搜索、消息、联系人、定时任务、记忆、技能、子代理）

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompts;
pub mod skills;
pub mod tools;

pub use agent::{Agent, AgentEvent, AgentInput, AgentParams, TurnResult};
pub use core::AgentError;
