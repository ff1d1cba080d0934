//! 记忆层：Agent 实例内的对话累积（持久化由外部负责）

pub mod conversation;

pub use conversation::{ConversationStore, Message, Role, ToolCall};
