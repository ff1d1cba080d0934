//! 工具层：Tool trait、注册表、执行器，以及按能力类别划分的具体工具

pub mod backend;
pub mod contact;
pub mod context;
pub mod executor;
pub mod memory;
pub mod message;
pub mod registry;
pub mod schedule;
pub mod schema;
pub mod skill;
pub mod subagent;
pub mod web;

pub use backend::BackendClient;
pub use contact::contact_tools;
pub use context::ToolContext;
pub use executor::ToolExecutor;
pub use memory::SearchMemoryTool;
pub use message::SendMessageTool;
pub use registry::{Tool, ToolError, ToolRegistry};
pub use schedule::schedule_tools;
pub use schema::{input_schema, parse_args};
pub use skill::{SkillActivation, UseSkillTool};
pub use subagent::CallSubagentTool;
pub use web::WebSearchTool;
