//! use_skill 工具：在对话中启用技能目录里的某个技能
//!
//! 启用动作通过构造时传入的 SkillActivation 回调完成，工具本身不持有启用集合。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::skills::AgentSkill;
use crate::tools::schema::{input_schema, parse_args};
use crate::tools::{Tool, ToolError};

/// 启用回调；返回是否为新启用
pub type SkillActivation = Arc<dyn Fn(&AgentSkill) -> bool + Send + Sync>;

#[derive(Debug, Deserialize, JsonSchema)]
struct UseSkillArgs {
    /// 要启用的技能名称
    #[serde(alias = "skillName")]
    skill_name: String,
    /// 为什么认为该技能与当前任务相关
    #[serde(default)]
    reason: String,
}

pub struct UseSkillTool {
    catalog: Vec<AgentSkill>,
    activate: SkillActivation,
}

impl UseSkillTool {
    pub fn new(catalog: Vec<AgentSkill>, activate: SkillActivation) -> Self {
        Self { catalog, activate }
    }
}

#[async_trait]
impl Tool for UseSkillTool {
    fn name(&self) -> &str {
        "use_skill"
    }

    fn description(&self) -> &str {
        "Use a skill if you think it is relevant to the current task"
    }

    fn parameters_schema(&self) -> Value {
        input_schema::<UseSkillArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: UseSkillArgs = parse_args(args)?;
        let Some(skill) = self.catalog.iter().find(|s| s.name == args.skill_name) else {
            return Ok(json!({ "error": "Skill not found" }));
        };
        if (self.activate)(skill) {
            tracing::info!(skill = %skill.name, reason = %args.reason, "skill enabled");
        }
        Ok(json!({
            "success": true,
            "skill_name": skill.name,
            "reason": args.reason,
        }))
    }
}
