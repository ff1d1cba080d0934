//! 技能系统
//!
//! 技能（Skill）是一段可按需启用的领域知识/行为说明。
//! 生命周期：在配置中声明 -> 可预先启用 -> 运行中由 use_skill 工具启用 -> 之后一直保持启用。
//!
//! 目录结构：
//! ```text
//! config/skills/
//! ├── cooking/
//! │   ├── skill.toml      # 技能元数据（name / description）
//! │   └── SKILL.md        # 启用后注入 system prompt 的正文（可选）
//! └── ...
//! ```

mod enabled;
mod loader;

pub use enabled::{EnabledSkills, SharedSkills};
pub use loader::{AgentSkill, SkillLoader, SkillMeta};
