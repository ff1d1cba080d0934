//! 技能加载器
//!
//! 从 skills 目录加载技能目录：每个子目录含 skill.toml（元数据）与可选 SKILL.md（启用后注入 system 的正文）。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 技能：名称唯一，description 用于模型判断是否启用，content 在启用后注入 system prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
}

impl AgentSkill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            content: content.into(),
        }
    }

    /// 获取用于技能列表的简短描述
    pub fn summary(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// 技能元数据（skill.toml）
#[derive(Debug, Clone, Deserialize)]
pub struct SkillMeta {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct SkillToml {
    skill: SkillMeta,
}

/// 技能加载器
pub struct SkillLoader {
    skills_dir: PathBuf,
}

impl SkillLoader {
    /// 创建新的加载器
    pub fn new(skills_dir: impl AsRef<Path>) -> Self {
        Self {
            skills_dir: skills_dir.as_ref().to_path_buf(),
        }
    }

    /// 从默认位置创建
    pub fn from_default() -> Self {
        let dirs = [
            PathBuf::from("config/skills"),
            PathBuf::from("../config/skills"),
        ];
        let skills_dir = dirs
            .into_iter()
            .find(|d| d.exists())
            .unwrap_or_else(|| PathBuf::from("config/skills"));
        Self::new(skills_dir)
    }

    /// 加载全部技能，按名称排序；目录不存在时返回空列表
    pub fn load_all(&self) -> anyhow::Result<Vec<AgentSkill>> {
        let mut skills = Vec::new();

        if !self.skills_dir.exists() {
            return Ok(skills);
        }

        for entry in std::fs::read_dir(&self.skills_dir)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                match self.load_skill(&path) {
                    Ok(Some(skill)) => skills.push(skill),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(dir = %path.display(), error = %e, "skip invalid skill"),
                }
            }
        }

        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills.dedup_by(|a, b| a.name == b.name);
        tracing::info!("Loaded {} skills", skills.len());
        Ok(skills)
    }

    /// 加载单个技能；没有 skill.toml 的目录不是技能
    fn load_skill(&self, dir: &Path) -> anyhow::Result<Option<AgentSkill>> {
        let skill_toml = dir.join("skill.toml");
        if !skill_toml.exists() {
            return Ok(None);
        }

        let toml_content = std::fs::read_to_string(&skill_toml)?;
        let meta = toml::from_str::<SkillToml>(&toml_content)?.skill;
        let content = std::fs::read_to_string(dir.join("SKILL.md")).unwrap_or_default();

        Ok(Some(AgentSkill {
            name: meta.name,
            description: meta.description,
            content,
        }))
    }
}
