//! 已启用技能集合
//!
//! 按名称去重、保持启用顺序；只增不减，技能在 Agent 实例生命周期内不会被关闭。

use std::sync::{Arc, Mutex, PoisonError};

use super::AgentSkill;

/// 已启用技能（插入顺序即报告顺序）
#[derive(Debug, Clone, Default)]
pub struct EnabledSkills {
    skills: Vec<AgentSkill>,
}

impl EnabledSkills {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用技能；已启用时为 no-op，返回是否新加入
    pub fn enable(&mut self, skill: AgentSkill) -> bool {
        if self.contains(&skill.name) {
            return false;
        }
        self.skills.push(skill);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.iter().any(|s| s.name == name)
    }

    pub fn skills(&self) -> &[AgentSkill] {
        &self.skills
    }

    pub fn names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// Agent 与 use_skill 工具共享的启用集合
#[derive(Debug, Clone, Default)]
pub struct SharedSkills(Arc<Mutex<EnabledSkills>>);

impl SharedSkills {
    pub fn new(initial: EnabledSkills) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }

    pub fn enable(&self, skill: AgentSkill) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).enable(skill)
    }

    /// 当前快照（system prompt 每步重新读取）
    pub fn snapshot(&self) -> EnabledSkills {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_is_idempotent_and_ordered() {
        let mut set = EnabledSkills::new();
        assert!(set.enable(AgentSkill::new("weather", "", "")));
        assert!(set.enable(AgentSkill::new("cooking", "", "")));
        assert!(!set.enable(AgentSkill::new("weather", "other", "")));
        assert_eq!(set.names(), vec!["weather", "cooking"]);
    }

    #[test]
    fn test_shared_handles_see_same_state() {
        let shared = SharedSkills::default();
        let handle = shared.clone();
        handle.enable(AgentSkill::new("cooking", "", ""));
        assert_eq!(shared.names(), vec!["cooking"]);
        assert_eq!(shared.snapshot().len(), 1);
    }
}
