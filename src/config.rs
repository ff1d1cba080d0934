//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CONCIERGE__*` 覆盖（双下划线表示嵌套，如 `CONCIERGE__LLM__PROVIDER=mock`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::agent::{AgentAction, DelegationHistory};
use crate::llm::ToolChoice;
use crate::tools::ToolContext;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub search: SearchSection,
    pub backend: BackendSection,
    /// 当前会话的身份上下文
    pub identity: ToolContext,
}

/// [llm]
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// openai（任意 OpenAI 兼容端点，配合 base_url）| mock；其他值在创建客户端时报错
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 未配置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
        }
    }
}

/// [agent]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub locale: String,
    /// 回复语言
    pub language: String,
    /// 单轮最多推理步数
    pub max_steps: usize,
    /// 直接加载进上下文的历史时长（分钟）
    pub max_context_load_time: u32,
    pub platforms: Vec<String>,
    pub current_platform: Option<String>,
    /// 允许的能力类别，缺省为全部
    pub allowed: Option<Vec<AgentAction>>,
    /// 预先启用的技能名
    pub use_skills: Vec<String>,
    pub skills_dir: Option<PathBuf>,
    /// 强制的 tool choice："auto" / "required" / "none" / { type = "tool", name = "..." }
    pub tool_choice: Option<ToolChoice>,
    /// 视为「端点不支持强制 tool choice」的错误片段；缺省使用内置列表
    pub fallback_signatures: Option<Vec<String>>,
    pub subagent_history: DelegationHistory,
}

pub const DEFAULT_MAX_STEPS: usize = 50;
pub const DEFAULT_MAX_CONTEXT_LOAD_TIME: u32 = 1440;
pub const DEFAULT_LANGUAGE: &str = "Same as user input";
pub const DEFAULT_LOCALE: &str = "en-US";

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            max_context_load_time: DEFAULT_MAX_CONTEXT_LOAD_TIME,
            platforms: Vec::new(),
            current_platform: None,
            allowed: None,
            use_skills: Vec::new(),
            skills_dir: None,
            tool_choice: None,
            fallback_signatures: None,
            subagent_history: DelegationHistory::default(),
        }
    }
}

/// [search]：Brave Search；没有 key 时不暴露 web_search
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub brave_api_key: Option<String>,
    pub brave_base_url: Option<String>,
    pub timeout_secs: u64,
    pub count: u32,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            brave_base_url: None,
            timeout_secs: 15,
            count: 5,
        }
    }
}

/// [backend]：联系人 / 定时任务 / 记忆 / 消息 API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub base_url: String,
    /// 缺省使用 identity.session_token
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

/// 从 config 目录加载配置，环境变量 CONCIERGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CONCIERGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CONCIERGE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
