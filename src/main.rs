//! Concierge 命令行入口
//!
//! 用法：`concierge [--config <path>] <问题...>`
//! 初始化日志、加载配置与技能目录，构建 Agent 并把一次流式回答输出到 stdout。

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use concierge::agent::{Agent, AgentEvent, AgentInput, AgentParams};
use concierge::config::load_config;
use concierge::llm::create_llm_from_config;
use concierge::observability;
use concierge::skills::SkillLoader;
use concierge::tools::BackendClient;
use futures_util::StreamExt;

fn parse_args() -> anyhow::Result<(Option<PathBuf>, String)> {
    let mut config_path = None;
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = Some(PathBuf::from(args.next().context("--config needs a path")?));
        } else {
            words.push(arg);
        }
    }
    let query = words.join(" ");
    if query.trim().is_empty() {
        bail!("usage: concierge [--config <path>] <query...>");
    }
    Ok((config_path, query))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let (config_path, query) = parse_args()?;
    let cfg = load_config(config_path).context("Failed to load config")?;

    let skills = match &cfg.agent.skills_dir {
        Some(dir) => SkillLoader::new(dir),
        None => SkillLoader::from_default(),
    }
    .load_all()
    .context("Failed to load skills")?;

    let llm = create_llm_from_config(&cfg).context("Failed to create LLM client")?;
    let token = cfg
        .backend
        .token
        .clone()
        .or_else(|| cfg.identity.session_token.clone());
    let backend = BackendClient::new(cfg.backend.base_url.clone(), token, cfg.backend.timeout_secs);
    let mut agent = Agent::new(AgentParams::from_config(&cfg, skills), llm, backend);

    let mut stdout = std::io::stdout();
    let mut events = agent.stream(AgentInput::query(query));
    while let Some(event) = events.next().await {
        match event.context("Agent turn failed")? {
            AgentEvent::TextDelta { text } => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            AgentEvent::ToolCall { tool, .. } => tracing::info!(tool = %tool, "calling tool"),
            AgentEvent::ToolChoiceRelaxed { reason } => {
                tracing::warn!(reason = %reason, "retrying with tool choice auto")
            }
            AgentEvent::Finish { result } => {
                writeln!(stdout)?;
                if !result.skills.is_empty() {
                    tracing::info!(skills = ?result.skills, "enabled skills");
                }
            }
            _ => {}
        }
    }

    Ok(())
}
