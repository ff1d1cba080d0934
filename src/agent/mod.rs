//! Agent 编排引擎
//!
//! 一个 Agent 实例持有一份对话历史与一份已启用技能集合，四个入口共享它们：
//! - ask：阻塞式一轮对话
//! - stream：流式一轮对话，逐个产出 AgentEvent，最后以 Finish 携带结果
//! - ask_as_subagent：以子代理身份（独立的 system prompt）完成一轮
//! - trigger_schedule：把已触发的定时任务渲染为用户消息后走 ask 的路径
//!
//! 入口都接收 `&mut self`，同一实例上的调用由借用规则串行化。
//! 每轮：先追加调用方给出的历史与用户消息，再组装能力集合并运行生成循环（含 tool choice 降级），
//! 成功后把产生的消息追加到历史；失败时只留下已追加的输入，历史只增不减。

pub mod capabilities;
pub mod events;
pub mod fallback;
pub mod generation;
pub mod types;

use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use futures_util::{Stream, StreamExt};

use crate::config::{AppConfig, DEFAULT_LANGUAGE, DEFAULT_LOCALE, DEFAULT_MAX_CONTEXT_LOAD_TIME, DEFAULT_MAX_STEPS};
use crate::core::AgentError;
use crate::llm::{LlmClient, ToolChoice};
use crate::memory::{ConversationStore, Message};
use crate::observability::{ToolObserver, TracingObserver};
use crate::prompts::{schedule_prompt, subagent_system, system_prompt, SystemPromptParams};
use crate::skills::{AgentSkill, EnabledSkills, SharedSkills};
use crate::tools::{BackendClient, ToolContext, ToolExecutor, ToolRegistry};

pub use capabilities::{assemble, category_tools, CapabilityContext};
pub use events::AgentEvent;
pub use fallback::{FallbackPolicy, FallbackState, DEFAULT_REJECTION_SIGNATURES};
pub use generation::{GenerationItem, GenerationRequest};
pub use types::{AgentAction, AgentInput, DelegationHistory, Schedule, SubagentProfile, TurnResult};

/// 流式入口的返回类型
pub type AgentStream<'a> = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send + 'a>>;

/// Brave Search 凭据
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub count: u32,
}

impl SearchSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout_secs: 15,
            count: 5,
        }
    }
}

/// 引擎参数
#[derive(Debug, Clone)]
pub struct AgentParams {
    pub locale: String,
    pub language: String,
    pub max_steps: usize,
    /// 分钟
    pub max_context_load_time: u32,
    pub platforms: Vec<String>,
    pub current_platform: Option<String>,
    pub allowed: Vec<AgentAction>,
    /// 技能目录
    pub skills: Vec<AgentSkill>,
    /// 预先启用的技能名（须在目录中）
    pub use_skills: Vec<String>,
    pub tool_choice: Option<ToolChoice>,
    pub identity: ToolContext,
    /// 为 None 时不暴露 web_search
    pub search: Option<SearchSettings>,
    pub fallback: FallbackPolicy,
    pub subagent_history: DelegationHistory,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            max_context_load_time: DEFAULT_MAX_CONTEXT_LOAD_TIME,
            platforms: Vec::new(),
            current_platform: None,
            allowed: AgentAction::ALL.to_vec(),
            skills: Vec::new(),
            use_skills: Vec::new(),
            tool_choice: None,
            identity: ToolContext::default(),
            search: None,
            fallback: FallbackPolicy::default(),
            subagent_history: DelegationHistory::default(),
        }
    }
}

impl AgentParams {
    /// 由配置文件与已加载的技能目录生成参数
    pub fn from_config(cfg: &AppConfig, skills: Vec<AgentSkill>) -> Self {
        let agent = &cfg.agent;
        let search = cfg
            .search
            .brave_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|key| SearchSettings {
                api_key: key.to_string(),
                base_url: cfg.search.brave_base_url.clone(),
                timeout_secs: cfg.search.timeout_secs,
                count: cfg.search.count,
            });
        Self {
            locale: agent.locale.clone(),
            language: agent.language.clone(),
            max_steps: agent.max_steps,
            max_context_load_time: agent.max_context_load_time,
            platforms: agent.platforms.clone(),
            current_platform: agent.current_platform.clone(),
            allowed: agent
                .allowed
                .clone()
                .unwrap_or_else(|| AgentAction::ALL.to_vec()),
            skills,
            use_skills: agent.use_skills.clone(),
            tool_choice: agent.tool_choice.clone(),
            identity: cfg.identity.clone(),
            search,
            fallback: agent
                .fallback_signatures
                .clone()
                .map(FallbackPolicy::new)
                .unwrap_or_default(),
            subagent_history: agent.subagent_history,
        }
    }

    /// 目录中被预先启用的技能；不在目录中的名称忽略
    fn pre_enabled(&self) -> EnabledSkills {
        let mut enabled = EnabledSkills::new();
        for name in &self.use_skills {
            match self.skills.iter().find(|s| &s.name == name) {
                Some(skill) => {
                    enabled.enable(skill.clone());
                }
                None => tracing::warn!(skill = %name, "pre-enabled skill not in catalog, ignored"),
            }
        }
        enabled
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().into()
}

/// 编排引擎实例
pub struct Agent {
    params: AgentParams,
    llm: Arc<dyn LlmClient>,
    backend: BackendClient,
    observer: Arc<dyn ToolObserver>,
    conversation: ConversationStore,
    skills: SharedSkills,
}

impl Agent {
    pub fn new(params: AgentParams, llm: Arc<dyn LlmClient>, backend: BackendClient) -> Self {
        let skills = SharedSkills::new(params.pre_enabled());
        Self {
            params,
            llm,
            backend,
            observer: Arc::new(TracingObserver),
            conversation: ConversationStore::new(),
            skills,
        }
    }

    /// 替换工具调用观察者（默认 TracingObserver）
    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn enabled_skill_names(&self) -> Vec<String> {
        self.skills.names()
    }

    /// 当前参数与启用状态下的能力集合（每次调用重新组装）
    pub fn capabilities(&self) -> ToolRegistry {
        assemble(&CapabilityContext {
            params: &self.params,
            skills: &self.skills,
            llm: &self.llm,
            backend: &self.backend,
            observer: &self.observer,
        })
    }

    /// 主代理 system 文本；每次调用读取最新的启用技能
    fn main_system(&self) -> String {
        let enabled = self.skills.snapshot();
        system_prompt(&SystemPromptParams {
            now: now(),
            locale: &self.params.locale,
            language: &self.params.language,
            max_context_load_time: self.params.max_context_load_time,
            platforms: &self.params.platforms,
            current_platform: self.params.current_platform.as_deref(),
            allowed: &self.params.allowed,
            skills: &self.params.skills,
            enabled_skills: enabled.skills(),
            identity: &self.params.identity,
        })
    }

    /// 追加调用方历史与本轮用户消息，返回用户消息
    fn begin_turn(&mut self, prior: Vec<Message>, user: Message) -> Message {
        self.conversation.extend(prior);
        self.conversation.push(user.clone());
        user
    }

    /// 成功后提交产生的消息并生成结果
    fn commit(&mut self, user: Message, produced: Vec<Message>) -> TurnResult {
        self.conversation.extend(produced.iter().cloned());
        self.finish(user, produced)
    }

    fn finish(&self, user: Message, produced: Vec<Message>) -> TurnResult {
        let mut messages = Vec::with_capacity(produced.len() + 1);
        messages.push(user);
        messages.extend(produced);
        TurnResult {
            messages,
            skills: self.skills.names(),
        }
    }

    /// 对给定历史运行一次完整生成（含 tool choice 降级）
    async fn generate(
        &self,
        history: &[Message],
        system: &(dyn Fn() -> String + Send + Sync),
    ) -> Result<Vec<Message>, AgentError> {
        let executor = ToolExecutor::new(self.capabilities(), self.observer.clone());
        tracing::info!(
            tools = ?executor.registry().tool_names(),
            history = history.len(),
            "generation start"
        );
        let requested = self.params.tool_choice.as_ref();
        fallback::run_with_fallback(&self.params.fallback, requested, |tool_choice| {
            generation::run(GenerationRequest {
                llm: self.llm.as_ref(),
                executor: &executor,
                history,
                system,
                max_steps: self.params.max_steps,
                tool_choice,
            })
        })
        .await
    }

    /// 阻塞式一轮对话
    pub async fn ask(&mut self, input: AgentInput) -> Result<TurnResult, AgentError> {
        let user = self.begin_turn(input.messages, Message::user(input.query));
        let produced = {
            let this = &*self;
            let system = || this.main_system();
            this.generate(this.conversation.messages(), &system).await?
        };
        Ok(self.commit(user, produced))
    }

    /// 以子代理身份完成一轮；历史是否与父级共享由 subagent_history 决定
    pub async fn ask_as_subagent(
        &mut self,
        input: AgentInput,
        profile: SubagentProfile,
    ) -> Result<TurnResult, AgentError> {
        let user = Message::user(input.query);
        let locale = self.params.locale.clone();
        let system = move || {
            subagent_system(
                &now(),
                &locale,
                &profile.name,
                profile.description.as_deref(),
            )
        };

        match self.params.subagent_history {
            DelegationHistory::Shared => {
                let user = self.begin_turn(input.messages, user);
                let produced = self.generate(self.conversation.messages(), &system).await?;
                Ok(self.commit(user, produced))
            }
            DelegationHistory::Isolated => {
                let mut history = input.messages;
                history.push(user.clone());
                let produced = self.generate(&history, &system).await?;
                Ok(self.finish(user, produced))
            }
        }
    }

    /// 已触发的定时任务：渲染为用户消息后与 ask 相同
    pub async fn trigger_schedule(
        &mut self,
        input: AgentInput,
        schedule: Schedule,
    ) -> Result<TurnResult, AgentError> {
        tracing::info!(schedule = %schedule.name, pattern = %schedule.pattern, "schedule triggered");
        let content = schedule_prompt(&schedule, &now(), &self.params.locale);
        let user = self.begin_turn(input.messages, Message::user(content));
        let produced = {
            let this = &*self;
            let system = || this.main_system();
            this.generate(this.conversation.messages(), &system).await?
        };
        Ok(self.commit(user, produced))
    }

    /// 流式一轮对话
    ///
    /// 降级时已发出的事件不撤回：先发出 ToolChoiceRelaxed，再以 auto 从头重放整轮。
    /// 出错时以 Err 结束，不会再有 Finish。
    pub fn stream(&mut self, input: AgentInput) -> AgentStream<'_> {
        let this = self;
        Box::pin(async_stream::stream! {
            let user = this.begin_turn(input.messages, Message::user(input.query));

            let outcome: Result<Vec<Message>, AgentError> = {
                let agent = &*this;
                let system = || agent.main_system();
                let executor = ToolExecutor::new(agent.capabilities(), agent.observer.clone());
                let requested = agent.params.tool_choice.as_ref();
                let mut state = FallbackState::initial(requested);

                loop {
                    let mut attempt = Box::pin(generation::run_stream(GenerationRequest {
                        llm: agent.llm.as_ref(),
                        executor: &executor,
                        history: agent.conversation.messages(),
                        system: &system,
                        max_steps: agent.params.max_steps,
                        tool_choice: state.directive(requested),
                    }));

                    let mut result: Result<Vec<Message>, AgentError> = Ok(Vec::new());
                    while let Some(item) = attempt.next().await {
                        match item {
                            Ok(GenerationItem::Event(event)) => yield Ok(event),
                            Ok(GenerationItem::Done(produced)) => result = Ok(produced),
                            Err(e) => {
                                result = Err(e);
                                break;
                            }
                        }
                    }

                    match result {
                        Ok(produced) => break Ok(produced),
                        Err(e) => {
                            if !state.relax_on(&agent.params.fallback, &e) {
                                break Err(e);
                            }
                            yield Ok(AgentEvent::ToolChoiceRelaxed { reason: e.to_string() });
                        }
                    }
                }
            };

            match outcome {
                Ok(produced) => {
                    let result = this.commit(user, produced);
                    yield Ok(AgentEvent::Finish { result });
                }
                Err(e) => yield Err(e),
            }
        })
    }

    /// 消费 stream 直到 Finish，返回结果（事件交给 on_event）
    pub async fn stream_to_end(
        &mut self,
        input: AgentInput,
        mut on_event: impl FnMut(&AgentEvent) + Send,
    ) -> Result<TurnResult, AgentError> {
        let mut events = self.stream(input);
        while let Some(event) = events.next().await {
            let event = event?;
            if let AgentEvent::Finish { result } = event {
                return Ok(result);
            }
            on_event(&event);
        }
        Err(AgentError::Llm(crate::llm::LlmError::InvalidResponse(
            "stream ended without a result".to_string(),
        )))
    }
}
