//! Agent 多入口集成测试：步数上限、tool choice 降级、流式/阻塞一致、历史只追加、技能启用、委派与定时任务

use std::sync::{Arc, Mutex};
use std::time::Duration;

use concierge::agent::{
    Agent, AgentAction, AgentEvent, AgentInput, AgentParams, DelegationHistory, Schedule,
    SearchSettings, SubagentProfile,
};
use concierge::llm::{LlmError, ModelResponse, OpenAiClient, ScriptedLlmClient, ToolChoice};
use concierge::memory::{Message, Role, ToolCall};
use concierge::observability::ToolObserver;
use concierge::skills::AgentSkill;
use concierge::tools::{BackendClient, ToolContext, ToolError};
use concierge::AgentError;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// 没有服务监听的地址；测试中的工具都在发请求前返回
fn backend() -> BackendClient {
    BackendClient::new("http://127.0.0.1:9", None, 1)
}

fn params(allowed: &[AgentAction]) -> AgentParams {
    AgentParams {
        allowed: allowed.to_vec(),
        ..AgentParams::default()
    }
}

fn cooking() -> AgentSkill {
    AgentSkill::new("cooking", "做饭建议", "Ask about allergies.")
}

fn call(id: &str, name: &str, args: Value) -> ModelResponse {
    ModelResponse::tool_calls(vec![ToolCall::new(id, name, args)])
}

fn rejection() -> LlmError {
    LlmError::api("Tool choice must be auto")
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ToolObserver for Recorder {
    fn on_call(&self, tool: &str, _input: &Value) {
        self.events.lock().unwrap().push(format!("call:{tool}"));
    }

    fn on_result(&self, tool: &str, _input: &Value, _result: &Value, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("result:{tool}"));
    }

    fn on_error(&self, tool: &str, _input: &Value, _error: &ToolError, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("error:{tool}"));
    }
}

#[tokio::test]
async fn test_step_bound_is_respected() {
    let llm = Arc::new(ScriptedLlmClient::repeating(call(
        "c",
        "use_skill",
        json!({ "skill_name": "missing", "reason": "loop" }),
    )));
    let mut agent = Agent::new(
        AgentParams {
            max_steps: 3,
            ..params(&[AgentAction::Skill])
        },
        llm.clone(),
        backend(),
    );

    let result = agent.ask(AgentInput::query("go")).await.unwrap();

    assert_eq!(llm.call_count(), 3);
    // user + 3 × (assistant + tool)
    assert_eq!(result.messages.len(), 7);
    assert_eq!(result.messages.last().unwrap().role, Role::Tool);
}

#[tokio::test]
async fn test_fallback_fires_exactly_once() {
    let llm = Arc::new(ScriptedLlmClient::new(|_, _| Err(rejection())));
    let mut agent = Agent::new(
        AgentParams {
            tool_choice: Some(ToolChoice::Tool("use_skill".into())),
            ..params(&[AgentAction::Skill])
        },
        llm.clone(),
        backend(),
    );

    let err = agent.ask(AgentInput::query("hi")).await.unwrap_err();

    assert!(matches!(err, AgentError::Llm(_)));
    let choices: Vec<Option<ToolChoice>> = llm.requests().into_iter().map(|r| r.tool_choice).collect();
    assert_eq!(
        choices,
        vec![Some(ToolChoice::Tool("use_skill".into())), Some(ToolChoice::Auto)]
    );
}

#[tokio::test]
async fn test_forced_web_search_rejected_then_relaxed_succeeds() {
    let llm = Arc::new(ScriptedLlmClient::new(|req, _| match &req.tool_choice {
        Some(ToolChoice::Tool(_)) => Err(rejection()),
        _ => Ok(ModelResponse::text("relaxed answer")),
    }));
    let mut agent = Agent::new(
        AgentParams {
            tool_choice: Some(ToolChoice::Tool("web_search".into())),
            search: Some(SearchSettings::new("brave-key")),
            ..params(&[AgentAction::WebSearch])
        },
        llm.clone(),
        backend(),
    );

    let result = agent.ask(AgentInput::query("news?")).await.unwrap();

    assert_eq!(result.final_text(), "relaxed answer");
    assert_eq!(llm.call_count(), 2);
    assert_eq!(llm.requests()[0].tools[0].name, "web_search");
    // 降级只作用于本次调用
    assert_eq!(
        agent.params().tool_choice,
        Some(ToolChoice::Tool("web_search".into()))
    );
}

#[tokio::test]
async fn test_rejection_in_wrapped_cause_is_detected() {
    let llm = Arc::new(ScriptedLlmClient::new(|req, _| match &req.tool_choice {
        Some(ToolChoice::Required) => Err(LlmError::wrapped(
            "Bad Request",
            std::io::Error::new(std::io::ErrorKind::Other, "Tool choice must be auto"),
        )),
        _ => Ok(ModelResponse::text("ok")),
    }));
    let mut agent = Agent::new(
        AgentParams {
            tool_choice: Some(ToolChoice::Required),
            ..params(&[AgentAction::Skill])
        },
        llm.clone(),
        backend(),
    );

    assert!(agent.ask(AgentInput::query("hi")).await.is_ok());
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_other_model_errors_are_not_retried() {
    let llm = Arc::new(ScriptedLlmClient::new(|_, _| Err(LlmError::api("rate limited"))));
    let mut agent = Agent::new(
        AgentParams {
            tool_choice: Some(ToolChoice::Tool("use_skill".into())),
            ..params(&[AgentAction::Skill])
        },
        llm.clone(),
        backend(),
    );

    let err = agent.ask(AgentInput::query("hi")).await.unwrap_err();
    assert!(err.to_string().contains("rate limited"));
    assert_eq!(llm.call_count(), 1);
}

fn skill_script() -> Vec<ModelResponse> {
    vec![
        call(
            "c1",
            "use_skill",
            json!({ "skill_name": "cooking", "reason": "dinner" }),
        ),
        ModelResponse::text("Any allergies?"),
    ]
}

fn skill_params() -> AgentParams {
    AgentParams {
        skills: vec![cooking()],
        ..params(&[AgentAction::Skill])
    }
}

#[tokio::test]
async fn test_stream_and_blocking_produce_same_result() {
    let mut blocking = Agent::new(
        skill_params(),
        Arc::new(ScriptedLlmClient::from_responses(skill_script())),
        backend(),
    );
    let expected = blocking.ask(AgentInput::query("what's for dinner")).await.unwrap();

    let mut streaming = Agent::new(
        skill_params(),
        Arc::new(ScriptedLlmClient::from_responses(skill_script())),
        backend(),
    );
    let mut deltas = String::new();
    let actual = streaming
        .stream_to_end(AgentInput::query("what's for dinner"), |event| {
            if let AgentEvent::TextDelta { text } = event {
                deltas.push_str(text);
            }
        })
        .await
        .unwrap();

    assert_eq!(actual, expected);
    assert_eq!(actual.skills, vec!["cooking"]);
    assert_eq!(deltas, "Any allergies?");
    assert_eq!(
        streaming.conversation().messages(),
        blocking.conversation().messages()
    );
}

#[tokio::test]
async fn test_stream_event_order() {
    let mut agent = Agent::new(
        skill_params(),
        Arc::new(ScriptedLlmClient::from_responses(skill_script())),
        backend(),
    );
    let events: Vec<AgentEvent> = agent
        .stream(AgentInput::query("dinner"))
        .map(|e| e.unwrap())
        .collect()
        .await;

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            AgentEvent::StepStart { .. } => "step_start",
            AgentEvent::TextDelta { .. } => "text_delta",
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::StepFinish { .. } => "step_finish",
            AgentEvent::ToolChoiceRelaxed { .. } => "tool_choice_relaxed",
            AgentEvent::Finish { .. } => "finish",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "step_start",
            "tool_call",
            "tool_result",
            "step_finish",
            "step_start",
            "text_delta",
            "step_finish",
            "finish"
        ]
    );
}

#[tokio::test]
async fn test_stream_fallback_replays_with_auto() {
    let llm = Arc::new(ScriptedLlmClient::new(|req, _| match &req.tool_choice {
        Some(ToolChoice::Tool(_)) => Err(rejection()),
        _ => Ok(ModelResponse::text("streamed")),
    }));
    let mut agent = Agent::new(
        AgentParams {
            tool_choice: Some(ToolChoice::Tool("use_skill".into())),
            ..params(&[AgentAction::Skill])
        },
        llm.clone(),
        backend(),
    );

    let events: Vec<AgentEvent> = agent
        .stream(AgentInput::query("hi"))
        .map(|e| e.unwrap())
        .collect()
        .await;

    assert!(events
        .iter()
        .any(|e| matches!(e, AgentEvent::ToolChoiceRelaxed { .. })));
    match events.last().unwrap() {
        AgentEvent::Finish { result } => assert_eq!(result.final_text(), "streamed"),
        other => panic!("expected finish, got {other:?}"),
    }
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_stream_fallback_at_most_once() {
    let llm = Arc::new(ScriptedLlmClient::new(|_, _| Err(rejection())));
    let mut agent = Agent::new(
        AgentParams {
            tool_choice: Some(ToolChoice::Tool("use_skill".into())),
            ..params(&[AgentAction::Skill])
        },
        llm.clone(),
        backend(),
    );

    let items: Vec<Result<AgentEvent, AgentError>> =
        agent.stream(AgentInput::query("hi")).collect().await;

    let choices: Vec<Option<ToolChoice>> = llm.requests().into_iter().map(|r| r.tool_choice).collect();
    assert_eq!(
        choices,
        vec![Some(ToolChoice::Tool("use_skill".into())), Some(ToolChoice::Auto)]
    );
    let relaxed = items
        .iter()
        .filter(|i| matches!(i, Ok(AgentEvent::ToolChoiceRelaxed { .. })))
        .count();
    assert_eq!(relaxed, 1);
    assert!(matches!(items.last().unwrap(), Err(AgentError::Llm(_))));
}

#[tokio::test]
async fn test_stream_step_bound() {
    let llm = Arc::new(ScriptedLlmClient::repeating(call(
        "c",
        "use_skill",
        json!({ "skill_name": "missing", "reason": "loop" }),
    )));
    let mut agent = Agent::new(
        AgentParams {
            max_steps: 3,
            ..params(&[AgentAction::Skill])
        },
        llm.clone(),
        backend(),
    );

    let result = agent.stream_to_end(AgentInput::query("go"), |_| {}).await.unwrap();

    assert_eq!(llm.call_count(), 3);
    assert_eq!(result.messages.len(), 7);
}

/// 读完一个 HTTP 请求（请求头 + Content-Length 指定的正文）
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return;
        }
    }
}

/// 本地 OpenAI 兼容端点：强制 tool choice 的请求一律 400 拒绝
async fn serve_rejecting_endpoint() -> String {
    const BODY: &str = r#"{"error":{"message":"Tool choice must be auto","type":"invalid_request_error","param":null,"code":null}}"#;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{BODY}",
                    BODY.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}/v1")
}

#[tokio::test]
async fn test_openai_stream_rejection_relaxes_tool_choice() {
    let base_url = serve_rejecting_endpoint().await;
    let llm = Arc::new(OpenAiClient::new(Some(&base_url), "gpt-test", Some("sk-test")));
    let mut agent = Agent::new(
        AgentParams {
            tool_choice: Some(ToolChoice::Tool("use_skill".into())),
            ..params(&[AgentAction::Skill])
        },
        llm,
        backend(),
    );

    let items: Vec<Result<AgentEvent, AgentError>> =
        agent.stream(AgentInput::query("hi")).collect().await;

    assert!(items.iter().any(|i| matches!(
        i,
        Ok(AgentEvent::ToolChoiceRelaxed { reason }) if reason.contains("Tool choice must be auto")
    )));
    // 端点对 auto 也拒绝，第二次失败原样上抛
    match items.last().unwrap() {
        Err(err) => assert_eq!(err.to_string(), "LLM error: Tool choice must be auto"),
        Ok(event) => panic!("expected an error, got {event:?}"),
    }
}

#[tokio::test]
async fn test_stream_error_ends_without_finish() {
    let mut agent = Agent::new(
        params(&[AgentAction::Skill]),
        Arc::new(ScriptedLlmClient::repeating(call("c", "teleport", json!({})))),
        backend(),
    );

    let items: Vec<Result<AgentEvent, AgentError>> =
        agent.stream(AgentInput::query("hi")).collect().await;

    assert!(matches!(
        items.last().unwrap(),
        Err(AgentError::HallucinatedTool(name)) if name == "teleport"
    ));
    assert!(!items
        .iter()
        .any(|i| matches!(i, Ok(AgentEvent::Finish { .. }))));
}

#[tokio::test]
async fn test_skill_enabled_mid_turn_reaches_next_step_and_result() {
    let llm = Arc::new(ScriptedLlmClient::from_responses(skill_script()));
    let mut agent = Agent::new(skill_params(), llm.clone(), backend());

    let result = agent.ask(AgentInput::query("dinner")).await.unwrap();

    let requests = llm.requests();
    assert!(requests[0].system.contains("- cooking: 做饭建议"));
    assert!(!requests[0].system.contains("Ask about allergies."));
    assert!(requests[1].system.contains("Ask about allergies."));
    assert_eq!(result.skills, vec!["cooking"]);
    assert_eq!(agent.enabled_skill_names(), vec!["cooking"]);
}

#[tokio::test]
async fn test_append_only_across_entry_points() {
    let llm = Arc::new(ScriptedLlmClient::new(|req, _| {
        let last = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        if last.contains("explode") {
            Err(LlmError::api("upstream down"))
        } else {
            Ok(ModelResponse::text(format!("re: {last}")))
        }
    }));
    let mut agent = Agent::new(params(&[AgentAction::Schedule]), llm, backend());
    let mut snapshots: Vec<Vec<Message>> = vec![agent.conversation().messages().to_vec()];

    agent
        .ask(AgentInput::query("one").with_messages(vec![Message::assistant("earlier")]))
        .await
        .unwrap();
    snapshots.push(agent.conversation().messages().to_vec());

    agent.stream_to_end(AgentInput::query("two"), |_| {}).await.unwrap();
    snapshots.push(agent.conversation().messages().to_vec());

    agent
        .ask_as_subagent(AgentInput::query("three"), SubagentProfile::new("helper", None))
        .await
        .unwrap();
    snapshots.push(agent.conversation().messages().to_vec());

    assert!(agent.ask(AgentInput::query("explode")).await.is_err());
    snapshots.push(agent.conversation().messages().to_vec());

    let schedule = Schedule {
        name: "daily".into(),
        pattern: "0 9 * * *".into(),
        command: "say good morning".into(),
        max_calls: Some(1),
        ..Default::default()
    };
    agent
        .trigger_schedule(AgentInput::default(), schedule)
        .await
        .unwrap();
    snapshots.push(agent.conversation().messages().to_vec());

    for pair in snapshots.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        assert!(after.len() >= before.len());
        assert_eq!(&after[..before.len()], before.as_slice());
    }
    // 失败的调用只留下它的用户消息
    let failed = &snapshots[4];
    assert_eq!(failed.len(), snapshots[3].len() + 1);
    assert_eq!(failed.last().unwrap().content, "explode");
}

#[tokio::test]
async fn test_schedule_trigger_scenario() {
    let llm = Arc::new(ScriptedLlmClient::repeating(ModelResponse::text("Good morning!")));
    let mut agent = Agent::new(params(&[AgentAction::Schedule]), llm.clone(), backend());

    let schedule = Schedule {
        name: "daily".into(),
        pattern: "0 9 * * *".into(),
        command: "say good morning".into(),
        max_calls: Some(1),
        ..Default::default()
    };
    let result = agent
        .trigger_schedule(AgentInput::default(), schedule)
        .await
        .unwrap();

    assert_eq!(result.messages[0].role, Role::User);
    assert!(result.messages[0].content.contains("say good morning"));
    assert!(result.skills.is_empty());

    let tools: Vec<String> = llm.requests()[0].tools.iter().map(|t| t.name.clone()).collect();
    assert_eq!(tools, vec!["get_schedules", "remove_schedule", "schedule"]);
}

#[tokio::test]
async fn test_missing_bot_id_is_config_error() {
    let recorder = Arc::new(Recorder::default());
    let mut agent = Agent::new(
        params(&[AgentAction::Contact]),
        Arc::new(ScriptedLlmClient::repeating(call(
            "c",
            "contact_search",
            json!({ "query": "Ann" }),
        ))),
        backend(),
    )
    .with_observer(recorder.clone());

    let err = agent.ask(AgentInput::query("find Ann")).await.unwrap_err();

    assert!(matches!(err, AgentError::ConfigError(msg) if msg.contains("bot_id")));
    assert_eq!(recorder.events(), vec!["call:contact_search", "error:contact_search"]);
}

#[tokio::test]
async fn test_tool_failure_terminates_turn() {
    let identity = ToolContext {
        bot_id: Some("bot-1".into()),
        ..Default::default()
    };
    let llm = Arc::new(ScriptedLlmClient::repeating(call(
        "c",
        "schedule",
        json!({ "name": "x", "pattern": "whenever", "command": "noop" }),
    )));
    let mut agent = Agent::new(
        AgentParams {
            identity,
            ..params(&[AgentAction::Schedule])
        },
        llm.clone(),
        backend(),
    );

    let err = agent.ask(AgentInput::query("schedule it")).await.unwrap_err();

    assert!(matches!(err, AgentError::ToolExecutionFailed { ref tool, .. } if tool == "schedule"));
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_hallucinated_tool_fails() {
    let mut agent = Agent::new(
        params(&[AgentAction::Schedule]),
        Arc::new(ScriptedLlmClient::repeating(call("c", "use_skill", json!({})))),
        backend(),
    );

    let err = agent.ask(AgentInput::query("hi")).await.unwrap_err();
    assert!(matches!(err, AgentError::HallucinatedTool(name) if name == "use_skill"));
}

#[tokio::test]
async fn test_observer_sees_every_tool_call() {
    let recorder = Arc::new(Recorder::default());
    let mut agent = Agent::new(
        skill_params(),
        Arc::new(ScriptedLlmClient::from_responses(skill_script())),
        backend(),
    )
    .with_observer(recorder.clone());

    agent.ask(AgentInput::query("dinner")).await.unwrap();
    assert_eq!(recorder.events(), vec!["call:use_skill", "result:use_skill"]);
}

#[tokio::test]
async fn test_subagent_shares_parent_history() {
    let llm = Arc::new(ScriptedLlmClient::repeating(ModelResponse::text("ok")));
    let mut agent = Agent::new(AgentParams::default(), llm.clone(), backend());
    assert_eq!(agent.params().subagent_history, DelegationHistory::Shared);

    agent.ask(AgentInput::query("parent question")).await.unwrap();
    let result = agent
        .ask_as_subagent(
            AgentInput::query("sub question"),
            SubagentProfile::new("researcher", Some("finds facts".into())),
        )
        .await
        .unwrap();

    let last = llm.requests().pop().unwrap();
    let contents: Vec<&str> = last.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["parent question", "ok", "sub question"]);
    assert!(last.system.contains("\"researcher\""));
    assert!(!last.system.contains("**Schedule**"));
    assert_eq!(result.messages.len(), 2);
    assert_eq!(agent.conversation().len(), 4);
}

#[tokio::test]
async fn test_call_subagent_tool_delegates_to_child() {
    let llm = Arc::new(ScriptedLlmClient::new(|req, _| {
        if req.system.contains("subagent named") {
            return Ok(ModelResponse::text("child answer"));
        }
        match req.messages.last() {
            Some(m) if m.role == Role::Tool => Ok(ModelResponse::text("parent done")),
            _ => Ok(call(
                "sub-1",
                "call_subagent",
                json!({ "name": "researcher", "query": "find facts" }),
            )),
        }
    }));
    let mut agent = Agent::new(
        AgentParams {
            tool_choice: Some(ToolChoice::Auto),
            ..params(&[AgentAction::Subagent, AgentAction::Schedule])
        },
        llm.clone(),
        backend(),
    );

    let result = agent.ask(AgentInput::query("research")).await.unwrap();

    assert_eq!(result.final_text(), "parent done");
    let tool_message = &result.messages[2];
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("sub-1"));
    let payload: Value = serde_json::from_str(&tool_message.content).unwrap();
    assert_eq!(payload["text"], "child answer");
    assert_eq!(payload["name"], "researcher");

    let child = llm
        .requests()
        .into_iter()
        .find(|r| r.system.contains("subagent named"))
        .unwrap();
    let child_tools: Vec<String> = child.tools.iter().map(|t| t.name.clone()).collect();
    assert!(!child_tools.contains(&"call_subagent".to_string()));
    assert!(child_tools.contains(&"schedule".to_string()));
    assert_eq!(child.tool_choice, None);
    // 子代理不影响父级历史：user, assistant(call), tool, assistant
    assert_eq!(agent.conversation().len(), 4);
}
