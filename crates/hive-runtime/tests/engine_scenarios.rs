//! End-to-end engine scenarios with scripted providers.
//!
//! Each test wires a real registry, bus, dispatcher, and engine to a mock
//! provider factory whose responses are scripted per model name.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hive_core::agent::{AgentSpec, AgentStatus, ProviderKind};
use hive_core::config::SwarmConfig;
use hive_core::events::{EventBus, SwarmEvent};
use hive_core::history::{Provenance, Role};
use hive_core::ids::AgentId;
use hive_core::retry::RetryConfig;
use hive_core::tools::ToolName;
use hive_llm::factory::ProviderFactory;
use hive_llm::provider::{
    ChatMessage, ChatOptions, ChunkStream, Provider, ProviderResult, StreamChunk,
};
use hive_runtime::engine::{noop_chunk, ConversationEngine};
use hive_runtime::errors::SwarmError;
use hive_runtime::registry::AgentRegistry;
use parking_lot::Mutex;

// ─────────────────────────────────────────────────────────────────────────────
// Scripted provider
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Script {
    deltas: Vec<String>,
    delay_ms: u64,
    input_tokens: u64,
    output_tokens: u64,
}

impl Script {
    fn text(text: &str) -> Self {
        Self {
            deltas: vec![text.to_owned()],
            delay_ms: 0,
            input_tokens: 10,
            output_tokens: 5,
        }
    }

    fn chunks(deltas: &[&str], delay_ms: u64) -> Self {
        Self {
            deltas: deltas.iter().map(|d| (*d).to_owned()).collect(),
            delay_ms,
            input_tokens: 10,
            output_tokens: 5,
        }
    }

    fn empty() -> Self {
        Self {
            deltas: Vec::new(),
            delay_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

type ScriptQueue = Arc<Mutex<VecDeque<Script>>>;

struct ScriptedProvider {
    model: String,
    queue: ScriptQueue,
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalChat
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        _messages: &[ChatMessage],
        _options: &ChatOptions,
    ) -> ProviderResult<ChunkStream> {
        // An exhausted queue falls back to a terminating plain response so
        // recursive continuations always wind down.
        let script = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::text("ok"));

        let stream = async_stream::stream! {
            for delta in script.deltas {
                if script.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(script.delay_ms)).await;
                }
                yield Ok(StreamChunk::Text { delta });
            }
            yield Ok(StreamChunk::Done {
                input_tokens: script.input_tokens,
                output_tokens: script.output_tokens,
            });
        };
        Ok(Box::pin(stream))
    }
}

#[derive(Clone, Default)]
struct ScriptedFactory {
    queues: Arc<Mutex<HashMap<String, ScriptQueue>>>,
}

impl ScriptedFactory {
    fn push(&self, model: &str, script: Script) {
        self.queue_for(model).lock().push_back(script);
    }

    fn queue_for(&self, model: &str) -> ScriptQueue {
        self.queues
            .lock()
            .entry(model.to_owned())
            .or_default()
            .clone()
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(
        &self,
        _kind: ProviderKind,
        model: &str,
        _endpoint: Option<&str>,
        _credential: Option<&str>,
    ) -> ProviderResult<Arc<dyn Provider>> {
        Ok(Arc::new(ScriptedProvider {
            model: model.to_owned(),
            queue: self.queue_for(model),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

struct Harness {
    engine: Arc<ConversationEngine>,
    registry: Arc<AgentRegistry>,
    bus: Arc<EventBus>,
    factory: ScriptedFactory,
    _workdir: tempfile::TempDir,
}

async fn harness() -> Harness {
    harness_with_depth(5).await
}

async fn harness_with_depth(max_depth: u32) -> Harness {
    let workdir = tempfile::tempdir().unwrap();
    let config = SwarmConfig {
        project_root: workdir.path().to_path_buf(),
        max_depth,
        retry: RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
            max_delay_ms: 1,
        },
        ..SwarmConfig::default()
    };

    let bus = Arc::new(EventBus::new());
    let registry = Arc::new(AgentRegistry::new(bus.clone(), None));
    let factory = ScriptedFactory::default();
    let engine = Arc::new(ConversationEngine::new(
        registry.clone(),
        bus.clone(),
        Arc::new(factory.clone()),
        config,
    ));

    Harness {
        engine,
        registry,
        bus,
        factory,
        _workdir: workdir,
    }
}

impl Harness {
    fn create_agent(&self, name: &str, model: &str, project: Option<&str>, leader: bool) -> AgentId {
        let mut spec = AgentSpec::new(name, ProviderKind::LocalChat, model);
        spec.role = Some("specialist".into());
        spec.description = Some(format!("{name} does things"));
        spec.project = project.map(str::to_owned);
        spec.is_leader = Some(leader);
        self.registry.create(spec).unwrap().id
    }

    async fn make_project(&self, name: &str) {
        tokio::fs::create_dir_all(self._workdir.path().join(name))
            .await
            .unwrap();
    }

    fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<SwarmEvent>) -> Vec<SwarmEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 1: single tool round-trip
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_tool_round_trip() {
    let h = harness().await;
    h.make_project("p").await;
    tokio::fs::write(h._workdir.path().join("p/README.md"), "hello world")
        .await
        .unwrap();

    let id = h.create_agent("Worker", "worker-model", Some("p"), false);
    h.factory.push("worker-model", Script::text("@read_file(README.md)"));
    h.factory
        .push("worker-model", Script::text("The README says hello."));

    let mut rx = h.bus.subscribe();
    let response = h
        .engine
        .chat(&id, "Read README.md", noop_chunk())
        .await
        .unwrap();
    assert_eq!(response, "The README says hello.");

    // Events: tool:start then tool:result for the read.
    let events = Harness::drain_events(&mut rx);
    let start_pos = events
        .iter()
        .position(|e| matches!(e, SwarmEvent::ToolStart { tool: ToolName::ReadFile, .. }))
        .expect("tool:start published");
    let result_pos = events
        .iter()
        .position(|e| matches!(e, SwarmEvent::ToolResult { tool: ToolName::ReadFile, .. }))
        .expect("tool:result published");
    assert!(start_pos < result_pos);

    // The continuation entry carries the provenance tag and the payload.
    let history = h.registry.history(&id).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].content, "@read_file(README.md)");
    assert!(history[2]
        .content
        .starts_with("[TOOL RESULTS]\n--- read_file(README.md) ---\nhello world"));
    match &history[2].provenance {
        Provenance::ToolResult { results } => {
            assert_eq!(results.len(), 1);
            assert!(results[0].success);
            assert_eq!(results[0].result.as_deref(), Some("hello world"));
        }
        other => panic!("wrong provenance: {other:?}"),
    }
    assert_eq!(history[3].content, "The README says hello.");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 2: leader delegation with per-target serialisation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn leader_delegation_with_serialisation() {
    let h = harness().await;
    let lead = h.create_agent("Lead", "lead-model", None, true);
    let _d1 = h.create_agent("D1", "d1-model", None, false);
    let _d2 = h.create_agent("D2", "d2-model", None, false);

    h.factory.push(
        "lead-model",
        Script::text(concat!(
            "Splitting the work.\n",
            "@delegate(D1, \"task one\")\n",
            "@delegate(D1, \"task two\")\n",
            "@delegate(D2, \"task three\")\n",
        )),
    );
    h.factory.push("d1-model", Script::chunks(&["done one"], 30));
    h.factory.push("d1-model", Script::chunks(&["done two"], 30));
    h.factory.push("d2-model", Script::chunks(&["done three"], 30));
    h.factory.push("lead-model", Script::text("All three tasks finished."));

    let response = h.engine.chat(&lead, "split the work", noop_chunk()).await.unwrap();
    assert_eq!(response, "All three tasks finished.");

    // Synthesis continuation: three response sections in textual order of
    // the original delegations.
    let history = h.registry.history(&lead).unwrap();
    let synthesis = &history[2];
    assert!(matches!(
        synthesis.provenance,
        Provenance::DelegationResult { .. }
    ));
    let body = &synthesis.content;
    let one = body.find("--- Response from D1 ---\ndone one").unwrap();
    let two = body.find("--- Response from D1 ---\ndone two").unwrap();
    let three = body.find("--- Response from D2 ---\ndone three").unwrap();
    assert!(one < two && two < three);

    // D1 ran its two tasks in order (queue popped in order), and each
    // specialist turn carries the delegation-task provenance and handoff
    // message shape.
    let d1_history = h.registry.history(&_d1).unwrap();
    assert_eq!(d1_history[0].content, "[TASK from Lead]: task one");
    assert!(matches!(
        &d1_history[0].provenance,
        Provenance::DelegationTask { from } if from == "Lead"
    ));
    assert_eq!(d1_history[2].content, "[TASK from Lead]: task two");

    // The target todos were added and completed with timestamps.
    let d1_view = h.registry.get(&_d1).unwrap();
    assert_eq!(d1_view.todos.len(), 2);
    assert!(d1_view.todos.iter().all(|t| t.done && t.completed_at.is_some()));
    assert_eq!(d1_view.todos[0].text, "[From Lead] task one");
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 3: code-block immunity
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn code_block_immunity() {
    let h = harness().await;
    let lead = h.create_agent("Lead", "lead-model", None, true);
    let _qa = h.create_agent("QA", "qa-model", None, false);
    let _dev = h.create_agent("Developer", "dev-model", None, false);

    h.factory.push(
        "lead-model",
        Script::text(concat!(
            "Here is how delegation works:\n",
            "```\n@delegate(Developer, \"example\")\n```\n",
            "Now for real: @delegate(QA, \"run tests\")\n",
        )),
    );
    h.factory.push("qa-model", Script::text("tests pass"));
    h.factory.push("lead-model", Script::text("QA confirms green."));

    let mut rx = h.bus.subscribe();
    let _ = h.engine.chat(&lead, "teach then do", noop_chunk()).await.unwrap();

    let delegations: Vec<String> = Harness::drain_events(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            SwarmEvent::Delegation { to_name, .. } => Some(to_name),
            _ => None,
        })
        .collect();
    assert_eq!(delegations, vec!["QA".to_owned()]);

    // The Developer example never ran.
    assert!(h.registry.history(&_dev).unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 4: path traversal rejected
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn path_traversal_rejected() {
    let h = harness().await;
    h.make_project("p").await;
    let id = h.create_agent("Worker", "worker-model", Some("p"), false);

    h.factory
        .push("worker-model", Script::text("@read_file(../../etc/passwd)"));
    h.factory
        .push("worker-model", Script::text("I cannot read that file."));

    let mut rx = h.bus.subscribe();
    let response = h.engine.chat(&id, "read passwd", noop_chunk()).await.unwrap();
    assert_eq!(response, "I cannot read that file.");

    let history = h.registry.history(&id).unwrap();
    match &history[2].provenance {
        Provenance::ToolResult { results } => {
            assert!(!results[0].success);
            assert_eq!(
                results[0].error.as_deref(),
                Some("path traversal not allowed")
            );
        }
        other => panic!("wrong provenance: {other:?}"),
    }
    assert!(history[2].content.contains("Error: path traversal not allowed"));

    let saw_tool_error = Harness::drain_events(&mut rx)
        .iter()
        .any(|e| matches!(e, SwarmEvent::ToolError { .. }));
    assert!(saw_tool_error);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 5: cancellation mid-stream
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_mid_stream() {
    let h = harness().await;
    let id = h.create_agent("Talker", "slow-model", None, false);
    h.factory.push(
        "slow-model",
        Script::chunks(&["one ", "two ", "three ", "four ", "five "], 40),
    );

    let mut rx = h.bus.subscribe();
    let engine = h.engine.clone();
    let chat_id = id.clone();
    let turn = tokio::spawn(async move {
        engine.chat(&chat_id, "talk to me", noop_chunk()).await
    });

    // Wait for two chunks, then stop.
    let mut chunks_seen = 0;
    while chunks_seen < 2 {
        if let Ok(event) = rx.recv().await {
            if matches!(event, SwarmEvent::StreamChunk { .. }) {
                chunks_seen += 1;
            }
        }
    }
    h.engine.stop(&id).unwrap();

    let outcome = turn.await.unwrap();
    assert!(matches!(outcome, Err(SwarmError::Cancelled)));

    let view = h.registry.get(&id).unwrap();
    assert_eq!(view.status, AgentStatus::Idle);
    assert!(view.current_thinking.is_empty());

    // History keeps the user message and gains no assistant entry.
    let history = h.registry.history(&id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);

    let saw_stopped = Harness::drain_events(&mut rx)
        .iter()
        .any(|e| matches!(e, SwarmEvent::Stopped { .. }));
    assert!(saw_stopped);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario 6: error-report escalation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn error_report_escalation() {
    let h = harness().await;
    h.make_project("p").await;
    let id = h.create_agent("Worker", "worker-model", Some("p"), false);

    h.factory
        .push("worker-model", Script::text("@report_error(Missing dependency X)"));
    h.factory
        .push("worker-model", Script::text("I am blocked on dependency X."));

    let mut rx = h.bus.subscribe();
    let response = h.engine.chat(&id, "install deps", noop_chunk()).await.unwrap();
    assert_eq!(response, "I am blocked on dependency X.");

    let report = Harness::drain_events(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            SwarmEvent::ErrorReport { description, .. } => Some(description),
            _ => None,
        });
    assert_eq!(report.as_deref(), Some("Missing dependency X"));

    let history = h.registry.history(&id).unwrap();
    assert!(history[2].content.contains("[ERROR REPORT] Missing dependency X"));
    assert!(history[2]
        .content
        .contains("so your manager can decide the next step"));
    match &history[2].provenance {
        Provenance::ToolResult { results } => {
            assert!(results[0].success);
            assert!(results[0].is_error_report);
        }
        other => panic!("wrong provenance: {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delegation to a missing agent
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_delegation_target_still_synthesises() {
    let h = harness().await;
    let lead = h.create_agent("Lead", "lead-model", None, true);

    h.factory
        .push("lead-model", Script::text("@delegate(Ghost, \"haunt the repo\")"));
    h.factory
        .push("lead-model", Script::text("Ghost is unavailable; plan B."));

    let response = h.engine.chat(&lead, "go", noop_chunk()).await.unwrap();
    assert_eq!(response, "Ghost is unavailable; plan B.");

    let history = h.registry.history(&lead).unwrap();
    match &history[2].provenance {
        Provenance::DelegationResult { results } => {
            assert_eq!(results.len(), 1);
            assert_eq!(
                results[0].error.as_deref(),
                Some("Agent \"Ghost\" not found in swarm")
            );
        }
        other => panic!("wrong provenance: {other:?}"),
    }
    assert!(history[2]
        .content
        .contains("Decide whether to retry, reassign, or adapt your plan accordingly."));
}

// ─────────────────────────────────────────────────────────────────────────────
// Boundaries and invariants
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_model_output_completes_with_empty_entry() {
    let h = harness().await;
    h.make_project("p").await;
    let id = h.create_agent("Quiet", "quiet-model", Some("p"), false);
    h.factory.push("quiet-model", Script::empty());

    let response = h.engine.chat(&id, "say nothing", noop_chunk()).await.unwrap();
    assert_eq!(response, "");

    let history = h.registry.history(&id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "");
}

#[tokio::test]
async fn total_messages_counts_turns_not_continuations() {
    let h = harness().await;
    h.make_project("p").await;
    tokio::fs::write(h._workdir.path().join("p/a.txt"), "x")
        .await
        .unwrap();
    let id = h.create_agent("Worker", "worker-model", Some("p"), false);

    // One turn with two recursive tool continuations.
    h.factory.push("worker-model", Script::text("@read_file(a.txt)"));
    h.factory.push("worker-model", Script::text("@read_file(a.txt)"));
    h.factory.push("worker-model", Script::text("done"));

    let _ = h.engine.chat(&id, "poke the file", noop_chunk()).await.unwrap();
    assert_eq!(h.registry.get(&id).unwrap().metrics.total_messages, 1);

    // A second plain turn increments again.
    let _ = h.engine.chat(&id, "and now?", noop_chunk()).await.unwrap();
    assert_eq!(h.registry.get(&id).unwrap().metrics.total_messages, 2);
}

#[tokio::test]
async fn depth_limit_skips_post_processing() {
    let h = harness_with_depth(2).await;
    h.make_project("p").await;
    tokio::fs::write(h._workdir.path().join("p/a.txt"), "x")
        .await
        .unwrap();
    let id = h.create_agent("Looper", "loop-model", Some("p"), false);

    for _ in 0..6 {
        h.factory.push("loop-model", Script::text("@read_file(a.txt)"));
    }

    let response = h.engine.chat(&id, "loop forever", noop_chunk()).await.unwrap();
    // Depth 0 and 1 process tools; depth 2 hits the limit and returns the
    // raw assistant text untouched.
    assert_eq!(response, "@read_file(a.txt)");
    assert_eq!(h.factory.queue_for("loop-model").lock().len(), 3);
}

#[tokio::test]
async fn token_usage_accumulates_into_metrics() {
    let h = harness().await;
    let id = h.create_agent("Counter", "count-model", None, false);
    h.factory.push(
        "count-model",
        Script {
            deltas: vec!["hi".into()],
            delay_ms: 0,
            input_tokens: 100,
            output_tokens: 42,
        },
    );

    let _ = h.engine.chat(&id, "hello", noop_chunk()).await.unwrap();
    let metrics = h.registry.get(&id).unwrap().metrics;
    assert_eq!(metrics.total_input_tokens, 100);
    assert_eq!(metrics.total_output_tokens, 42);
    assert!(metrics.last_active.is_some());
}

#[tokio::test]
async fn chat_with_unknown_agent_is_not_found() {
    let h = harness().await;
    let err = h
        .engine
        .chat(&AgentId::new("ghost"), "hi", noop_chunk())
        .await
        .unwrap_err();
    assert!(matches!(err, SwarmError::NotFound { .. }));
}

#[tokio::test]
async fn broadcast_runs_every_agent_and_collects_outcomes() {
    let h = harness().await;
    let a = h.create_agent("A", "a-model", None, false);
    let b = h.create_agent("B", "b-model", None, false);
    h.factory.push("a-model", Script::text("A here"));
    h.factory.push("b-model", Script::text("B here"));

    let outcomes = h.engine.broadcast("ping", noop_chunk()).await;
    assert_eq!(outcomes.len(), 2);
    let by_id: HashMap<&AgentId, &str> = outcomes
        .iter()
        .map(|o| (&o.id, o.response.as_deref().unwrap()))
        .collect();
    assert_eq!(by_id[&a], "A here");
    assert_eq!(by_id[&b], "B here");
}

#[tokio::test]
async fn handoff_carries_recent_context() {
    let h = harness().await;
    let from = h.create_agent("Scout", "scout-model", None, false);
    let to = h.create_agent("Closer", "closer-model", None, false);

    h.factory.push("scout-model", Script::text("found the bug in parser.rs"));
    let _ = h.engine.chat(&from, "investigate", noop_chunk()).await.unwrap();

    h.factory.push("closer-model", Script::text("on it"));
    let mut rx = h.bus.subscribe();
    let response = h
        .engine
        .handoff(&from, &to, "please fix what Scout found", noop_chunk())
        .await
        .unwrap();
    assert_eq!(response, "on it");

    let saw_handoff = Harness::drain_events(&mut rx)
        .iter()
        .any(|e| matches!(e, SwarmEvent::Handoff { .. }));
    assert!(saw_handoff);

    let history = h.registry.history(&to).unwrap();
    assert!(history[0]
        .content
        .starts_with("[HANDOFF from Scout]: please fix what Scout found"));
    assert!(history[0].content.contains("found the bug in parser.rs"));
}

#[tokio::test]
async fn execute_todo_marks_done_with_timestamp() {
    let h = harness().await;
    let id = h.create_agent("Doer", "doer-model", None, false);
    let todo = h.registry.add_todo(&id, "write the report").unwrap();
    h.factory.push("doer-model", Script::text("report written"));

    let response = h
        .engine
        .execute_todo(&id, &todo.id, noop_chunk())
        .await
        .unwrap();
    assert_eq!(response, "report written");

    let view = h.registry.get(&id).unwrap();
    assert!(view.todos[0].done);
    assert!(view.todos[0].completed_at.is_some());

    // The todo text went through as the user message.
    let history = h.registry.history(&id).unwrap();
    assert_eq!(history[0].content, "write the report");
}

#[tokio::test]
async fn execute_all_todos_tolerates_failures() {
    let h = harness().await;
    let id = h.create_agent("Doer", "doer-model", None, false);
    let first = h.registry.add_todo(&id, "first").unwrap();
    let second = h.registry.add_todo(&id, "second").unwrap();

    // Exhausted queue falls back to "ok" for both turns.
    let outcomes = h
        .engine
        .execute_all_todos(&id, noop_chunk())
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].0, first.id);
    assert_eq!(outcomes[1].0, second.id);
    assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
}

#[tokio::test]
async fn subscriber_callback_receives_chunks_and_markers() {
    let h = harness().await;
    let lead = h.create_agent("Lead", "lead-model", None, true);
    let _dev = h.create_agent("Dev", "dev-model", None, false);

    h.factory
        .push("lead-model", Script::text("@delegate(Dev, \"build\")"));
    h.factory.push("dev-model", Script::text("built"));
    h.factory.push("lead-model", Script::text("all done"));

    let seen = Arc::new(Mutex::new(String::new()));
    let sink = seen.clone();
    let on_chunk: hive_runtime::engine::OnChunk =
        Arc::new(move |chunk: &str| sink.lock().push_str(chunk));

    let _ = h.engine.chat(&lead, "go", on_chunk).await.unwrap();

    let transcript = seen.lock().clone();
    assert!(transcript.contains("@delegate(Dev, \"build\")"));
    assert!(transcript.contains("--- Delegating to Dev: build ---"));
    assert!(transcript.contains("built"));
    assert!(transcript.contains("all done"));
}

#[tokio::test]
async fn no_cancellation_token_remains_after_a_turn() {
    let h = harness().await;
    let id = h.create_agent("Tidy", "tidy-model", None, false);
    h.factory.push("tidy-model", Script::text("done"));

    let _ = h.engine.chat(&id, "hi", noop_chunk()).await.unwrap();
    assert!(h.engine.cancels().is_empty());
}
