//! Turn execution: streaming, eager delegation dispatch, post-processing,
//! and recursion.

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::StreamExt;
use hive_core::agent::{Agent, AgentStatus};
use hive_core::delegation::{Delegation, DelegationResult};
use hive_core::events::SwarmEvent;
use hive_core::history::Provenance;
use hive_core::ids::AgentId;
use hive_core::tools::{ToolCall, ToolName, ToolResult};
use hive_llm::provider::{ChatOptions, ProviderError, StreamChunk};
use hive_llm::retry::{with_provider_retry, StreamFactory};
use hive_tools::parser::parse_tool_calls;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{continuation, prompt, ConversationEngine, OnChunk};
use crate::delegation::parse_delegations;
use crate::errors::SwarmError;
use crate::queue::TaskOutcome;

/// Preview length for tool-result events.
const PREVIEW_CHARS: usize = 200;

/// A delegation dispatched (or refused) during one turn, in textual order.
struct PendingDelegation {
    delegation: Delegation,
    state: PendingState,
}

enum PendingState {
    /// The target name resolved to no agent.
    Unresolved,
    /// Enqueued on the target's lane; awaiting its outcome.
    Waiting {
        target_id: AgentId,
        target_name: String,
        rx: oneshot::Receiver<TaskOutcome>,
    },
}

impl ConversationEngine {
    /// One engine invocation: a model stream plus post-processing, possibly
    /// recursing with a continuation message.
    pub(crate) fn chat_inner(
        self: Arc<Self>,
        id: AgentId,
        message: String,
        depth: u32,
        provenance: Provenance,
        on_chunk: OnChunk,
    ) -> BoxFuture<'static, Result<String, SwarmError>> {
        Box::pin(async move {
            let agent = self.registry.snapshot(&id)?;
            let is_continuation = provenance.is_continuation();

            // Continuations stay inside the turn that registered the token;
            // a fresh turn goes busy and registers its own.
            let cancel = if is_continuation {
                self.cancels
                    .get(&id)
                    .unwrap_or_else(CancellationToken::new)
            } else {
                self.registry.set_status(&id, AgentStatus::Busy)?;
                self.cancels.register(&id)
            };

            debug!(agent = %id, depth, is_continuation, "turn started");
            let outcome = self
                .run_turn(&agent, &message, depth, provenance, &on_chunk, &cancel)
                .await;

            if !is_continuation {
                self.cancels.remove(&id);
                match &outcome {
                    Ok(_) => {
                        let _ = self.registry.set_status(&id, AgentStatus::Idle);
                        self.registry.persist(&id);
                        info!(agent = %id, depth, "turn completed");
                    }
                    Err(SwarmError::Cancelled) => {
                        // stop() already reset status, cleared thinking, and
                        // published agent:stopped.
                        info!(agent = %id, depth, "turn cancelled by user");
                    }
                    Err(e) => {
                        let _ = self
                            .registry
                            .with_agent_mut(&id, |a| a.metrics.error_count += 1);
                        let _ = self.registry.set_status(&id, AgentStatus::Error);
                        self.registry.persist(&id);
                        warn!(agent = %id, depth, "turn failed: {e}");
                    }
                }
            }
            outcome
        })
    }

    async fn run_turn(
        self: &Arc<Self>,
        agent: &Agent,
        message: &str,
        depth: u32,
        provenance: Provenance,
        on_chunk: &OnChunk,
        cancel: &CancellationToken,
    ) -> Result<String, SwarmError> {
        let id = &agent.id;
        let is_continuation = provenance.is_continuation();

        // building: compose from the pre-message snapshot, then record the
        // user entry so a cancelled stream still leaves it in history.
        let roster = if agent.is_leader && depth == 0 {
            Some(self.registry.list())
        } else {
            None
        };
        let messages = prompt::compose(agent, roster.as_deref(), &self.config, message);
        self.record_user_entry(id, message, provenance)?;

        // streaming
        let provider = self.providers.create(
            agent.provider,
            &agent.model,
            agent.endpoint.as_deref(),
            agent.credential.as_deref(),
        )?;
        let options = ChatOptions {
            temperature: agent.temperature,
            max_tokens: agent.max_tokens,
        };
        let messages = Arc::new(messages);
        let factory: StreamFactory = {
            let provider = provider.clone();
            let messages = messages.clone();
            Box::new(move || {
                let provider = provider.clone();
                let messages = messages.clone();
                Box::pin(async move { provider.stream(&messages, &options).await })
            })
        };
        let mut stream =
            with_provider_retry(factory, self.config.retry.clone(), Some(cancel.clone()));

        let _ = self.bus.publish(SwarmEvent::StreamStart { id: id.clone() });

        let may_delegate = agent.is_leader && depth < self.config.max_depth;
        let mut full = String::new();
        let mut usage = (0u64, 0u64);
        let mut detected = 0usize;
        let mut pending: Vec<PendingDelegation> = Vec::new();

        let stream_result: Result<(), SwarmError> = loop {
            // biased: prefer the cancellation branch when both are ready,
            // bounding stop latency to one chunk.
            let item = tokio::select! {
                biased;
                () = cancel.cancelled() => break Err(SwarmError::Cancelled),
                item = stream.next() => item,
            };

            match item {
                None => break Ok(()),
                Some(Ok(StreamChunk::Text { delta })) => {
                    full.push_str(&delta);
                    self.registry
                        .with_agent_mut(id, |a| a.current_thinking.clone_from(&full))?;
                    let _ = self.bus.publish(SwarmEvent::AgentThinking {
                        id: id.clone(),
                        thinking: full.clone(),
                    });
                    let _ = self.bus.publish(SwarmEvent::StreamChunk {
                        id: id.clone(),
                        chunk: delta.clone(),
                    });
                    on_chunk(&delta);

                    if may_delegate {
                        for delegation in parse_delegations(&full).into_iter().skip(detected) {
                            detected += 1;
                            pending.push(self.dispatch_delegation(
                                agent, delegation, depth, on_chunk,
                            ));
                        }
                    }
                }
                Some(Ok(StreamChunk::Done {
                    input_tokens,
                    output_tokens,
                })) => {
                    usage = (input_tokens, output_tokens);
                    break Ok(());
                }
                Some(Err(ProviderError::Cancelled)) => break Err(SwarmError::Cancelled),
                Some(Err(e)) => break Err(SwarmError::Provider(e)),
            }
        };

        match stream_result {
            Ok(()) => {
                let _ = self.bus.publish(SwarmEvent::StreamEnd { id: id.clone() });
            }
            Err(SwarmError::Cancelled) => return Err(SwarmError::Cancelled),
            Err(e) => {
                let _ = self.bus.publish(SwarmEvent::StreamError {
                    id: id.clone(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        // post-processing: assistant entry first, then counters.
        self.registry.with_agent_mut(id, |a| {
            a.history.push(hive_core::history::HistoryEntry::new(
                hive_core::history::Role::Assistant,
                full.clone(),
            ));
            a.current_thinking.clear();
            a.metrics.total_input_tokens += usage.0;
            a.metrics.total_output_tokens += usage.1;
            if !is_continuation {
                a.metrics.total_messages += 1;
            }
            a.metrics.last_active = Some(Utc::now());
        })?;

        // tool continuation
        if agent.project.is_some() && depth < self.config.max_depth {
            let calls = parse_tool_calls(&full);
            if !calls.is_empty() {
                let results = self.execute_tools(agent, &calls, cancel).await;
                let message = continuation::tool_results_message(&results);
                return self
                    .clone()
                    .chat_inner(
                        id.clone(),
                        message,
                        depth + 1,
                        Provenance::ToolResult { results },
                        on_chunk.clone(),
                    )
                    .await;
            }
        }

        // delegation continuation
        if may_delegate {
            // Delegations completed between the last chunk and stream end
            // use the same eager-dispatch logic.
            for delegation in parse_delegations(&full).into_iter().skip(detected) {
                detected += 1;
                pending.push(self.dispatch_delegation(agent, delegation, depth, on_chunk));
            }

            if !pending.is_empty() {
                let results = await_delegations(pending).await;
                let message = continuation::delegation_results_message(&results);
                return self
                    .clone()
                    .chat_inner(
                        id.clone(),
                        message,
                        depth + 1,
                        Provenance::DelegationResult { results },
                        on_chunk.clone(),
                    )
                    .await;
            }
        }

        if depth >= self.config.max_depth && (agent.project.is_some() || agent.is_leader) {
            info!(agent = %id, depth, "recursion depth limit reached, skipping post-processing");
        }

        Ok(full)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Delegations
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve and enqueue one delegation. Publishes `agent:delegation`,
    /// adds a todo on the target, and hands the recursive engine call to
    /// the target's lane.
    fn dispatch_delegation(
        self: &Arc<Self>,
        leader: &Agent,
        delegation: Delegation,
        depth: u32,
        on_chunk: &OnChunk,
    ) -> PendingDelegation {
        let Some((target_id, target_name)) =
            self.registry.resolve_name(&delegation.agent, Some(&leader.id))
        else {
            warn!(
                leader = %leader.id,
                target = %delegation.agent,
                "delegation target not found"
            );
            return PendingDelegation {
                delegation,
                state: PendingState::Unresolved,
            };
        };

        let _ = self.bus.publish(SwarmEvent::Delegation {
            from_id: leader.id.clone(),
            from_name: leader.name.clone(),
            to_id: target_id.clone(),
            to_name: target_name.clone(),
            task: delegation.task.clone(),
        });
        on_chunk(&format!(
            "\n\n--- Delegating to {target_name}: {} ---\n",
            delegation.task
        ));

        let todo_id = self
            .registry
            .add_todo(&target_id, format!("[From {}] {}", leader.name, delegation.task))
            .map(|todo| todo.id)
            .ok();

        let engine = self.clone();
        let task_message = format!("[TASK from {}]: {}", leader.name, delegation.task);
        let leader_name = leader.name.clone();
        let lane_target = target_id.clone();
        let chunk = on_chunk.clone();

        let rx = self.lanes.enqueue(&target_id, move || {
            Box::pin(async move {
                let result = engine
                    .clone()
                    .chat_inner(
                        lane_target.clone(),
                        task_message,
                        depth + 1,
                        Provenance::DelegationTask { from: leader_name },
                        chunk,
                    )
                    .await;
                if result.is_ok() {
                    if let Some(todo_id) = &todo_id {
                        let _ = engine.registry.complete_todo(&lane_target, todo_id);
                    }
                }
                result
            })
        });

        PendingDelegation {
            delegation,
            state: PendingState::Waiting {
                target_id,
                target_name,
                rx,
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tools
    // ─────────────────────────────────────────────────────────────────────

    /// Execute tool calls in textual order, publishing the tool events.
    /// `report_error` is intercepted here and never reaches the dispatcher.
    async fn execute_tools(
        &self,
        agent: &Agent,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Vec<ToolResult> {
        let Some(project) = agent.project.as_deref() else {
            return Vec::new();
        };
        let root = self.config.project_dir(project);
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if cancel.is_cancelled() {
                break;
            }

            if call.tool == ToolName::ReportError {
                let description = call.args.first().cloned().unwrap_or_default();
                let _ = self.bus.publish(SwarmEvent::ErrorReport {
                    id: agent.id.clone(),
                    name: agent.name.clone(),
                    description: description.clone(),
                    timestamp: Utc::now(),
                });
                results.push(ToolResult::report(call, description));
                continue;
            }

            let _ = self.bus.publish(SwarmEvent::ToolStart {
                id: agent.id.clone(),
                name: agent.name.clone(),
                tool: call.tool,
                args: call.args.clone(),
            });

            let result = self.dispatcher.dispatch(&root, call, cancel).await;

            if result.success {
                let _ = self.bus.publish(SwarmEvent::ToolResult {
                    id: agent.id.clone(),
                    name: agent.name.clone(),
                    tool: call.tool,
                    args: call.args.clone(),
                    preview: preview(result.result.as_deref().unwrap_or("")),
                });
            } else {
                let _ = self.bus.publish(SwarmEvent::ToolError {
                    id: agent.id.clone(),
                    name: agent.name.clone(),
                    tool: call.tool,
                    args: call.args.clone(),
                    error: result.error.clone().unwrap_or_default(),
                });
            }
            results.push(result);
        }

        results
    }
}

/// Await delegation outcomes in the textual order of the originals.
async fn await_delegations(pending: Vec<PendingDelegation>) -> Vec<DelegationResult> {
    let mut results = Vec::with_capacity(pending.len());
    for entry in pending {
        let PendingDelegation { delegation, state } = entry;
        let result = match state {
            PendingState::Unresolved => DelegationResult::err(
                AgentId::new(""),
                delegation.agent.clone(),
                delegation.task,
                format!("Agent \"{}\" not found in swarm", delegation.agent),
            ),
            PendingState::Waiting {
                target_id,
                target_name,
                rx,
            } => match rx.await {
                Ok(Ok(response)) => {
                    DelegationResult::ok(target_id, target_name, delegation.task, response)
                }
                Ok(Err(e)) => {
                    DelegationResult::err(target_id, target_name, delegation.task, e.to_string())
                }
                Err(_) => DelegationResult::err(
                    target_id,
                    target_name,
                    delegation.task,
                    "delegation task aborted",
                ),
            },
        };
        results.push(result);
    }
    results
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_owned()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    }
}
