//! The agent record and its owned sub-records.
//!
//! An [`Agent`] binds a model, an identity, instruction text, an optional
//! project, and runtime state. Todos, RAG documents, and history entries are
//! owned by their agent and destroyed with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::ids::AgentId;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Which model backend serves this agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Local chat endpoint (Ollama-style).
    #[serde(rename = "localChat")]
    LocalChat,
    /// Anthropic Messages API.
    #[serde(rename = "anthropic")]
    Anthropic,
    /// `OpenAI` chat completions.
    #[serde(rename = "openAIChat")]
    OpenAiChat,
    /// `OpenAI` legacy text completions.
    #[serde(rename = "openAICompletion")]
    OpenAiCompletion,
    /// Any `OpenAI`-compatible chat endpoint.
    #[serde(rename = "openAICompatible")]
    OpenAiCompatible,
}

/// Runtime status of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// No turn in flight.
    #[default]
    Idle,
    /// A turn is streaming or post-processing.
    Busy,
    /// The last turn failed.
    Error,
}

// ─────────────────────────────────────────────────────────────────────────────
// Owned sub-records
// ─────────────────────────────────────────────────────────────────────────────

/// One todo item on an agent's list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Todo id.
    pub id: String,
    /// Task text.
    pub text: String,
    /// Completion flag.
    pub done: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Present iff `done` and the todo was completed via the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Todo {
    /// A fresh, not-done todo.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            done: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// A reference document attached to an agent's prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagDoc {
    /// Document id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Document content.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl RagDoc {
    /// A fresh reference document.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Per-agent usage counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    /// Completed assistant turns (continuations excluded).
    pub total_messages: u64,
    /// Accumulated input tokens.
    pub total_input_tokens: u64,
    /// Accumulated output tokens.
    pub total_output_tokens: u64,
    /// Failed turns.
    pub error_count: u64,
    /// Last turn completion time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// A persistent agent configuration plus its runtime state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique id within the registry.
    pub id: AgentId,
    /// Display name. May collide with other agents; matched case-insensitively.
    pub name: String,
    /// Role tag (e.g. "developer", "qa").
    pub role: String,
    /// Descriptive text shown to leaders in their roster.
    pub description: String,
    /// Which backend serves this agent.
    pub provider: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// Backend endpoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// API credential. Persisted in clear; never leaves via sanitised reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// System instructions.
    pub instructions: String,
    /// Runtime status.
    #[serde(default)]
    pub status: AgentStatus,
    /// Sampling temperature, 0–1.
    pub temperature: f64,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Ordered todo list.
    #[serde(default)]
    pub todos: Vec<Todo>,
    /// Ordered reference documents.
    #[serde(default)]
    pub rag_docs: Vec<RagDoc>,
    /// Ordered conversation history.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Transient buffer of the in-flight assistant output.
    #[serde(default)]
    pub current_thinking: String,
    /// Usage counters.
    #[serde(default)]
    pub metrics: AgentMetrics,
    /// Bound project name, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Whether this agent receives a roster and may delegate.
    #[serde(default)]
    pub is_leader: bool,
    /// Display icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Display colour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Build an agent from a creation spec, assigning a fresh id.
    #[must_use]
    pub fn from_spec(spec: AgentSpec) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::generate(),
            name: spec.name,
            role: spec.role.unwrap_or_default(),
            description: spec.description.unwrap_or_default(),
            provider: spec.provider,
            model: spec.model,
            endpoint: spec.endpoint,
            credential: spec.credential,
            instructions: spec.instructions.unwrap_or_default(),
            status: AgentStatus::Idle,
            temperature: spec.temperature.unwrap_or(0.7).clamp(0.0, 1.0),
            max_tokens: spec.max_tokens.unwrap_or(4096),
            todos: Vec::new(),
            rag_docs: Vec::new(),
            history: Vec::new(),
            current_thinking: String::new(),
            metrics: AgentMetrics::default(),
            project: spec.project,
            is_leader: spec.is_leader.unwrap_or(false),
            icon: spec.icon,
            color: spec.color,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update patch. Runtime state is untouchable here: the patch
    /// type has no fields for status, thinking, metrics, or history.
    pub fn apply_update(&mut self, update: AgentUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(provider) = update.provider {
            self.provider = provider;
        }
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(endpoint) = update.endpoint {
            self.endpoint = Some(endpoint);
        }
        if let Some(credential) = update.credential {
            self.credential = Some(credential);
        }
        if let Some(instructions) = update.instructions {
            self.instructions = instructions;
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature.clamp(0.0, 1.0);
        }
        if let Some(max_tokens) = update.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(project) = update.project {
            self.project = Some(project);
        }
        if let Some(is_leader) = update.is_leader {
            self.is_leader = is_leader;
        }
        if let Some(icon) = update.icon {
            self.icon = Some(icon);
        }
        if let Some(color) = update.color {
            self.color = Some(color);
        }
        self.updated_at = Utc::now();
    }

    /// The read view with the credential replaced by a boolean.
    #[must_use]
    pub fn sanitized(&self) -> SanitizedAgent {
        SanitizedAgent {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            description: self.description.clone(),
            provider: self.provider,
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            has_credential: self.credential.is_some(),
            instructions: self.instructions.clone(),
            status: self.status,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            todos: self.todos.clone(),
            rag_docs: self.rag_docs.clone(),
            current_thinking: self.current_thinking.clone(),
            metrics: self.metrics.clone(),
            project: self.project.clone(),
            is_leader: self.is_leader,
            icon: self.icon.clone(),
            color: self.color.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Sanitised agent view: the credential is reduced to `has_credential`.
///
/// This is what registry reads and `agent:*` events carry. History is
/// omitted — the transport fetches it through the dedicated history
/// operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedAgent {
    /// Agent id.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Role tag.
    pub role: String,
    /// Description.
    pub description: String,
    /// Backend selector.
    pub provider: ProviderKind,
    /// Model identifier.
    pub model: String,
    /// Endpoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Whether a credential is configured.
    pub has_credential: bool,
    /// System instructions.
    pub instructions: String,
    /// Runtime status.
    pub status: AgentStatus,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Todo list.
    pub todos: Vec<Todo>,
    /// Reference documents.
    pub rag_docs: Vec<RagDoc>,
    /// In-flight output buffer.
    pub current_thinking: String,
    /// Usage counters.
    pub metrics: AgentMetrics,
    /// Bound project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Leader flag.
    pub is_leader: bool,
    /// Display icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Display colour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Creation / update payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Payload for creating an agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentSpec {
    /// Display name (required).
    pub name: String,
    /// Backend selector (required).
    pub provider: ProviderKind,
    /// Model identifier (required).
    pub model: String,
    /// Role tag.
    #[serde(default)]
    pub role: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Endpoint override.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// API credential.
    #[serde(default)]
    pub credential: Option<String>,
    /// System instructions.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Sampling temperature (defaults to 0.7, clamped to 0–1).
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Maximum output tokens (defaults to 4096).
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Bound project.
    #[serde(default)]
    pub project: Option<String>,
    /// Leader flag.
    #[serde(default)]
    pub is_leader: Option<bool>,
    /// Display icon.
    #[serde(default)]
    pub icon: Option<String>,
    /// Display colour.
    #[serde(default)]
    pub color: Option<String>,
}

impl AgentSpec {
    /// Minimal spec for the given name/provider/model.
    pub fn new(name: impl Into<String>, provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider,
            model: model.into(),
            role: None,
            description: None,
            endpoint: None,
            credential: None,
            instructions: None,
            temperature: None,
            max_tokens: None,
            project: None,
            is_leader: None,
            icon: None,
            color: None,
        }
    }
}

/// Whitelisted update patch.
///
/// `deny_unknown_fields` makes an attempt to patch runtime state (status,
/// thinking, metrics, history) a deserialisation error rather than a silent
/// no-op.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentUpdate {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New role tag.
    #[serde(default)]
    pub role: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New backend selector.
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    /// New model identifier.
    #[serde(default)]
    pub model: Option<String>,
    /// New endpoint override.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// New credential.
    #[serde(default)]
    pub credential: Option<String>,
    /// New system instructions.
    #[serde(default)]
    pub instructions: Option<String>,
    /// New temperature (clamped to 0–1).
    #[serde(default)]
    pub temperature: Option<f64>,
    /// New max output tokens.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// New project binding.
    #[serde(default)]
    pub project: Option<String>,
    /// New leader flag.
    #[serde(default)]
    pub is_leader: Option<bool>,
    /// New icon.
    #[serde(default)]
    pub icon: Option<String>,
    /// New colour.
    #[serde(default)]
    pub color: Option<String>,
}
