//! Per-agent task lanes.
//!
//! Each agent id owns a single-lane queue: an unbounded channel plus a
//! consumer task spawned lazily on first enqueue. Jobs on one lane run
//! strictly in enqueue order, one at a time; lanes for different agents run
//! in parallel. A failing job never aborts its lane — the producer's future
//! carries the job's own outcome. There is no bound on queue length;
//! back-pressure is the caller's responsibility.

use dashmap::DashMap;
use futures::future::BoxFuture;
use hive_core::ids::AgentId;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::errors::SwarmError;

/// Outcome carried by every lane job.
pub type TaskOutcome = Result<String, SwarmError>;

type Thunk = Box<dyn FnOnce() -> BoxFuture<'static, TaskOutcome> + Send>;

struct Job {
    thunk: Thunk,
    reply: oneshot::Sender<TaskOutcome>,
}

/// Map of agent id → single-consumer lane.
#[derive(Default)]
pub struct TaskLanes {
    lanes: DashMap<AgentId, mpsc::UnboundedSender<Job>>,
}

impl TaskLanes {
    /// An empty lane map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job on an agent's lane, spawning the consumer on first
    /// use. Returns a future resolving to the job's own outcome.
    pub fn enqueue(
        &self,
        id: &AgentId,
        thunk: impl FnOnce() -> BoxFuture<'static, TaskOutcome> + Send + 'static,
    ) -> oneshot::Receiver<TaskOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            thunk: Box::new(thunk),
            reply: reply_tx,
        };

        let sender = self
            .lanes
            .entry(id.clone())
            .or_insert_with(|| spawn_consumer(id.clone()))
            .clone();

        if let Err(send_error) = sender.send(job) {
            // The consumer is gone (agent deleted mid-enqueue); surface the
            // failure through the job's own reply slot.
            let Job { reply, .. } = send_error.0;
            let _ = reply.send(Err(SwarmError::internal("task lane closed")));
        }

        reply_rx
    }

    /// Tear down an agent's lane. Queued jobs still drain; the consumer
    /// exits once the channel is empty.
    pub fn remove(&self, id: &AgentId) {
        let _ = self.lanes.remove(id);
    }

    /// Number of live lanes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// Whether no lanes exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

fn spawn_consumer(id: AgentId) -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    let _handle = tokio::spawn(async move {
        debug!(agent = %id, "task lane consumer started");
        while let Some(job) = rx.recv().await {
            let outcome = (job.thunk)().await;
            // The producer may have dropped its receiver; that is fine.
            let _ = job.reply.send(outcome);
        }
        debug!(agent = %id, "task lane consumer stopped");
    });
    tx
}
