use crate::error::{Error, ErrorKind};
use crate::producer::Producer;
use crate::registry::{ChannelRef, SessionRegistry};
use crate::session::SessionId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};

/// Why a production loop stopped.
#[derive(Debug)]
pub enum Termination {
    /// The producer's stop predicate matched the last payload sent.
    StopCondition,
    /// The session was unregistered (or taken over by another channel).
    Unregistered,
    /// Delivery or production failed; the channel was completed with this error.
    Failed(Error),
}

struct StreamTask {
    generation: u64,
    abort: AbortHandle,
}

/// Runs one production loop per open stream and tracks them by session id.
pub struct Manager {
    registry: Arc<SessionRegistry>,
    tasks: Arc<DashMap<SessionId, StreamTask>>,
    next_generation: AtomicU64,
}

impl Manager {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            tasks: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Register `channel` under `session_id` and start its production loop.
    ///
    /// A loop still running for the same session is aborted first, so only one
    /// loop ever writes to a session. The superseded channel is completed after
    /// the task map is released. Must be called within a tokio runtime.
    pub fn open<P: Producer>(
        &self,
        session_id: SessionId,
        channel: ChannelRef,
        producer: P,
    ) -> JoinHandle<Termination> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // Open and close both update the registry while holding this entry.
        let entry = self.tasks.entry(session_id.clone());
        if let Entry::Occupied(ref previous) = entry {
            debug!("Aborting superseded production loop for session {session_id}");
            previous.get().abort.abort();
        }

        let superseded = self.registry.replace(session_id.clone(), Arc::clone(&channel));

        let registry = Arc::clone(&self.registry);
        let tasks = Arc::clone(&self.tasks);
        let task_session_id = session_id.clone();
        let handle = tokio::spawn(async move {
            let termination = run(&registry, &task_session_id, &channel, producer).await;
            tasks.remove_if(&task_session_id, |_, task| task.generation == generation);
            termination
        });

        entry.insert(StreamTask {
            generation,
            abort: handle.abort_handle(),
        });

        if let Some(previous) = superseded {
            previous.complete();
        }

        info!("Opened SSE stream for session {session_id}");
        handle
    }

    /// Unregister `session_id`, stop its loop and complete its channel.
    pub fn close(&self, session_id: &SessionId) {
        let taken = match self.tasks.entry(session_id.clone()) {
            Entry::Occupied(task) => {
                task.get().abort.abort();
                let channel = self.registry.take(session_id);
                task.remove();
                channel
            }
            Entry::Vacant(_) => self.registry.take(session_id),
        };

        if let Some(channel) = taken {
            channel.complete();
            info!("Closed SSE stream for session {session_id}");
        }
    }

    /// Number of production loops still running.
    pub fn active_streams(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_streaming(&self, session_id: &SessionId) -> bool {
        self.tasks.contains_key(session_id)
    }
}

/// The per-connection loop: Open until a stop, an unregister or a failure,
/// then Closing, which releases the registry entry and completes the channel.
async fn run<P: Producer>(
    registry: &SessionRegistry,
    session_id: &SessionId,
    channel: &ChannelRef,
    mut producer: P,
) -> Termination {
    let termination = loop {
        let payload = match producer.next_message().await {
            Ok(payload) => payload,
            Err(e) => break Termination::Failed(e),
        };

        match registry.send_on(session_id, channel, &payload) {
            Ok(()) => trace!("Sent message to session {session_id}"),
            Err(e) if e.error_kind == ErrorKind::NotConnected => break Termination::Unregistered,
            Err(e) => break Termination::Failed(e),
        }

        if producer.is_terminal(&payload) {
            break Termination::StopCondition;
        }
    };

    // Already gone after a failed delivery; the guard keeps a newer session intact.
    registry.unregister_channel(session_id, channel);

    match &termination {
        Termination::Failed(e) => {
            error!("SSE stream for session {session_id} failed: {e}");
            channel.complete_with_error(e);
        }
        Termination::StopCondition | Termination::Unregistered => {
            info!("SSE stream for session {session_id} completed ({termination:?})");
            channel.complete();
        }
    }

    termination
}
