use crate::channel::Channel;
use crate::error::{Error, ErrorKind, Result};
use crate::session::SessionId;
use dashmap::DashMap;
use log::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to a registered channel.
pub type ChannelRef = Arc<dyn Channel>;

/// Concurrency-safe map of session id to the channel currently serving it.
///
/// Each operation is atomic per session id (DashMap shard locks). Channel
/// pushes always happen after the shard guard is released, so a slow channel
/// never blocks unrelated sessions.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, ChannelRef>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Insert or overwrite the mapping for `session_id`.
    ///
    /// A superseded channel is completed normally, so its client sees the old
    /// stream end instead of hanging forever.
    pub fn register(&self, session_id: SessionId, channel: ChannelRef) {
        if let Some(previous) = self.replace(session_id, channel) {
            previous.complete();
        }
    }

    /// Insert or overwrite the mapping, handing back the superseded channel
    /// without completing it.
    pub fn replace(&self, session_id: SessionId, channel: ChannelRef) -> Option<ChannelRef> {
        let superseded = self.sessions.insert(session_id.clone(), channel);
        match superseded {
            Some(_) => info!("Session {session_id} re-registered, superseding previous channel"),
            None => debug!("Registered session {session_id}"),
        }
        superseded
    }

    /// Remove the mapping if present. Idempotent.
    pub fn unregister(&self, session_id: &SessionId) {
        if self.sessions.remove(session_id).is_some() {
            debug!("Unregistered session {session_id}");
        }
    }

    /// Remove the mapping only if it still points at `channel`.
    ///
    /// Returns `true` when an entry was removed.
    pub fn unregister_channel(&self, session_id: &SessionId, channel: &ChannelRef) -> bool {
        self.sessions
            .remove_if(session_id, |_, current| Arc::ptr_eq(current, channel))
            .is_some()
    }

    /// Remove the mapping and hand back the channel it held.
    pub fn take(&self, session_id: &SessionId) -> Option<ChannelRef> {
        self.sessions.remove(session_id).map(|(_, channel)| channel)
    }

    pub fn lookup(&self, session_id: &SessionId) -> Option<ChannelRef> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Push `payload` to the channel registered under `session_id`.
    ///
    /// On a failed push the stale entry is evicted before the error is returned.
    pub fn send(&self, session_id: &SessionId, payload: &str) -> Result<()> {
        let channel = self.lookup(session_id).ok_or_else(Error::not_connected)?;
        self.deliver(session_id, &channel, payload)
    }

    /// Like `send`, but only if `session_id` is still served by `channel`.
    ///
    /// A session that was unregistered or re-registered under another channel
    /// reports `NotConnected`.
    pub fn send_on(
        &self,
        session_id: &SessionId,
        channel: &ChannelRef,
        payload: &str,
    ) -> Result<()> {
        match self.lookup(session_id) {
            Some(current) if Arc::ptr_eq(&current, channel) => {
                self.deliver(session_id, channel, payload)
            }
            _ => Err(Error::not_connected()),
        }
    }

    /// Apply `send` to a snapshot of every registered session.
    ///
    /// Failures are collected per session instead of aborting the pass.
    pub fn broadcast(&self, payload: &str) -> HashMap<SessionId, Result<()>> {
        let snapshot: Vec<(SessionId, ChannelRef)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let results: HashMap<SessionId, Result<()>> = snapshot
            .into_iter()
            .map(|(session_id, channel)| {
                let result = self.deliver(&session_id, &channel, payload);
                (session_id, result)
            })
            .collect();

        debug!(
            "Broadcast delivered to {} of {} session(s)",
            results.values().filter(|r| r.is_ok()).count(),
            results.len()
        );

        results
    }

    pub fn size(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Push through `channel`. Any push failure is reported as `DeliveryFailed`
    /// (the channel's own error kept as source) after evicting the entry.
    fn deliver(&self, session_id: &SessionId, channel: &ChannelRef, payload: &str) -> Result<()> {
        channel.push(payload).map_err(|e| {
            warn!("Failed to deliver to session {session_id}: {e}. Removing stale session.");
            // A newer registration under the same id must survive.
            self.unregister_channel(session_id, channel);
            match e.error_kind {
                ErrorKind::DeliveryFailed => e,
                _ => Error::delivery_failed(e),
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Test channel that records pushes and can be told to fail.
    #[derive(Default)]
    pub(crate) struct MockChannel {
        failing: AtomicBool,
        // Kind reported by a failing push; `DeliveryFailed` when unset.
        failure_kind: Mutex<Option<ErrorKind>>,
        pub(crate) pushed: Mutex<Vec<String>>,
        pub(crate) completed: AtomicUsize,
        pub(crate) completed_with_error: AtomicUsize,
    }

    impl MockChannel {
        pub(crate) fn ok() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn failing() -> Arc<Self> {
            let channel = Self::default();
            channel.failing.store(true, Ordering::SeqCst);
            Arc::new(channel)
        }

        /// A channel whose push fails with an error of `kind`.
        pub(crate) fn failing_with(kind: ErrorKind) -> Arc<Self> {
            let channel = Self::failing();
            *channel.failure_kind.lock().unwrap() = Some(kind);
            channel
        }

        pub(crate) fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub(crate) fn pushed(&self) -> Vec<String> {
            self.pushed.lock().unwrap().clone()
        }
    }

    impl Channel for MockChannel {
        fn push(&self, payload: &str) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(match self.failure_kind.lock().unwrap().clone() {
                    Some(kind) => Error::new(kind),
                    None => Error::delivery_failed("mock transport closed"),
                });
            }
            self.pushed.lock().unwrap().push(payload.to_string());
            Ok(())
        }

        fn complete(&self) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn complete_with_error(&self, _error: &Error) {
            self.completed_with_error.fetch_add(1, Ordering::SeqCst);
        }

        fn is_open(&self) -> bool {
            !self.failing.load(Ordering::SeqCst)
        }
    }

    fn id(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[test]
    fn test_lookup_returns_most_recent_registration() {
        let registry = SessionRegistry::new();
        let first: ChannelRef = MockChannel::ok();
        let second: ChannelRef = MockChannel::ok();

        assert!(registry.lookup(&id("A")).is_none());

        registry.register(id("A"), Arc::clone(&first));
        assert!(Arc::ptr_eq(&registry.lookup(&id("A")).unwrap(), &first));

        registry.register(id("A"), Arc::clone(&second));
        assert!(Arc::ptr_eq(&registry.lookup(&id("A")).unwrap(), &second));

        registry.unregister(&id("A"));
        assert!(registry.lookup(&id("A")).is_none());
    }

    #[test]
    fn test_register_twice_keeps_one_entry_and_completes_superseded() {
        let registry = SessionRegistry::new();
        let first = MockChannel::ok();
        let second = MockChannel::ok();

        registry.register(id("A"), first.clone());
        registry.register(id("A"), second.clone());

        assert_eq!(registry.size(), 1);
        assert_eq!(first.completed.load(Ordering::SeqCst), 1);
        assert_eq!(second.completed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.register(id("A"), MockChannel::ok());

        registry.unregister(&id("A"));
        registry.unregister(&id("A"));
        registry.unregister(&id("never-registered"));

        assert!(registry.is_empty());
    }

    #[test]
    fn test_send_to_unregistered_session_is_not_connected() {
        let registry = SessionRegistry::new();
        registry.register(id("B"), MockChannel::ok());

        let err = registry.send(&id("A"), "x").unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::NotConnected);
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_send_success_keeps_entry() {
        let registry = SessionRegistry::new();
        let channel = MockChannel::ok();
        registry.register(id("A"), channel.clone());

        registry.send(&id("A"), "x").unwrap();

        assert_eq!(channel.pushed(), vec!["x".to_string()]);
        assert!(registry.lookup(&id("A")).is_some());
    }

    #[test]
    fn test_send_failure_evicts_session() {
        let registry = SessionRegistry::new();
        registry.register(id("A"), MockChannel::failing());

        let err = registry.send(&id("A"), "x").unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::DeliveryFailed);
        assert!(registry.lookup(&id("A")).is_none());
        assert_eq!(registry.size(), 0);
    }

    #[test]
    fn test_send_reports_any_push_failure_as_delivery_failed() {
        let registry = SessionRegistry::new();
        registry.register(id("A"), MockChannel::failing_with(ErrorKind::NotConnected));
        registry.register(id("B"), MockChannel::failing_with(ErrorKind::Production));

        let err = registry.send(&id("A"), "x").unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::DeliveryFailed);
        let source = err.source.as_ref().unwrap().to_string();
        assert!(source.contains("session is not connected"));

        let results = registry.broadcast("ping");
        assert_eq!(
            results[&id("B")].as_ref().unwrap_err().error_kind,
            ErrorKind::DeliveryFailed
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replace_hands_back_superseded_channel_uncompleted() {
        let registry = SessionRegistry::new();
        let first = MockChannel::ok();
        let first_ref: ChannelRef = first.clone();
        registry.register(id("A"), first_ref.clone());

        let superseded = registry.replace(id("A"), MockChannel::ok()).unwrap();

        assert!(Arc::ptr_eq(&superseded, &first_ref));
        assert_eq!(first.completed.load(Ordering::SeqCst), 0);
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_swap_to_failing_channel_scenario() {
        let registry = SessionRegistry::new();
        registry.register(id("A"), MockChannel::ok());

        registry.send(&id("A"), "x").unwrap();
        assert_eq!(registry.size(), 1);

        registry.register(id("A"), MockChannel::failing());
        let err = registry.send(&id("A"), "y").unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::DeliveryFailed);
        assert_eq!(registry.size(), 0);
        assert!(registry.lookup(&id("A")).is_none());
    }

    #[test]
    fn test_failed_push_does_not_evict_newer_registration() {
        let registry = SessionRegistry::new();
        let stale: ChannelRef = MockChannel::failing();
        let fresh: ChannelRef = MockChannel::ok();

        registry.register(id("A"), Arc::clone(&fresh));

        assert!(!registry.unregister_channel(&id("A"), &stale));
        assert!(registry.deliver(&id("A"), &stale, "x").is_err());
        assert!(Arc::ptr_eq(&registry.lookup(&id("A")).unwrap(), &fresh));
    }

    #[test]
    fn test_send_on_superseded_channel_is_not_connected() {
        let registry = SessionRegistry::new();
        let old: ChannelRef = MockChannel::ok();
        let new = MockChannel::ok();

        registry.register(id("A"), Arc::clone(&old));
        registry.send_on(&id("A"), &old, "first").unwrap();
        registry.register(id("A"), new.clone());

        let err = registry.send_on(&id("A"), &old, "second").unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::NotConnected);
        assert!(new.pushed().is_empty());
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_take_returns_registered_channel() {
        let registry = SessionRegistry::new();
        let channel: ChannelRef = MockChannel::ok();
        registry.register(id("A"), Arc::clone(&channel));

        let taken = registry.take(&id("A")).unwrap();

        assert!(Arc::ptr_eq(&taken, &channel));
        assert!(registry.take(&id("A")).is_none());
    }

    #[test]
    fn test_broadcast_collects_per_session_results() {
        let registry = SessionRegistry::new();
        for n in 0..5 {
            registry.register(id(&format!("ok-{n}")), MockChannel::ok());
        }
        for n in 0..3 {
            registry.register(id(&format!("dead-{n}")), MockChannel::failing());
        }

        let results = registry.broadcast("ping");

        assert_eq!(results.len(), 8);
        assert_eq!(results.values().filter(|r| r.is_ok()).count(), 5);
        let failed: Vec<_> = results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e.error_kind.clone())))
            .collect();
        assert_eq!(failed.len(), 3);
        assert!(failed
            .iter()
            .all(|(id, kind)| id.as_str().starts_with("dead-")
                && *kind == ErrorKind::DeliveryFailed));
        assert_eq!(registry.size(), 5);
    }

    #[test]
    fn test_broadcast_with_no_sessions_is_empty() {
        let registry = SessionRegistry::new();

        let results = registry.broadcast("ping");

        assert!(results.is_empty());
    }

    #[test]
    fn test_recovered_channel_receives_after_failure_toggle() {
        let registry = SessionRegistry::new();
        let channel = MockChannel::ok();
        registry.register(id("A"), channel.clone());

        channel.set_failing(true);
        assert!(registry.send(&id("A"), "lost").is_err());

        channel.set_failing(false);
        let err = registry.send(&id("A"), "after").unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::NotConnected);
        assert!(channel.pushed().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_operations_on_disjoint_sessions() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();

        for n in 0..64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let session = id(&format!("session-{n}"));
                let channel = MockChannel::ok();
                registry.register(session.clone(), channel.clone());
                for i in 0..20 {
                    registry.send(&session, &i.to_string()).unwrap();
                }
                // Odd sessions leave, even sessions stay connected.
                if n % 2 == 1 {
                    registry.unregister(&session);
                }
                channel.pushed().len()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 20);
        }

        assert_eq!(registry.size(), 32);
        for n in (0..64).step_by(2) {
            assert!(registry.lookup(&id(&format!("session-{n}"))).is_some());
        }
    }
}
