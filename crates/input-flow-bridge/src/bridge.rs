//! Pending-completion tracking and the grace-period watchdog.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use input_flow_types::{DeviceHandleId, DeviceId};

use crate::error::BridgeError;

/// Grace period before a pending operation is marked stale; a second full
/// grace period later it is failed.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(4);

/// The four capability operations. At most one completion per kind is
/// pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Prepare,
    Unprepare,
    Start,
    Stop,
}

type Completion = Box<dyn FnOnce(bool) + Send>;

/// Provider-side interface to the platform's remote input capability.
///
/// A provider either returns an error synchronously or eventually resolves
/// the given [`CompletionHandle`]. Resolving late (after the watchdog has
/// already failed the operation) is harmless.
#[async_trait]
pub trait RemoteInputProvider: Send + Sync {
    /// Establish the capability link between two devices.
    async fn prepare(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        done: CompletionHandle,
    ) -> Result<(), BridgeError>;

    /// Tear down the capability link between two devices.
    async fn unprepare(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        done: CompletionHandle,
    ) -> Result<(), BridgeError>;

    /// Start forwarding input from the origin's devices to the remote.
    async fn start(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        dhids: &[DeviceHandleId],
        done: CompletionHandle,
    ) -> Result<(), BridgeError>;

    /// Stop forwarding input from the origin's devices to the remote.
    async fn stop(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        dhids: &[DeviceHandleId],
        done: CompletionHandle,
    ) -> Result<(), BridgeError>;
}

struct Pending {
    generation: u64,
    callback: Option<Completion>,
    stale: bool,
}

struct Inner {
    pending: Mutex<HashMap<OperationKind, Pending>>,
    generation: AtomicU64,
    grace: Duration,
}

impl Inner {
    /// Resolve the pending completion of `kind`, if it is still the one
    /// registered under `generation`. Late or superseded completions are
    /// dropped silently.
    fn resolve(&self, kind: OperationKind, generation: u64, success: bool) {
        let callback = {
            let mut pending = self.pending.lock().unwrap();
            match pending.get(&kind) {
                Some(p) if p.generation == generation => {
                    pending.remove(&kind).and_then(|p| p.callback)
                }
                _ => {
                    debug!(?kind, generation, "ignoring stale completion");
                    None
                }
            }
        };
        if let Some(callback) = callback {
            callback(success);
        }
    }
}

/// Handle a provider resolves to report the outcome of one operation.
pub struct CompletionHandle {
    inner: Arc<Inner>,
    kind: OperationKind,
    generation: u64,
}

impl CompletionHandle {
    /// Report the operation's outcome.
    pub fn resolve(self, success: bool) {
        self.inner.resolve(self.kind, self.generation, success);
    }
}

/// Async facade over a [`RemoteInputProvider`].
///
/// Each call registers a pending completion, invokes the provider, and
/// waits for the outcome. Registering a new operation of the same kind
/// supersedes the previous one, which then reports failure to its caller.
#[derive(Clone)]
pub struct RemoteInputBridge {
    inner: Arc<Inner>,
    provider: Arc<dyn RemoteInputProvider>,
}

impl RemoteInputBridge {
    pub fn new(provider: Arc<dyn RemoteInputProvider>) -> Self {
        Self::with_grace(provider, DEFAULT_GRACE)
    }

    pub fn with_grace(provider: Arc<dyn RemoteInputProvider>, grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(1),
                grace,
            }),
            provider,
        }
    }

    /// Whether an operation of `kind` is still awaiting its completion.
    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.inner.pending.lock().unwrap().contains_key(&kind)
    }

    /// Establish the capability link `remote` <- `origin`. Resolves to the
    /// reported outcome, or `false` on timeout or supersession.
    pub async fn prepare(&self, remote: &DeviceId, origin: &DeviceId) -> Result<bool, BridgeError> {
        let (rx, handle) = self.register(OperationKind::Prepare);
        if let Err(e) = self.provider.prepare(remote, origin, handle).await {
            self.abandon(OperationKind::Prepare);
            return Err(e);
        }
        Ok(rx.await.unwrap_or(false))
    }

    /// Tear down the capability link `remote` <- `origin`.
    pub async fn unprepare(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
    ) -> Result<bool, BridgeError> {
        let (rx, handle) = self.register(OperationKind::Unprepare);
        if let Err(e) = self.provider.unprepare(remote, origin, handle).await {
            self.abandon(OperationKind::Unprepare);
            return Err(e);
        }
        Ok(rx.await.unwrap_or(false))
    }

    /// Start forwarding the given devices from `origin` to `remote`.
    pub async fn start(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        dhids: &[DeviceHandleId],
    ) -> Result<bool, BridgeError> {
        let (rx, handle) = self.register(OperationKind::Start);
        if let Err(e) = self.provider.start(remote, origin, dhids, handle).await {
            self.abandon(OperationKind::Start);
            return Err(e);
        }
        Ok(rx.await.unwrap_or(false))
    }

    /// Stop forwarding the given devices from `origin` to `remote`.
    pub async fn stop(
        &self,
        remote: &DeviceId,
        origin: &DeviceId,
        dhids: &[DeviceHandleId],
    ) -> Result<bool, BridgeError> {
        let (rx, handle) = self.register(OperationKind::Stop);
        if let Err(e) = self.provider.stop(remote, origin, dhids, handle).await {
            self.abandon(OperationKind::Stop);
            return Err(e);
        }
        Ok(rx.await.unwrap_or(false))
    }

    fn register(&self, kind: OperationKind) -> (oneshot::Receiver<bool>, CompletionHandle) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let callback: Completion = Box::new(move |success| {
            let _ = tx.send(success);
        });

        let superseded = self.inner.pending.lock().unwrap().insert(
            kind,
            Pending {
                generation,
                callback: Some(callback),
                stale: false,
            },
        );
        // Dropping the superseded callback closes its channel; the earlier
        // caller observes failure.
        if superseded.is_some() {
            debug!(?kind, "superseding pending operation");
        }

        self.spawn_watchdog(kind, generation);

        let handle = CompletionHandle {
            inner: Arc::clone(&self.inner),
            kind,
            generation,
        };
        (rx, handle)
    }

    fn abandon(&self, kind: OperationKind) {
        self.inner.pending.lock().unwrap().remove(&kind);
    }

    /// One grace period marks the operation stale, a second fails it.
    fn spawn_watchdog(&self, kind: OperationKind, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let grace = self.inner.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            {
                let mut pending = inner.pending.lock().unwrap();
                match pending.get_mut(&kind) {
                    Some(p) if p.generation == generation => {
                        p.stale = true;
                        debug!(?kind, generation, "operation still pending after grace");
                    }
                    _ => return,
                }
            }
            tokio::time::sleep(grace).await;
            warn!(?kind, generation, "operation timed out, reporting failure");
            inner.resolve(kind, generation, false);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBehavior, MockRemoteInput};

    fn ids() -> (DeviceId, DeviceId) {
        (DeviceId::new("remote"), DeviceId::new("origin"))
    }

    #[tokio::test]
    async fn provider_success_resolves_true() {
        let provider = MockRemoteInput::new();
        let handle = provider.handle();
        let bridge = RemoteInputBridge::new(Arc::new(provider));
        let (remote, origin) = ids();

        let ok = bridge.prepare(&remote, &origin).await.unwrap();
        assert!(ok);
        assert!(!bridge.is_pending(OperationKind::Prepare));
        assert_eq!(handle.calls().len(), 1);
    }

    #[tokio::test]
    async fn provider_reported_failure_resolves_false() {
        let provider = MockRemoteInput::new();
        provider
            .handle()
            .set_behavior(OperationKind::Start, MockBehavior::CompleteWith(false));
        let bridge = RemoteInputBridge::new(Arc::new(provider));
        let (remote, origin) = ids();

        let ok = bridge
            .start(&remote, &origin, &[DeviceHandleId::new("dhid-1")])
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn sync_error_clears_pending() {
        let provider = MockRemoteInput::new();
        provider
            .handle()
            .set_behavior(OperationKind::Unprepare, MockBehavior::FailSync);
        let bridge = RemoteInputBridge::new(Arc::new(provider));
        let (remote, origin) = ids();

        let err = bridge.unprepare(&remote, &origin).await.unwrap_err();
        assert!(matches!(err, BridgeError::Capability(_)));
        assert!(!bridge.is_pending(OperationKind::Unprepare));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_provider_fails_after_two_grace_periods() {
        let provider = MockRemoteInput::new();
        provider
            .handle()
            .set_behavior(OperationKind::Stop, MockBehavior::Hold);
        let bridge = RemoteInputBridge::new(Arc::new(provider));
        let (remote, origin) = ids();

        let start = tokio::time::Instant::now();
        let ok = bridge.stop(&remote, &origin, &[]).await.unwrap();
        assert!(!ok);
        assert!(start.elapsed() >= DEFAULT_GRACE * 2);
        assert!(!bridge.is_pending(OperationKind::Stop));
    }

    #[tokio::test(start_paused = true)]
    async fn completion_within_second_grace_period_still_counts() {
        let provider = MockRemoteInput::new();
        let handle = provider.handle();
        handle.set_behavior(OperationKind::Prepare, MockBehavior::Hold);
        let bridge = RemoteInputBridge::new(Arc::new(provider));
        let (remote, origin) = ids();

        let task = {
            let bridge = bridge.clone();
            let (remote, origin) = (remote.clone(), origin.clone());
            tokio::spawn(async move { bridge.prepare(&remote, &origin).await })
        };

        // Past the first grace, inside the second
        tokio::time::sleep(DEFAULT_GRACE + Duration::from_secs(1)).await;
        assert!(bridge.is_pending(OperationKind::Prepare));
        handle.resolve_held(OperationKind::Prepare, true);

        let ok = task.await.unwrap().unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn superseded_operation_reports_failure() {
        let provider = MockRemoteInput::new();
        let handle = provider.handle();
        handle.set_behavior(OperationKind::Prepare, MockBehavior::Hold);
        let bridge = RemoteInputBridge::new(Arc::new(provider));
        let (remote, origin) = ids();

        let first = {
            let bridge = bridge.clone();
            let (remote, origin) = (remote.clone(), origin.clone());
            tokio::spawn(async move { bridge.prepare(&remote, &origin).await })
        };
        // Let the first call register before superseding it
        tokio::task::yield_now().await;

        handle.set_behavior(OperationKind::Prepare, MockBehavior::CompleteWith(true));
        let second = bridge.prepare(&remote, &origin).await.unwrap();
        assert!(second);

        let first = first.await.unwrap().unwrap();
        assert!(!first);
    }

    #[tokio::test(start_paused = true)]
    async fn late_completion_is_ignored() {
        let provider = MockRemoteInput::new();
        let handle = provider.handle();
        handle.set_behavior(OperationKind::Start, MockBehavior::Hold);
        let bridge = RemoteInputBridge::new(Arc::new(provider));
        let (remote, origin) = ids();

        let ok = bridge.start(&remote, &origin, &[]).await.unwrap();
        assert!(!ok);

        // The held completion resolves after the watchdog already failed it
        handle.resolve_held(OperationKind::Start, true);
        assert!(!bridge.is_pending(OperationKind::Start));
    }
}
