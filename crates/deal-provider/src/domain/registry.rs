//! # Deal Handler Registry
//!
//! Maps each admitted deal to a live `DealHandler` that fans out lifecycle
//! updates and carries the deal's cancellation token.
//!
//! ## Concurrency
//!
//! - `register` / `remove` are only called by the acceptance loop.
//! - `get` / `subscribe` / `cancel` are called from any task.
//! - The map sits behind a `parking_lot::RwLock`; no lock is held across an
//!   `.await`.
//!
//! ## Update Delivery
//!
//! Every subscriber owns an unbounded queue, so a listening subscriber never
//! misses an update and publishing never blocks. Subscribers that dropped
//! their stream are pruned on the next publish.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::{Mutex, RwLock};
use shared_types::{DealId, DealUpdate};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::domain::errors::RegistryError;

// =============================================================================
// DEAL HANDLER
// =============================================================================

struct HandlerInner {
    subscribers: Vec<mpsc::UnboundedSender<DealUpdate>>,
    closed: bool,
}

/// Live coordination object for one admitted deal.
pub struct DealHandler {
    deal_uuid: DealId,
    inner: Mutex<HandlerInner>,
    cancel: CancellationToken,
}

impl DealHandler {
    fn new(deal_uuid: DealId, cancel: CancellationToken) -> Self {
        Self {
            deal_uuid,
            inner: Mutex::new(HandlerInner {
                subscribers: Vec::new(),
                closed: false,
            }),
            cancel,
        }
    }

    #[must_use]
    pub fn deal_uuid(&self) -> DealId {
        self.deal_uuid
    }

    /// Subscribe to updates published from now on.
    ///
    /// On a closed handler the returned stream ends immediately.
    pub fn subscribe(&self) -> DealUpdateSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        DealUpdateSubscription {
            deal_uuid: self.deal_uuid,
            receiver: rx,
        }
    }

    /// Deliver an update to every current subscriber, in call order.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, update: DealUpdate) -> usize {
        let mut inner = self.inner.lock();
        if inner.closed {
            return 0;
        }
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(update.clone()).is_ok());
        inner.subscribers.len()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|s| !s.is_closed());
        inner.subscribers.len()
    }

    /// Stop accepting subscribers and end every open update stream once
    /// its queued updates are drained.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Signal downstream execution to abort. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the deal is cancelled or the provider shuts down.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

impl std::fmt::Debug for DealHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DealHandler")
            .field("deal_uuid", &self.deal_uuid)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// UPDATE SUBSCRIPTION
// =============================================================================

/// One subscriber's ordered stream of updates for a deal.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct DealUpdateSubscription {
    deal_uuid: DealId,
    receiver: mpsc::UnboundedReceiver<DealUpdate>,
}

impl DealUpdateSubscription {
    #[must_use]
    pub fn deal_uuid(&self) -> DealId {
        self.deal_uuid
    }

    /// Next update, or `None` once the deal finished or the provider stopped.
    pub async fn recv(&mut self) -> Option<DealUpdate> {
        self.receiver.recv().await
    }

    /// Next queued update without waiting.
    pub fn try_recv(&mut self) -> Option<DealUpdate> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for DealUpdateSubscription {
    type Item = DealUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Authoritative map from deal identifier to handler.
pub struct DealHandlerRegistry {
    handlers: RwLock<HashMap<DealId, Arc<DealHandler>>>,
    /// Parent of every handler's cancellation token.
    shutdown: CancellationToken,
}

impl DealHandlerRegistry {
    /// Create a registry whose handlers are cancelled when `shutdown` is.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    /// Create and store a handler for `deal_uuid`.
    pub fn register(&self, deal_uuid: DealId) -> Result<Arc<DealHandler>, RegistryError> {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&deal_uuid) {
            return Err(RegistryError::AlreadyExists(deal_uuid));
        }
        let handler = Arc::new(DealHandler::new(deal_uuid, self.shutdown.child_token()));
        handlers.insert(deal_uuid, Arc::clone(&handler));
        debug!(deal_uuid = %deal_uuid, "Registered deal handler");
        Ok(handler)
    }

    pub fn get(&self, deal_uuid: DealId) -> Result<Arc<DealHandler>, RegistryError> {
        self.handlers
            .read()
            .get(&deal_uuid)
            .cloned()
            .ok_or(RegistryError::NotFound(deal_uuid))
    }

    /// Delete the handler. No-op if absent.
    pub fn remove(&self, deal_uuid: DealId) -> Option<Arc<DealHandler>> {
        let removed = self.handlers.write().remove(&deal_uuid);
        if removed.is_some() {
            debug!(deal_uuid = %deal_uuid, "Removed deal handler");
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, deal_uuid: DealId) -> bool {
        self.handlers.read().contains_key(&deal_uuid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Subscribe to a tracked deal's updates.
    pub fn subscribe(&self, deal_uuid: DealId) -> Result<DealUpdateSubscription, RegistryError> {
        Ok(self.get(deal_uuid)?.subscribe())
    }

    /// Cancel a tracked deal.
    pub fn cancel(&self, deal_uuid: DealId) -> Result<(), RegistryError> {
        self.get(deal_uuid)?.cancel();
        Ok(())
    }

    /// Close and drop every handler, ending all update streams.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.handlers.write().drain().collect();
        for (_, handler) in drained {
            handler.close();
        }
    }
}
