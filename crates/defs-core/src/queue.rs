//! Ordered execution of mutating backend calls.
//!
//! ```text
//!   submit() ──mpsc──▶ worker ──▶ work.await ──▶ CompletionHook ──▶ EventBus (fan-out)
//!      ▲                                                      │
//!      └──────────────────────── oneshot ◀────────────────────┘
//! ```
//!
//! A single worker task drains the submission channel, so task *i+1* never
//! starts before task *i* has settled. Every task produces exactly one
//! [`OperationEvent`], which is handed to the completion hook, published on
//! the bus for all subscribers, and finally returned to the submitter.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::VfsError;

/// The unit of work serialized by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    CreateDirectory,
    DeleteFile,
    DeleteDirectory,
    UploadFile,
    ReserveSpace,
    GrantRole,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateDirectory => "create-directory",
            OperationKind::DeleteFile => "delete-file",
            OperationKind::DeleteDirectory => "delete-directory",
            OperationKind::UploadFile => "upload-file",
            OperationKind::ReserveSpace => "reserve-space",
            OperationKind::GrantRole => "grant-role",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Error,
}

/// Operation-specific payload of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationOutcome {
    Created { path: String },
    Uploaded { path: String },
    Deleted { path: String },
    SpaceReserved { amount: u64 },
    RoleGranted { address: String },
    Failed { message: String },
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationOutcome::Created { path } => write!(f, "created {}", path),
            OperationOutcome::Uploaded { path } => write!(f, "uploaded {}", path),
            OperationOutcome::Deleted { path } => write!(f, "deleted {}", path),
            OperationOutcome::SpaceReserved { amount } => write!(f, "reserved {} bytes", amount),
            OperationOutcome::RoleGranted { address } => {
                write!(f, "granted allocator role to {}", address)
            }
            OperationOutcome::Failed { message } => f.write_str(message),
        }
    }
}

/// Result payload of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// DePath of the directory whose contents the operation may have changed.
    /// None means the effect is not confined to one directory.
    pub destination: Option<String>,
    pub outcome: OperationOutcome,
}

impl OperationResult {
    pub fn new(destination: Option<String>, outcome: OperationOutcome) -> Self {
        OperationResult {
            destination,
            outcome,
        }
    }

    /// Error payload for a failure that touched `destination`.
    pub fn failed(destination: Option<String>, error: impl fmt::Display) -> Self {
        OperationResult {
            destination,
            outcome: OperationOutcome::Failed {
                message: error.to_string(),
            },
        }
    }
}

/// The one terminal notification of a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEvent {
    pub id: u64,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub result: OperationResult,
}

impl OperationEvent {
    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}

/// Runs after an operation settles, before its event is published.
#[async_trait]
pub trait CompletionHook: Send + Sync + 'static {
    async fn on_complete(&self, event: &OperationEvent);
}

type BoxedWork = Pin<Box<dyn Future<Output = Result<OperationResult, OperationResult>> + Send>>;

struct Task {
    id: u64,
    kind: OperationKind,
    work: BoxedWork,
    reply: oneshot::Sender<OperationEvent>,
}

struct Subscriber {
    tx: mpsc::UnboundedSender<OperationEvent>,
    /// Events delivered but not yet received.
    pending: Arc<AtomicUsize>,
}

/// Standing multicast channel of operation events.
///
/// Each subscriber owns an unbounded queue, so a slow observer never loses
/// events. `backlog_warning` is the number of unread events at which a
/// subscriber is reported as falling behind.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    backlog_warning: usize,
}

impl EventBus {
    pub fn new(backlog_warning: usize) -> Self {
        EventBus {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            backlog_warning: backlog_warning.max(1),
        }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    ///
    /// Subscribers whose [`EventSubscription`] was dropped are pruned here.
    pub fn publish(&self, event: OperationEvent) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|sub| {
            if sub.tx.send(event.clone()).is_err() {
                return false;
            }
            let pending = sub.pending.fetch_add(1, Ordering::AcqRel) + 1;
            if pending == self.backlog_warning + 1 {
                warn!(pending, "event subscriber is falling behind");
            }
            true
        });
        subscribers.len()
    }

    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscriber {
                tx,
                pending: Arc::clone(&pending),
            });
        EventSubscription { rx, pending }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|sub| !sub.tx.is_closed());
        subscribers.len()
    }
}

/// One observer of the bus. Sees every event published after it subscribed.
pub struct EventSubscription {
    rx: mpsc::UnboundedReceiver<OperationEvent>,
    pending: Arc<AtomicUsize>,
}

impl EventSubscription {
    /// Wait for the next event. Returns None once the bus is gone and drained.
    pub async fn recv(&mut self) -> Option<OperationEvent> {
        let event = self.rx.recv().await?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(event)
    }

    /// Next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<OperationEvent> {
        let event = self.rx.try_recv().ok()?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Some(event)
    }

    /// Events delivered to this subscriber and not yet received.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Handle to the single-consumer operation queue.
///
/// Dropping the last handle closes the channel; the worker finishes the tasks
/// already queued and exits.
pub struct OperationQueue {
    tx: mpsc::Sender<Task>,
    next_id: Mutex<u64>,
    bus: EventBus,
}

impl OperationQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(
        capacity: usize,
        backlog_warning: usize,
        hook: Option<Arc<dyn CompletionHook>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let bus = EventBus::new(backlog_warning);
        tokio::spawn(run_worker(rx, bus.clone(), hook));
        OperationQueue {
            tx,
            next_id: Mutex::new(1),
            bus,
        }
    }

    /// Queue `work` and wait for its event.
    ///
    /// `on_success` and `on_error` map the work's outcome into the event
    /// payload. The returned future resolves with the success event, or with
    /// [`VfsError::OperationFailed`] carrying the error event. Once queued the
    /// task runs to completion even if this future is dropped.
    pub async fn submit<T, E, Fut, S, F>(
        &self,
        kind: OperationKind,
        work: Fut,
        on_success: S,
        on_error: F,
    ) -> Result<OperationEvent, VfsError>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        S: FnOnce(T) -> OperationResult + Send + 'static,
        F: FnOnce(E) -> OperationResult + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let work: BoxedWork = Box::pin(async move {
            match work.await {
                Ok(value) => Ok(on_success(value)),
                Err(err) => Err(on_error(err)),
            }
        });

        let permit = self.tx.reserve().await.map_err(|_| VfsError::QueueClosed)?;
        // Id assignment and enqueueing happen under one lock, so ids follow channel order
        let id = {
            let mut next_id = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
            let id = *next_id;
            *next_id += 1;
            permit.send(Task {
                id,
                kind,
                work,
                reply,
            });
            id
        };
        trace!(id, kind = %kind, "submitted operation");

        let event = rx.await.map_err(|_| VfsError::QueueClosed)?;
        if event.is_success() {
            Ok(event)
        } else {
            Err(VfsError::OperationFailed(Box::new(event)))
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.bus.subscribe()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Task>,
    bus: EventBus,
    hook: Option<Arc<dyn CompletionHook>>,
) {
    while let Some(task) = rx.recv().await {
        debug!(id = task.id, kind = %task.kind, "operation started");

        let settled = AssertUnwindSafe(task.work).catch_unwind().await;
        let (status, result) = match settled {
            Ok(Ok(result)) => (OperationStatus::Success, result),
            Ok(Err(result)) => (OperationStatus::Error, result),
            Err(_) => (
                OperationStatus::Error,
                OperationResult::failed(None, "operation panicked"),
            ),
        };

        let event = OperationEvent {
            id: task.id,
            kind: task.kind,
            status,
            result,
        };
        match event.status {
            OperationStatus::Success => {
                debug!(id = event.id, kind = %event.kind, outcome = %event.result.outcome, "operation succeeded")
            }
            OperationStatus::Error => {
                warn!(id = event.id, kind = %event.kind, error = %event.result.outcome, "operation failed")
            }
        }

        if let Some(hook) = &hook {
            hook.on_complete(&event).await;
        }
        bus.publish(event.clone());
        // Submitter may have gone away
        let _ = task.reply.send(event);
    }
    debug!("operation queue closed");
}
