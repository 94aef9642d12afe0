//! Handle reference, mailbox and exit notification

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;

use crate::stats::{HandleStats, StatsTable};

use super::command::{ExitReason, HandleCommand, HandleStatus, InfoMap, MediaInfo, PlayRequest};
use super::error::HandleError;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a media actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a running media actor
///
/// Cloning is cheap. Two handles are equal when they point at the same actor.
#[derive(Clone)]
pub struct Handle {
    id: HandleId,
    tx: mpsc::UnboundedSender<HandleCommand>,
    /// Commands sent but not yet taken out of the mailbox
    pending: Arc<AtomicUsize>,
    exit: watch::Receiver<Option<ExitReason>>,
    abort: Arc<AbortHandle>,
}

impl Handle {
    /// Spawn a media actor and return a handle to it
    ///
    /// The body receives the actor's mailbox and returns its exit reason. A
    /// panicking body exits with [`ExitReason::Panic`], an aborted one with
    /// [`ExitReason::Killed`].
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(HandleMailbox) -> Fut,
        Fut: Future<Output = ExitReason> + Send + 'static,
    {
        let id = HandleId::next();
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let (exit_tx, exit_rx) = watch::channel(None);

        let mailbox = HandleMailbox {
            id,
            rx,
            pending: Arc::clone(&pending),
        };
        let task = tokio::spawn(body(mailbox));
        let abort = task.abort_handle();

        tokio::spawn(async move {
            let reason = match task.await {
                Ok(reason) => reason,
                Err(e) if e.is_panic() => ExitReason::Panic(panic_message(e.into_panic())),
                Err(_) => ExitReason::Killed,
            };
            tracing::debug!(handle = %id, reason = %reason, "Media handle exited");
            exit_tx.send_replace(Some(reason));
        });

        Self {
            id,
            tx,
            pending,
            exit: exit_rx,
            abort: Arc::new(abort),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Whether the actor is still running
    pub fn is_alive(&self) -> bool {
        self.exit.borrow().is_none()
    }

    /// Exit reason, once the actor has stopped
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit.borrow().clone()
    }

    /// Subscribe to the actor's exit without keeping its mailbox open
    pub fn exit_watch(&self) -> ExitWatch {
        ExitWatch {
            id: self.id,
            rx: self.exit.clone(),
        }
    }

    /// Wait for the actor to stop
    pub async fn wait_exit(&self) -> ExitReason {
        self.exit_watch().wait().await
    }

    /// Number of commands queued in the mailbox
    pub fn pending_messages(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Send a raw command
    pub fn send(&self, cmd: HandleCommand) -> Result<(), HandleError> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(cmd).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            HandleError::Gone(self.id)
        })
    }

    pub fn play(&self, request: PlayRequest) -> Result<(), HandleError> {
        self.send(HandleCommand::Play(request))
    }

    pub fn set_source(&self, source: impl Into<String>) -> Result<(), HandleError> {
        self.send(HandleCommand::SetSource(source.into()))
    }

    pub fn stop(&self) -> Result<(), HandleError> {
        self.send(HandleCommand::Stop)
    }

    /// Ask the actor to discard itself
    pub fn shutdown(&self) -> Result<(), HandleError> {
        self.send(HandleCommand::Shutdown)
    }

    /// Abort the actor task without asking it
    pub fn kill(&self) {
        self.abort.abort();
    }

    pub async fn status(&self, limit: Duration) -> Result<HandleStatus, HandleError> {
        self.query(HandleCommand::Status, limit).await
    }

    pub async fn info(&self, limit: Duration) -> Result<InfoMap, HandleError> {
        self.query(HandleCommand::Info, limit).await
    }

    pub async fn media_info(&self, limit: Duration) -> Result<Option<MediaInfo>, HandleError> {
        self.query(HandleCommand::MediaInfo, limit).await
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HandleCommand,
        limit: Duration,
    ) -> Result<T, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;

        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(HandleError::Gone(self.id)),
            Err(_) => Err(HandleError::Timeout(self.id)),
        }
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Exit subscription for one handle
#[derive(Clone)]
pub struct ExitWatch {
    id: HandleId,
    rx: watch::Receiver<Option<ExitReason>>,
}

impl ExitWatch {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Resolve once the actor has stopped
    pub async fn wait(mut self) -> ExitReason {
        let reason = match self.rx.wait_for(|reason| reason.is_some()).await {
            Ok(reason) => reason.clone().unwrap_or(ExitReason::Killed),
            // Supervisor dropped without publishing (runtime shutdown)
            Err(_) => ExitReason::Killed,
        };
        reason
    }
}

/// Receiving side of a handle, owned by the actor body
pub struct HandleMailbox {
    id: HandleId,
    rx: mpsc::UnboundedReceiver<HandleCommand>,
    pending: Arc<AtomicUsize>,
}

impl HandleMailbox {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Await the next command; `None` once every handle has been dropped
    pub async fn recv(&mut self) -> Option<HandleCommand> {
        let cmd = self.rx.recv().await;
        if cmd.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        cmd
    }

    /// Number of commands waiting in this mailbox
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Publish this actor's runtime stats row
    ///
    /// The row stays bound to this mailbox's depth, so the watchdog keeps
    /// seeing the real queue length after the actor stops reporting.
    pub fn report(&self, stats: &StatsTable, name: impl Into<String>, client_count: u32) {
        stats.update_live(
            HandleStats {
                handle: self.id,
                name: name.into(),
                client_count,
                pending_messages: self.pending(),
            },
            Arc::clone(&self.pending),
        );
    }
}
