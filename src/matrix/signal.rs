//! Signal routing collaborator
//!
//! The matrix is the source of truth; the native library only mirrors it.
//! Each committed mutation yields a list of [`SignalCommand`]s which are
//! handed to a [`SignalRouter`] after the state lock is released.
//!
//! ```text
//!   state.write() ──► mutate ──► drain commands ──► enqueue ──► drop(state) ──► await applied
//!                                                      │
//!                                                      ▼
//!                                   dispatch task: router.switch()/clear()/... (blocking pool)
//! ```
//!
//! Enqueueing under the state lock keeps the order in which commands reach
//! the router identical to the commit order. The lock is never held while
//! the router works.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};

use crate::matrix::MatrixError;

/// A change to push to the native routing layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalCommand {
    /// Make a destination visible on the network
    Advertise { destination: String },
    /// Stop advertising a destination
    Withdraw { destination: String },
    /// Point a destination at a source
    Switch { destination: String, source: String },
    /// Leave a destination without an upstream
    Clear { destination: String },
}

/// External collaborator that advertises and switches outputs
///
/// Calls run on the blocking pool; implementations may block briefly.
pub trait SignalRouter: Send + Sync + 'static {
    fn advertise(&self, destination: &str) -> Result<(), MatrixError>;
    fn withdraw(&self, destination: &str) -> Result<(), MatrixError>;
    fn switch(&self, destination: &str, source: &str) -> Result<(), MatrixError>;
    fn clear(&self, destination: &str) -> Result<(), MatrixError>;
}

/// Router that accepts everything and does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRouter;

impl SignalRouter for NullRouter {
    fn advertise(&self, _destination: &str) -> Result<(), MatrixError> {
        Ok(())
    }

    fn withdraw(&self, _destination: &str) -> Result<(), MatrixError> {
        Ok(())
    }

    fn switch(&self, _destination: &str, _source: &str) -> Result<(), MatrixError> {
        Ok(())
    }

    fn clear(&self, _destination: &str) -> Result<(), MatrixError> {
        Ok(())
    }
}

/// Router that records every command it receives
///
/// Lets tests assert on what the native layer would have been told.
#[derive(Debug, Default)]
pub struct RecordingRouter {
    commands: Mutex<Vec<SignalCommand>>,
}

impl RecordingRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded commands
    pub fn take(&self) -> Vec<SignalCommand> {
        std::mem::take(&mut *self.lock())
    }

    fn record(&self, command: SignalCommand) -> Result<(), MatrixError> {
        self.lock().push(command);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SignalCommand>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SignalRouter for RecordingRouter {
    fn advertise(&self, destination: &str) -> Result<(), MatrixError> {
        self.record(SignalCommand::Advertise {
            destination: destination.into(),
        })
    }

    fn withdraw(&self, destination: &str) -> Result<(), MatrixError> {
        self.record(SignalCommand::Withdraw {
            destination: destination.into(),
        })
    }

    fn switch(&self, destination: &str, source: &str) -> Result<(), MatrixError> {
        self.record(SignalCommand::Switch {
            destination: destination.into(),
            source: source.into(),
        })
    }

    fn clear(&self, destination: &str) -> Result<(), MatrixError> {
        self.record(SignalCommand::Clear {
            destination: destination.into(),
        })
    }
}

struct Batch {
    commands: Vec<SignalCommand>,
    done: oneshot::Sender<()>,
}

/// Applies commands to the router in commit order
///
/// Batches go through one queue drained by a single worker task, so
/// enqueueing never waits on router I/O.
pub(crate) struct SignalDispatcher {
    router: Arc<dyn SignalRouter>,
    queue: mpsc::UnboundedSender<Batch>,
    /// Receiver waiting for the worker to be spawned on first use
    idle: Mutex<Option<mpsc::UnboundedReceiver<Batch>>>,
}

/// Handle on a queued batch
#[must_use = "await `applied` to wait for the router"]
pub(crate) struct Dispatched(Option<oneshot::Receiver<()>>);

impl SignalDispatcher {
    pub(crate) fn new(router: Arc<dyn SignalRouter>) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        Self {
            router,
            queue,
            idle: Mutex::new(Some(receiver)),
        }
    }

    /// Queue commands behind every earlier batch
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn enqueue(&self, commands: Vec<SignalCommand>) -> Dispatched {
        if commands.is_empty() {
            return Dispatched(None);
        }
        self.start_worker();

        let (done, applied) = oneshot::channel();
        if self.queue.send(Batch { commands, done }).is_err() {
            tracing::error!("Signal dispatcher stopped, dropping commands");
            return Dispatched(None);
        }
        Dispatched(Some(applied))
    }

    /// Apply commands synchronously, used before the runtime serves requests
    pub(crate) fn apply_blocking(&self, commands: Vec<SignalCommand>) {
        for command in commands {
            apply_one(self.router.as_ref(), &command);
        }
    }

    fn start_worker(&self) {
        let receiver = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(receiver) = receiver {
            tokio::spawn(run_dispatch(Arc::clone(&self.router), receiver));
        }
    }
}

impl Dispatched {
    /// Wait until the router has seen the batch
    pub(crate) async fn applied(self) {
        if let Some(applied) = self.0 {
            // Err only when the worker is gone; nothing left to wait for
            let _ = applied.await;
        }
    }
}

async fn run_dispatch(router: Arc<dyn SignalRouter>, mut queue: mpsc::UnboundedReceiver<Batch>) {
    while let Some(Batch { commands, done }) = queue.recv().await {
        let router = Arc::clone(&router);
        let applied = tokio::task::spawn_blocking(move || {
            for command in &commands {
                apply_one(router.as_ref(), command);
            }
        })
        .await;

        if let Err(e) = applied {
            tracing::error!(error = %e, "Signal dispatch task failed");
        }
        let _ = done.send(());
    }
    tracing::debug!("Signal dispatcher stopped");
}

fn apply_one(router: &dyn SignalRouter, command: &SignalCommand) {
    let result = match command {
        SignalCommand::Advertise { destination } => router.advertise(destination),
        SignalCommand::Withdraw { destination } => router.withdraw(destination),
        SignalCommand::Switch {
            destination,
            source,
        } => router.switch(destination, source),
        SignalCommand::Clear { destination } => router.clear(destination),
    };

    match result {
        Ok(()) => tracing::debug!(command = ?command, "Signal applied"),
        Err(e) => tracing::warn!(command = ?command, error = %e, "Signal router rejected command"),
    }
}
