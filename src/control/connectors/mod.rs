//! Queue-boundary glue between a running [`crate::control::scheduler::Scheduler`]
//! and the outside world: a bounded command intake queue and a broadcast
//! snapshot subscription handle (spec.md §5).
//!
//! The engine itself never parses bytes off a socket; a host process is
//! expected to translate its own wire protocol into [`Command`] values and
//! forward them here.

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::control::errors::Outcome;
use crate::control::messages::{Command, Snapshot};
use crate::control::scheduler::{CommandEnvelope, Scheduler};

/// Default capacity of the command intake queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;
/// Default capacity of the snapshot broadcast channel. Once a subscriber
/// falls this far behind, `tokio::sync::broadcast` drops its oldest
/// pending snapshots rather than stalling the scheduler (spec.md §5).
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 16;

/// A lightweight, cloneable front door to a running [`Scheduler`]. Talks to
/// the scheduler purely across channel boundaries, never by shared state.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<CommandEnvelope>,
    snapshot_tx: broadcast::Sender<Snapshot>,
}

impl EngineHandle {
    /// Builds a scheduler wired to fresh channels and a handle to drive it.
    /// The caller is responsible for polling `scheduler.run()` to
    /// completion, typically via `tokio::spawn`.
    pub fn with_scheduler(
        topology: crate::control::rail_system::topology::Topology,
        train_types: std::collections::HashMap<crate::general::TrainTypeId, crate::control::train::TrainType>,
        tick_rate_hz: f64,
    ) -> (EngineHandle, Scheduler) {
        let (command_tx, command_rx) = mpsc::channel(DEFAULT_COMMAND_CAPACITY);
        let (snapshot_tx, _) = broadcast::channel(DEFAULT_SNAPSHOT_CAPACITY);
        let scheduler = Scheduler::new(topology, train_types, tick_rate_hz, command_rx, snapshot_tx.clone());
        let handle = EngineHandle {
            command_tx,
            snapshot_tx,
        };
        (handle, scheduler)
    }

    /// Enqueues a command without waiting for its outcome.
    pub async fn send(&self, command: Command) -> Result<(), mpsc::error::SendError<CommandEnvelope>> {
        self.command_tx.send(CommandEnvelope::fire_and_forget(command)).await
    }

    /// Enqueues a command and awaits the scheduler's outcome for it, applied
    /// at the next tick boundary it drains commands.
    pub async fn send_and_await(&self, command: Command) -> Option<Outcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = CommandEnvelope {
            command,
            reply: Some(reply_tx),
        };
        self.command_tx.send(envelope).await.ok()?;
        reply_rx.await.ok()
    }

    /// Subscribes to the snapshot broadcast. A slow subscriber only loses
    /// its own stalest pending snapshots; the scheduler is never blocked.
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }
}
