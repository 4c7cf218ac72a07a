//! Long-running consumer that applies queued commands to the engine.
//!
//! The worker is an async task that sleeps on the queue's notifier. When
//! woken it drains the queue on the blocking pool, popping one command at a
//! time so anything not yet popped can still be superseded by the producer.
//! Every [`PUBLISH_EVERY`] commands, and at the end of each batch, it
//! publishes an [`EngineReadback`] if selection membership changed.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

use crate::geometry::{EngineReadback, GeometryEngine, GeometryEngineClient};
use crate::queue::CommandQueue;

/// Commands executed between readback checks inside one batch.
pub const PUBLISH_EVERY: usize = 16;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("geometry worker task failed: {0}")]
    Join(#[from] JoinError),
    #[error("geometry worker already shut down")]
    AlreadyStopped,
}

/// Owner-side handle. Dropping it closes the queue; the worker finishes what
/// is already queued and exits.
#[derive(Debug)]
pub struct WorkerHandle {
    queue: CommandQueue,
    join: Option<JoinHandle<Result<usize, WorkerError>>>,
}

impl WorkerHandle {
    /// Close the queue, let the worker drain it, and wait for it to exit.
    /// Returns the number of commands executed over the worker's lifetime.
    pub async fn shutdown(&mut self) -> Result<usize, WorkerError> {
        self.queue.close();
        let join = self.join.take().ok_or(WorkerError::AlreadyStopped)?;
        join.await?
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Best-effort stop; do not block in Drop.
        self.queue.close();
    }
}

/// Spawn the worker on the current tokio runtime.
///
/// Returns the handle plus the receiving side of the readback channel, seeded
/// with the engine's state at spawn time.
pub fn spawn_worker<E>(
    engine: Arc<E>,
    queue: CommandQueue,
) -> (WorkerHandle, watch::Receiver<EngineReadback>)
where
    E: GeometryEngine + ?Sized + 'static,
{
    let client = GeometryEngineClient::new(engine);
    let (tx, rx) = watch::channel(client.readback());
    let tx = Arc::new(tx);
    let join = tokio::spawn(worker_loop(client, queue.clone(), tx));
    (
        WorkerHandle {
            queue,
            join: Some(join),
        },
        rx,
    )
}

async fn worker_loop<E>(
    client: GeometryEngineClient<E>,
    queue: CommandQueue,
    readback: Arc<watch::Sender<EngineReadback>>,
) -> Result<usize, WorkerError>
where
    E: GeometryEngine + ?Sized + 'static,
{
    let mut executed = 0;
    loop {
        let closed = queue.is_closed();
        if !queue.is_empty() {
            let batch_client = client.clone();
            let batch_queue = queue.clone();
            let publisher = Arc::clone(&readback);
            let count = tokio::task::spawn_blocking(move || {
                drain(&batch_client, &batch_queue, |latest| {
                    publisher.send_replace(latest);
                })
            })
            .await?;
            executed += count;
            debug!(count, "worker drained batch");
            continue;
        }
        if closed {
            break;
        }
        queue.notified().await;
    }
    info!(executed, "geometry worker stopped");
    Ok(executed)
}

fn drain<E: GeometryEngine + ?Sized>(
    client: &GeometryEngineClient<E>,
    queue: &CommandQueue,
    mut publish: impl FnMut(EngineReadback),
) -> usize {
    let mut publish_if_dirty = || {
        let latest = client.readback();
        if latest.dirty {
            publish(latest);
        }
    };
    let mut count = 0;
    while let Some(command) = queue.pop() {
        client.execute(&command);
        count += 1;
        if count % PUBLISH_EVERY == 0 {
            publish_if_dirty();
        }
    }
    publish_if_dirty();
    count
}
