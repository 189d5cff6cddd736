//! Live-task registry: every delivery that has been spawned and not yet
//! joined.
//!
//! Tasks deregister themselves when they finish. Spawning also prunes any
//! finished handle that is still present, so the map never grows past what
//! is actually in flight.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub(crate) struct TaskRegistry {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

/// Removes a task's entry when the task's future completes or is dropped.
struct Deregister {
    registry: Arc<TaskRegistry>,
    id: u64,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.id);
    }
}

impl TaskRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the id the next spawned task will carry.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Spawn `task` on `runtime` and track it under `id`.
    ///
    /// A task can finish before its handle is inserted; its deregistration
    /// is then a no-op and the finished handle is pruned on the next pass.
    pub(crate) fn spawn<F>(self: &Arc<Self>, runtime: &Handle, id: u64, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = Deregister {
            registry: Arc::clone(self),
            id,
        };
        let handle = runtime.spawn(async move {
            let _guard = guard;
            task.await;
        });

        let mut tasks = self.lock();
        prune(&mut tasks);
        tasks.insert(id, handle);
    }

    /// Number of tasks still running.
    pub(crate) fn len(&self) -> usize {
        let mut tasks = self.lock();
        prune(&mut tasks);
        tasks.len()
    }

    /// Remove and return every tracked handle.
    pub(crate) fn take_all(&self) -> Vec<JoinHandle<()>> {
        self.lock().drain().map(|(_, handle)| handle).collect()
    }
}

fn prune(tasks: &mut HashMap<u64, JoinHandle<()>>) {
    tasks.retain(|_, handle| !handle.is_finished());
}
