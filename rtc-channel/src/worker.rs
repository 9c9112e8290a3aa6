use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, trace, warn};
use shared::error::{Error, Result};
use tokio::sync::{mpsc, oneshot};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Quit,
}

struct WorkerInner {
    name: String,
    tx: mpsc::UnboundedSender<Message>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Quit);

        let handle = match self.handle.get_mut() {
            Ok(handle) => handle.take(),
            Err(err) => err.into_inner().take(),
        };
        if let Some(handle) = handle {
            // The last handle can be released by a task on the worker itself.
            if thread::current().id() != self.thread_id && handle.join().is_err() {
                warn!("worker {} panicked", self.name);
            }
        }
        debug!("worker {} stopped", self.name);
    }
}

/// Worker is a single thread that runs tasks in submission order.
/// Channel state is only ever touched from a worker task.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    pub fn new(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let thread_name = name.to_owned();

        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                trace!("worker {thread_name} started");
                while let Some(msg) = rx.blocking_recv() {
                    match msg {
                        Message::Run(task) => task(),
                        Message::Quit => break,
                    }
                }
                trace!("worker {thread_name} exiting");
            })?;

        Ok(Worker {
            inner: Arc::new(WorkerInner {
                name: name.to_owned(),
                tx,
                thread_id: handle.thread().id(),
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// is_current tells whether the caller runs on this worker.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// post queues `task` and returns immediately.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        self.inner
            .tx
            .send(Message::Run(Box::new(task)))
            .map_err(|_| Error::ErrWorkerStopped)
    }

    /// invoke runs `f` on the worker and blocks until it returns. Called
    /// from the worker itself, `f` runs inline.
    pub fn invoke<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return Ok(f());
        }

        let (tx, rx) = oneshot::channel();
        self.post(move || {
            let _ = tx.send(f());
        })?;
        rx.blocking_recv().map_err(|_| Error::ErrWorkerStopped)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("name", &self.inner.name).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_invoke_returns_value() -> Result<()> {
        let worker = Worker::new("test-worker")?;
        let on_worker = worker.invoke({
            let worker = worker.clone();
            move || worker.is_current()
        })?;
        assert!(on_worker);
        assert!(!worker.is_current());
        assert_eq!(worker.invoke(|| 40 + 2)?, 42);
        Ok(())
    }

    #[test]
    fn test_post_keeps_order() -> Result<()> {
        let worker = Worker::new("test-worker")?;
        let seen = Arc::new(Mutex::new(vec![]));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            worker.post(move || {
                if let Ok(mut seen) = seen.lock() {
                    seen.push(i);
                }
            })?;
        }

        // invoke is queued behind every earlier post
        let seen = worker.invoke(move || seen.lock().map(|s| s.clone()).unwrap_or_default())?;
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_nested_invoke_runs_inline() -> Result<()> {
        let worker = Worker::new("test-worker")?;
        let inner = worker.clone();
        let value = worker.invoke(move || inner.invoke(|| 7))??;
        assert_eq!(value, 7);
        Ok(())
    }

    #[test]
    fn test_drop_drains_queued_tasks() -> Result<()> {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let worker = Worker::new("test-worker")?;
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                worker.post(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })?;
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        Ok(())
    }
}
