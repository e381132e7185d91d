//! Fixed-size worker pool for conversion jobs.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use async_executor::{Executor, Task};

/// A fixed set of worker threads driving one shared executor.
///
/// Jobs are spawned as futures and come back as [`Task`]s; block on a task to
/// wait for its result.
///
/// # Example
///
/// ```ignore
/// let pool = TaskPool::new(4)?;
/// let task = pool.spawn(async { 6 * 7 });
/// assert_eq!(futures_lite::future::block_on(task), 42);
/// ```
pub struct TaskPool {
    executor: Arc<Executor<'static>>,
    threads: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl TaskPool {
    /// Start `num_threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if `num_threads` is 0.
    pub fn new(num_threads: usize) -> std::io::Result<Self> {
        assert!(num_threads > 0, "TaskPool must have at least one thread");

        let executor = Arc::new(Executor::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            executor,
            threads: Vec::with_capacity(num_threads),
            shutdown,
        };

        for i in 0..num_threads {
            let exec = pool.executor.clone();
            let shutdown = pool.shutdown.clone();

            let handle = thread::Builder::new()
                .name(format!("satchel-convert-{}", i))
                .spawn(move || {
                    while !shutdown.load(Ordering::Relaxed) {
                        if !exec.try_tick() {
                            thread::sleep(Duration::from_millis(1));
                        }
                    }
                })?;
            pool.threads.push(handle);
        }

        tracing::debug!("TaskPool created with {} threads", num_threads);
        Ok(pool)
    }

    /// One worker per logical CPU.
    pub fn with_num_cpus() -> std::io::Result<Self> {
        Self::new(num_cpus::get().max(1))
    }

    pub fn spawn<T>(&self, future: impl Future<Output = T> + Send + 'static) -> Task<T>
    where
        T: Send + 'static,
    {
        self.executor.spawn(future)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Tasks that have not started yet are dropped, so await every task you
    /// need before calling this.
    pub fn shutdown(mut self) {
        tracing::debug!("Shutting down TaskPool with {} threads", self.threads.len());
        self.shutdown.store(true, Ordering::Relaxed);

        for handle in std::mem::take(&mut self.threads) {
            if let Err(e) = handle.join() {
                tracing::error!("Task pool thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
