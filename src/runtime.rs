//! Runtime abstraction layer for async operations
//!
//! Tile fetches are spawned through [`AsyncSpawner`] so the cache does not
//! depend on a particular executor. With the `tokio-runtime` feature the
//! global spawner uses the ambient tokio runtime; without one (or outside a
//! runtime context) each task is driven to completion on its own thread.

use crate::prelude::{Arc, Future, Mutex, Pin};
use std::sync::atomic::{AtomicBool, Ordering};

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Convenience function for spawning on the global runtime
pub fn spawn<F>(future: F) -> Box<dyn AsyncHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    runtime().spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    use super::*;

    /// Runs every task on a dedicated OS thread with a blocking executor.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ThreadSpawner;

    impl AsyncSpawner for ThreadSpawner {
        fn spawn_boxed(
            &self,
            future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
        ) -> Box<dyn AsyncHandle> {
            let finished = Arc::new(AtomicBool::new(false));
            let flag = finished.clone();
            std::thread::spawn(move || {
                futures::executor::block_on(future);
                flag.store(true, Ordering::Release);
            });
            Box::new(ThreadHandle { finished })
        }
    }

    struct ThreadHandle {
        finished: Arc<AtomicBool>,
    }

    impl AsyncHandle for ThreadHandle {
        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::Acquire)
        }

        fn cancel(&self) {
            // Threads cannot be interrupted; the task runs to completion.
        }
    }

    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::*;
        use ::tokio::task::JoinHandle;

        /// Tokio-based async spawner
        ///
        /// Spawns onto the runtime of the calling context and falls back to
        /// [`ThreadSpawner`] when called outside of one.
        #[derive(Debug, Default, Clone, Copy)]
        pub struct TokioSpawner;

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(
                &self,
                future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
            ) -> Box<dyn AsyncHandle> {
                match ::tokio::runtime::Handle::try_current() {
                    Ok(handle) => Box::new(TokioHandle(Mutex::new(handle.spawn(future)))),
                    Err(_) => ThreadSpawner.spawn_boxed(future),
                }
            }
        }

        struct TokioHandle(Mutex<JoinHandle<()>>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.lock().map(|h| h.is_finished()).unwrap_or(true)
            }

            fn cancel(&self) {
                if let Ok(handle) = self.0.lock() {
                    handle.abort();
                }
            }
        }
    }
}

/// Global runtime instance
static RUNTIME: std::sync::OnceLock<Box<dyn AsyncSpawner>> = std::sync::OnceLock::new();

/// Initialize the runtime with a specific spawner.
///
/// Returns `false` if a spawner was already installed.
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) -> bool {
    RUNTIME.set(spawner).is_ok()
}

/// Get the global runtime spawner
pub fn runtime() -> &'static dyn AsyncSpawner {
    RUNTIME
        .get_or_init(|| {
            #[cfg(feature = "tokio-runtime")]
            {
                Box::new(spawners::tokio_impl::TokioSpawner)
            }

            #[cfg(not(feature = "tokio-runtime"))]
            {
                Box::new(spawners::ThreadSpawner)
            }
        })
        .as_ref()
}

/// Shared handle to the global spawner, for components that store one.
#[derive(Clone, Copy, Default)]
pub struct GlobalSpawner;

impl AsyncSpawner for GlobalSpawner {
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle> {
        runtime().spawn_boxed(future)
    }
}
