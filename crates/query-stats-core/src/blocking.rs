// crates/query-stats-core/src/blocking.rs
// ============================================================================
// Module: Blocking Runtime
// Description: Private tokio runtime for synchronous adapters over async SDKs.
// Purpose: Let synchronous ports call async clients without leaking async APIs.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! AWS and database adapters expose synchronous ports but talk to async
//! clients. Each adapter owns a [`BlockingRuntime`] created at cold start and
//! reused across calls, so pools and tasks created by one call are still alive
//! for the next. When the caller is already inside a tokio runtime the owned
//! runtime is driven under `block_in_place` on multi-thread runtimes, or from
//! a helper thread otherwise, so nested `block_on` never panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::runtime::RuntimeFlavor;

// ============================================================================
// SECTION: Runtime Wrapper
// ============================================================================

/// Owned tokio runtime used to block on adapter futures.
pub struct BlockingRuntime {
    /// Runtime, taken on drop so it can shut down off the caller's thread.
    runtime: Option<Arc<Runtime>>,
}

impl BlockingRuntime {
    /// Creates a multi-thread runtime.
    ///
    /// # Errors
    ///
    /// Returns an error when the runtime cannot be started.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            runtime: Some(Arc::new(Runtime::new()?)),
        })
    }

    /// Drives `future` to completion.
    ///
    /// `error` wraps runtime failures into the adapter's error type.
    ///
    /// # Errors
    ///
    /// Returns the future's error, or `error(..)` when the runtime is gone or
    /// a helper thread cannot complete.
    pub fn block_on<F, T, E>(&self, future: F, error: fn(String) -> E) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            return Err(error("runtime closed".to_string()));
        };
        match Handle::try_current().map(|handle| handle.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| runtime.block_on(future))
            }
            Ok(_) => {
                let runtime = Arc::clone(runtime);
                let (tx, rx) = std::sync::mpsc::sync_channel(1);
                std::thread::spawn(move || {
                    let _ = tx.send(runtime.block_on(future));
                });
                rx.recv().unwrap_or_else(|_| Err(error("runtime thread join failed".to_string())))
            }
            Err(_) => runtime.block_on(future),
        }
    }
}

impl Drop for BlockingRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
