//! Handler registry for relayed payloads
//!
//! Handlers observe traffic; they never change what gets relayed. Each one is
//! isolated, so an error or a panic in one handler is logged and the rest
//! still run.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use dashmap::DashMap;
use futures::FutureExt;
use log::{debug, error, warn};

use crate::network::types::{Payload, PeerAddress};

/// Handler error type
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Payload could not be interpreted by the handler
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Handler's own processing failed
    #[error("Processing failed: {0}")]
    Failed(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Side-effect hook run for every relayed payload.
///
/// Runs inline with the relaying connection's read loop, so it must not
/// block indefinitely.
#[async_trait::async_trait]
pub trait PayloadHandler: Send + Sync {
    /// Process a payload received from `origin`
    async fn handle(&self, payload: &Payload, origin: PeerAddress) -> Result<(), HandlerError>;
}

/// Adapter turning a closure into a `PayloadHandler`
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Payload, PeerAddress) -> Result<(), HandlerError> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait::async_trait]
impl<F> PayloadHandler for FnHandler<F>
where
    F: Fn(&Payload, PeerAddress) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, payload: &Payload, origin: PeerAddress) -> Result<(), HandlerError> {
        (self.func)(payload, origin)
    }
}

/// Result of running every handler once
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    /// Handlers that returned `Ok`
    pub succeeded: usize,

    /// Names of handlers that returned an error or panicked
    pub failed: Vec<String>,
}

/// Named handlers, safe to mutate while other connections invoke them
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn PayloadHandler>>,
}

impl HandlerRegistry {
    /// Create a new handler registry
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler, replacing any handler with the same name
    pub fn register(&self, name: &str, handler: Arc<dyn PayloadHandler>) -> bool {
        let replaced = self.handlers.insert(name.to_string(), handler).is_some();
        if replaced {
            debug!("Replaced payload handler {}", name);
        } else {
            debug!("Registered payload handler {}", name);
        }
        replaced
    }

    /// Remove a handler. Returns false if no handler had that name.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.handlers.remove(name).is_some();
        if removed {
            debug!("Removed payload handler {}", name);
        }
        removed
    }

    /// Registered handler names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Run every registered handler on a payload.
    ///
    /// Works on a snapshot taken up front, so handlers added or removed
    /// meanwhile take effect from the next payload.
    pub async fn invoke_all(&self, payload: &Payload, origin: PeerAddress) -> InvocationReport {
        let snapshot: Vec<(String, Arc<dyn PayloadHandler>)> = self.handlers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut report = InvocationReport::default();

        for (name, handler) in snapshot {
            let outcome = AssertUnwindSafe(handler.handle(payload, origin))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => report.succeeded += 1,
                Ok(Err(e)) => {
                    warn!("Handler {} failed on payload from {}: {}", name, origin, e);
                    report.failed.push(name);
                }
                Err(panic) => {
                    error!("Handler {} panicked on payload from {}: {}", name, origin, panic_message(&*panic));
                    report.failed.push(name);
                }
            }
        }

        report
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
