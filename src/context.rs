//! Cancellation and deadline propagation.
//!
//! A [`Context`] is handed to every [`Task`](crate::Task) a pool runs. Each pool
//! owns a root context that `stop()` cancels; long-running tasks can poll
//! [`Context::is_cancelled`] or [`Context::err`] to bail out early. Callers build
//! their own contexts to bound [`RateLimiter::wait`](crate::RateLimiter::wait)
//! or a [`fan_out`](crate::pool::fan_out) with a deadline.
//!
//! Contexts form a tree: cancelling a parent is visible from every child, while
//! cancelling a child leaves the parent untouched.

use crate::error::ContextError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Node {
    cancelled: AtomicBool,
    parent: Option<Arc<Node>>,
}

impl Node {
    fn is_cancelled(&self) -> bool {
        let mut node = Some(self);
        while let Some(n) = node {
            if n.cancelled.load(Ordering::Acquire) {
                return true;
            }
            node = n.parent.as_deref();
        }
        false
    }
}

/// A cloneable cancellation token with an optional deadline.
///
/// Clones share the same cancellation flag.
///
/// # Example
///
/// ```
/// use cmdhint_core::Context;
/// use std::time::Duration;
///
/// let root = Context::new();
/// let child = root.with_timeout(Duration::from_secs(5));
///
/// assert!(child.err().is_none());
/// root.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    node: Arc<Node>,
    deadline: Option<Instant>,
}

impl Context {
    /// Creates a root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child context that inherits this context's deadline.
    pub fn child(&self) -> Self {
        Context {
            node: Arc::new(Node {
                cancelled: AtomicBool::new(false),
                parent: Some(Arc::clone(&self.node)),
            }),
            deadline: self.deadline,
        }
    }

    /// Creates a child context that expires after `timeout`.
    ///
    /// The child never outlives its parent's deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Creates a child context that expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        });
        child
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.node.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once this context or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.node.is_cancelled()
    }

    /// Returns the deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline; `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns why the context is done, or `None` while it is still live.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns `true` if [`err`](Self::err) would return `Some`.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}
