use crate::context::Context;
use crate::error::{BoxError, PoolError};
use core::any::Any;
use core::fmt;
use std::panic::{self, AssertUnwindSafe};

/// What a task returns: `Ok(())` or the reason it failed.
pub type TaskResult = Result<(), BoxError>;

/// A unit of work a pool can run.
///
/// Closures taking a `&Context` implement this, so most callers never name
/// the trait:
///
/// ```
/// use cmdhint_core::{Context, Task};
///
/// fn boxed(task: impl Task) -> Box<dyn Task> {
///     Box::new(task)
/// }
///
/// let task = boxed(|ctx: &Context| {
///     if ctx.is_cancelled() {
///         return Err("cancelled".into());
///     }
///     Ok(())
/// });
/// assert!(task.execute(&Context::new()).is_ok());
/// ```
pub trait Task: Send + 'static {
    /// Runs the task. `ctx` is cancelled when the pool stops.
    fn execute(self: Box<Self>, ctx: &Context) -> TaskResult;
}

impl<F> Task for F
where
    F: FnOnce(&Context) -> TaskResult + Send + 'static,
{
    fn execute(self: Box<Self>, ctx: &Context) -> TaskResult {
        (*self)(ctx)
    }
}

pub(crate) type BoxTask = Box<dyn Task>;

/// How a task run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The task returned `Ok(())`.
    Completed,
    /// The task returned an error.
    Failed(BoxError),
    /// The task panicked; holds the panic message.
    Panicked(String),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    /// Converts into the error a waiting submitter sees.
    pub fn into_result(self) -> Result<(), PoolError> {
        match self {
            Outcome::Completed => Ok(()),
            Outcome::Failed(e) => Err(PoolError::Task(e)),
            Outcome::Panicked(msg) => Err(PoolError::Panicked(msg)),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed => f.write_str("completed"),
            Outcome::Failed(e) => write!(f, "failed: {}", e),
            Outcome::Panicked(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

/// Runs `task`, catching any panic.
///
/// `on_panic` sees the raw payload. A panic inside `on_panic` itself is
/// swallowed so the calling worker keeps running.
pub(crate) fn run_isolated<H>(task: BoxTask, ctx: &Context, on_panic: H) -> Outcome
where
    H: FnOnce(&(dyn Any + Send)),
{
    match panic::catch_unwind(AssertUnwindSafe(|| task.execute(ctx))) {
        Ok(Ok(())) => Outcome::Completed,
        Ok(Err(e)) => Outcome::Failed(e),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            if panic::catch_unwind(AssertUnwindSafe(|| on_panic(payload.as_ref()))).is_err() {
                tracing::warn!("panic handler panicked");
            }
            Outcome::Panicked(message)
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn boxed(task: impl Task) -> BoxTask {
        Box::new(task)
    }

    #[test]
    fn test_outcomes() {
        let ctx = Context::new();
        let ok = run_isolated(boxed(|_: &Context| Ok(())), &ctx, |_| {});
        assert!(ok.is_completed());

        let failed = run_isolated(boxed(|_: &Context| -> TaskResult { Err("no results".into()) }), &ctx, |_| {});
        assert_eq!(failed.to_string(), "failed: no results");
        assert!(matches!(failed.into_result(), Err(PoolError::Task(_))));
    }

    #[test]
    fn test_panic_is_caught_and_reported() {
        let seen = Cell::new(false);
        let outcome = run_isolated(
            boxed(|_: &Context| -> TaskResult { panic!("index out of range") }),
            &Context::new(),
            |payload| seen.set(payload.downcast_ref::<&str>().is_some()),
        );
        assert!(seen.get());
        match outcome {
            Outcome::Panicked(msg) => assert_eq!(msg, "index out of range"),
            other => panic!("unexpected outcome: {}", other),
        }
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let outcome = run_isolated(
            boxed(|_: &Context| -> TaskResult { panic!("{}", String::from("formatted")) }),
            &Context::new(),
            |_| panic!("handler"),
        );
        assert!(matches!(outcome, Outcome::Panicked(ref m) if m == "formatted"));
    }

    #[test]
    fn test_task_sees_context() {
        let ctx = Context::new();
        ctx.cancel();
        let outcome = run_isolated(
            boxed(|ctx: &Context| -> TaskResult {
                match ctx.err() {
                    Some(e) => Err(e.into()),
                    None => Ok(()),
                }
            }),
            &ctx,
            |_| {},
        );
        assert_eq!(outcome.to_string(), "failed: context cancelled");
    }
}
