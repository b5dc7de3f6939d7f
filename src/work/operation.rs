//! # Operation capability and function-backed implementation.
//!
//! An [`Operation`] is the opaque work a unit performs: it receives the unit's
//! payload by value plus a [`CancellationToken`] and produces a result.
//! [`OperationFn`] wraps a closure; [`OperationRef`] is the shared handle
//! (`Arc<dyn Operation>`) that many units can point at.
//!
//! ## Concurrency semantics
//! - Each call creates a **new** `'static` future that owns its payload; no
//!   state is borrowed from the unit or the serve loop.
//! - Shared state between calls must be explicit (`Arc<...>` captured by the closure).

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::WorkError;

/// Boxed future returned by [`Operation::call`].
pub type BoxWorkFuture<R> = Pin<Box<dyn Future<Output = Result<R, WorkError>> + Send + 'static>>;

/// Shared handle to an operation.
pub type OperationRef<A, R> = Arc<dyn Operation<A, R>>;

/// # Opaque unit of work.
///
/// `A` is the payload element type, `R` the result type.
///
/// Implementations should watch `ctx` and return [`WorkError::Canceled`] promptly
/// once it fires (dispatcher shutdown or per-unit timeout).
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use fanvisor::{BoxWorkFuture, Operation};
///
/// struct Sum;
///
/// impl Operation<u64, u64> for Sum {
///     fn name(&self) -> &str { "sum" }
///
///     fn call(&self, payload: Vec<u64>, _ctx: CancellationToken) -> BoxWorkFuture<u64> {
///         Box::pin(async move { Ok(payload.iter().sum()) })
///     }
/// }
/// ```
pub trait Operation<A, R>: Send + Sync + 'static {
    /// Stable, human-readable name (used in events and logs).
    fn name(&self) -> &str;

    /// Starts one execution over `payload`.
    fn call(&self, payload: Vec<A>, ctx: CancellationToken) -> BoxWorkFuture<R>;
}

/// Function-backed operation.
///
/// Wraps a closure that *creates* a new future per call.
pub struct OperationFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> OperationFn<F> {
    /// Creates a new function-backed operation.
    ///
    /// Prefer [`OperationFn::arc`] when you immediately need an [`OperationRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the operation and returns it as a shared handle.
    ///
    /// ## Example
    /// ```rust
    /// use tokio_util::sync::CancellationToken;
    /// use fanvisor::{OperationFn, OperationRef, WorkError};
    ///
    /// let double: OperationRef<u32, u32> =
    ///     OperationFn::arc("double", |p: Vec<u32>, _ctx: CancellationToken| async move {
    ///         Ok::<_, WorkError>(p[0] * 2)
    ///     });
    /// assert_eq!(double.name(), "double");
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> fmt::Debug for OperationFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<A, R, F, Fut> Operation<A, R> for OperationFn<F>
where
    F: Fn(Vec<A>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, WorkError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, payload: Vec<A>, ctx: CancellationToken) -> BoxWorkFuture<R> {
        Box::pin((self.f)(payload, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_operation_owns_its_payload() {
        let op: OperationRef<String, usize> =
            OperationFn::arc("len", |p: Vec<String>, _ctx: CancellationToken| async move {
                Ok::<usize, WorkError>(p.iter().map(String::len).sum())
            });

        let fut = op.call(vec!["ab".into(), "cde".into()], CancellationToken::new());
        drop(op);
        assert_eq!(fut.await, Ok(5));
    }

    #[tokio::test]
    async fn test_fn_operation_sees_cancellation() {
        let op = OperationFn::new("wait", |_p: Vec<()>, ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(WorkError::Canceled)
        });

        let token = CancellationToken::new();
        let fut = Operation::<(), ()>::call(&op, Vec::new(), token.clone());
        token.cancel();
        assert_eq!(fut.await, Err(WorkError::Canceled));
        assert!(format!("{op:?}").contains("wait"));
    }
}
