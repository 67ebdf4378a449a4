//! Blocking and callback presentations of async operations.
//!
//! Every operation in this crate is a single `async fn`. Callers that are not
//! async themselves use [`block_on`], which drives a process-wide
//! current-thread event loop, or [`spawn_notify`], which runs the operation
//! in the background and reports the outcome through a callback.

use std::future::Future;
use std::marker::PhantomData;

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, SecretError};

static EVENT_LOOP: Lazy<std::result::Result<Runtime, String>> = Lazy::new(|| {
    Builder::new_current_thread()
        .enable_all()
        .thread_name("secretbus-event-loop")
        .build()
        .map_err(|e| e.to_string())
});

fn event_loop() -> Result<&'static Runtime> {
    EVENT_LOOP
        .as_ref()
        .map_err(|e| SecretError::Transport(format!("event loop unavailable: {e}")))
}

/// Run `fut` to completion on the process event loop.
///
/// Tasks started with [`spawn_notify`] outside any runtime make progress
/// while this is running. Calling it from inside an async context would
/// deadlock, so that is refused with [`SecretError::Usage`].
pub fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    if Handle::try_current().is_ok() {
        return Err(SecretError::Usage(
            "blocking call made from inside an async context; await the async form instead"
                .to_string(),
        ));
    }
    Ok(event_loop()?.block_on(fut))
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SecretError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Holds a completion callback until it is handed a result.
///
/// Dropping the guard with the callback still inside reports
/// [`SecretError::Cancelled`]. That covers a task dropped at runtime shutdown
/// and a task unwinding from a panic.
struct NotifyGuard<T, C: FnOnce(Result<T>)> {
    callback: Option<C>,
    _result: PhantomData<fn(T)>,
}

impl<T, C: FnOnce(Result<T>)> NotifyGuard<T, C> {
    fn new(callback: C) -> Self {
        Self {
            callback: Some(callback),
            _result: PhantomData,
        }
    }

    fn notify(mut self, result: Result<T>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl<T, C: FnOnce(Result<T>)> Drop for NotifyGuard<T, C> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            debug!("operation dropped before completing");
            callback(Err(SecretError::Cancelled));
        }
    }
}

/// Start `op` in the background and hand its outcome to `callback`.
///
/// `op` receives the token that governs it. `callback` runs exactly once. If
/// the token is cancelled before the callback runs, the callback receives
/// [`SecretError::Cancelled`] whatever the operation produced. The same goes
/// for an operation that panics or whose runtime shuts down first.
///
/// The task runs on the current runtime when there is one, otherwise on the
/// process event loop.
pub fn spawn_notify<T, F, Fut, C>(cancel: Option<&CancellationToken>, op: F, callback: C)
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    C: FnOnce(Result<T>) + Send + 'static,
{
    let guard = NotifyGuard::new(callback);
    let handle = match Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => match event_loop() {
            Ok(rt) => rt.handle().clone(),
            Err(err) => {
                guard.notify(Err(err));
                return;
            }
        },
    };

    let token = cancel.cloned().unwrap_or_default();
    let fut = op(token.clone());

    handle.spawn(async move {
        let result = fut.await;
        let result = if token.is_cancelled() {
            debug!("operation finished after cancellation");
            Err(SecretError::Cancelled)
        } else {
            result
        };
        guard.notify(result);
    });
}
