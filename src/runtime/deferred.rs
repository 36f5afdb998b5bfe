//! The uniform asynchronous result handle.
//!
//! A [`Deferred`] is pending until its [`Completer`] settles it with a
//! success or a failure. Continuations registered with
//! [`Deferred::on_complete`] run in registration order, exactly once, on the
//! thread that settled the result (or on the registering thread if it was
//! already settled). A `Deferred` can also be awaited directly.
//!
//! Cancellation suppresses every continuation not yet started, makes awaiting
//! yield [`BridgeError::Cancelled`], and fires the cancellation token the
//! normalizer handed to the backend.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::BridgeError;

type Continuation<T> = Box<dyn FnOnce(&Result<T, BridgeError>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    /// Result arrived; continuations are being run.
    Completing,
    Ready,
    /// Result moved out by `.await`.
    Taken,
    Cancelled,
}

struct State<T> {
    phase: Phase,
    continuations: Vec<Continuation<T>>,
    result: Option<Result<T, BridgeError>>,
    waker: Option<Waker>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    cancelled: AtomicBool,
    token: CancellationToken,
}

impl<T> Shared<T> {
    /// Run queued continuations against `result`, then park it as ready.
    fn drain(&self, result: Result<T, BridgeError>) -> bool {
        loop {
            let batch = {
                let mut state = self.state.lock();
                if state.phase == Phase::Cancelled {
                    return false;
                }
                if state.continuations.is_empty() {
                    state.result = Some(result);
                    state.phase = Phase::Ready;
                    let waker = state.waker.take();
                    drop(state);
                    if let Some(waker) = waker {
                        waker.wake();
                    }
                    return true;
                }
                state.phase = Phase::Completing;
                std::mem::take(&mut state.continuations)
            };

            for continuation in batch {
                if self.cancelled.load(Ordering::Acquire) {
                    return false;
                }
                if catch_unwind(AssertUnwindSafe(|| continuation(&result))).is_err() {
                    warn!("deferred continuation panicked");
                }
            }
        }
    }

    fn abort(&self) -> bool {
        let (dropped, waker) = {
            let mut state = self.state.lock();
            match state.phase {
                Phase::Pending | Phase::Completing => {
                    state.phase = Phase::Cancelled;
                    self.cancelled.store(true, Ordering::Release);
                    (
                        std::mem::take(&mut state.continuations),
                        state.waker.take(),
                    )
                }
                Phase::Ready | Phase::Taken | Phase::Cancelled => return false,
            }
        };
        drop(dropped);
        self.token.cancel();
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }
}

trait Cancel: Send + Sync {
    fn cancel(&self) -> bool;
    fn is_cancelled(&self) -> bool;
}

impl<T: Send> Cancel for Shared<T> {
    fn cancel(&self) -> bool {
        self.abort()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Uniform handle to the eventual result of a facade operation.
pub struct Deferred<T> {
    shared: Arc<Shared<T>>,
}

/// Write side of a [`Deferred`].
///
/// Dropping a completer without settling it cancels the deferred.
pub struct Completer<T> {
    shared: Arc<Shared<T>>,
    settled: bool,
}

/// Cloneable handle that cancels a [`Deferred`] from anywhere.
#[derive(Clone)]
pub struct CancelHandle {
    target: Arc<dyn Cancel>,
}

impl<T: Send + 'static> Deferred<T> {
    /// A pending deferred and the completer that settles it.
    pub fn pending() -> (Self, Completer<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                phase: Phase::Pending,
                continuations: Vec::new(),
                result: None,
                waker: None,
            }),
            cancelled: AtomicBool::new(false),
            token: CancellationToken::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            Completer {
                shared,
                settled: false,
            },
        )
    }

    /// An already-successful deferred.
    pub fn ready(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// An already-failed deferred.
    pub fn failed(error: BridgeError) -> Self {
        Self::settled(Err(error))
    }

    fn settled(result: Result<T, BridgeError>) -> Self {
        let (deferred, completer) = Self::pending();
        completer.complete(result);
        deferred
    }

    /// Register a continuation.
    ///
    /// Runs immediately if the result is already available; never runs if
    /// the deferred is (or becomes) cancelled first.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&Result<T, BridgeError>) + Send + 'static,
    {
        let ready = {
            let mut state = self.shared.state.lock();
            match state.phase {
                Phase::Pending | Phase::Completing => {
                    state.continuations.push(Box::new(continuation));
                    None
                }
                Phase::Ready => {
                    state.continuations.push(Box::new(continuation));
                    state.phase = Phase::Completing;
                    state.result.take()
                }
                Phase::Taken | Phase::Cancelled => None,
            }
        };
        if let Some(result) = ready {
            self.shared.drain(result);
        }
    }

    /// Cancel the operation.
    ///
    /// Returns `false` if the result had already been delivered. Continuations
    /// that have not started will never run, even if the backend later
    /// completes.
    pub fn cancel(&self) -> bool {
        self.shared.abort()
    }

    /// Handle that can cancel this deferred from another owner.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            target: Arc::clone(&self.shared) as Arc<dyn Cancel>,
        }
    }

    /// Whether the deferred has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Whether the result is still outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.shared.state.lock().phase,
            Phase::Pending | Phase::Completing
        )
    }

    /// Whether a result is available (and not yet taken by `.await`).
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().phase == Phase::Ready
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match state.phase {
            Phase::Ready => {
                state.phase = Phase::Taken;
                match state.result.take() {
                    Some(result) => Poll::Ready(result),
                    None => Poll::Ready(Err(BridgeError::InvalidState(
                        "deferred result already taken".to_owned(),
                    ))),
                }
            }
            Phase::Cancelled => Poll::Ready(Err(BridgeError::Cancelled)),
            Phase::Taken => Poll::Ready(Err(BridgeError::InvalidState(
                "deferred result already taken".to_owned(),
            ))),
            Phase::Pending | Phase::Completing => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("phase", &self.shared.state.lock().phase)
            .finish()
    }
}

impl<T: Send + 'static> Completer<T> {
    /// Settle the deferred. Returns `false` if it was cancelled.
    pub fn complete(mut self, result: Result<T, BridgeError>) -> bool {
        self.settled = true;
        {
            let mut state = self.shared.state.lock();
            if state.phase != Phase::Pending {
                return false;
            }
            state.phase = Phase::Completing;
        }
        self.shared.drain(result)
    }

    /// Settle the deferred as cancelled.
    pub fn cancel(mut self) -> bool {
        self.settled = true;
        self.shared.abort()
    }

    /// Token fired when the deferred is cancelled.
    pub fn token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    /// Whether the caller has cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if !self.settled {
            let waker = {
                let mut state = self.shared.state.lock();
                if state.phase != Phase::Pending {
                    return;
                }
                state.phase = Phase::Cancelled;
                self.shared.cancelled.store(true, Ordering::Release);
                state.continuations.clear();
                state.waker.take()
            };
            self.shared.token.cancel();
            if let Some(waker) = waker {
                waker.wake();
            }
        }
    }
}

impl CancelHandle {
    /// Cancel the target deferred. Returns `false` if already settled.
    pub fn cancel(&self) -> bool {
        self.target.cancel()
    }

    /// Whether the target has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.target.is_cancelled()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
