//! One normalization function per native call style.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{BridgeError, NativeError};

use super::deferred::{Completer, Deferred};
use super::{NativeCall, SuspendBody};

/// What a driven native call produced.
enum Outcome<N> {
    Settled(Result<N, NativeError>),
    /// A reactive source completed without emitting.
    Empty,
    TimedOut(Duration),
}

/// Converts native results of one backend into deferred results.
#[derive(Debug, Clone)]
pub struct Normalizer {
    backend: Arc<str>,
    timeout: Option<Duration>,
    runtime: Handle,
}

impl Normalizer {
    /// Normalizer spawning its drivers on `runtime`.
    pub fn new(backend: impl Into<Arc<str>>, timeout: Option<Duration>, runtime: Handle) -> Self {
        Self {
            backend: backend.into(),
            timeout,
            runtime,
        }
    }

    /// Normalizer on the ambient Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] outside a Tokio runtime.
    pub fn current(backend: impl Into<Arc<str>>, timeout: Option<Duration>) -> Result<Self, BridgeError> {
        let runtime = Handle::try_current()
            .map_err(|e| BridgeError::InvalidState(format!("no Tokio runtime available: {e}")))?;
        Ok(Self::new(backend, timeout, runtime))
    }

    /// Backend identifier used when wrapping native errors.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Runtime the drivers are spawned on.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Configured per-operation timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Copy with a different per-operation timeout.
    pub fn with_timeout(&self, timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Normalize a single-result call, translating the native value.
    pub fn normalize<N, T, F>(&self, call: NativeCall<N>, translate: F) -> Deferred<T>
    where
        N: Send + 'static,
        T: Send + 'static,
        F: FnOnce(N) -> Result<T, BridgeError> + Send + 'static,
    {
        let (deferred, completer) = Deferred::pending();
        trace!(backend = %self.backend, style = ?call.style(), "normalizing call");
        match call {
            NativeCall::Blocking(f) => self.drive(completer, translate, run_blocking(f)),
            NativeCall::Future(fut) => self.drive(completer, translate, async move { Some(fut.await) }),
            NativeCall::Stream(mut stream) => {
                self.drive(completer, translate, async move { stream.next().await })
            }
            NativeCall::Suspend { scheduler, body } => {
                let token = completer.token().child_token();
                let runtime = scheduler.unwrap_or_else(|| self.runtime.clone());
                self.drive(completer, translate, run_suspended(runtime, body, token))
            }
        }
        deferred
    }

    /// Normalize a streaming call into a lazy sequence.
    ///
    /// Reactive sources yield every element in emission order; the other
    /// styles yield their single result. Nothing runs until the sequence is
    /// first polled.
    pub fn normalize_stream<N, T, F>(&self, call: NativeCall<N>, mut translate: F) -> Sequence<T>
    where
        N: Send + 'static,
        T: Send + 'static,
        F: FnMut(N) -> Result<T, BridgeError> + Send + 'static,
    {
        match call {
            NativeCall::Stream(stream) => {
                let backend = Arc::clone(&self.backend);
                Sequence::new(
                    stream
                        .map(move |item| match item {
                            Ok(native) => translate(native),
                            Err(source) => Err(BridgeError::backend(backend.as_ref(), source)),
                        })
                        .boxed(),
                )
            }
            single => {
                let normalizer = self.clone();
                Sequence::new(
                    futures::stream::once(async move {
                        normalizer.normalize(single, translate).await
                    })
                    .boxed(),
                )
            }
        }
    }

    /// Spawn the driver that settles `completer` from `work`.
    fn drive<N, T, F, W>(&self, completer: Completer<T>, translate: F, work: W)
    where
        N: Send + 'static,
        T: Send + 'static,
        F: FnOnce(N) -> Result<T, BridgeError> + Send + 'static,
        W: Future<Output = Option<Result<N, NativeError>>> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let timeout = self.timeout;
        let token = completer.token();
        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(backend = %backend, "call cancelled before completion");
                    return;
                }
                outcome = race(timeout, work) => outcome,
            };
            match outcome {
                Outcome::Settled(Ok(native)) => {
                    completer.complete(translate(native));
                }
                Outcome::Settled(Err(source)) => {
                    completer.complete(Err(BridgeError::backend(backend.as_ref(), source)));
                }
                Outcome::Empty => {
                    debug!(backend = %backend, "reactive source completed without a value");
                    completer.cancel();
                }
                Outcome::TimedOut(after) => {
                    debug!(backend = %backend, ?after, "call timed out");
                    completer.complete(Err(BridgeError::Timeout(after)));
                    token.cancel();
                }
            }
        });
    }
}

async fn race<N, W>(timeout: Option<Duration>, work: W) -> Outcome<N>
where
    W: Future<Output = Option<Result<N, NativeError>>>,
{
    let settled = match timeout {
        Some(after) => match tokio::time::timeout(after, work).await {
            Ok(settled) => settled,
            Err(_) => return Outcome::TimedOut(after),
        },
        None => work.await,
    };
    match settled {
        Some(result) => Outcome::Settled(result),
        None => Outcome::Empty,
    }
}

async fn run_blocking<N: Send + 'static>(
    f: Box<dyn FnOnce() -> Result<N, NativeError> + Send>,
) -> Option<Result<N, NativeError>> {
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => Some(result),
        Err(join) => Some(Err(Box::new(join))),
    }
}

/// Aborts the wrapped task when dropped, so a cancelled or timed-out driver
/// tears the suspended computation down with it.
struct AbortOnDrop<N>(JoinHandle<N>);

impl<N> Drop for AbortOnDrop<N> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_suspended<N: Send + 'static>(
    runtime: Handle,
    body: SuspendBody<N>,
    token: CancellationToken,
) -> Option<Result<N, NativeError>> {
    let guard_token = token.clone();
    let mut task = AbortOnDrop(runtime.spawn(body(token)));
    let _cancel_on_drop = guard_token.drop_guard();
    match (&mut task.0).await {
        Ok(result) => Some(result),
        Err(join) => Some(Err(Box::new(join))),
    }
}

/// Lazy, cancellable sequence of normalized results.
pub struct Sequence<T> {
    inner: Option<BoxStream<'static, Result<T, BridgeError>>>,
    token: CancellationToken,
    // Registers the consumer's waker with the token so a cancel from another
    // task wakes a pending `next()`.
    cancelled: BoxFuture<'static, ()>,
}

impl<T: Send + 'static> Sequence<T> {
    fn new(inner: BoxStream<'static, Result<T, BridgeError>>) -> Self {
        let token = CancellationToken::new();
        Self {
            inner: Some(inner),
            cancelled: token.clone().cancelled_owned().boxed(),
            token,
        }
    }

    /// A sequence yielding one error and ending.
    pub fn failed(error: BridgeError) -> Self {
        Self::new(futures::stream::once(async move { Err(error) }).boxed())
    }

    /// Stop the sequence and release the native source.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.inner = None;
    }

    /// Token that stops the sequence when cancelled from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether the sequence was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T> Stream for Sequence<T> {
    type Item = Result<T, BridgeError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.inner.is_none() {
            return Poll::Ready(None);
        }
        if self.cancelled.as_mut().poll(cx).is_ready() {
            trace!("sequence cancelled, releasing the native source");
            self.inner = None;
            return Poll::Ready(None);
        }
        match self.inner.as_mut() {
            Some(inner) => {
                let polled = inner.poll_next_unpin(cx);
                if let Poll::Ready(None) = polled {
                    self.inner = None;
                }
                polled
            }
            None => Poll::Ready(None),
        }
    }
}

impl<T> std::fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("active", &self.inner.is_some())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
