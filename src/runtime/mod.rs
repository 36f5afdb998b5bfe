//! Concurrency normalization.
//!
//! Backends answer in one of four native shapes ([`NativeCall`]); the
//! [`Normalizer`] turns every shape into a [`Deferred`] (single result) or a
//! [`Sequence`] (streaming result). No other module branches on the shape.

use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::error::NativeError;

pub mod deferred;
pub mod normalizer;

pub use deferred::{CancelHandle, Completer, Deferred};
pub use normalizer::{Normalizer, Sequence};

/// Body of a suspension-style call. Receives the token it must observe.
pub type SuspendBody<T> =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<T, NativeError>> + Send>;

/// A backend's native result, tagged by concurrency style.
pub enum NativeCall<T> {
    /// Synchronous call; runs on a dedicated blocking worker.
    Blocking(Box<dyn FnOnce() -> Result<T, NativeError> + Send>),
    /// Promise already in flight; observed until it settles.
    Future(BoxFuture<'static, Result<T, NativeError>>),
    /// Reactive stream; the first element answers single-result calls.
    Stream(BoxStream<'static, Result<T, NativeError>>),
    /// Lazy computation run to completion on its native scheduler, with
    /// cancellation propagated through the token it is given.
    Suspend {
        /// Scheduler to run on; the normalizer's runtime when `None`.
        scheduler: Option<Handle>,
        /// The computation.
        body: SuspendBody<T>,
    },
}

/// Concurrency style of a [`NativeCall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallStyle {
    /// Synchronous.
    Blocking,
    /// Future / promise.
    Future,
    /// Reactive stream.
    Stream,
    /// Suspension / coroutine.
    Suspend,
}

impl<T: Send + 'static> NativeCall<T> {
    /// Synchronous call.
    pub fn blocking<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, NativeError> + Send + 'static,
    {
        Self::Blocking(Box::new(f))
    }

    /// Promise-style call.
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, NativeError>> + Send + 'static,
    {
        Self::Future(fut.boxed())
    }

    /// Reactive stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, NativeError>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    /// Suspension-style computation on the normalizer's runtime.
    pub fn suspend<F, Fut>(body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, NativeError>> + Send + 'static,
    {
        Self::Suspend {
            scheduler: None,
            body: Box::new(move |token| body(token).boxed()),
        }
    }

    /// Suspension-style computation on a specific scheduler.
    pub fn suspend_on<F, Fut>(scheduler: Handle, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, NativeError>> + Send + 'static,
    {
        Self::Suspend {
            scheduler: Some(scheduler),
            body: Box::new(move |token| body(token).boxed()),
        }
    }

    /// Already-settled success.
    pub fn ready(value: T) -> Self {
        Self::future(futures::future::ready(Ok(value)))
    }

    /// Already-settled failure.
    pub fn failed(error: impl Into<NativeError>) -> Self {
        let error = error.into();
        Self::future(futures::future::ready(Err(error)))
    }

    /// Concurrency style tag.
    pub fn style(&self) -> CallStyle {
        match self {
            Self::Blocking(_) => CallStyle::Blocking,
            Self::Future(_) => CallStyle::Future,
            Self::Stream(_) => CallStyle::Stream,
            Self::Suspend { .. } => CallStyle::Suspend,
        }
    }
}

impl<T> std::fmt::Debug for NativeCall<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let style = match self {
            Self::Blocking(_) => "Blocking",
            Self::Future(_) => "Future",
            Self::Stream(_) => "Stream",
            Self::Suspend { .. } => "Suspend",
        };
        f.debug_tuple("NativeCall").field(&style).finish()
    }
}
