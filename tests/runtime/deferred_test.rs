//! Deferred result semantics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use chatbridge::runtime::Deferred;
use chatbridge::{BridgeError, ErrorKind};

#[test]
fn continuations_run_once_in_registration_order() {
    let (deferred, completer) = Deferred::<u32>::pending();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second", "third"] {
        let seen = Arc::clone(&seen);
        deferred.on_complete(move |result| {
            let value = *result.as_ref().expect("success");
            seen.lock().push((tag, value));
        });
    }
    assert!(deferred.is_pending());

    assert!(completer.complete(Ok(7)));

    assert_eq!(
        *seen.lock(),
        vec![("first", 7), ("second", 7), ("third", 7)]
    );
    assert!(deferred.is_ready());
}

#[test]
fn continuation_registered_after_completion_runs_immediately() {
    let deferred = Deferred::ready("done".to_owned());
    let ran = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&ran);
    deferred.on_complete(move |result| {
        assert_eq!(result.as_deref().ok(), Some("done"));
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&ran);
    deferred.on_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[test]
fn cancel_suppresses_continuations_even_if_the_backend_completes() {
    let (deferred, completer) = Deferred::<u32>::pending();
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    deferred.on_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(deferred.cancel());
    assert!(completer.token().is_cancelled());
    assert!(!completer.complete(Ok(1)));

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(deferred.is_cancelled());
}

#[test]
fn cancel_after_completion_is_refused() {
    let deferred = Deferred::ready(5_u8);
    assert!(!deferred.cancel());
    assert!(!deferred.is_cancelled());
}

#[test]
fn dropping_the_completer_cancels() {
    let (deferred, completer) = Deferred::<()>::pending();
    let token = completer.token();

    drop(completer);

    assert!(deferred.is_cancelled());
    assert!(token.is_cancelled());
}

#[test]
fn cancel_handle_cancels_from_another_owner() {
    let (deferred, completer) = Deferred::<()>::pending();
    let handle = deferred.cancel_handle();

    let worker = std::thread::spawn(move || handle.cancel());
    assert!(worker.join().expect("thread finished"));

    assert!(completer.is_cancelled());
    assert!(deferred.is_cancelled());
}

#[test]
fn panicking_continuation_does_not_stop_the_others() {
    let (deferred, completer) = Deferred::<u32>::pending();
    let ran = Arc::new(AtomicUsize::new(0));

    deferred.on_complete(|_| panic!("continuation failure"));
    let counter = Arc::clone(&ran);
    deferred.on_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    completer.complete(Ok(1));

    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn awaiting_yields_the_result() {
    let (deferred, completer) = Deferred::<u32>::pending();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        completer.complete(Ok(42));
    });

    assert_eq!(deferred.await.expect("success"), 42);
}

#[tokio::test]
async fn awaiting_a_failure_yields_the_error() {
    let deferred = Deferred::<u32>::failed(BridgeError::InvalidState("nope".to_owned()));
    let err = deferred.await.expect_err("failure");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn awaiting_a_cancelled_deferred_yields_cancelled() {
    let (deferred, _completer) = Deferred::<u32>::pending();
    let handle = deferred.cancel_handle();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        handle.cancel();
    });

    let err = deferred.await.expect_err("cancelled");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
