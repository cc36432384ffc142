use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::FutureError;

#[derive(Debug)]
enum State<T> {
    Empty,
    Value(T),
    Error(Arc<anyhow::Error>),
}

#[derive(Debug)]
struct Inner<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

/// A one-shot cell published exactly once with either a value or an error,
/// waitable from any number of threads.
///
/// Handles are cheap clones of a shared cell: the producer keeps one side,
/// consumers the other, and whichever outlives the other keeps the outcome
/// alive. Once published the payload never changes, and every current and
/// future waiter observes the same outcome.
#[derive(Debug)]
pub struct Future<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Future<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Empty),
                cond: Condvar::new(),
            }),
        }
    }

    /// Publishes `value` and wakes all waiters. Fails once published.
    pub fn set_value(&self, value: T) -> Result<(), FutureError> {
        let mut state = self.inner.state.lock().unwrap();
        match *state {
            State::Empty => {
                *state = State::Value(value);
                self.inner.cond.notify_all();
                Ok(())
            }
            _ => Err(FutureError::AlreadySet),
        }
    }

    /// Publishes `error` and wakes all waiters. Fails once published.
    pub fn set_error(&self, error: anyhow::Error) -> Result<(), FutureError> {
        let mut state = self.inner.state.lock().unwrap();
        match *state {
            State::Empty => {
                *state = State::Error(Arc::new(error));
                self.inner.cond.notify_all();
                Ok(())
            }
            _ => Err(FutureError::AlreadySet),
        }
    }

    /// True once a value or error has been published.
    pub fn is_set(&self) -> bool {
        !matches!(*self.inner.state.lock().unwrap(), State::Empty)
    }

    /// Blocks until the future is published.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock().unwrap();
        while matches!(*state, State::Empty) {
            state = self.inner.cond.wait(state).unwrap();
        }
    }

    /// Blocks until published or until `timeout` elapses. Returns whether
    /// the future was published on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock().unwrap();
        while matches!(*state, State::Empty) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.inner.cond.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
        true
    }

    /// Millisecond form of [`wait_timeout`](Self::wait_timeout).
    pub fn wait_ms(&self, millis: u64) -> bool {
        self.wait_timeout(Duration::from_millis(millis))
    }
}

impl<T: Clone> Future<T> {
    /// Blocks until published, then returns the value, or the wrapped
    /// producer error when the producer failed.
    pub fn get_value(&self) -> Result<T, FutureError> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            match &*state {
                State::Value(value) => return Ok(value.clone()),
                State::Error(error) => return Err(FutureError::Producer(error.clone())),
                State::Empty => {}
            }
            state = self.inner.cond.wait(state).unwrap();
        }
    }
}

impl<T> Default for Future<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A completion handle with a wait face and no value.
///
/// Returned by `FairPool::submit_waitable`; completes when the tracked job
/// has run, whether it succeeded or panicked.
#[derive(Debug, Clone)]
pub struct Waitable {
    done: Future<bool>,
}

impl Waitable {
    pub(crate) fn new(done: Future<bool>) -> Self {
        Self { done }
    }

    /// Blocks until the tracked job has completed.
    pub fn wait(&self) {
        self.done.wait()
    }

    /// Blocks until completion or timeout. Returns whether the job had
    /// completed on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.done.wait_timeout(timeout)
    }

    /// Millisecond form of [`wait_timeout`](Self::wait_timeout).
    pub fn wait_ms(&self, millis: u64) -> bool {
        self.done.wait_ms(millis)
    }

    /// True once the tracked job has completed.
    pub fn is_complete(&self) -> bool {
        self.done.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::thread;

    #[test]
    fn value_roundtrip() {
        let future = Future::new();
        assert!(!future.is_set());
        future.set_value(42).unwrap();
        assert!(future.is_set());
        assert_eq!(future.get_value().unwrap(), 42);
        // The value stays observable for later waiters.
        assert_eq!(future.get_value().unwrap(), 42);
    }

    #[test]
    fn double_publish_is_rejected() {
        let future = Future::new();
        future.set_value(1).unwrap();
        assert!(matches!(future.set_value(2), Err(FutureError::AlreadySet)));
        assert!(matches!(
            future.set_error(anyhow!("late")),
            Err(FutureError::AlreadySet)
        ));
        assert_eq!(future.get_value().unwrap(), 1);
    }

    #[test]
    fn error_is_wrapped_for_the_getter() {
        let future: Future<u32> = Future::new();
        future.set_error(anyhow!("invalid operation")).unwrap();

        let err = future.get_value().unwrap_err();
        let inner = err.inner().expect("producer error");
        assert!(inner.to_string().contains("invalid operation"));
    }

    #[test]
    fn timed_wait_reports_readiness() {
        let future: Future<u32> = Future::new();
        assert!(!future.wait_ms(10));

        let publisher = future.clone();
        let handle = thread::spawn(move || publisher.set_value(7).unwrap());
        assert!(future.wait_ms(2_000));
        assert_eq!(future.get_value().unwrap(), 7);
        handle.join().unwrap();
    }

    #[test]
    fn all_waiters_observe_the_same_outcome() {
        let future: Future<String> = Future::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let f = future.clone();
                thread::spawn(move || f.get_value().unwrap())
            })
            .collect();

        future.set_value("done".to_string()).unwrap();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), "done");
        }
    }

    #[test]
    fn unbounded_wait_unblocks_on_publish() {
        let future: Future<()> = Future::new();
        let waiter = future.clone();
        let handle = thread::spawn(move || waiter.wait());
        future.set_value(()).unwrap();
        handle.join().unwrap();
    }
}
