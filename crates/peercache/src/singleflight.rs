//! Per-key request deduplication
//!
//! The first caller for a key runs the work; callers arriving while it is in
//! flight block until it finishes and receive a clone of the same outcome.
//! The pending record is dropped as soon as the work completes, so the next
//! call for that key starts fresh.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

enum CallState<T> {
    Pending,
    Done(T),
    /// The owning execution unwound without producing a value
    Abandoned,
}

struct Call<T> {
    state: Mutex<CallState<T>>,
    cv: Condvar,
}

impl<T> Call<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(CallState::Pending),
            cv: Condvar::new(),
        }
    }
}

enum Role<T> {
    Leader(Arc<Call<T>>),
    Waiter(Arc<Call<T>>),
}

/// Collapses concurrent calls for the same key into one execution
pub struct SingleFlight<T> {
    calls: Mutex<HashMap<String, Arc<Call<T>>>>,
}

impl<T: Clone> SingleFlight<T> {
    /// Create an empty flight group
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` unless a call for `key` is already in flight, in which case
    /// wait for that call and return its outcome
    pub fn execute<F>(&self, key: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.execute_shared(key, f).0
    }

    /// Like [`SingleFlight::execute`], also reporting whether the outcome was
    /// produced by another caller
    pub fn execute_shared<F>(&self, key: &str, f: F) -> (T, bool)
    where
        F: FnOnce() -> T,
    {
        loop {
            let role = {
                let mut calls = self.calls.lock();
                match calls.get(key) {
                    Some(call) => Role::Waiter(Arc::clone(call)),
                    None => {
                        let call = Arc::new(Call::new());
                        calls.insert(key.to_string(), Arc::clone(&call));
                        Role::Leader(call)
                    }
                }
            };

            match role {
                Role::Leader(call) => {
                    let mut guard = LeaderGuard {
                        flight: self,
                        key,
                        call,
                        finished: false,
                    };
                    let value = f();
                    guard.finish(CallState::Done(value.clone()));
                    return (value, false);
                }
                Role::Waiter(call) => {
                    let mut state = call.state.lock();
                    while matches!(*state, CallState::Pending) {
                        call.cv.wait(&mut state);
                    }
                    if let CallState::Done(value) = &*state {
                        return (value.clone(), true);
                    }
                    // Leader unwound; retry, possibly as the new leader
                }
            }
        }
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes the leader's outcome and removes the pending record, including
/// when the leader unwinds
struct LeaderGuard<'a, T> {
    flight: &'a SingleFlight<T>,
    key: &'a str,
    call: Arc<Call<T>>,
    finished: bool,
}

impl<T> LeaderGuard<'_, T> {
    fn finish(&mut self, outcome: CallState<T>) {
        *self.call.state.lock() = outcome;
        self.call.cv.notify_all();
        self.flight.calls.lock().remove(self.key);
        self.finished = true;
    }
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(CallState::Abandoned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_execute_returns_value() {
        let flight = SingleFlight::new();
        let v = flight.execute("key", || Ok::<_, String>("bar".to_string()));
        assert_eq!(v, Ok("bar".to_string()));
        assert_eq!(flight.in_flight(), 0);
    }

    #[test]
    fn test_execute_propagates_error() {
        let flight: SingleFlight<Result<String, String>> = SingleFlight::new();
        let v = flight.execute("key", || Err("some error".to_string()));
        assert_eq!(v, Err("some error".to_string()));
    }

    #[test]
    fn test_concurrent_calls_are_deduplicated() {
        const CALLERS: usize = 10;

        let flight = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    flight.execute("key", || {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        thread::sleep(Duration::from_millis(200));
                        Ok::<_, String>(format!("result-{n}"))
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &Ok("result-1".to_string())));
        assert_eq!(flight.in_flight(), 0);
    }

    #[test]
    fn test_completed_call_is_not_reused() {
        let flight = SingleFlight::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let (_, shared) = flight.execute_shared("key", || calls.fetch_add(1, Ordering::SeqCst));
            assert!(!shared);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_distinct_keys_run_independently() {
        let flight = SingleFlight::new();
        let a = flight.execute("a", || 1);
        let b = flight.execute("b", || 2);
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn test_waiter_recovers_from_leader_panic() {
        let flight = Arc::new(SingleFlight::new());

        let leader = {
            let flight = Arc::clone(&flight);
            thread::spawn(move || {
                flight.execute("key", || -> u32 {
                    thread::sleep(Duration::from_millis(100));
                    panic!("loader blew up");
                })
            })
        };

        thread::sleep(Duration::from_millis(20));
        let value = flight.execute("key", || 7);

        assert!(leader.join().is_err());
        assert_eq!(value, 7);
        assert_eq!(flight.in_flight(), 0);

        let again = panic::catch_unwind(AssertUnwindSafe(|| {
            flight.execute("key", || -> u32 { panic!("again") })
        }));
        assert!(again.is_err());
        assert_eq!(flight.in_flight(), 0);
    }
}
