// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reactive cells
//!
//! A [`ReactiveCell`] holds one value and a list of observers. Every write
//! replaces the value and then calls each observer with the new value,
//! synchronously, on the writer's thread, in subscription order.
//!
//! A cell may carry a transform: a plain `fn` run on every write before
//! observers are notified. It sees the previous value and may adjust the new
//! one in place.
//!
//! # Reentrancy
//!
//! Writes to one cell are serialized. An observer or transform must not write
//! to the cell it is attached to; doing so deadlocks. Reads from observers are
//! fine.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Hook run on every write: `(previous, next)`
pub type Transform<T> = fn(&T, &mut T);

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`ReactiveCell::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Slot<T> {
    value: T,
    observers: Vec<(SubscriptionId, Observer<T>)>,
    next_id: u64,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    // held for the whole write so notifications are never interleaved
    write_gate: Mutex<()>,
    transform: Option<Transform<T>>,
}

/// A shared value with change notification
///
/// Cloning the cell clones the handle; all clones see the same value.
pub struct ReactiveCell<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ReactiveCell<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for ReactiveCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.shared.slot.lock();
        f.debug_struct("ReactiveCell")
            .field("value", &slot.value)
            .field("observers", &slot.observers.len())
            .finish()
    }
}

impl<T: Default + Clone> Default for ReactiveCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> ReactiveCell<T> {
    pub fn new(value: T) -> Self {
        Self::build(value, None)
    }

    /// Create a cell whose writes pass through `transform` first
    ///
    /// The initial value is stored as given.
    pub fn with_transform(value: T, transform: Transform<T>) -> Self {
        Self::build(value, Some(transform))
    }

    fn build(value: T, transform: Option<Transform<T>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    value,
                    observers: Vec::new(),
                    next_id: 0,
                }),
                write_gate: Mutex::new(()),
                transform,
            }),
        }
    }

    /// Current value
    pub fn read(&self) -> T {
        self.shared.slot.lock().value.clone()
    }

    /// Borrow the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.slot.lock().value)
    }

    /// Replace the value and notify observers
    pub fn write(&self, value: T) {
        self.update(move |current| *current = value);
    }

    /// Read-modify-write as one step, then notify observers
    ///
    /// `f` runs with the cell locked and must not touch this cell.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _gate = self.shared.write_gate.lock();

        let (result, published, observers) = {
            let mut slot = self.shared.slot.lock();
            let mut next = slot.value.clone();
            let result = f(&mut next);
            if let Some(transform) = self.shared.transform {
                transform(&slot.value, &mut next);
            }
            slot.value = next;

            let observers: Vec<Observer<T>> = slot
                .observers
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();
            (result, slot.value.clone(), observers)
        };

        for observer in &observers {
            observer(&published);
        }
        result
    }

    /// Register an observer for future writes
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let mut slot = self.shared.slot.lock();
        let id = SubscriptionId(slot.next_id);
        slot.next_id += 1;
        slot.observers.push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer; returns false if it was not subscribed
    ///
    /// A write already in progress may still deliver to it once.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut slot = self.shared.slot.lock();
        let before = slot.observers.len();
        slot.observers.retain(|(existing, _)| *existing != id);
        slot.observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.slot.lock().observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_write_notifies_in_subscription_order() {
        let cell = ReactiveCell::new(0u32);
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            cell.subscribe(move |value| log.lock().push(format!("{}:{}", name, value)));
        }

        cell.write(7);
        assert_eq!(cell.read(), 7);
        assert_eq!(*log.lock(), vec!["first:7", "second:7", "third:7"]);
    }

    #[test]
    fn test_notification_is_synchronous() {
        let cell = ReactiveCell::new(String::new());
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        cell.subscribe(move |value| *sink.lock() = value.clone());

        cell.write("ready".to_string());
        // no yield point between write and the observer running
        assert_eq!(*seen.lock(), "ready");
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let cell = ReactiveCell::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = cell.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cell.write(1);
        assert!(cell.unsubscribe(id));
        assert!(!cell.unsubscribe(id));
        cell.write(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_same_closure_shape_subscribed_twice_is_two_observers() {
        let cell = ReactiveCell::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let ids: Vec<_> = (0..2)
            .map(|_| {
                let counter = Arc::clone(&calls);
                cell.subscribe(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        assert_ne!(ids[0], ids[1]);

        cell.write(5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    fn keep_maximum(previous: &i64, next: &mut i64) {
        if *previous > *next {
            *next = *previous;
        }
    }

    #[test]
    fn test_transform_runs_before_notification() {
        let cell = ReactiveCell::with_transform(10i64, keep_maximum);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        cell.subscribe(move |value| sink.lock().push(*value));

        cell.write(3);
        cell.write(42);
        cell.write(7);

        assert_eq!(*seen.lock(), vec![10, 42, 42]);
        assert_eq!(cell.read(), 42);
    }

    #[test]
    fn test_update_returns_closure_result() {
        let cell = ReactiveCell::new(vec![1, 2]);
        let len = cell.update(|values| {
            values.push(3);
            values.len()
        });
        assert_eq!(len, 3);
        assert_eq!(cell.with(|values| values.iter().sum::<i32>()), 6);
    }

    #[test]
    fn test_concurrent_writers_are_serialized() {
        let cell = ReactiveCell::new(0u64);
        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        cell.subscribe(move |value| sink.lock().push(*value));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cell.update(|v| *v += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let observed = observed.lock();
        assert_eq!(observed.len(), 400);
        // each observer call sees the value its own write produced
        assert!(observed.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(cell.read(), 400);
    }
}
