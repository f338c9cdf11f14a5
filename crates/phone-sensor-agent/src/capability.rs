// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Capture capability registry
//!
//! Commands that need the camera can arrive before the camera is ready, and
//! the camera can become ready while nobody is asking for a photo. The
//! registry is the meeting point: a single slot that holds either a ready
//! capture callback or a count of requests waiting for one.
//!
//! ```text
//! NoCallback ──register──▶ CallbackReady(cb) ──invoke──▶ NoCallback
//!     │                                                      ▲
//!  invoke                                                    │
//!     ▼                                                      │
//! CallbackPendingInvocation(n) ──register (n == 1)──────────┘
//!     │ register (n > 1): fire, n - 1
//! ```
//!
//! Every pending request is served by exactly one registration; a registered
//! callback serves exactly one request. Callbacks always run after the state
//! transition has been published, never under the registry's lock.

use crate::reactive::{ReactiveCell, SubscriptionId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Performs one capture and hands the photo off for transmission
pub type CaptureCallback = Arc<dyn Fn() + Send + Sync>;

/// State of the single capability slot
#[derive(Clone)]
pub enum CapabilityState {
    NoCallback,
    /// `n >= 1` requests arrived before a callback was available
    CallbackPendingInvocation(usize),
    CallbackReady(CaptureCallback),
}

impl CapabilityState {
    pub fn is_ready(&self) -> bool {
        matches!(self, CapabilityState::CallbackReady(_))
    }

    /// Requests still waiting for a callback
    pub fn pending(&self) -> usize {
        match self {
            CapabilityState::CallbackPendingInvocation(n) => *n,
            _ => 0,
        }
    }
}

impl fmt::Debug for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityState::NoCallback => write!(f, "NoCallback"),
            CapabilityState::CallbackPendingInvocation(n) => {
                write!(f, "CallbackPendingInvocation({})", n)
            }
            CapabilityState::CallbackReady(_) => write!(f, "CallbackReady(..)"),
        }
    }
}

impl PartialEq for CapabilityState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CapabilityState::NoCallback, CapabilityState::NoCallback) => true,
            (
                CapabilityState::CallbackPendingInvocation(a),
                CapabilityState::CallbackPendingInvocation(b),
            ) => a == b,
            (CapabilityState::CallbackReady(a), CapabilityState::CallbackReady(b)) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

/// What [`CapabilityRegistry::invoke_or_queue`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// The ready callback was consumed and run
    Invoked,
    /// No callback yet; the request now waits (value = pending count)
    Queued(usize),
}

/// What [`CapabilityRegistry::register`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The callback was stored for the next request
    Stored,
    /// The callback was replaced by a newer one
    Replaced,
    /// A waiting request consumed the callback immediately (value = still pending)
    Served(usize),
}

enum Action {
    Run(CaptureCallback),
    Nothing,
}

/// Shared handle to the capability slot
#[derive(Clone)]
pub struct CapabilityRegistry {
    cell: ReactiveCell<CapabilityState>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapabilityRegistry")
            .field(&self.state())
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            cell: ReactiveCell::new(CapabilityState::NoCallback),
        }
    }

    pub fn state(&self) -> CapabilityState {
        self.cell.read()
    }

    /// Observe state transitions
    pub fn subscribe(
        &self,
        observer: impl Fn(&CapabilityState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.cell.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.cell.unsubscribe(id)
    }

    /// Serve one capture request: run the ready callback, or queue the request
    pub fn invoke_or_queue(&self) -> InvokeOutcome {
        let (action, outcome) = self.cell.update(|state| {
            match std::mem::replace(state, CapabilityState::NoCallback) {
                CapabilityState::CallbackReady(callback) => {
                    (Action::Run(callback), InvokeOutcome::Invoked)
                }
                CapabilityState::NoCallback => {
                    *state = CapabilityState::CallbackPendingInvocation(1);
                    (Action::Nothing, InvokeOutcome::Queued(1))
                }
                CapabilityState::CallbackPendingInvocation(n) => {
                    *state = CapabilityState::CallbackPendingInvocation(n + 1);
                    (Action::Nothing, InvokeOutcome::Queued(n + 1))
                }
            }
        });

        match action {
            Action::Run(callback) => {
                debug!("[CAPABILITY] Invoking ready capture callback");
                callback();
            }
            Action::Nothing => {
                debug!("[CAPABILITY] No capture callback yet; {:?}", outcome);
            }
        }
        outcome
    }

    /// Offer a capture callback
    ///
    /// If requests are waiting, the callback serves one of them right away and
    /// is not stored.
    pub fn register(&self, callback: CaptureCallback) -> RegisterOutcome {
        let (action, outcome) = self.cell.update(|state| {
            match std::mem::replace(state, CapabilityState::NoCallback) {
                CapabilityState::CallbackPendingInvocation(n) => {
                    let remaining = n - 1;
                    if remaining > 0 {
                        *state = CapabilityState::CallbackPendingInvocation(remaining);
                    }
                    (Action::Run(callback), RegisterOutcome::Served(remaining))
                }
                CapabilityState::CallbackReady(_) => {
                    *state = CapabilityState::CallbackReady(callback);
                    (Action::Nothing, RegisterOutcome::Replaced)
                }
                CapabilityState::NoCallback => {
                    *state = CapabilityState::CallbackReady(callback);
                    (Action::Nothing, RegisterOutcome::Stored)
                }
            }
        });

        if let Action::Run(callback) = action {
            debug!("[CAPABILITY] Serving a waiting request with the new callback");
            callback();
        } else {
            trace!("[CAPABILITY] Callback registered: {:?}", outcome);
        }
        outcome
    }

    /// Drop a ready callback (capture pipeline going away or being rebuilt)
    ///
    /// Pending requests are kept; they will be served by the next registration.
    /// Returns true if a callback was removed.
    pub fn withdraw(&self) -> bool {
        self.cell.update(|state| {
            if state.is_ready() {
                *state = CapabilityState::NoCallback;
                true
            } else {
                false
            }
        })
    }

    /// Forget requests that are still waiting; returns how many were dropped
    ///
    /// Used when the session that issued them ends.
    pub fn cancel_pending(&self) -> usize {
        self.cell.update(|state| match state {
            CapabilityState::CallbackPendingInvocation(n) => {
                let dropped = *n;
                *state = CapabilityState::NoCallback;
                dropped
            }
            _ => 0,
        })
    }
}
