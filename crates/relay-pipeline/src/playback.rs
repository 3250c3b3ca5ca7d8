//! Playback-token gate: the session's sole cancellation mechanism for
//! outbound audio and streaming decode.
//!
//! A captured token is a plain `u64` handed to background work by value,
//! never a reference to the counter — so no shared-memory synchronization
//! is needed beyond the counter itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct PlaybackGate {
    inner: Arc<Inner>,
}

struct Inner {
    token: AtomicU64,
    call_ended: AtomicBool,
}

impl PlaybackGate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: AtomicU64::new(0),
                call_ended: AtomicBool::new(false),
            }),
        }
    }

    /// Read-and-remember the current token.
    pub fn capture(&self) -> u64 {
        self.inner.token.load(Ordering::SeqCst)
    }

    /// Invalidates every prior capture. Called on a new turn beginning
    /// processing or on detected barge-in.
    pub fn increment(&self) -> u64 {
        self.inner.token.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// True only if `captured` is still the live token and the call hasn't
    /// ended. Every outbound audio send and every provider-response read
    /// must check this before acting.
    pub fn still_valid(&self, captured: u64) -> bool {
        !self.inner.call_ended.load(Ordering::SeqCst)
            && self.inner.token.load(Ordering::SeqCst) == captured
    }

    /// Idempotent one-way latch. Once set, `still_valid` never returns
    /// true again for this session.
    pub fn end_call(&self) {
        self.inner.call_ended.store(true, Ordering::SeqCst);
    }

    pub fn call_ended(&self) -> bool {
        self.inner.call_ended.load(Ordering::SeqCst)
    }
}

impl Default for PlaybackGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_capture_is_valid() {
        let gate = PlaybackGate::new();
        let t = gate.capture();
        assert!(gate.still_valid(t));
    }

    #[test]
    fn increment_invalidates_prior_captures() {
        let gate = PlaybackGate::new();
        let t = gate.capture();
        gate.increment();
        assert!(!gate.still_valid(t));
        assert!(gate.still_valid(gate.capture()));
    }

    #[test]
    fn call_ended_invalidates_every_capture() {
        let gate = PlaybackGate::new();
        let t = gate.capture();
        gate.end_call();
        assert!(!gate.still_valid(t));
        assert!(!gate.still_valid(gate.capture()));
    }

    #[test]
    fn end_call_is_idempotent() {
        let gate = PlaybackGate::new();
        gate.end_call();
        gate.end_call();
        assert!(gate.call_ended());
    }

    #[test]
    fn clone_shares_the_same_counter() {
        let gate = PlaybackGate::new();
        let clone = gate.clone();
        clone.increment();
        assert_eq!(gate.capture(), clone.capture());
    }
}
