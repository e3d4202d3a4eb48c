//! Lock-light triple buffer for a body's [`PhysicsState`].
//!
//! Three slots rotate between three roles:
//!
//! - **current** -- the last published state, what every reader sees.
//! - **next** -- the write target of the single writer (the tick worker that
//!   owns the body this tick).
//! - **snapshot** -- a copy refreshed at the end of each tick for renderers
//!   and other out-of-tick readers.
//!
//! The roles are packed into one `AtomicU8`. Publishing writes the next slot
//! and then swaps `current` and `next` with a single atomic store, so a
//! reader never observes a half-written state. A reader that loses a race
//! with a publish retries against the new role word.

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::RwLock;

use super::state::PhysicsState;

const SLOT_MASK: u8 = 0b11;

#[inline]
fn pack(current: u8, next: u8, snapshot: u8) -> u8 {
    current | (next << 2) | (snapshot << 4)
}

#[inline]
fn unpack(roles: u8) -> (usize, usize, usize) {
    (
        (roles & SLOT_MASK) as usize,
        ((roles >> 2) & SLOT_MASK) as usize,
        ((roles >> 4) & SLOT_MASK) as usize,
    )
}

/// Three-slot physics state buffer with an atomically published current slot.
#[derive(Debug)]
pub struct PhysicsBuffer {
    slots: [RwLock<PhysicsState>; 3],
    roles: AtomicU8,
}

impl PhysicsBuffer {
    /// Create a buffer whose every slot holds `initial`.
    pub fn new(initial: PhysicsState) -> Self {
        Self {
            slots: [
                RwLock::new(initial),
                RwLock::new(initial),
                RwLock::new(initial),
            ],
            roles: AtomicU8::new(pack(0, 1, 2)),
        }
    }

    /// The most recently published state.
    pub fn current(&self) -> PhysicsState {
        loop {
            let roles = self.roles.load(Ordering::Acquire);
            let (current, _, _) = unpack(roles);
            let state = *self.slots[current].read();
            if self.roles.load(Ordering::Acquire) == roles {
                return state;
            }
        }
    }

    /// Write `state` into the next slot and make it current.
    ///
    /// The previous current slot becomes the next write target. Must only be
    /// called by one writer at a time; concurrent readers are fine.
    pub fn publish(&self, state: PhysicsState) {
        let roles = self.roles.load(Ordering::Acquire);
        let (current, next, snapshot) = unpack(roles);
        *self.slots[next].write() = state;
        self.roles.store(
            pack(next as u8, current as u8, snapshot as u8),
            Ordering::Release,
        );
    }

    /// Read the current state, let `f` modify a copy, then publish it.
    pub fn update(&self, f: impl FnOnce(&mut PhysicsState)) {
        let mut state = self.current();
        f(&mut state);
        self.publish(state);
    }

    /// Copy the current state into the snapshot slot.
    pub fn refresh_snapshot(&self) {
        let state = self.current();
        let (_, _, snapshot) = unpack(self.roles.load(Ordering::Acquire));
        *self.slots[snapshot].write() = state;
    }

    /// The state as of the last [`refresh_snapshot`](Self::refresh_snapshot).
    pub fn snapshot(&self) -> PhysicsState {
        let (_, _, snapshot) = unpack(self.roles.load(Ordering::Acquire));
        *self.slots[snapshot].read()
    }

    /// Slot indices currently playing `(current, next, snapshot)`.
    pub fn slot_indices(&self) -> (usize, usize, usize) {
        unpack(self.roles.load(Ordering::Acquire))
    }
}

impl Default for PhysicsBuffer {
    fn default() -> Self {
        Self::new(PhysicsState::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
