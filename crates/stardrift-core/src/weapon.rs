//! Player weapon slots and cross-thread trigger handles.

use std::sync::Arc;

use crate::emitter::Emitter;

/// Ordered weapon slots with one active weapon.
#[derive(Debug, Default)]
pub struct WeaponSet {
    weapons: Vec<Arc<Emitter>>,
    active: usize,
}

impl WeaponSet {
    /// Add a weapon, returning its slot. The first weapon becomes active.
    pub fn push(&mut self, weapon: Arc<Emitter>) -> usize {
        self.weapons.push(weapon);
        self.weapons.len() - 1
    }

    pub fn len(&self) -> usize {
        self.weapons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weapons.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Arc<Emitter>> {
        self.weapons.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Emitter>> {
        self.weapons.iter()
    }

    pub fn active_index(&self) -> Option<usize> {
        (!self.weapons.is_empty()).then_some(self.active)
    }

    pub fn active(&self) -> Option<&Arc<Emitter>> {
        self.weapons.get(self.active)
    }

    /// Cycle to the next slot, wrapping around.
    pub fn select_next(&mut self) -> Option<usize> {
        if self.weapons.is_empty() {
            return None;
        }
        self.active = (self.active + 1) % self.weapons.len();
        Some(self.active)
    }

    /// Register a fire request on the active weapon. Returns `false` when
    /// there are no weapons.
    pub fn fire(&self) -> bool {
        match self.active() {
            Some(weapon) => {
                weapon.register_request();
                true
            }
            None => false,
        }
    }

    /// Remaining ammunition ratio per slot, `1.0` for unlimited weapons.
    pub fn ammo_status(&self) -> Vec<f64> {
        self.weapons.iter().map(|w| w.ammo_ratio()).collect()
    }
}

/// Cloneable handle that lets any thread request an emission.
#[derive(Debug, Clone)]
pub struct EmitterTrigger(Arc<Emitter>);

impl EmitterTrigger {
    pub fn new(emitter: Arc<Emitter>) -> Self {
        Self(emitter)
    }

    pub fn fire(&self) {
        self.0.register_request();
    }

    pub fn emitter(&self) -> &Emitter {
        &self.0
    }
}
