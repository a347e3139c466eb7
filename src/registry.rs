use serde::Serialize;
use std::fmt;

use crate::drivers::BackendDriver;
use crate::error::RegistryError;

/// Fixed identity of a backend kind in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Relational,
    Document,
}

impl Slot {
    pub const COUNT: usize = 2;
    pub const ALL: [Slot; Slot::COUNT] = [Slot::Relational, Slot::Document];

    pub fn index(self) -> usize {
        match self {
            Slot::Relational => 0,
            Slot::Document => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::Relational => "relational",
            Slot::Document => "document",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which backends take part in this run. Written once during startup,
/// then consumed by the orchestrator.
#[derive(Default)]
pub struct Registry {
    slots: [Option<Box<dyn BackendDriver>>; Slot::COUNT],
    order: Vec<Slot>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        slot: Slot,
        driver: Box<dyn BackendDriver>,
    ) -> Result<(), RegistryError> {
        let entry = &mut self.slots[slot.index()];
        if entry.is_some() {
            return Err(RegistryError::SlotAlreadyOccupied(slot));
        }
        *entry = Some(driver);
        self.order.push(slot);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Occupied slots in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &dyn BackendDriver)> {
        self.order
            .iter()
            .filter_map(|&slot| self.slots[slot.index()].as_deref().map(|d| (slot, d)))
    }

    /// Hands out every registered driver in registration order.
    /// Consumes the registry, so the sequence cannot be restarted.
    pub fn into_active(self) -> impl Iterator<Item = (Slot, Box<dyn BackendDriver>)> {
        let Registry { mut slots, order } = self;
        order
            .into_iter()
            .filter_map(move |slot| slots[slot.index()].take().map(|d| (slot, d)))
    }
}
