use crate::proof::SlotIndex;
use std::collections::HashMap;

/// Scratch byte buffers addressed by slot index.
///
/// Slots are created by the first store. Reading a slot that was never
/// stored yields an empty buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryBank {
    slots: HashMap<SlotIndex, Vec<u8>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, slot: SlotIndex, value: Vec<u8>) {
        self.slots.insert(slot, value);
    }

    pub fn get(&self, slot: SlotIndex) -> &[u8] {
        self.slots.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn load(&self, slot: SlotIndex) -> Vec<u8> {
        self.get(slot).to_vec()
    }

    /// Exchanges `value` with the slot's contents.
    pub fn swap(&mut self, slot: SlotIndex, value: &mut Vec<u8>) {
        std::mem::swap(self.slots.entry(slot).or_default(), value);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
