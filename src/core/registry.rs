//! Bounded handle registry
//!
//! Control blocks live in a fixed table of `Arc` slots. A handle is the
//! 32-bit word `(generation << 16) | (slot + 1)`, so raw 0 is never a
//! valid handle and a handle to a freed slot stops resolving as soon as
//! the slot's generation moves on.

use alloc::sync::Arc;
use core::cell::RefCell;
use core::num::NonZeroU32;

use critical_section::Mutex;

use crate::error::{OsError, OsResult};

struct Slot<T> {
    generation: u16,
    object: Option<Arc<T>>,
}

impl<T> Slot<T> {
    const EMPTY: Self = Slot {
        generation: 0,
        object: None,
    };
}

/// Fixed-capacity table of shared control blocks
pub struct Registry<T, const N: usize> {
    slots: Mutex<RefCell<[Slot<T>; N]>>,
}

fn encode(generation: u16, index: usize) -> NonZeroU32 {
    let raw = ((generation as u32) << 16) | (index as u32 + 1);
    // low half is index + 1, never zero
    NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN)
}

fn decode(raw: NonZeroU32) -> (u16, usize) {
    let raw = raw.get();
    ((raw >> 16) as u16, ((raw & 0xFFFF) as usize).wrapping_sub(1))
}

impl<T, const N: usize> Registry<T, N> {
    const _FITS: () = assert!(N > 0 && N < 0xFFFF);

    pub const fn new() -> Self {
        let () = Self::_FITS;
        Registry {
            slots: Mutex::new(RefCell::new([Slot::EMPTY; N])),
        }
    }

    /// Store `object`, returning its handle
    ///
    /// # Returns
    /// * `Err(OsError::NoMemory)` - Every slot is taken
    pub fn insert(&self, object: T) -> OsResult<NonZeroU32> {
        let object = Arc::new(object);
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            let (index, slot) = slots
                .iter_mut()
                .enumerate()
                .find(|(_, slot)| slot.object.is_none())
                .ok_or(OsError::NoMemory)?;
            slot.object = Some(object);
            Ok(encode(slot.generation, index))
        })
    }

    /// Resolve a handle to its control block
    pub fn get(&self, raw: NonZeroU32) -> OsResult<Arc<T>> {
        let (generation, index) = decode(raw);
        critical_section::with(|cs| {
            let slots = self.slots.borrow_ref(cs);
            match slots.get(index) {
                Some(Slot { generation: g, object: Some(object) }) if *g == generation => {
                    Ok(Arc::clone(object))
                }
                _ => Err(OsError::InvalidHandle),
            }
        })
    }

    /// Free a handle's slot, returning the control block
    pub fn remove(&self, raw: NonZeroU32) -> OsResult<Arc<T>> {
        let (generation, index) = decode(raw);
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow_ref_mut(cs);
            let slot = slots
                .get_mut(index)
                .filter(|slot| slot.generation == generation)
                .ok_or(OsError::InvalidHandle)?;
            let object = slot.object.take().ok_or(OsError::InvalidHandle)?;
            slot.generation = slot.generation.wrapping_add(1);
            Ok(object)
        })
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        critical_section::with(|cs| {
            self.slots
                .borrow_ref(cs)
                .iter()
                .filter(|slot| slot.object.is_some())
                .count()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, const N: usize> Default for Registry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let reg: Registry<u32, 4> = Registry::new();
        let h = reg.insert(7).unwrap();
        assert_eq!(*reg.get(h).unwrap(), 7);
        assert_eq!(reg.len(), 1);
        assert_eq!(*reg.remove(h).unwrap(), 7);
        assert!(reg.is_empty());
    }

    #[test]
    fn stale_handle_is_rejected_after_reuse() {
        let reg: Registry<u32, 1> = Registry::new();
        let old = reg.insert(1).unwrap();
        reg.remove(old).unwrap();
        let new = reg.insert(2).unwrap();
        assert_ne!(old, new);
        assert_eq!(reg.get(old).unwrap_err(), OsError::InvalidHandle);
        assert_eq!(reg.remove(old).unwrap_err(), OsError::InvalidHandle);
        assert_eq!(*reg.get(new).unwrap(), 2);
    }

    #[test]
    fn full_registry_reports_no_memory() {
        let reg: Registry<u8, 2> = Registry::new();
        reg.insert(1).unwrap();
        reg.insert(2).unwrap();
        assert_eq!(reg.insert(3).unwrap_err(), OsError::NoMemory);
    }

    #[test]
    fn out_of_range_handle_is_invalid() {
        let reg: Registry<u8, 2> = Registry::new();
        let bogus = NonZeroU32::new(0x0001_0009).unwrap();
        assert_eq!(reg.get(bogus).unwrap_err(), OsError::InvalidHandle);
        let no_slot = NonZeroU32::new(0x0001_0000).unwrap();
        assert_eq!(reg.remove(no_slot).unwrap_err(), OsError::InvalidHandle);
    }
}
