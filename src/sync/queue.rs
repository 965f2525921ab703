//! Bounded message queues
//!
//! A queue is a ring of fixed-size items plus two host mutexes used as
//! gates: `readable` is locked while the ring is empty and `writable` while
//! it is full. A receiver blocks on `readable`, a sender on `writable`, so
//! every wait (with or without a deadline) is a plain native lock and a
//! timed-out waiter is already off the host's wait queue when it returns.
//! The ring itself is only touched inside `critical_section::with`.
//!
//! Counting semaphores are queues with zero-sized items.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;

use critical_section::Mutex;

use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::port::{HostKernel, NativeMutex};
use crate::sync::{acquire, lookup, wait_for, SemaphoreHandle, SyncObject};
use crate::time::Wait;
use crate::types::Tick;

/// Queue handle, shares the handle space with semaphores
pub type QueueHandle = SemaphoreHandle;

struct Ring {
    buf: Vec<u8>,
    item_size: usize,
    capacity: usize,
    head: usize,
    len: usize,
}

impl Ring {
    fn item(&mut self, index: usize) -> &mut [u8] {
        let start = (index % self.capacity) * self.item_size;
        &mut self.buf[start..start + self.item_size]
    }

    fn push(&mut self, item: Option<&[u8]>, front: bool) {
        let index = if front {
            self.head = (self.head + self.capacity - 1) % self.capacity;
            self.head
        } else {
            self.head + self.len
        };
        let slot = self.item(index);
        match item {
            Some(item) => slot.copy_from_slice(item),
            None => slot.fill(0),
        }
        self.len += 1;
    }

    fn copy_front(&mut self, out: Option<&mut [u8]>) {
        let head = self.head;
        let size = self.item_size;
        let slot = self.item(head);
        if let Some(out) = out {
            out[..size].copy_from_slice(slot);
        }
    }

    fn pop(&mut self, out: Option<&mut [u8]>) {
        self.copy_front(out);
        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;
    }
}

/// Ring buffer with blocking gates
pub(crate) struct RawQueue {
    ring: Mutex<RefCell<Ring>>,
    item_size: usize,
    capacity: usize,
    readable: Box<dyn NativeMutex>,
    writable: Box<dyn NativeMutex>,
}

impl RawQueue {
    /// Queue of `capacity` items of `item_size` bytes, `initial` of them
    /// already present (zeroed)
    pub(crate) fn new(
        host: &dyn HostKernel,
        capacity: usize,
        item_size: usize,
        initial: usize,
    ) -> OsResult<Self> {
        if capacity == 0 || initial > capacity {
            return Err(OsError::InvalidParameter);
        }
        let bytes = capacity.checked_mul(item_size).ok_or(OsError::NoMemory)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes).map_err(|_| OsError::NoMemory)?;
        buf.resize(bytes, 0u8);

        let readable = host.mutex_new();
        let writable = host.mutex_new();
        if initial == 0 {
            readable.lock();
        }
        if initial == capacity {
            writable.lock();
        }

        Ok(RawQueue {
            ring: Mutex::new(RefCell::new(Ring {
                buf,
                item_size,
                capacity,
                head: 0,
                len: initial,
            })),
            item_size,
            capacity,
            readable,
            writable,
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn item_size(&self) -> usize {
        self.item_size
    }

    pub(crate) fn len(&self) -> usize {
        critical_section::with(|cs| self.ring.borrow_ref(cs).len)
    }

    /// Add one item, `None` adds a zeroed item
    ///
    /// Returns whether a receiver may have been woken.
    pub(crate) fn send(&self, item: Option<&[u8]>, wait: Wait, front: bool) -> OsResult<bool> {
        if item.is_some_and(|item| item.len() != self.item_size) {
            return Err(OsError::InvalidParameter);
        }
        loop {
            if !acquire(&*self.writable, wait) {
                return Err(wait.failure(OsError::Full));
            }
            let pushed = critical_section::with(|cs| {
                let mut ring = self.ring.borrow_ref_mut(cs);
                if ring.len == ring.capacity {
                    return None;
                }
                ring.push(item, front);
                Some(ring.len)
            });
            match pushed {
                Some(len) => {
                    if len < self.capacity {
                        self.writable.unlock();
                    }
                    let woke = len == 1;
                    if woke {
                        self.readable.unlock();
                    }
                    return Ok(woke);
                }
                // Emptied by a concurrent reset, the gate stays closed
                None if wait.is_poll() => return Err(OsError::Full),
                None => continue,
            }
        }
    }

    /// Remove the front item into `out`, `None` discards it
    ///
    /// Returns whether a sender may have been woken.
    pub(crate) fn receive(&self, mut out: Option<&mut [u8]>, wait: Wait) -> OsResult<bool> {
        self.check_out(&out)?;
        loop {
            if !acquire(&*self.readable, wait) {
                return Err(wait.failure(OsError::Empty));
            }
            let popped = critical_section::with(|cs| {
                let mut ring = self.ring.borrow_ref_mut(cs);
                if ring.len == 0 {
                    return None;
                }
                let was_full = ring.len == ring.capacity;
                ring.pop(out.as_deref_mut());
                Some((ring.len, was_full))
            });
            match popped {
                Some((len, was_full)) => {
                    if len > 0 {
                        self.readable.unlock();
                    }
                    if was_full {
                        self.writable.unlock();
                    }
                    return Ok(was_full);
                }
                None if wait.is_poll() => return Err(OsError::Empty),
                None => continue,
            }
        }
    }

    /// Copy the front item without removing it
    pub(crate) fn peek(&self, mut out: Option<&mut [u8]>, wait: Wait) -> OsResult<()> {
        self.check_out(&out)?;
        loop {
            if !acquire(&*self.readable, wait) {
                return Err(wait.failure(OsError::Empty));
            }
            let copied = critical_section::with(|cs| {
                let mut ring = self.ring.borrow_ref_mut(cs);
                if ring.len == 0 {
                    return false;
                }
                ring.copy_front(out.as_deref_mut());
                true
            });
            if copied {
                self.readable.unlock();
                return Ok(());
            }
            if wait.is_poll() {
                return Err(OsError::Empty);
            }
        }
    }

    /// Drop every queued item
    pub(crate) fn reset(&self) {
        critical_section::with(|cs| {
            let mut ring = self.ring.borrow_ref_mut(cs);
            ring.head = 0;
            ring.len = 0;
        });
        // Close the read gate, whoever holds it finds the ring empty
        let _ = self.readable.try_lock();
        self.writable.unlock();
    }

    fn check_out(&self, out: &Option<&mut [u8]>) -> OsResult<()> {
        match out {
            Some(out) if out.len() < self.item_size => Err(OsError::InvalidParameter),
            _ => Ok(()),
        }
    }
}

// ============ Public API ============

fn with_queue<R>(handle: QueueHandle, f: impl FnOnce(&RawQueue) -> OsResult<R>) -> OsResult<R> {
    let object = lookup(handle)?;
    f(object.as_queue()?)
}

/// Create a queue of `length` items of `item_size` bytes
///
/// # Returns
/// * `Err(OsError::InvalidParameter)` - `length` is 0
/// * `Err(OsError::NoMemory)` - Buffer or handle unavailable
pub fn create(length: usize, item_size: usize) -> OsResult<QueueHandle> {
    let host = kernel::host()?;
    let queue = RawQueue::new(host, length, item_size, 0)
        .map_err(|e| crate::os_err!(e, "queue create"))?;
    let handle = SemaphoreHandle::insert(SyncObject::Queue(queue))?;
    crate::debug!("queue {} created, {} x {} bytes", handle.raw(), length, item_size);
    Ok(handle)
}

/// Append an item, waiting up to `ticks` for space
pub fn send(handle: QueueHandle, item: &[u8], ticks: Tick) -> OsResult<()> {
    send_to_back(handle, item, ticks)
}

/// Append an item, waiting up to `ticks` for space
pub fn send_to_back(handle: QueueHandle, item: &[u8], ticks: Tick) -> OsResult<()> {
    let wait = wait_for(ticks)?;
    with_queue(handle, |q| q.send(Some(item), wait, false)).map(|_| ())
}

/// Prepend an item, waiting up to `ticks` for space
pub fn send_to_front(handle: QueueHandle, item: &[u8], ticks: Tick) -> OsResult<()> {
    let wait = wait_for(ticks)?;
    with_queue(handle, |q| q.send(Some(item), wait, true)).map(|_| ())
}

/// Take the front item into `out`, waiting up to `ticks` for one
pub fn receive(handle: QueueHandle, out: &mut [u8], ticks: Tick) -> OsResult<()> {
    let wait = wait_for(ticks)?;
    with_queue(handle, |q| q.receive(Some(out), wait)).map(|_| ())
}

/// Copy the front item into `out` without removing it
pub fn peek(handle: QueueHandle, out: &mut [u8], ticks: Tick) -> OsResult<()> {
    let wait = wait_for(ticks)?;
    with_queue(handle, |q| q.peek(Some(out), wait))
}

/// Append an item from an interrupt handler
///
/// Never blocks. Returns whether a waiting task may have been woken.
pub fn send_from_isr(handle: QueueHandle, item: &[u8]) -> OsResult<bool> {
    with_queue(handle, |q| q.send(Some(item), Wait::Poll, false))
}

/// Take the front item from an interrupt handler
///
/// Never blocks. Returns whether a waiting task may have been woken.
pub fn receive_from_isr(handle: QueueHandle, out: &mut [u8]) -> OsResult<bool> {
    with_queue(handle, |q| q.receive(Some(out), Wait::Poll))
}

/// Number of queued items
pub fn messages_waiting(handle: QueueHandle) -> OsResult<usize> {
    with_queue(handle, |q| Ok(q.len()))
}

/// Number of free item slots
pub fn spaces_available(handle: QueueHandle) -> OsResult<usize> {
    with_queue(handle, |q| Ok(q.capacity() - q.len()))
}

/// Item size the queue was created with
pub fn item_size(handle: QueueHandle) -> OsResult<usize> {
    with_queue(handle, |q| Ok(q.item_size()))
}

/// Drop every queued item
pub fn reset(handle: QueueHandle) -> OsResult<()> {
    with_queue(handle, |q| {
        q.reset();
        Ok(())
    })
}

/// Delete a queue
pub fn delete(handle: QueueHandle) -> OsResult<()> {
    crate::sync::delete(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(capacity: usize, item_size: usize) -> Ring {
        Ring {
            buf: alloc::vec![0; capacity * item_size],
            item_size,
            capacity,
            head: 0,
            len: 0,
        }
    }

    #[test]
    fn ring_fifo_order() {
        let mut r = ring(3, 1);
        r.push(Some(&[1]), false);
        r.push(Some(&[2]), false);
        let mut out = [0u8; 1];
        r.pop(Some(&mut out));
        assert_eq!(out, [1]);
        r.push(Some(&[3]), false);
        r.push(Some(&[4]), false);
        assert_eq!(r.len, 3);
        for expected in [2, 3, 4] {
            r.pop(Some(&mut out));
            assert_eq!(out, [expected]);
        }
        assert_eq!(r.len, 0);
    }

    #[test]
    fn ring_push_front_wraps() {
        let mut r = ring(2, 2);
        r.push(Some(&[1, 1]), false);
        r.push(Some(&[2, 2]), true);
        let mut out = [0u8; 2];
        r.pop(Some(&mut out));
        assert_eq!(out, [2, 2]);
        r.pop(Some(&mut out));
        assert_eq!(out, [1, 1]);
    }

    #[test]
    fn zero_sized_items_only_count() {
        let mut r = ring(5, 0);
        r.push(None, false);
        r.push(None, false);
        r.pop(None);
        assert_eq!(r.len, 1);
    }
}
