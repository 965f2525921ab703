//! Task record definition
//!
//! The shim's bookkeeping for one task it created: identity, mapped
//! priority, name and the stack it handed to the host.

use alloc::boxed::Box;

use heapless::String;

use crate::config::CFG_MAX_NAME_LEN;
use crate::types::{HostPrio, TaskFn, TaskId};

/// Bounded task or timer name
pub type Name = String<CFG_MAX_NAME_LEN>;

/// Copy `name`, truncating on a character boundary to fit
pub fn bounded_name(name: &str) -> Name {
    let mut out = Name::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Stack memory of a task
pub enum TaskStack {
    /// Allocated by the shim, freed when the record is replaced
    Owned(Box<[u8]>),
    /// Supplied by the caller, who keeps ownership
    Borrowed(&'static mut [u8]),
}

impl TaskStack {
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        match self {
            TaskStack::Owned(buf) => buf.as_mut_ptr(),
            TaskStack::Borrowed(buf) => buf.as_mut_ptr(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TaskStack::Owned(buf) => buf.len(),
            TaskStack::Borrowed(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Task record
pub struct TaskRecord {
    /// Host thread id, negative until the host has accepted the thread
    pub id: TaskId,
    pub name: Name,
    /// Host priority after mapping
    pub priority: HostPrio,
    pub stack: TaskStack,
    pub entry: TaskFn,
    /// Entry argument, kept as an address so the record is `Send`
    pub args: usize,
    /// Cleared when the task terminates. The record and its stack stay
    /// until the slot is handed to a new task.
    pub alive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_truncated() {
        assert_eq!(bounded_name("idle").as_str(), "idle");
        let long = bounded_name("a-task-name-that-is-too-long");
        assert_eq!(long.len(), CFG_MAX_NAME_LEN);
        assert_eq!(long.as_str(), "a-task-name-that");
    }

    #[test]
    fn truncation_keeps_char_boundaries() {
        // 8 two-byte characters fill the name exactly, the ninth is dropped
        let name = bounded_name("ééééééééé");
        assert_eq!(name.chars().count(), 8);
    }
}
