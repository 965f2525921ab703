//! Core shim modules
//!
//! Configuration, errors, the host binding, handle registry, task and
//! time management, and critical sections.

pub mod config;
pub mod critical;
pub mod error;
pub mod kernel;
pub mod prio;
pub mod registry;
pub mod task;
pub mod time;
pub mod types;
