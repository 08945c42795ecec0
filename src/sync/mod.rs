//! Synchronization primitives.
//!
//! The manager itself is single-writer; diagnostic sinks and the dummy
//! device's heap memory are shared.

pub(crate) mod mutex;
