//! Public API for gpupages.
//!
//! This module contains all user-facing types and functions.
//! Most users should only interact with types from this module.

pub mod config;
pub mod handle;
pub mod manager;
pub mod scope;
pub mod stats;
