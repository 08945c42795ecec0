//! Coded diagnostics for allocator and transfer misuse.
//!
//! This module provides:
//! - **Runtime diagnostics**: allocator-aware messages with codes
//! - **Sinks**: observe what a manager reported (tests, tooling overlays)
//! - **Strict mode**: optional panic-on-error, turning misuse into hard assertions
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                              |
//! |-------|--------------------------------------|
//! | GP0xx | Page and device memory               |
//! | GP1xx | Limits exceeded (request was clamped) |
//! | GP2xx | Handle and lifecycle misuse          |
//! | GP3xx | Transfer ordering hints              |
//! | GP9xx | Internal errors                      |

pub mod emit;
pub mod kind;
pub mod strict;

pub use emit::{
    emit, emit_with_context, is_suppressed, set_verbose, suppress_diagnostics, CollectedDiagnostic,
    CollectingSink, DiagnosticSink,
};
pub use kind::{Diagnostic, DiagnosticKind};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};

pub use kind::{GP001, GP002, GP101, GP102, GP103, GP104, GP201, GP202, GP203, GP301, GP302, GP901};
