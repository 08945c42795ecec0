//! Diagnostic emission backend.
//!
//! Diagnostics always go to the `log` crate. With the `diagnostics` feature
//! they are also printed to stderr in a rustc-like layout. Managers may carry
//! an additional [`DiagnosticSink`] to observe what they reported.

use std::sync::atomic::{AtomicBool, Ordering};

use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::{should_panic, should_panic_on_warning};
use crate::sync::mutex::Mutex;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Global flag to enable verbose diagnostics.
static VERBOSE_DIAGNOSTICS: AtomicBool = AtomicBool::new(false);

/// Suppress all diagnostic output.
///
/// Sinks still receive diagnostics and strict mode still applies.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Enable verbose diagnostic output (notes and help lines).
pub fn set_verbose(verbose: bool) {
    VERBOSE_DIAGNOSTICS.store(verbose, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Emit a diagnostic.
pub fn emit(diag: &Diagnostic) {
    emit_with_context(diag, "");
}

/// Emit a diagnostic with additional runtime context.
///
/// Panics afterwards when the strict mode asks for it.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    if !is_suppressed() {
        emit_to_log(diag, context);

        #[cfg(feature = "diagnostics")]
        emit_to_stderr(diag, context);
    }

    let fatal = match diag.kind {
        DiagnosticKind::Error => should_panic(),
        DiagnosticKind::Warning => should_panic_on_warning(),
        DiagnosticKind::Note => false,
    };
    if fatal {
        panic!(
            "[gpupages][{}] {}\nContext: {}\nStrict mode enabled - diagnostic is fatal.",
            diag.code, diag.message, context
        );
    }
}

/// Internal: forward to the `log` crate.
fn emit_to_log(diag: &Diagnostic, context: &str) {
    let verbose = VERBOSE_DIAGNOSTICS.load(Ordering::Relaxed);

    match diag.kind {
        DiagnosticKind::Error => log::error!("[{}] {} ({})", diag.code, diag.message, context),
        DiagnosticKind::Warning => log::warn!("[{}] {} ({})", diag.code, diag.message, context),
        DiagnosticKind::Note => log::info!("[{}] {} ({})", diag.code, diag.message, context),
    }

    if verbose {
        if let Some(note) = diag.note {
            log::info!("  note: {}", note);
        }
        if let Some(help) = diag.help {
            log::info!("  help: {}", help);
        }
    }
}

/// Internal: emit to stderr.
#[cfg(feature = "diagnostics")]
fn emit_to_stderr(diag: &Diagnostic, context: &str) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(
        stderr,
        "[gpupages][{}] {}: {}",
        diag.code,
        diag.kind.prefix(),
        diag.message
    );

    if !context.is_empty() {
        let _ = writeln!(stderr, "  context: {}", context);
    }
    if let Some(note) = diag.note {
        let _ = writeln!(stderr, "  note: {}", note);
    }
    if let Some(help) = diag.help {
        let _ = writeln!(stderr, "  help: {}", help);
    }

    let _ = writeln!(stderr);
}

/// A diagnostic sink for custom output.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a diagnostic together with its runtime context.
    fn emit(&self, diag: &Diagnostic, context: &str);
}

/// A diagnostic captured by [`CollectingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedDiagnostic {
    /// The predefined diagnostic.
    pub diagnostic: Diagnostic,
    /// Runtime context (resource name, requested values, ...).
    pub context: String,
}

/// A simple sink that collects diagnostics.
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<CollectedDiagnostic>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected diagnostics.
    pub fn diagnostics(&self) -> Vec<CollectedDiagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Collected diagnostics carrying the given code.
    pub fn with_code(&self, code: &str) -> Vec<CollectedDiagnostic> {
        self.diagnostics
            .lock()
            .iter()
            .filter(|d| d.diagnostic.code == code)
            .cloned()
            .collect()
    }

    /// Clear collected diagnostics.
    pub fn clear(&self) {
        self.diagnostics.lock().clear();
    }

    /// Check if any errors were collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .iter()
            .any(|d| d.diagnostic.is_error())
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .lock()
            .iter()
            .any(|d| d.diagnostic.kind == DiagnosticKind::Warning)
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diag: &Diagnostic, context: &str) {
        self.diagnostics.lock().push(CollectedDiagnostic {
            diagnostic: diag.clone(),
            context: context.to_string(),
        });
    }
}
