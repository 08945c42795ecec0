//! Diagnostic kinds and the predefined diagnostic table.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - an invariant was broken by the caller.
    Error,
    /// A warning - the request was corrected or is probably a mistake.
    Warning,
    /// Additional context about another diagnostic.
    Note,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `GP0xx` - Page and device memory issues
/// - `GP1xx` - Texture and sampler limit violations (requests are clamped)
/// - `GP2xx` - Handle and lifecycle misuse
/// - `GP3xx` - Transfer ordering hints
/// - `GP9xx` - Internal errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "GP101").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new note diagnostic.
    pub const fn note(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Note,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}

// =============================================================================
// Predefined diagnostics (GP0xx - Pages and device memory)
// =============================================================================

/// GP001: The device could not back a new page.
pub const GP001: Diagnostic = Diagnostic::error(
    "GP001",
    "device memory exhausted while creating a page"
).with_note("the device abstraction refused a heap allocation for a new page")
 .with_help("free the scene scope, lower page sizes in ManagerConfig, or retry with a smaller request");

/// GP002: A resource did not fit the configured page size.
pub const GP002: Diagnostic = Diagnostic::note(
    "GP002",
    "resource larger than the configured page size received a dedicated page"
).with_note("the page is sized to the resource and will rarely be shared")
 .with_help("raise the page size in ManagerConfig if this happens often");

// =============================================================================
// Predefined diagnostics (GP1xx - Device limits)
// =============================================================================

/// GP101: Texture extent exceeds the device limit.
pub const GP101: Diagnostic = Diagnostic::warning(
    "GP101",
    "texture extent exceeds device limits and was clamped"
).with_note("width, height or depth was larger than the device maximum for this dimension")
 .with_help("downscale the source asset or pick a smaller render target");

/// GP102: Too many mip levels requested.
pub const GP102: Diagnostic = Diagnostic::warning(
    "GP102",
    "texture mip level count exceeds the full mip chain and was clamped"
).with_note("a mip chain ends at a 1x1x1 level")
 .with_help("request 0 mip levels to get the full chain");

/// GP103: Too many array layers requested.
pub const GP103: Diagnostic = Diagnostic::warning(
    "GP103",
    "texture array size exceeds device limits and was clamped"
).with_help("split the array across several textures");

/// GP104: Sampler anisotropy outside the supported range.
pub const GP104: Diagnostic = Diagnostic::warning(
    "GP104",
    "sampler anisotropy outside the device range was clamped"
).with_note("anisotropy must be between 1 and the device maximum")
 .with_help("query DeviceLimits::max_anisotropy before building sampler descriptors");

// =============================================================================
// Predefined diagnostics (GP2xx - Handles and lifecycle)
// =============================================================================

/// GP201: Operation applied to the wrong kind of resource.
pub const GP201: Diagnostic = Diagnostic::error(
    "GP201",
    "operation applied to the wrong resource kind"
).with_note("the handle's kind or CPU access flags do not allow this operation")
 .with_help("allocate the resource with CPU_WRITE/CPU_READ (or their _ONCE variants) for staged access");

/// GP202: Staging memory of a once-resource was already released.
pub const GP202: Diagnostic = Diagnostic::error(
    "GP202",
    "staging memory of a once-resource used after its transfer"
).with_note("CPU_WRITE_ONCE / CPU_READ_ONCE staging is released after one transfer")
 .with_help("use CPU_WRITE / CPU_READ for resources that are staged repeatedly");

/// GP203: Handle outlived its scope.
pub const GP203: Diagnostic = Diagnostic::error(
    "GP203",
    "resource handle used after its scope was freed"
).with_note("free_memory() invalidates every handle issued in that scope")
 .with_help("re-allocate the resource after loading the new scene");

// =============================================================================
// Predefined diagnostics (GP3xx - Transfer ordering)
// =============================================================================

/// GP301: Upload of a resource whose staging memory was never written.
pub const GP301: Diagnostic = Diagnostic::warning(
    "GP301",
    "uploading a resource whose staging memory was never written"
).with_note("the device copy will transfer whatever the staging page holds")
 .with_help("call update_buffer()/update_texture() before upload_resources()");

/// GP302: CPU read without a pending readback.
pub const GP302: Diagnostic = Diagnostic::warning(
    "GP302",
    "reading a resource with no readback recorded since its last read"
).with_note("the readback page may hold stale data")
 .with_help("call readback_resources() and wait for the GPU before read_buffer()/read_texture()");

// =============================================================================
// Predefined diagnostics (GP9xx - Internal)
// =============================================================================

/// GP901: Internal allocator error.
pub const GP901: Diagnostic = Diagnostic::error(
    "GP901",
    "internal page bookkeeping error"
).with_note("this indicates a bug in gpupages")
 .with_help("please report this issue with the diagnostic context");
