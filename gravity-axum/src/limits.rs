//! Request body size limits.
//!
//! The body is buffered in full before binding, so every controller reads it
//! under a limit. The default of 4 MiB suits ordinary JSON APIs.

/// Default maximum request body size (4 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Configuration for request body size limits.
///
/// # Example
///
/// ```rust
/// use gravity_axum::BodyLimits;
///
/// // Use default 4 MiB limit
/// let limits = BodyLimits::default();
///
/// // Custom 16 MiB limit for large payloads
/// let limits = BodyLimits::new(16 * 1024 * 1024);
///
/// // No limit (not recommended for production)
/// let limits = BodyLimits::unlimited();
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyLimits {
    /// `None` means unlimited.
    max_body_size: Option<usize>,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_body_size: Some(DEFAULT_MAX_BODY_SIZE),
        }
    }
}

impl BodyLimits {
    pub fn new(max_body_size: usize) -> Self {
        Self {
            max_body_size: Some(max_body_size),
        }
    }

    /// Create limits with no maximum.
    ///
    /// A client can then exhaust server memory with one large request; only
    /// use this behind a proxy that enforces its own limit.
    pub fn unlimited() -> Self {
        Self {
            max_body_size: None,
        }
    }

    /// Returns the maximum body size, or `None` if unlimited.
    pub fn max_body_size(&self) -> Option<usize> {
        self.max_body_size
    }

    /// Check a declared or observed body size against the limit.
    ///
    /// On failure returns the limit that was exceeded.
    pub fn check_size(&self, size: usize) -> Result<(), usize> {
        match self.max_body_size {
            Some(max) if size > max => Err(max),
            _ => Ok(()),
        }
    }
}
