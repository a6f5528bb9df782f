//! Unified error types for the cgthrottle workspace.
//!
//! Every failure in the configuration-to-`io.max` pipeline maps onto one
//! [`ThrottleError`] variant. The applier wraps failures in
//! [`ThrottleError::Entry`] to record which class, entry, and field they
//! came from; [`ThrottleError::root`] recovers the original variant.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// The configuration document is not valid JSON for the expected shape.
    #[error("error parsing JSON: {source}")]
    ConfigParse {
        /// Underlying deserialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The configuration is structurally empty somewhere.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the missing piece.
        message: String,
    },

    /// A device path could not be statted.
    #[error("device {path} not found: {source}")]
    DeviceNotFound {
        /// Device path as written in the configuration.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A throttle value is not a valid quantity.
    #[error("invalid value {value:?}: {source}")]
    InvalidValue {
        /// The offending text, trimmed.
        value: String,
        /// Why the text was rejected.
        source: QuantityError,
    },

    /// The target cgroup directory does not exist.
    #[error("cgroup path does not exist: {path}")]
    CgroupNotFound {
        /// Cgroup directory that was requested.
        path: PathBuf,
    },

    /// The `io.max` control file could not be read, locked, or written.
    #[error("control file {path}: {source}")]
    ControlFile {
        /// Path of the control file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A failure raised while processing one quota entry.
    #[error("{class}[{index}] {field}: {source}")]
    Entry {
        /// Class label the entry belongs to.
        class: String,
        /// Position of the entry inside its class.
        index: usize,
        /// Field or device being processed.
        field: String,
        /// The wrapped failure.
        source: Box<ThrottleError>,
    },

    /// The operation needs a platform feature this build lacks.
    #[error("{operation} requires Linux")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },
}

impl ThrottleError {
    /// Returns the innermost error, skipping [`ThrottleError::Entry`] context.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Entry { source, .. } = current {
            current = source;
        }
        current
    }

    /// Wraps `self` with the class, entry index, and field it relates to.
    #[must_use]
    pub fn in_entry(self, class: &str, index: usize, field: impl Into<String>) -> Self {
        Self::Entry {
            class: class.to_owned(),
            index,
            field: field.into(),
            source: Box::new(self),
        }
    }
}

/// Reasons a quantity string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Nothing left after trimming whitespace.
    #[error("empty value not allowed")]
    Empty,

    /// The text does not have the `<number><suffix>` shape.
    #[error("quantities must match the regular expression '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$'")]
    Format,

    /// The number is followed by a suffix that is not recognized.
    #[error("unable to parse quantity's suffix {0:?}")]
    Suffix(String),

    /// Throttle quantities cannot be below zero.
    #[error("negative quantities are not allowed")]
    Negative,

    /// The scaled value does not fit in 64 bits.
    #[error("quantity exceeds the 64-bit range")]
    Overflow,
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ThrottleError>;
