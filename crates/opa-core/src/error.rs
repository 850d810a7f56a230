//! Error types for hosting compiled policies.
//!
//! Every failure that can cross the host/guest boundary is one variant of
//! [`Error`]. Errors raised inside host callbacks travel through the guest
//! as a `wasmtime::Error` and are recovered by downcasting, so callers see
//! the same structured variant regardless of where it originated.
//!
//! # Examples
//!
//! ```
//! use opa_core::{Error, Result};
//!
//! fn resolve(id: u32) -> Result<&'static str> {
//!     Err(Error::NotImplemented { id, name: None })
//! }
//!
//! let err = resolve(7).unwrap_err();
//! assert!(err.is_not_implemented());
//! assert_eq!(err.to_string(), "builtin not implemented: id 7");
//! ```

use crate::Address;
use thiserror::Error;

/// Main error type for policy hosting.
///
/// All four boundary failures (serialization, guest parse rejection,
/// unimplemented builtin, guest abort) terminate only the call that raised
/// them; the session stays usable.
#[derive(Error, Debug)]
pub enum Error {
    /// A value could not be encoded for, or decoded from, linear memory.
    ///
    /// Raised when host serialization fails, when a payload does not fit
    /// the 32-bit guest address space, or when text dumped by the guest
    /// is not valid UTF-8 JSON.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure
        message: String,
        /// Underlying serde error
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The guest parser rejected bytes written by the host.
    ///
    /// Signaled by the guest returning the null address from its parse
    /// export.
    #[error("guest failed to parse {length} bytes of JSON at {address}")]
    Parse {
        /// Address of the raw buffer handed to the guest
        address: Address,
        /// Length of the raw buffer in bytes
        length: usize,
    },

    /// The guest requested a builtin the host does not implement.
    #[error("builtin not implemented: {}", describe_builtin(*.id, .name.as_deref()))]
    NotImplemented {
        /// Numeric builtin id as passed by the guest
        id: u32,
        /// Resolved builtin name, when the module's own table knows the id
        name: Option<String>,
    },

    /// The guest aborted evaluation through its abort import.
    #[error("guest aborted: {message}")]
    GuestAbort {
        /// Decoded diagnostic message from guest memory
        message: String,
    },

    /// A builtin was invoked with the wrong number of arguments.
    #[error("builtin '{name}' expects {expected} argument(s), got {actual}")]
    BuiltinArity {
        /// Builtin name
        name: String,
        /// Registered arity
        expected: usize,
        /// Number of arguments the guest passed
        actual: usize,
    },

    /// A builtin rejected its arguments while strict builtin errors are on.
    #[error("builtin '{name}' failed: {message}")]
    BuiltinFailed {
        /// Builtin name
        name: String,
        /// Failure description from the implementation
        message: String,
    },

    /// A guest export is missing or has an unexpected signature.
    #[error("policy module export '{name}' unavailable: {message}")]
    MissingExport {
        /// Export name
        name: String,
        /// Lookup failure details
        message: String,
    },

    /// Engine, compilation, linking, or instantiation failure.
    #[error("WASM error: {message}")]
    WasmError {
        /// Description of the failure
        message: String,
    },

    /// The guest trapped for a reason other than an explicit abort.
    #[error("guest trapped: {message}")]
    Trap {
        /// Trap description
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },
}

fn describe_builtin(id: u32, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{name} (id {id})"),
        None => format!("id {id}"),
    }
}

impl Error {
    /// Creates a serialization error wrapping a serde failure.
    #[must_use]
    pub fn serialization(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns `true` if this is a serialization error.
    #[must_use]
    pub const fn is_serialization_error(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Returns `true` if the guest parser rejected host bytes.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Returns `true` if a builtin had no host implementation.
    ///
    /// # Examples
    ///
    /// ```
    /// use opa_core::Error;
    ///
    /// let err = Error::NotImplemented { id: 3, name: Some("glob.match".into()) };
    /// assert!(err.is_not_implemented());
    /// assert!(err.to_string().contains("glob.match (id 3)"));
    /// ```
    #[must_use]
    pub const fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }

    /// Returns `true` if the guest aborted evaluation.
    #[must_use]
    pub const fn is_guest_abort(&self) -> bool {
        matches!(self, Self::GuestAbort { .. })
    }

    /// Returns `true` for builtin arity or strict-mode failures.
    #[must_use]
    pub const fn is_builtin_error(&self) -> bool {
        matches!(self, Self::BuiltinArity { .. } | Self::BuiltinFailed { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// Returns `true` if guest heap state may be inconsistent after this error.
    ///
    /// Aborts and traps stop the guest mid-evaluation; callers should
    /// re-establish data before trusting further evaluations.
    #[must_use]
    pub const fn taints_heap(&self) -> bool {
        matches!(self, Self::GuestAbort { .. } | Self::Trap { .. })
    }
}

/// Result type alias for policy hosting operations.
pub type Result<T> = std::result::Result<T, Error>;
