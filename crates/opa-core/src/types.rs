//! Strong domain types for the host/guest boundary.
//!
//! Guest functions traffic in raw `i32` values; wrapping them in newtypes
//! keeps addresses, builtin ids, and entrypoint ids from being mixed up on
//! the host side.
//!
//! # Examples
//!
//! ```
//! use opa_core::{Address, BuiltinId};
//!
//! let addr = Address::from_raw(1024);
//! assert_eq!(addr.offset(), 1024);
//! assert!(Address::NULL.is_null());
//!
//! let id = BuiltinId::from_raw(3);
//! assert_eq!(id.get(), 3);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Guest-relative byte offset into linear memory.
///
/// Carries no type information. The zero address is reserved: guests
/// return it to signal an absent value or a failed operation.
///
/// # Examples
///
/// ```
/// use opa_core::Address;
///
/// let addr = Address::new(64);
/// assert_eq!(addr.as_raw(), 64);
/// assert_eq!(addr.to_string(), "0x00000040");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u32);

impl Address {
    /// The reserved "absent/failed" address.
    pub const NULL: Self = Self(0);

    /// Creates an address from an unsigned offset.
    #[inline]
    #[must_use]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Creates an address from the `i32` a guest function returned.
    ///
    /// Wasm32 pointers are unsigned; the bits are reinterpreted as-is.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw as u32)
    }

    /// Returns the `i32` form guest functions expect.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_raw(self) -> i32 {
        self.0 as i32
    }

    /// Returns the offset as a host index into the memory slice.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for the reserved null address.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Numeric builtin id assigned by a policy module.
///
/// Ids are only meaningful for the module instance that enumerated them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuiltinId(u32);

impl BuiltinId {
    /// Creates a builtin id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Creates a builtin id from the `i32` a guest passed to a dispatch hook.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw as u32)
    }

    /// Returns the numeric id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BuiltinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric entrypoint id selecting which compiled rule a guest evaluates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntrypointId(u32);

impl EntrypointId {
    /// Creates an entrypoint id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the numeric id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the `i32` form guest functions expect.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_raw(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for EntrypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upper bound on linear memory a session may grow to.
///
/// Stored in megabytes; wasm32 cannot address more than 4 GiB.
///
/// # Examples
///
/// ```
/// use opa_core::MemoryLimit;
///
/// let limit = MemoryLimit::from_mb(64).unwrap();
/// assert_eq!(limit.bytes(), 64 * 1024 * 1024);
/// assert!(MemoryLimit::from_mb(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct MemoryLimit(usize);

impl MemoryLimit {
    /// Largest limit expressible for a wasm32 memory.
    pub const MAX_MB: usize = 4096;

    /// Default limit: 256MB.
    pub const DEFAULT_MB: usize = 256;

    /// Creates a memory limit from megabytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if `mb` is zero or above [`Self::MAX_MB`].
    pub fn from_mb(mb: usize) -> Result<Self> {
        if mb == 0 || mb > Self::MAX_MB {
            return Err(Error::ConfigError {
                message: format!(
                    "memory limit must be between 1 and {} MB, got {mb}",
                    Self::MAX_MB
                ),
            });
        }
        Ok(Self(mb))
    }

    /// Returns the limit in megabytes.
    #[inline]
    #[must_use]
    pub const fn megabytes(self) -> usize {
        self.0
    }

    /// Returns the limit in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> usize {
        self.0 * 1024 * 1024
    }
}

impl Default for MemoryLimit {
    fn default() -> Self {
        Self(Self::DEFAULT_MB)
    }
}

impl TryFrom<usize> for MemoryLimit {
    type Error = Error;

    fn try_from(mb: usize) -> Result<Self> {
        Self::from_mb(mb)
    }
}

impl From<MemoryLimit> for usize {
    fn from(limit: MemoryLimit) -> Self {
        limit.0
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MB", self.0)
    }
}
