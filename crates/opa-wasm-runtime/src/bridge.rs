//! JSON transport across the host/guest boundary.
//!
//! Values cross linear memory as JSON text. Loading asks the guest
//! allocator for a buffer, copies the text in and has the guest parse it;
//! dumping has the guest serialize a value into a null-terminated string
//! that the host reads back.

use crate::host::HostState;
use opa_core::{Address, Error, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::trace;
use wasmtime::{AsContextMut, Memory, Trap, TypedFunc, WasmParams, WasmResults};

/// Converts a failed guest call into the structured error it carries.
///
/// Host callbacks raise [`Error`]s inside a `wasmtime::Error`; those are
/// recovered as-is. Anything else is a trap.
pub(crate) fn guest_error(err: wasmtime::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(err) => err,
        Err(err) => {
            let message = err
                .downcast_ref::<Trap>()
                .map_or_else(|| format!("{err:#}"), ToString::to_string);
            Error::Trap { message }
        }
    }
}

/// Calls a guest export, mapping failures through [`guest_error`].
pub(crate) fn invoke<P, R>(
    store: impl AsContextMut<Data = HostState>,
    func: &TypedFunc<P, R>,
    params: P,
) -> Result<R>
where
    P: WasmParams,
    R: WasmResults,
{
    func.call(store, params).map_err(guest_error)
}

/// Encodes a value as JSON text.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if serde rejects the value.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::serialization("failed to encode value as JSON", e))
}

/// Returns the bytes of the null-terminated run starting at `address`.
fn c_bytes(data: &[u8], address: Address) -> Result<&[u8]> {
    let tail = data.get(address.offset()..).ok_or_else(|| Error::Trap {
        message: format!("address {address} is outside linear memory"),
    })?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::Serialization {
            message: format!("string at {address} is not null-terminated"),
            source: None,
        })?;
    Ok(&tail[..len])
}

/// Decodes a null-terminated diagnostic string.
///
/// Invalid UTF-8 is replaced rather than rejected; the text only ever feeds
/// logs and abort messages.
pub(crate) fn decode_c_string(data: &[u8], address: Address) -> Result<String> {
    c_bytes(data, address).map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

/// Guest exports needed to move JSON values in and out of linear memory.
#[derive(Clone)]
pub(crate) struct MemoryBridge {
    memory: Memory,
    malloc: TypedFunc<i32, i32>,
    json_parse: TypedFunc<(i32, i32), i32>,
    json_dump: TypedFunc<i32, i32>,
}

impl std::fmt::Debug for MemoryBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBridge").finish_non_exhaustive()
    }
}

impl MemoryBridge {
    pub(crate) const fn new(
        memory: Memory,
        malloc: TypedFunc<i32, i32>,
        json_parse: TypedFunc<(i32, i32), i32>,
        json_dump: TypedFunc<i32, i32>,
    ) -> Self {
        Self {
            memory,
            malloc,
            json_parse,
            json_dump,
        }
    }

    /// Serializes `value` into guest memory and returns the parsed value's
    /// address.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if the value cannot be encoded,
    /// [`Error::Parse`] if the guest rejects the text.
    pub(crate) fn load_json<T: Serialize + ?Sized>(
        &self,
        store: impl AsContextMut<Data = HostState>,
        value: &T,
    ) -> Result<Address> {
        let bytes = encode(value)?;
        self.load_bytes(store, &bytes)
    }

    /// Copies pre-encoded JSON text into guest memory and has the guest
    /// parse it.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if the text exceeds the 32-bit address space,
    /// [`Error::Parse`] if the guest parser returns the null address.
    pub(crate) fn load_bytes(
        &self,
        mut store: impl AsContextMut<Data = HostState>,
        bytes: &[u8],
    ) -> Result<Address> {
        let length = i32::try_from(bytes.len()).map_err(|_| Error::Serialization {
            message: format!("{} byte payload exceeds the guest address space", bytes.len()),
            source: None,
        })?;

        let raw = Address::from_raw(invoke(&mut store, &self.malloc, length)?);
        self.memory
            .write(&mut store, raw.offset(), bytes)
            .map_err(|e| Error::Trap {
                message: format!("writing {} bytes at {raw}: {e}", bytes.len()),
            })?;

        let parsed = Address::from_raw(invoke(&mut store, &self.json_parse, (raw.as_raw(), length))?);
        if parsed.is_null() {
            return Err(Error::Parse {
                address: raw,
                length: bytes.len(),
            });
        }

        trace!(raw = %raw, parsed = %parsed, length = bytes.len(), "Loaded JSON into guest");
        Ok(parsed)
    }

    /// Reads the guest value at `address` back as JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if the dumped text is unterminated or not
    /// valid UTF-8 JSON.
    pub(crate) fn dump_json(
        &self,
        mut store: impl AsContextMut<Data = HostState>,
        address: Address,
    ) -> Result<Value> {
        let text = Address::from_raw(invoke(&mut store, &self.json_dump, address.as_raw())?);
        let bytes = c_bytes(self.memory.data(&store), text)?;
        trace!(value = %address, text = %text, length = bytes.len(), "Dumped JSON from guest");
        serde_json::from_slice(bytes)
            .map_err(|e| Error::serialization(format!("guest produced invalid JSON at {text}"), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_bytes_stops_at_nul() {
        let data = b"\0\0{\"a\":1}\0junk";
        assert_eq!(c_bytes(data, Address::new(2)).unwrap(), b"{\"a\":1}");
        assert_eq!(c_bytes(data, Address::new(0)).unwrap(), b"");
    }

    #[test]
    fn test_c_bytes_unterminated() {
        let err = c_bytes(b"abc", Address::new(0)).unwrap_err();
        assert!(err.is_serialization_error());
    }

    #[test]
    fn test_c_bytes_out_of_bounds() {
        let err = c_bytes(b"abc\0", Address::new(64)).unwrap_err();
        assert!(matches!(err, Error::Trap { .. }));
    }

    #[test]
    fn test_decode_c_string_is_lossy() {
        let data = b"bad \xff byte\0";
        assert_eq!(
            decode_c_string(data, Address::NULL).unwrap(),
            "bad \u{fffd} byte"
        );
    }

    #[test]
    fn test_encode_rejects_non_string_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(vec![1_u8], 1);
        assert!(encode(&map).unwrap_err().is_serialization_error());
    }

    #[test]
    fn test_guest_error_recovers_host_error() {
        let err = wasmtime::Error::new(Error::GuestAbort {
            message: "boom".to_string(),
        })
        .context("while evaluating");
        assert!(guest_error(err).is_guest_abort());
    }

    #[test]
    fn test_guest_error_wraps_traps() {
        let err = wasmtime::Error::new(Trap::UnreachableCodeReached);
        assert!(matches!(guest_error(err), Error::Trap { .. }));
    }
}
