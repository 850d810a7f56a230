//! Store resource limits.

use opa_core::MemoryLimit;
use tracing::{trace, warn};
use wasmtime::ResourceLimiter;

/// Caps linear memory growth for one session's store.
///
/// Applies to the host-created shared memory as well as anything the guest
/// grows afterwards. Refused growth surfaces to the guest as
/// `memory.grow` returning -1.
#[derive(Debug, Clone)]
pub(crate) struct MemoryLimiter {
    max_bytes: usize,
    peak_bytes: usize,
}

impl MemoryLimiter {
    pub(crate) const fn new(limit: MemoryLimit) -> Self {
        Self {
            max_bytes: limit.bytes(),
            peak_bytes: 0,
        }
    }

    /// Largest memory size granted so far.
    pub(crate) const fn peak_bytes(&self) -> usize {
        self.peak_bytes
    }
}

impl ResourceLimiter for MemoryLimiter {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired > self.max_bytes {
            warn!(
                current,
                desired,
                limit = self.max_bytes,
                "Refusing linear memory growth past limit"
            );
            return Ok(false);
        }
        trace!("Memory growing: {} -> {} bytes", current, desired);
        self.peak_bytes = self.peak_bytes.max(desired);
        Ok(true)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        _desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    #[test]
    fn test_growth_within_limit() {
        let mut limiter = MemoryLimiter::new(MemoryLimit::from_mb(2).unwrap());
        assert!(limiter.memory_growing(0, MB, None).unwrap());
        assert!(limiter.memory_growing(MB, 2 * MB, None).unwrap());
        assert_eq!(limiter.peak_bytes(), 2 * MB);
    }

    #[test]
    fn test_growth_past_limit_refused() {
        let mut limiter = MemoryLimiter::new(MemoryLimit::from_mb(1).unwrap());
        assert!(!limiter.memory_growing(0, MB + 1, None).unwrap());
        assert_eq!(limiter.peak_bytes(), 0);
    }
}
