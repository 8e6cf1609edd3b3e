//! Floating-point control state
//!
//! Producers may change rounding or exception masks and forget to put them
//! back. [`FpGuard`] captures the control register on entry and writes it
//! back on drop, which also runs while a panic unwinds.
//!
//! x86 and x86_64 save MXCSR, aarch64 saves FPCR. On other targets capture
//! returns zero and restore does nothing.

/// Raw floating-point control/status bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpState {
    bits: u64,
}

impl FpState {
    /// Read the current thread's control register
    pub fn capture() -> Self {
        Self { bits: arch::read() }
    }

    /// Build a state from raw register bits
    pub fn from_bits(bits: u64) -> Self {
        Self { bits }
    }

    /// Raw register bits
    pub fn bits(self) -> u64 {
        self.bits
    }

    /// Write this state into the current thread's control register
    pub fn restore(self) {
        arch::write(self.bits);
    }
}

/// Restores the captured [`FpState`] when dropped
#[must_use]
#[derive(Debug)]
pub struct FpGuard {
    saved: FpState,
}

impl FpGuard {
    /// Capture the current state
    pub fn new() -> Self {
        Self {
            saved: FpState::capture(),
        }
    }

    /// State that will be restored
    pub fn saved(&self) -> FpState {
        self.saved
    }
}

impl Default for FpGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FpGuard {
    fn drop(&mut self) {
        self.saved.restore();
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod arch {
    use std::arch::asm;
    use std::ptr::{addr_of, addr_of_mut};

    /// MXCSR rounding control, bits 13..15
    #[cfg(test)]
    pub(crate) const ROUND_TOWARD_ZERO: u64 = 0x6000;

    pub(super) fn read() -> u64 {
        let mut csr: u32 = 0;
        // SAFETY: stmxcsr stores four bytes to a valid, writable location.
        unsafe {
            asm!("stmxcsr [{}]", in(reg) addr_of_mut!(csr), options(nostack, preserves_flags));
        }
        u64::from(csr)
    }

    pub(super) fn write(bits: u64) {
        let csr = bits as u32;
        // SAFETY: ldmxcsr reads four bytes; the value came from stmxcsr.
        unsafe {
            asm!("ldmxcsr [{}]", in(reg) addr_of!(csr), options(nostack, readonly, preserves_flags));
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    use std::arch::asm;

    /// FPCR rounding mode, bits 22..24
    #[cfg(test)]
    pub(crate) const ROUND_TOWARD_ZERO: u64 = 0b11 << 22;

    pub(super) fn read() -> u64 {
        let fpcr: u64;
        // SAFETY: reading FPCR has no side effects.
        unsafe {
            asm!("mrs {}, fpcr", out(reg) fpcr, options(nomem, nostack, preserves_flags));
        }
        fpcr
    }

    pub(super) fn write(bits: u64) {
        // SAFETY: the value came from a previous FPCR read.
        unsafe {
            asm!("msr fpcr, {}", in(reg) bits, options(nomem, nostack, preserves_flags));
        }
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
mod arch {
    #[cfg(test)]
    pub(crate) const ROUND_TOWARD_ZERO: u64 = 0;

    pub(super) fn read() -> u64 {
        0
    }

    pub(super) fn write(_bits: u64) {}
}

#[cfg(test)]
pub(crate) use arch::ROUND_TOWARD_ZERO;

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    fn clobber() {
        let current = FpState::capture();
        FpState::from_bits(current.bits() | ROUND_TOWARD_ZERO).restore();
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let before = FpState::capture();
        {
            let guard = FpGuard::new();
            assert_eq!(guard.saved(), before);
            clobber();
        }
        assert_eq!(FpState::capture(), before);
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let before = FpState::capture();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = FpGuard::new();
            clobber();
            panic!("producer crashed");
        }));
        assert!(result.is_err());
        assert_eq!(FpState::capture(), before);
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn test_clobber_is_visible() {
        let before = FpState::capture();
        clobber();
        let changed = FpState::capture();
        before.restore();
        assert_ne!(changed, before);
        assert_eq!(changed.bits() & ROUND_TOWARD_ZERO, ROUND_TOWARD_ZERO);
    }
}
