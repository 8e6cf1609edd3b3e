//! Isolation boundary around producer calls

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use framesynth::{Error, Result};

use crate::fpstate::FpGuard;

/// Run `f` with the floating-point state restored afterwards and any panic
/// converted to [`Error::Fault`]
pub fn isolate<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _fp = FpGuard::new();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Error::Fault(panic_payload_message(payload))),
    }
}

pub(crate) fn panic_payload_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fpstate::{FpState, ROUND_TOWARD_ZERO};
    use framesynth::ErrorKind;

    #[test]
    fn test_passes_results_through() {
        assert_eq!(isolate(|| Ok(5)).unwrap(), 5);
        let err = isolate::<(), _>(|| Err(Error::script("nope"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Script);
    }

    #[test]
    fn test_panic_becomes_fault() {
        let err = isolate::<(), _>(|| panic!("division by zero in frame {}", 3)).unwrap_err();
        assert_eq!(err, Error::Fault("division by zero in frame 3".into()));
        assert_eq!(err.kind(), ErrorKind::HardwareFault);
        assert!(err.latches());
    }

    #[test]
    fn test_static_str_payload() {
        let err = isolate::<(), _>(|| panic!("boom")).unwrap_err();
        assert_eq!(err, Error::Fault("boom".into()));
    }

    #[test]
    fn test_unknown_payload() {
        let err = isolate::<(), _>(|| panic::panic_any(42u8)).unwrap_err();
        assert_eq!(err, Error::Fault("unknown panic".into()));
    }

    #[test]
    fn test_fp_state_restored() {
        let before = FpState::capture();
        let _ = isolate(|| {
            FpState::from_bits(before.bits() | ROUND_TOWARD_ZERO).restore();
            Ok(())
        });
        assert_eq!(FpState::capture(), before);

        let _ = isolate::<(), _>(|| {
            FpState::from_bits(before.bits() | ROUND_TOWARD_ZERO).restore();
            panic!("crashed with rounding changed")
        });
        assert_eq!(FpState::capture(), before);
    }
}
