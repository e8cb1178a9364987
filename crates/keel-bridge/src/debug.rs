//! `Debug.Log` facade.
//!
//! ```ignore
//! debug::log(&bridge, "door opened", LogSeverity::Warning)?;
//! debug::log_info(&bridge, &base.transform().position()?)?;
//! ```

use crate::abi::AbiValue;
use crate::binding::Bridge;
use crate::catalog::OpId;
use crate::severity::LogSeverity;
use crate::value::Vector3;
use crate::BridgeError;

/// A value `Debug.Log` has an overload for.
pub trait LogValue {
    /// The overload to call and the marshalled value.
    fn to_log_arg(&self) -> (OpId, AbiValue);
}

impl LogValue for str {
    fn to_log_arg(&self) -> (OpId, AbiValue) {
        (OpId::DebugLogText, AbiValue::Str(self.to_owned()))
    }
}

impl LogValue for String {
    fn to_log_arg(&self) -> (OpId, AbiValue) {
        self.as_str().to_log_arg()
    }
}

impl LogValue for i32 {
    fn to_log_arg(&self) -> (OpId, AbiValue) {
        (OpId::DebugLogInt, AbiValue::I32(*self))
    }
}

impl LogValue for f32 {
    fn to_log_arg(&self) -> (OpId, AbiValue) {
        (OpId::DebugLogFloat, AbiValue::F32(*self))
    }
}

impl LogValue for bool {
    fn to_log_arg(&self) -> (OpId, AbiValue) {
        (OpId::DebugLogBool, AbiValue::Bool(*self))
    }
}

impl LogValue for Vector3 {
    fn to_log_arg(&self) -> (OpId, AbiValue) {
        (OpId::DebugLogVector3, AbiValue::Vector3(*self))
    }
}

impl<T: LogValue + ?Sized> LogValue for &T {
    fn to_log_arg(&self) -> (OpId, AbiValue) {
        (**self).to_log_arg()
    }
}

/// Emit `value` to the host's log sink at `severity`.
pub fn log<T: LogValue + ?Sized>(
    bridge: &Bridge,
    value: &T,
    severity: LogSeverity,
) -> Result<(), BridgeError> {
    let (op, arg) = value.to_log_arg();
    bridge.call_void(op, &[arg, AbiValue::LogSeverity(severity)])
}

/// Emit `value` at the default severity. The default is applied here, so the
/// host always receives an explicit severity.
pub fn log_info<T: LogValue + ?Sized>(bridge: &Bridge, value: &T) -> Result<(), BridgeError> {
    log(bridge, value, LogSeverity::default())
}
