//! `Time.GetDeltaTime` facade.

use crate::binding::Bridge;
use crate::catalog::OpId;
use crate::BridgeError;

/// Seconds covered by the current simulation step.
pub fn delta_time(bridge: &Bridge) -> Result<f32, BridgeError> {
    bridge.call_f32(OpId::TimeGetDeltaTime, &[])
}
