//! `Input.*` facade.
//!
//! All queries read the host's per-step snapshot, so calling any of them
//! twice within one simulation step gives the same answer.

use crate::abi::AbiValue;
use crate::binding::Bridge;
use crate::catalog::OpId;
use crate::key::KeyCode;
use crate::value::Vector2;
use crate::BridgeError;

/// `true` only in the step the key went from released to pressed.
pub fn key_down(bridge: &Bridge, key: KeyCode) -> Result<bool, BridgeError> {
    bridge.call_bool(OpId::InputGetKeyDown, &[AbiValue::KeyCode(key)])
}

/// `true` in every step the key is held.
pub fn key(bridge: &Bridge, key: KeyCode) -> Result<bool, BridgeError> {
    bridge.call_bool(OpId::InputGetKey, &[AbiValue::KeyCode(key)])
}

/// `true` only in the step the key went from pressed to released.
pub fn key_up(bridge: &Bridge, key: KeyCode) -> Result<bool, BridgeError> {
    bridge.call_bool(OpId::InputGetKeyUp, &[AbiValue::KeyCode(key)])
}

pub fn mouse_position(bridge: &Bridge) -> Result<Vector2, BridgeError> {
    bridge.call_vector2(OpId::InputGetMousePosition, &[])
}

/// Mouse movement since the previous step.
pub fn mouse_delta(bridge: &Bridge) -> Result<Vector2, BridgeError> {
    bridge.call_vector2(OpId::InputGetMouseDelta, &[])
}

pub fn mouse_wheel_delta(bridge: &Bridge) -> Result<Vector2, BridgeError> {
    bridge.call_vector2(OpId::InputGetMouseWheelDelta, &[])
}
