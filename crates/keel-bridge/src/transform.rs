//! Script-side wrapper for a host transform.

use std::fmt;

use crate::abi::AbiValue;
use crate::binding::Bridge;
use crate::catalog::OpId;
use crate::handle::Handle;
use crate::value::{Quaternion, Vector3};
use crate::BridgeError;

/// Position, rotation and scale of an entity, owned by the host.
///
/// Every read goes to the host; nothing is cached, so a value set by another
/// script or by the host itself is visible on the next read.
#[derive(Clone)]
pub struct Transform {
    handle: Handle,
    bridge: Bridge,
}

impl Transform {
    /// Wrap a non-null handle.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NullHandle`] if `handle` is the null sentinel.
    pub fn new(bridge: Bridge, handle: Handle) -> Result<Self, BridgeError> {
        if handle.is_null() {
            return Err(BridgeError::NullHandle { op: "Transform.new" });
        }
        Ok(Self { handle, bridge })
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn position(&self) -> Result<Vector3, BridgeError> {
        self.bridge
            .call_vector3(OpId::TransformGetPosition, &[AbiValue::Handle(self.handle)])
    }

    pub fn set_position(&self, position: Vector3) -> Result<(), BridgeError> {
        self.bridge.call_void(
            OpId::TransformSetPosition,
            &[AbiValue::Handle(self.handle), AbiValue::Vector3(position)],
        )
    }

    pub fn rotation(&self) -> Result<Quaternion, BridgeError> {
        self.bridge
            .call_quaternion(OpId::TransformGetRotation, &[AbiValue::Handle(self.handle)])
    }

    pub fn set_rotation(&self, rotation: Quaternion) -> Result<(), BridgeError> {
        self.bridge.call_void(
            OpId::TransformSetRotation,
            &[AbiValue::Handle(self.handle), AbiValue::Quaternion(rotation)],
        )
    }

    /// Apply `delta` on top of the current rotation. The host stores the
    /// normalized product `delta * rotation`.
    pub fn rotate(&self, delta: Quaternion) -> Result<(), BridgeError> {
        self.bridge.call_void(
            OpId::TransformRotate,
            &[AbiValue::Handle(self.handle), AbiValue::Quaternion(delta)],
        )
    }

    pub fn scale(&self) -> Result<Vector3, BridgeError> {
        self.bridge
            .call_vector3(OpId::TransformGetScale, &[AbiValue::Handle(self.handle)])
    }

    pub fn set_scale(&self, scale: Vector3) -> Result<(), BridgeError> {
        self.bridge.call_void(
            OpId::TransformSetScale,
            &[AbiValue::Handle(self.handle), AbiValue::Vector3(scale)],
        )
    }

    /// Move by `offset`. Performed host-side as one call, not as a
    /// read-modify-write from the script.
    pub fn translate(&self, offset: Vector3) -> Result<(), BridgeError> {
        self.bridge.call_void(
            OpId::TransformTranslate,
            &[AbiValue::Handle(self.handle), AbiValue::Vector3(offset)],
        )
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transform").field(&self.handle).finish()
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Transform {}
