//! Script-side wrapper for a host entity.

use std::fmt;

use crate::abi::AbiValue;
use crate::binding::Bridge;
use crate::catalog::OpId;
use crate::handle::Handle;
use crate::BridgeError;

/// An entity owned by the host, named by handle.
///
/// Holds no state of its own: every accessor forwards through the bridge.
/// The handle may go stale if the host destroys the entity; calls then
/// return neutral values, and [`Entity::is_alive`] reports `false`.
#[derive(Clone)]
pub struct Entity {
    handle: Handle,
    bridge: Bridge,
}

impl Entity {
    /// Wrap a non-null handle.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NullHandle`] if `handle` is the null sentinel.
    pub fn new(bridge: Bridge, handle: Handle) -> Result<Self, BridgeError> {
        if handle.is_null() {
            return Err(BridgeError::NullHandle { op: "Entity.new" });
        }
        Ok(Self { handle, bridge })
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Whether the host still has an entity under this handle.
    pub fn is_alive(&self) -> Result<bool, BridgeError> {
        self.bridge
            .call_bool(OpId::EntityIsAlive, &[AbiValue::Handle(self.handle)])
    }

    pub fn name(&self) -> Result<String, BridgeError> {
        self.bridge
            .call_str(OpId::EntityGetName, &[AbiValue::Handle(self.handle)])
    }

    pub fn set_name(&self, name: &str) -> Result<(), BridgeError> {
        self.bridge.call_void(
            OpId::EntitySetName,
            &[AbiValue::Handle(self.handle), AbiValue::Str(name.to_owned())],
        )
    }

    pub fn is_active(&self) -> Result<bool, BridgeError> {
        self.bridge
            .call_bool(OpId::EntityIsActive, &[AbiValue::Handle(self.handle)])
    }

    pub fn set_active(&self, active: bool) -> Result<(), BridgeError> {
        self.bridge.call_void(
            OpId::EntitySetActive,
            &[AbiValue::Handle(self.handle), AbiValue::Bool(active)],
        )
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Entity").field(&self.handle).finish()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Entity {}
