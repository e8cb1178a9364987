//! The base every user script is built on.

use crate::binding::Bridge;
use crate::entity::Entity;
use crate::handle::Handle;
use crate::transform::Transform;
use crate::BridgeError;

/// The entity and transform a script instance is attached to.
///
/// Built once from the two handles the host supplies when it creates the
/// instance. Both sub-objects are only ever lent out immutably, so a script
/// cannot rebind itself to another object.
#[derive(Debug, Clone)]
pub struct ScriptBase {
    entity: Entity,
    transform: Transform,
    bridge: Bridge,
}

impl ScriptBase {
    /// # Errors
    ///
    /// [`BridgeError::NullHandle`] if either handle is null.
    pub fn new(bridge: Bridge, entity: Handle, transform: Handle) -> Result<Self, BridgeError> {
        Ok(Self {
            entity: Entity::new(bridge.clone(), entity)?,
            transform: Transform::new(bridge.clone(), transform)?,
            bridge,
        })
    }

    #[inline]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// The bridge, for the static facades (`debug`, `input`, `world`,
    /// `time`).
    #[inline]
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}

/// User-authored behaviour attached to one entity.
///
/// Only `tick` is required. Returned errors and panics are caught by the
/// [`ScriptRuntime`](crate::ScriptRuntime) and never reach the host.
pub trait Script: Send {
    fn initialize(&mut self, _base: &ScriptBase) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once per simulation step with the step's delta in seconds.
    fn tick(&mut self, base: &ScriptBase, delta: f32) -> anyhow::Result<()>;

    fn shutdown(&mut self, _base: &ScriptBase) -> anyhow::Result<()> {
        Ok(())
    }
}
