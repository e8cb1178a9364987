//! The host-owned object store scripts refer to by handle.
//!
//! Every entity owns exactly one transform. Both live in one slot table and
//! share one [`HandleAllocator`], so an entity handle and a transform handle
//! can never collide, and passing one where the other is expected simply
//! finds nothing.

use keel_bridge::{Handle, Quaternion, Vector3};

use crate::handles::{index_of, HandleAllocator};

/// Host-side state of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub name: String,
    pub active: bool,
    /// The entity's own transform.
    pub transform: Handle,
}

/// Host-side state of a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRecord {
    pub position: Vector3,
    /// Always unit length; the setters normalize.
    pub rotation: Quaternion,
    pub scale: Vector3,
    /// The entity this transform belongs to.
    pub entity: Handle,
}

/// The two handles a newly spawned object is known by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnedObject {
    pub entity: Handle,
    pub transform: Handle,
}

#[derive(Debug, Clone)]
struct Stored {
    handle: Handle,
    object: Slot,
}

#[derive(Debug, Clone)]
enum Slot {
    Entity(EntityRecord),
    Transform(TransformRecord),
}

/// Entities and transforms addressed by generational handle.
#[derive(Debug, Default)]
pub struct Scene {
    allocator: HandleAllocator,
    /// Indexed by handle slot index. `None` for free and reserved slots.
    slots: Vec<Option<Stored>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active entity with its transform, unrotated.
    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        position: Vector3,
        scale: Vector3,
    ) -> SpawnedObject {
        let entity = self.allocator.allocate();
        let transform = self.allocator.allocate();
        self.put(
            entity,
            Slot::Entity(EntityRecord {
                name: name.into(),
                active: true,
                transform,
            }),
        );
        self.put(
            transform,
            Slot::Transform(TransformRecord {
                position,
                rotation: Quaternion::IDENTITY,
                scale,
                entity,
            }),
        );
        tracing::trace!(entity = %entity, transform = %transform, "object spawned");
        SpawnedObject { entity, transform }
    }

    /// Destroy an entity and its transform. Both handles go stale.
    ///
    /// Returns `false` if `entity` does not name a live entity.
    pub fn despawn(&mut self, entity: Handle) -> bool {
        let Some(transform) = self.entity(entity).map(|e| e.transform) else {
            return false;
        };
        for handle in [entity, transform] {
            if self.allocator.release(handle) {
                self.slots[index_of(handle) as usize] = None;
            }
        }
        tracing::trace!(entity = %entity, "object despawned");
        true
    }

    /// Destroy everything. Every outstanding handle goes stale.
    pub fn clear(&mut self) {
        self.allocator.release_all();
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    // -- lookups ------------------------------------------------------------

    pub fn entity(&self, handle: Handle) -> Option<&EntityRecord> {
        match self.slot(handle)? {
            Slot::Entity(record) => Some(record),
            Slot::Transform(_) => None,
        }
    }

    pub fn entity_mut(&mut self, handle: Handle) -> Option<&mut EntityRecord> {
        match self.slot_mut(handle)? {
            Slot::Entity(record) => Some(record),
            Slot::Transform(_) => None,
        }
    }

    pub fn transform(&self, handle: Handle) -> Option<&TransformRecord> {
        match self.slot(handle)? {
            Slot::Transform(record) => Some(record),
            Slot::Entity(_) => None,
        }
    }

    pub fn transform_mut(&mut self, handle: Handle) -> Option<&mut TransformRecord> {
        match self.slot_mut(handle)? {
            Slot::Transform(record) => Some(record),
            Slot::Entity(_) => None,
        }
    }

    /// Whether `handle` names a live entity.
    pub fn is_entity_alive(&self, handle: Handle) -> bool {
        self.entity(handle).is_some()
    }

    /// First live entity with this name, in slot order.
    pub fn find_entity(&self, name: &str) -> Option<SpawnedObject> {
        self.entities()
            .find(|(_, record)| record.name == name)
            .map(|(entity, record)| SpawnedObject {
                entity,
                transform: record.transform,
            })
    }

    /// Live entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = (Handle, &EntityRecord)> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Some(Stored {
                handle,
                object: Slot::Entity(record),
            }) => Some((*handle, record)),
            _ => None,
        })
    }

    pub fn entity_count(&self) -> usize {
        self.entities().count()
    }

    // -- slot access --------------------------------------------------------

    fn put(&mut self, handle: Handle, object: Slot) {
        let index = index_of(handle) as usize;
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(Stored { handle, object });
    }

    fn slot(&self, handle: Handle) -> Option<&Slot> {
        if !self.allocator.is_alive(handle) {
            return None;
        }
        self.slots
            .get(index_of(handle) as usize)?
            .as_ref()
            .map(|stored| &stored.object)
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        if !self.allocator.is_alive(handle) {
            return None;
        }
        self.slots
            .get_mut(index_of(handle) as usize)?
            .as_mut()
            .map(|stored| &mut stored.object)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
