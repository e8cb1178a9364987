//! World documents behind `World.Load` and `World.Save`.
//!
//! A world file is a JSON [`WorldDocument`]: a format version and the list
//! of entities with their transform state. Loading replaces the whole scene.
//! The old contents are released through the handle allocator, so handles
//! scripts held before the load go stale rather than silently pointing at
//! new objects.
//!
//! # What Is NOT Saved
//!
//! - **Handles**: a loaded world gets fresh handles. Scripts find their
//!   objects again by name.
//! - **Input and clock state**: transient per-step data.
//! - **Script instances**: they belong to the runtime, not the scene.

use std::fs;
use std::path::{Component, Path, PathBuf};

use keel_bridge::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::scene::{Scene, SpawnedObject};
use crate::HostError;

/// Current world file format version.
pub const WORLD_FORMAT_VERSION: u32 = 1;

/// Serialized form of a [`Scene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldDocument {
    pub version: u32,
    pub entities: Vec<EntityDocument>,
}

/// One saved entity and its transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub position: Vector3,
    #[serde(default)]
    pub rotation: Quaternion,
    #[serde(default = "default_scale")]
    pub scale: Vector3,
}

fn default_active() -> bool {
    true
}

fn default_scale() -> Vector3 {
    Vector3::ONE
}

impl WorldDocument {
    /// Capture every live entity of `scene`, in slot order.
    pub fn capture(scene: &Scene) -> Self {
        let entities = scene
            .entities()
            .filter_map(|(_, entity)| {
                let transform = scene.transform(entity.transform)?;
                Some(EntityDocument {
                    name: entity.name.clone(),
                    active: entity.active,
                    position: transform.position,
                    rotation: transform.rotation,
                    scale: transform.scale,
                })
            })
            .collect();
        Self {
            version: WORLD_FORMAT_VERSION,
            entities,
        }
    }

    /// Replace the contents of `scene` with this document.
    ///
    /// Returns the handles of the spawned objects, in document order.
    pub fn apply(&self, scene: &mut Scene) -> Result<Vec<SpawnedObject>, HostError> {
        if self.version != WORLD_FORMAT_VERSION {
            return Err(HostError::WorldVersion {
                found: self.version,
                expected: WORLD_FORMAT_VERSION,
            });
        }
        scene.clear();
        let spawned = self
            .entities
            .iter()
            .map(|doc| {
                let obj = scene.spawn(doc.name.clone(), doc.position, doc.scale);
                if let Some(entity) = scene.entity_mut(obj.entity) {
                    entity.active = doc.active;
                }
                if let Some(transform) = scene.transform_mut(obj.transform) {
                    transform.rotation = doc.rotation.normalized();
                }
                obj
            })
            .collect();
        Ok(spawned)
    }
}

/// Resolve a script-supplied path against `root`.
///
/// Absolute paths and paths that climb out of `root` are refused.
pub fn resolve(root: &Path, path: &Path) -> Result<PathBuf, HostError> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || path.as_os_str().is_empty() {
        return Err(HostError::PathEscapesRoot {
            path: path.to_path_buf(),
        });
    }
    Ok(root.join(path))
}

/// Write `scene` to `path` as pretty-printed JSON.
pub fn save(scene: &Scene, path: &Path) -> Result<(), HostError> {
    let document = WorldDocument::capture(scene);
    let json = serde_json::to_string_pretty(&document).map_err(|source| HostError::WorldFormat {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| HostError::WorldIo {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), entities = document.entities.len(), "world saved");
    Ok(())
}

/// Replace `scene` with the world stored at `path`.
///
/// The file is read and parsed completely before the scene is touched, so
/// a failed load leaves the scene unchanged.
pub fn load(scene: &mut Scene, path: &Path) -> Result<Vec<SpawnedObject>, HostError> {
    let json = fs::read_to_string(path).map_err(|source| HostError::WorldIo {
        path: path.to_path_buf(),
        source,
    })?;
    let document: WorldDocument =
        serde_json::from_str(&json).map_err(|source| HostError::WorldFormat {
            path: path.to_path_buf(),
            source,
        })?;
    let spawned = document.apply(scene)?;
    tracing::info!(path = %path.display(), entities = spawned.len(), "world loaded");
    Ok(spawned)
}
