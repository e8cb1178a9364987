//! The reference native host: shared state plus the export table.
//!
//! [`NativeHost::exports`] registers one native function per catalog
//! operation. Each one locks the shared [`HostState`], looks the handle up
//! in the [`Scene`], and answers. A handle that no longer names a live
//! object yields the neutral value of the return type and a `warn` event;
//! it is never an error and never a panic.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use keel_bridge::prelude::*;
use keel_bridge::{abi_fingerprint, NativeExports};

use crate::config::HostConfig;
use crate::input::InputState;
use crate::log_sink::LogSink;
use crate::scene::{Scene, SpawnedObject};
use crate::{world_io, HostError};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Simulation time as seen by `Time.GetDeltaTime`.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    delta: f32,
    steps: u64,
    fixed_dt: f32,
}

impl Clock {
    fn new(fixed_dt: f32) -> Self {
        Self {
            delta: 0.0,
            steps: 0,
            fixed_dt,
        }
    }

    /// Begin the next fixed step.
    pub fn advance(&mut self) {
        self.steps += 1;
        self.delta = self.fixed_dt;
    }

    /// Seconds covered by the current step. Zero before the first step.
    pub fn delta(&self) -> f32 {
        self.delta
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Total simulated seconds. Computed from the step count, not
    /// accumulated, so it does not drift.
    pub fn elapsed(&self) -> f64 {
        self.steps as f64 * self.fixed_dt as f64
    }
}

// ---------------------------------------------------------------------------
// HostState
// ---------------------------------------------------------------------------

/// Everything the native functions read and write.
#[derive(Debug)]
pub struct HostState {
    pub scene: Scene,
    pub input: InputState,
    pub log: LogSink,
    pub clock: Clock,
    config: HostConfig,
}

impl HostState {
    fn new(config: HostConfig) -> Self {
        Self {
            scene: Scene::new(),
            input: InputState::new(),
            log: LogSink::new(config.log_capacity),
            clock: Clock::new(config.fixed_dt),
            config,
        }
    }

    /// Handle `World.Load`. Any failure is logged and reported as `false`.
    fn load_world(&mut self, path: &str) -> bool {
        let result = world_io::resolve(&self.config.world_root, Path::new(path))
            .and_then(|full| world_io::load(&mut self.scene, &full));
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(path, error = %e, "World.Load failed");
                false
            }
        }
    }

    /// Handle `World.Save`. Any failure is logged and reported as `false`.
    fn save_world(&self, path: &str) -> bool {
        let result = world_io::resolve(&self.config.world_root, Path::new(path))
            .and_then(|full| world_io::save(&self.scene, &full));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path, error = %e, "World.Save failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NativeHost
// ---------------------------------------------------------------------------

/// The in-process host. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct NativeHost {
    state: Arc<Mutex<HostState>>,
    config: HostConfig,
}

impl NativeHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState::new(config.clone()))),
            config,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Run `f` with exclusive access to the host state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn spawn_entity(&self, name: &str, position: Vector3) -> SpawnedObject {
        self.with_state(|s| s.scene.spawn(name, position, Vector3::ONE))
    }

    pub fn despawn_entity(&self, entity: Handle) -> bool {
        self.with_state(|s| s.scene.despawn(entity))
    }

    /// Bind a bridge against this host using the configured
    /// [`BridgeConfig`].
    pub fn bind(&self) -> Result<Bridge, HostError> {
        let exports = self.exports()?;
        Ok(Bridge::bind_with_config(&exports, self.config.bridge.clone())?)
    }

    /// Build the export table: every catalog operation, every aggregate
    /// layout and the ABI fingerprint.
    pub fn exports(&self) -> Result<NativeExports, HostError> {
        let mut exports = NativeExports::new();
        let mut reg = Registrar {
            exports: &mut exports,
            state: &self.state,
        };

        // -- Debug ----------------------------------------------------------
        reg.op(OpId::DebugLogText, |s, args| match args {
            [AbiValue::Str(text), AbiValue::LogSeverity(sev)] => {
                s.log.push(*sev, text.clone());
                Some(AbiValue::Void)
            }
            _ => None,
        })?;
        reg.op(OpId::DebugLogInt, |s, args| match args {
            [AbiValue::I32(v), AbiValue::LogSeverity(sev)] => {
                s.log.push(*sev, v.to_string());
                Some(AbiValue::Void)
            }
            _ => None,
        })?;
        reg.op(OpId::DebugLogFloat, |s, args| match args {
            [AbiValue::F32(v), AbiValue::LogSeverity(sev)] => {
                s.log.push(*sev, v.to_string());
                Some(AbiValue::Void)
            }
            _ => None,
        })?;
        reg.op(OpId::DebugLogBool, |s, args| match args {
            [AbiValue::Bool(v), AbiValue::LogSeverity(sev)] => {
                s.log.push(*sev, v.to_string());
                Some(AbiValue::Void)
            }
            _ => None,
        })?;
        reg.op(OpId::DebugLogVector3, |s, args| match args {
            [AbiValue::Vector3(v), AbiValue::LogSeverity(sev)] => {
                s.log.push(*sev, format!("({}, {}, {})", v.x, v.y, v.z));
                Some(AbiValue::Void)
            }
            _ => None,
        })?;

        // -- Input ----------------------------------------------------------
        reg.op(OpId::InputGetKeyDown, |s, args| {
            key_arg(args).map(|k| AbiValue::Bool(s.input.key_down(k)))
        })?;
        reg.op(OpId::InputGetKey, |s, args| {
            key_arg(args).map(|k| AbiValue::Bool(s.input.key(k)))
        })?;
        reg.op(OpId::InputGetKeyUp, |s, args| {
            key_arg(args).map(|k| AbiValue::Bool(s.input.key_up(k)))
        })?;
        reg.op(OpId::InputGetMousePosition, |s, _| {
            Some(AbiValue::Vector2(s.input.mouse_position()))
        })?;
        reg.op(OpId::InputGetMouseDelta, |s, _| {
            Some(AbiValue::Vector2(s.input.mouse_delta()))
        })?;
        reg.op(OpId::InputGetMouseWheelDelta, |s, _| {
            Some(AbiValue::Vector2(s.input.mouse_wheel_delta()))
        })?;

        // -- World ----------------------------------------------------------
        reg.op(OpId::WorldLoad, |s, args| match args {
            [AbiValue::Str(path)] => Some(AbiValue::Bool(s.load_world(path))),
            _ => None,
        })?;
        reg.op(OpId::WorldSave, |s, args| match args {
            [AbiValue::Str(path)] => Some(AbiValue::Bool(s.save_world(path))),
            _ => None,
        })?;

        // -- Time -----------------------------------------------------------
        reg.op(OpId::TimeGetDeltaTime, |s, _| {
            Some(AbiValue::F32(s.clock.delta()))
        })?;

        // -- Entity ---------------------------------------------------------
        // Entity.IsAlive answers `false` for a stale handle; it is the one
        // entity query where that is the real answer rather than a fallback.
        reg.op(OpId::EntityIsAlive, |s, args| {
            handle_arg(args).map(|h| AbiValue::Bool(s.scene.is_entity_alive(h)))
        })?;
        reg.op(OpId::EntityGetName, |s, args| {
            let entity = s.scene.entity(handle_arg(args)?)?;
            Some(AbiValue::Str(entity.name.clone()))
        })?;
        reg.op(OpId::EntitySetName, |s, args| match args {
            [AbiValue::Handle(h), AbiValue::Str(name)] => {
                s.scene.entity_mut(*h)?.name = name.clone();
                Some(AbiValue::Void)
            }
            _ => None,
        })?;
        reg.op(OpId::EntityIsActive, |s, args| {
            let entity = s.scene.entity(handle_arg(args)?)?;
            Some(AbiValue::Bool(entity.active))
        })?;
        reg.op(OpId::EntitySetActive, |s, args| match args {
            [AbiValue::Handle(h), AbiValue::Bool(active)] => {
                s.scene.entity_mut(*h)?.active = *active;
                Some(AbiValue::Void)
            }
            _ => None,
        })?;

        // -- Transform ------------------------------------------------------
        reg.op(OpId::TransformGetPosition, |s, args| {
            let transform = s.scene.transform(handle_arg(args)?)?;
            Some(AbiValue::Vector3(transform.position))
        })?;
        reg.op(OpId::TransformSetPosition, |s, args| {
            let (h, v) = handle_vector_args(args)?;
            s.scene.transform_mut(h)?.position = v;
            Some(AbiValue::Void)
        })?;
        reg.op(OpId::TransformGetRotation, |s, args| {
            let transform = s.scene.transform(handle_arg(args)?)?;
            Some(AbiValue::Quaternion(transform.rotation))
        })?;
        reg.op(OpId::TransformSetRotation, |s, args| {
            let (h, q) = handle_quaternion_args(args)?;
            s.scene.transform_mut(h)?.rotation = q.normalized();
            Some(AbiValue::Void)
        })?;
        reg.op(OpId::TransformRotate, |s, args| {
            let (h, delta) = handle_quaternion_args(args)?;
            let transform = s.scene.transform_mut(h)?;
            transform.rotation = (delta * transform.rotation).normalized();
            Some(AbiValue::Void)
        })?;
        reg.op(OpId::TransformGetScale, |s, args| {
            let transform = s.scene.transform(handle_arg(args)?)?;
            Some(AbiValue::Vector3(transform.scale))
        })?;
        reg.op(OpId::TransformSetScale, |s, args| {
            let (h, v) = handle_vector_args(args)?;
            s.scene.transform_mut(h)?.scale = v;
            Some(AbiValue::Void)
        })?;
        reg.op(OpId::TransformTranslate, |s, args| {
            let (h, v) = handle_vector_args(args)?;
            s.scene.transform_mut(h)?.position += v;
            Some(AbiValue::Void)
        })?;

        exports
            .declare_layout(Vector2::layout())
            .declare_layout(Vector3::layout())
            .declare_layout(Quaternion::layout())
            .declare_fingerprint(abi_fingerprint());
        Ok(exports)
    }
}

impl std::fmt::Debug for NativeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHost")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Registration helpers
// ---------------------------------------------------------------------------

struct Registrar<'a> {
    exports: &'a mut NativeExports,
    state: &'a Arc<Mutex<HostState>>,
}

impl Registrar<'_> {
    /// Export `op`. `f` returns `None` when the handle is stale or the
    /// arguments are malformed; the caller then receives the neutral value.
    fn op<F>(&mut self, op: OpId, f: F) -> Result<(), HostError>
    where
        F: Fn(&mut HostState, &[AbiValue]) -> Option<AbiValue> + Send + Sync + 'static,
    {
        let signature = op.signature();
        let state = Arc::clone(self.state);
        self.exports.export_signature(signature, move |args| {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard, args).unwrap_or_else(|| {
                tracing::warn!(
                    op = %signature,
                    "stale handle or malformed arguments, returning neutral value"
                );
                AbiValue::neutral(signature.ret)
            })
        })?;
        Ok(())
    }
}

fn handle_arg(args: &[AbiValue]) -> Option<Handle> {
    match args.first()? {
        AbiValue::Handle(h) => Some(*h),
        _ => None,
    }
}

fn key_arg(args: &[AbiValue]) -> Option<KeyCode> {
    match args.first()? {
        AbiValue::KeyCode(k) => Some(*k),
        _ => None,
    }
}

fn handle_vector_args(args: &[AbiValue]) -> Option<(Handle, Vector3)> {
    match args {
        [AbiValue::Handle(h), AbiValue::Vector3(v)] => Some((*h, *v)),
        _ => None,
    }
}

fn handle_quaternion_args(args: &[AbiValue]) -> Option<(Handle, Quaternion)> {
    match args {
        [AbiValue::Handle(h), AbiValue::Quaternion(q)] => Some((*h, *q)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_elapsed_is_derived_from_step_count() {
        let mut clock = Clock::new(0.5);
        assert_eq!(clock.delta(), 0.0);
        clock.advance();
        clock.advance();
        assert_eq!(clock.delta(), 0.5);
        assert_eq!(clock.steps(), 2);
        assert_eq!(clock.elapsed(), 1.0);
    }

    #[test]
    fn exports_cover_the_catalog() {
        let host = NativeHost::new(HostConfig::default());
        let exports = host.exports().unwrap();
        assert_eq!(exports.len(), keel_bridge::catalog::CATALOG.len());
        for signature in keel_bridge::catalog::CATALOG {
            assert!(exports.contains(signature.name, signature.params), "{signature}");
        }
    }
}
