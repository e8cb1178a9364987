//! Loading and running one WASM script.
//!
//! A [`WasmScript`] owns its own Wasmtime engine, store and instance. Each
//! entry point call gets a fresh fuel budget so a runaway loop in one tick
//! cannot starve the next, and linear memory is capped by a store limiter.
//!
//! A script can be driven directly through `call_initialize`, `call_tick`
//! and `call_shutdown`, or boxed as a [`Script`] and attached to a
//! [`ScriptRuntime`](keel_bridge::ScriptRuntime) next to native scripts. In
//! the second case the runtime owns fault logging and forwarding.

use keel_bridge::{
    debug, time, Bridge, BridgeError, EntryStatus, Handle, LifecyclePhase, LifecycleStage,
    LogSeverity, Script, ScriptBase,
};
use serde::{Deserialize, Serialize};
use wasmtime::{Engine, ExternType, Instance, Linker, Module, Store, StoreLimitsBuilder, TypedFunc};

use crate::host_api::{self, ScriptState, IMPORT_MODULE};
use crate::WasmError;

const WASM_PAGE_BYTES: u64 = 64 * 1024;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a WASM script instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasmConfig {
    /// Fuel granted to each entry point call. Default: 1_000_000.
    pub fuel_per_call: u64,
    /// Maximum linear memory in bytes. Default: 16 MiB.
    pub memory_limit_bytes: usize,
}

impl Default for WasmConfig {
    fn default() -> Self {
        Self {
            fuel_per_call: 1_000_000,
            memory_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

enum TickEntry {
    Plain(TypedFunc<(), ()>),
    WithDelta(TypedFunc<f32, ()>),
}

/// A compiled and instantiated WASM script bound to one entity and
/// transform.
pub struct WasmScript {
    store: Store<ScriptState>,
    instance: Instance,
    initialize: Option<TypedFunc<(), ()>>,
    tick: TickEntry,
    shutdown: Option<TypedFunc<(), ()>>,
    config: WasmConfig,
    phase: LifecyclePhase,
    last_fault: Option<WasmError>,
    last_fuel_consumed: u64,
}

impl WasmScript {
    /// Compile `bytes` (binary WASM or WAT text), resolve its imports and
    /// instantiate it against `bridge`.
    ///
    /// # Errors
    ///
    /// - [`WasmError::Bridge`] if either handle is null.
    /// - [`WasmError::CompileError`] if the bytes do not compile.
    /// - [`WasmError::UnresolvedBinding`] if any import is not a `"keel"`
    ///   host function.
    /// - [`WasmError::ImportSignature`] if a `"keel"` import is declared
    ///   with a function type other than its lowered signature.
    /// - [`WasmError::MissingExport`] / [`WasmError::ExportSignature`] if
    ///   `tick` is absent or an entry point has an unusable signature.
    /// - [`WasmError::MemoryLimitExceeded`] if the module's initial memory is
    ///   larger than the configured cap.
    pub fn from_bytes(
        config: &WasmConfig,
        bytes: &[u8],
        bridge: Bridge,
        entity: Handle,
        transform: Handle,
    ) -> Result<Self, WasmError> {
        if entity.is_null() || transform.is_null() {
            return Err(BridgeError::NullHandle {
                op: "WasmScript.from_bytes",
            }
            .into());
        }

        let mut engine_config = wasmtime::Config::new();
        engine_config.consume_fuel(true);
        let engine =
            Engine::new(&engine_config).map_err(|e| WasmError::Runtime(format!("engine: {e}")))?;

        let module =
            Module::new(&engine, bytes).map_err(|e| WasmError::CompileError(format!("{e}")))?;
        check_module(&module, config)?;

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.memory_limit_bytes)
            .build();
        let mut store = Store::new(&engine, ScriptState::new(bridge, entity, transform, limits));
        store.limiter(|state| &mut state.limits);
        store
            .set_fuel(config.fuel_per_call)
            .map_err(|e| WasmError::Runtime(format!("set_fuel: {e}")))?;

        let mut linker = Linker::new(&engine);
        host_api::register_bridge_api(&mut linker, &engine)
            .map_err(|e| WasmError::Runtime(format!("host api registration: {e}")))?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| WasmError::Runtime(format!("instantiation: {e}")))?;

        let tick = if let Ok(f) = instance.get_typed_func::<f32, ()>(&mut store, "tick") {
            TickEntry::WithDelta(f)
        } else {
            instance
                .get_typed_func::<(), ()>(&mut store, "tick")
                .map(TickEntry::Plain)
                .map_err(|_| WasmError::ExportSignature {
                    name: "tick".to_owned(),
                    expected: "() -> () or (f32) -> ()",
                })?
        };
        let initialize = optional_entry(&instance, &mut store, "initialize")?;
        let shutdown = optional_entry(&instance, &mut store, "shutdown")?;

        tracing::info!(
            entity = %entity,
            imports = module.imports().len(),
            has_initialize = initialize.is_some(),
            has_shutdown = shutdown.is_some(),
            "loaded WASM script"
        );

        Ok(Self {
            store,
            instance,
            initialize,
            tick,
            shutdown,
            config: config.clone(),
            phase: LifecyclePhase::Loaded,
            last_fault: None,
            last_fuel_consumed: 0,
        })
    }

    // -- lifecycle ----------------------------------------------------------

    /// Run the script's `initialize` export, if any. Only the first call
    /// does anything.
    pub fn call_initialize(&mut self) -> EntryStatus {
        let outcome = self.enter(LifecycleStage::Initialize, None);
        self.report(LifecycleStage::Initialize, outcome)
    }

    /// Run the script's `tick` export. Skipped before initialize and after
    /// shutdown. A `tick(f32)` export receives `Time.GetDeltaTime`.
    pub fn call_tick(&mut self) -> EntryStatus {
        let outcome = self.enter(LifecycleStage::Tick, None);
        self.report(LifecycleStage::Tick, outcome)
    }

    /// Run the script's `shutdown` export, if any. Only the first call after
    /// initialize does anything.
    pub fn call_shutdown(&mut self) -> EntryStatus {
        let outcome = self.enter(LifecycleStage::Shutdown, None);
        self.report(LifecycleStage::Shutdown, outcome)
    }

    /// Run an entry point by its exported name.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownEntryPoint`] if `name` is not `initialize`,
    /// `tick` or `shutdown` (case-sensitive).
    pub fn call_entry(&mut self, name: &str) -> Result<EntryStatus, WasmError> {
        let stage = LifecycleStage::from_name(name).ok_or_else(|| BridgeError::UnknownEntryPoint {
            name: name.to_owned(),
        })?;
        Ok(match stage {
            LifecycleStage::Initialize => self.call_initialize(),
            LifecycleStage::Tick => self.call_tick(),
            LifecycleStage::Shutdown => self.call_shutdown(),
        })
    }

    /// Call an exported `() -> i32` function. Used to read script-side state
    /// from the host.
    ///
    /// # Errors
    ///
    /// [`WasmError::MissingExport`] if there is no such export with that
    /// signature, or the classified trap if the call fails.
    pub fn call_i32_export(&mut self, name: &str) -> Result<i32, WasmError> {
        let f = self
            .instance
            .get_typed_func::<(), i32>(&mut self.store, name)
            .map_err(|_| WasmError::MissingExport {
                name: name.to_owned(),
            })?;
        self.reset_fuel()?;
        f.call(&mut self.store, ())
            .map_err(|e| classify_trap(e, self.config.fuel_per_call))
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &WasmConfig {
        &self.config
    }

    pub fn entity(&self) -> Handle {
        self.store.data().entity
    }

    pub fn transform(&self) -> Handle {
        self.store.data().transform
    }

    /// Host functions the script has called so far.
    pub fn host_calls(&self) -> u64 {
        self.store.data().host_calls
    }

    /// Fuel used by the most recent entry point call.
    pub fn last_fuel_consumed(&self) -> u64 {
        self.last_fuel_consumed
    }

    /// The error behind the most recent [`EntryStatus::Failed`], cleared by
    /// the next successful call.
    pub fn last_fault(&self) -> Option<&WasmError> {
        self.last_fault.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.phase.is_running()
    }

    // -- internals ----------------------------------------------------------

    fn reset_fuel(&mut self) -> Result<(), WasmError> {
        self.store
            .set_fuel(self.config.fuel_per_call)
            .map_err(|e| WasmError::Runtime(format!("set_fuel: {e}")))
    }

    /// Advance the phase for `stage` and run its export. `None` if the
    /// stage is skipped in the current phase. `delta` overrides the value a
    /// `tick(f32)` export would otherwise read from the host clock.
    fn enter(&mut self, stage: LifecycleStage, delta: Option<f32>) -> Option<Result<(), WasmError>> {
        if !self.phase.enter(stage) {
            return None;
        }
        let outcome = match stage {
            LifecycleStage::Initialize => match self.initialize.clone() {
                Some(f) => self.run_call(|store| f.call(store, ())),
                None => Ok(()),
            },
            LifecycleStage::Tick => match &self.tick {
                TickEntry::Plain(f) => {
                    let f = f.clone();
                    self.run_call(|store| f.call(store, ()))
                }
                TickEntry::WithDelta(f) => {
                    let f = f.clone();
                    let delta = delta.unwrap_or_else(|| self.host_delta());
                    self.run_call(|store| f.call(store, delta))
                }
            },
            LifecycleStage::Shutdown => match self.shutdown.clone() {
                Some(f) => self.run_call(|store| f.call(store, ())),
                None => Ok(()),
            },
        };
        if outcome.is_ok() {
            tracing::trace!(stage = stage.entry_name(), fuel = self.last_fuel_consumed, "WASM entry point returned");
            self.last_fault = None;
        }
        Some(outcome)
    }

    fn host_delta(&self) -> f32 {
        time::delta_time(&self.store.data().bridge).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Time.GetDeltaTime failed, ticking with zero delta");
            0.0
        })
    }

    fn run_call<F>(&mut self, call: F) -> Result<(), WasmError>
    where
        F: FnOnce(&mut Store<ScriptState>) -> anyhow::Result<()>,
    {
        let outcome = self.reset_fuel().and_then(|()| {
            call(&mut self.store).map_err(|e| classify_trap(e, self.config.fuel_per_call))
        });
        let remaining = self.store.get_fuel().unwrap_or(0);
        self.last_fuel_consumed = self.config.fuel_per_call.saturating_sub(remaining);
        outcome
    }

    /// Turn an outcome into a status for direct callers, logging and
    /// forwarding a fault the way the script runtime does.
    fn report(&mut self, stage: LifecycleStage, outcome: Option<Result<(), WasmError>>) -> EntryStatus {
        let e = match outcome {
            None => return EntryStatus::Skipped,
            Some(Ok(())) => return EntryStatus::Ok,
            Some(Err(e)) => e,
        };
        let entity = self.store.data().entity;
        tracing::error!(
            entity = %entity,
            stage = stage.entry_name(),
            error = %e,
            "WASM entry point failed"
        );
        let bridge = &self.store.data().bridge;
        if bridge.config().forward_faults {
            let record = format!("[wasm {entity}] {stage} failed: {e}");
            if let Err(log_err) = debug::log(bridge, record.as_str(), LogSeverity::Error) {
                tracing::warn!(error = %log_err, "could not forward script fault to host");
            }
        }
        self.last_fault = Some(e);
        EntryStatus::Failed
    }

    /// Outcome for the [`Script`] impl: the fault is kept for
    /// [`last_fault`](Self::last_fault) and handed to the runtime as text.
    fn script_result(&mut self, outcome: Option<Result<(), WasmError>>) -> anyhow::Result<()> {
        match outcome {
            None | Some(Ok(())) => Ok(()),
            Some(Err(e)) => {
                let err = anyhow::anyhow!("wasm: {e}");
                self.last_fault = Some(e);
                Err(err)
            }
        }
    }

    fn check_binding(&self, base: &ScriptBase) {
        if base.entity().handle() != self.entity() {
            tracing::warn!(
                attached = %base.entity().handle(),
                bound = %self.entity(),
                "WASM script attached to a different object than it was loaded for"
            );
        }
    }
}

/// Lets a [`ScriptRuntime`](keel_bridge::ScriptRuntime) drive a WASM script
/// like any native one. The module keeps talking to the object it was
/// loaded for; `base` only confirms the attachment.
impl Script for WasmScript {
    fn initialize(&mut self, base: &ScriptBase) -> anyhow::Result<()> {
        self.check_binding(base);
        let outcome = self.enter(LifecycleStage::Initialize, None);
        self.script_result(outcome)
    }

    fn tick(&mut self, _base: &ScriptBase, delta: f32) -> anyhow::Result<()> {
        let outcome = self.enter(LifecycleStage::Tick, Some(delta));
        self.script_result(outcome)
    }

    fn shutdown(&mut self, _base: &ScriptBase) -> anyhow::Result<()> {
        let outcome = self.enter(LifecycleStage::Shutdown, None);
        self.script_result(outcome)
    }
}

impl std::fmt::Debug for WasmScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmScript")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("entity", &self.store.data().entity)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Load-time checks
// ---------------------------------------------------------------------------

fn check_module(module: &Module, config: &WasmConfig) -> Result<(), WasmError> {
    for import in module.imports() {
        let unresolved = || WasmError::UnresolvedBinding {
            module: import.module().to_owned(),
            name: import.name().to_owned(),
        };
        if import.module() != IMPORT_MODULE {
            return Err(unresolved());
        }
        let expected = host_api::expected_import(import.name()).ok_or_else(unresolved)?;
        let ExternType::Func(found) = import.ty() else {
            return Err(unresolved());
        };
        if !expected.matches(&found) {
            return Err(WasmError::ImportSignature {
                name: import.name().to_owned(),
                expected: expected.to_string(),
                found: host_api::describe_func_type(&found),
            });
        }
    }

    if module.get_export("tick").is_none() {
        return Err(WasmError::MissingExport {
            name: "tick".to_owned(),
        });
    }

    for export in module.exports() {
        if let ExternType::Memory(memory) = export.ty() {
            let initial = memory.minimum().saturating_mul(WASM_PAGE_BYTES);
            if initial > config.memory_limit_bytes as u64 {
                return Err(WasmError::MemoryLimitExceeded {
                    limit_bytes: config.memory_limit_bytes,
                });
            }
        }
    }

    Ok(())
}

fn optional_entry(
    instance: &Instance,
    store: &mut Store<ScriptState>,
    name: &str,
) -> Result<Option<TypedFunc<(), ()>>, WasmError> {
    if instance.get_func(&mut *store, name).is_none() {
        return Ok(None);
    }
    instance
        .get_typed_func::<(), ()>(&mut *store, name)
        .map(Some)
        .map_err(|_| WasmError::ExportSignature {
            name: name.to_owned(),
            expected: "() -> ()",
        })
}

/// Map a Wasmtime call error to a [`WasmError`], recognising fuel
/// exhaustion anywhere in the error chain.
fn classify_trap(error: anyhow::Error, budget: u64) -> WasmError {
    for cause in error.chain() {
        if let Some(trap) = cause.downcast_ref::<wasmtime::Trap>() {
            if *trap == wasmtime::Trap::OutOfFuel {
                return WasmError::OutOfFuel { budget };
            }
            return WasmError::Trap(format!("{error}"));
        }
    }
    WasmError::Runtime(format!("{error:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: WasmConfig = serde_json::from_str(r#"{ "fuel_per_call": 500 }"#).unwrap();
        assert_eq!(config.fuel_per_call, 500);
        assert_eq!(config.memory_limit_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn non_trap_errors_are_runtime_errors() {
        let err = classify_trap(anyhow::anyhow!("host state poisoned"), 10);
        assert!(matches!(err, WasmError::Runtime(msg) if msg.contains("poisoned")));
    }

    #[test]
    fn fuel_exhaustion_is_recognised_through_context() {
        let err = anyhow::Error::from(wasmtime::Trap::OutOfFuel).context("while ticking");
        assert!(matches!(classify_trap(err, 42), WasmError::OutOfFuel { budget: 42 }));

        let err = anyhow::Error::from(wasmtime::Trap::UnreachableCodeReached);
        assert!(matches!(classify_trap(err, 42), WasmError::Trap(_)));
    }
}
