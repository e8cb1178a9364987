//! Guarded lifecycle entry points driven by the host.
//!
//! The host calls [`ScriptRuntime::initialize`] once, [`ScriptRuntime::tick`]
//! once per simulation step, and [`ScriptRuntime::shutdown`] once. Each call
//! fans out to every live script instance.
//!
//! # Fault containment
//!
//! Nothing a script does can fail past an entry point. Each script call runs
//! under `catch_unwind`; a returned error or a panic is logged as a `tracing`
//! error event and, when [`BridgeConfig::forward_faults`] is set, sent to the
//! host as an `Error` record through `Debug.Log`. The entry point then
//! reports [`EntryStatus::Failed`], which the host is free to ignore.
//!
//! # Ordering
//!
//! | phase     | `initialize` | `tick`  | `shutdown` |
//! |-----------|--------------|---------|------------|
//! | loaded    | runs         | skipped | skipped    |
//! | running   | skipped      | runs    | runs       |
//! | stopped   | skipped      | skipped | skipped    |
//!
//! Instances spawned while running are initialized right before their first
//! tick.
//!
//! [`BridgeConfig::forward_faults`]: crate::BridgeConfig::forward_faults

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::binding::Bridge;
use crate::handle::Handle;
use crate::script::{Script, ScriptBase};
use crate::severity::LogSeverity;
use crate::{debug, panic_message, time, BridgeError};

// ---------------------------------------------------------------------------
// LifecycleStage / EntryStatus
// ---------------------------------------------------------------------------

/// The three entry points, resolvable by exact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    Initialize,
    Tick,
    Shutdown,
}

impl LifecycleStage {
    pub const ALL: [LifecycleStage; 3] = [
        LifecycleStage::Initialize,
        LifecycleStage::Tick,
        LifecycleStage::Shutdown,
    ];

    /// The exported name: `"initialize"`, `"tick"` or `"shutdown"`.
    pub const fn entry_name(self) -> &'static str {
        match self {
            LifecycleStage::Initialize => "initialize",
            LifecycleStage::Tick => "tick",
            LifecycleStage::Shutdown => "shutdown",
        }
    }

    /// Case-sensitive lookup by exported name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.entry_name() == name)
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_name())
    }
}

/// Outcome code returned by every entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EntryStatus {
    /// Every script call succeeded.
    Ok = 0,
    /// At least one script call failed; the failure was logged.
    Failed = 1,
    /// The entry point did nothing in the current phase.
    Skipped = 2,
}

impl EntryStatus {
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Combine two outcomes of the same entry point.
    fn merge(self, other: EntryStatus) -> EntryStatus {
        match (self, other) {
            (EntryStatus::Failed, _) | (_, EntryStatus::Failed) => EntryStatus::Failed,
            (EntryStatus::Ok, _) | (_, EntryStatus::Ok) => EntryStatus::Ok,
            _ => EntryStatus::Skipped,
        }
    }
}

/// Identifies a script instance within one [`ScriptRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position in the initialize, tick, shutdown order shown in the table
/// above. Shared by every driver of entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    #[default]
    Loaded,
    Running,
    Stopped,
}

impl LifecyclePhase {
    /// Advance for `stage`. Returns `false` and leaves the phase unchanged
    /// if `stage` is skipped in the current phase.
    pub fn enter(&mut self, stage: LifecycleStage) -> bool {
        let next = match (*self, stage) {
            (LifecyclePhase::Loaded, LifecycleStage::Initialize) => LifecyclePhase::Running,
            (LifecyclePhase::Running, LifecycleStage::Tick) => LifecyclePhase::Running,
            (LifecyclePhase::Running, LifecycleStage::Shutdown) => LifecyclePhase::Stopped,
            _ => return false,
        };
        *self = next;
        true
    }

    #[inline]
    pub fn is_running(self) -> bool {
        self == LifecyclePhase::Running
    }
}

// ---------------------------------------------------------------------------
// ScriptRuntime
// ---------------------------------------------------------------------------

struct Instance {
    id: InstanceId,
    label: String,
    base: ScriptBase,
    script: Box<dyn Script>,
    initialized: bool,
}

/// Owns every script instance and drives their lifecycle.
pub struct ScriptRuntime {
    bridge: Bridge,
    instances: Vec<Instance>,
    next_id: u64,
    phase: LifecyclePhase,
}

impl ScriptRuntime {
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge,
            instances: Vec::new(),
            next_id: 1,
            phase: LifecyclePhase::Loaded,
        }
    }

    /// Attach `script` to the host object named by the two handles.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NullHandle`] if either handle is null.
    pub fn spawn(
        &mut self,
        label: &str,
        entity: Handle,
        transform: Handle,
        script: Box<dyn Script>,
    ) -> Result<InstanceId, BridgeError> {
        let base = ScriptBase::new(self.bridge.clone(), entity, transform)?;
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        tracing::debug!(instance = %id, label, entity = %entity, "script spawned");
        self.instances.push(Instance {
            id,
            label: label.to_owned(),
            base,
            script,
            initialized: false,
        });
        Ok(id)
    }

    /// Remove an instance. A running, initialized instance has its
    /// `shutdown` called first.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownInstance`] if no instance has this id.
    pub fn despawn(&mut self, id: InstanceId) -> Result<EntryStatus, BridgeError> {
        let index = self
            .instances
            .iter()
            .position(|i| i.id == id)
            .ok_or(BridgeError::UnknownInstance { id: id.0 })?;
        let mut instance = self.instances.remove(index);
        let status = if self.phase.is_running() && instance.initialized {
            run_guarded(&self.bridge, LifecycleStage::Shutdown, &mut instance, |s, b| {
                s.shutdown(b)
            })
        } else {
            EntryStatus::Skipped
        };
        tracing::debug!(instance = %id, label = %instance.label, "script despawned");
        Ok(status)
    }

    /// Initialize every instance. Runs once; later calls are skipped.
    pub fn initialize(&mut self) -> EntryStatus {
        if !self.phase.enter(LifecycleStage::Initialize) {
            tracing::debug!("initialize skipped: already initialized");
            return EntryStatus::Skipped;
        }
        let mut status = EntryStatus::Ok;
        for instance in &mut self.instances {
            status = status.merge(initialize_instance(&self.bridge, instance));
        }
        status
    }

    /// Advance every instance by `delta` seconds.
    pub fn tick(&mut self, delta: f32) -> EntryStatus {
        if !self.phase.enter(LifecycleStage::Tick) {
            tracing::debug!(phase = ?self.phase, "tick skipped");
            return EntryStatus::Skipped;
        }
        let mut status = EntryStatus::Ok;
        for instance in &mut self.instances {
            if !instance.initialized {
                status = status.merge(initialize_instance(&self.bridge, instance));
            }
            status = status.merge(run_guarded(
                &self.bridge,
                LifecycleStage::Tick,
                instance,
                |s, b| s.tick(b, delta),
            ));
        }
        status
    }

    /// Shut every initialized instance down. Runs once.
    pub fn shutdown(&mut self) -> EntryStatus {
        if !self.phase.enter(LifecycleStage::Shutdown) {
            tracing::debug!(phase = ?self.phase, "shutdown skipped");
            return EntryStatus::Skipped;
        }
        let mut status = EntryStatus::Ok;
        for instance in self.instances.iter_mut().filter(|i| i.initialized) {
            status = status.merge(run_guarded(
                &self.bridge,
                LifecycleStage::Shutdown,
                instance,
                |s, b| s.shutdown(b),
            ));
        }
        status
    }

    /// Run an entry point by its exported name.
    ///
    /// `"tick"` sources its delta from `Time.GetDeltaTime`; if that call
    /// fails the tick runs with a delta of zero.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownEntryPoint`] if `name` is not exactly one of
    /// `"initialize"`, `"tick"` or `"shutdown"`.
    pub fn invoke(&mut self, name: &str) -> Result<EntryStatus, BridgeError> {
        let stage = LifecycleStage::from_name(name).ok_or_else(|| {
            BridgeError::UnknownEntryPoint {
                name: name.to_owned(),
            }
        })?;
        Ok(match stage {
            LifecycleStage::Initialize => self.initialize(),
            LifecycleStage::Tick => {
                let delta = time::delta_time(&self.bridge).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Time.GetDeltaTime failed, ticking with zero delta");
                    0.0
                });
                self.tick(delta)
            }
            LifecycleStage::Shutdown => self.shutdown(),
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// The base of a live instance.
    pub fn base(&self, id: InstanceId) -> Option<&ScriptBase> {
        self.instances.iter().find(|i| i.id == id).map(|i| &i.base)
    }

    pub fn is_running(&self) -> bool {
        self.phase.is_running()
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}

impl fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("instances", &self.instances.len())
            .field("phase", &self.phase)
            .finish()
    }
}

fn initialize_instance(bridge: &Bridge, instance: &mut Instance) -> EntryStatus {
    instance.initialized = true;
    run_guarded(bridge, LifecycleStage::Initialize, instance, |s, b| {
        s.initialize(b)
    })
}

/// Run one script call, containing any error or panic.
fn run_guarded<F>(
    bridge: &Bridge,
    stage: LifecycleStage,
    instance: &mut Instance,
    call: F,
) -> EntryStatus
where
    F: FnOnce(&mut dyn Script, &ScriptBase) -> anyhow::Result<()>,
{
    let Instance {
        id,
        label,
        base,
        script,
        ..
    } = instance;

    let message = match panic::catch_unwind(AssertUnwindSafe(|| call(script.as_mut(), base))) {
        Ok(Ok(())) => return EntryStatus::Ok,
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    tracing::error!(
        instance = %id,
        label = %label,
        stage = stage.entry_name(),
        error = %message,
        "script entry point failed"
    );
    if bridge.config().forward_faults {
        let record = format!("[{label}] {stage} failed: {message}");
        if let Err(e) = debug::log(bridge, record.as_str(), LogSeverity::Error) {
            tracing::warn!(error = %e, "could not forward script fault to host");
        }
    }
    EntryStatus::Failed
}
