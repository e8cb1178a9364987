//! Fixed-step driver that ties the host to the script runtime.
//!
//! Each [`HostLoop::step`]:
//!
//! 1. latches input, so every script sees the same snapshot this step,
//! 2. advances the clock by the fixed step,
//! 3. ticks every script instance with that delta.
//!
//! # Example
//!
//! ```
//! use keel_bridge::prelude::*;
//! use keel_host::{HostConfig, HostLoop, NativeHost};
//!
//! struct Drift;
//!
//! impl Script for Drift {
//!     fn tick(&mut self, base: &ScriptBase, delta: f32) -> anyhow::Result<()> {
//!         base.transform().translate(Vector3::new(delta, 0.0, 0.0))?;
//!         Ok(())
//!     }
//! }
//!
//! let host = NativeHost::new(HostConfig { fixed_dt: 0.5, ..Default::default() });
//! let mut host_loop = HostLoop::new(host).unwrap();
//! let (obj, _) = host_loop.spawn_scripted("drifter", Vector3::ZERO, Box::new(Drift)).unwrap();
//!
//! host_loop.start();
//! host_loop.run_steps(4);
//! host_loop.stop();
//!
//! let x = host_loop.host().with_state(|s| s.scene.transform(obj.transform).unwrap().position.x);
//! assert_eq!(x, 2.0);
//! ```

use std::time::{Duration, Instant};

use keel_bridge::{EntryStatus, InstanceId, Script, ScriptRuntime, Vector3};

use crate::host::NativeHost;
use crate::scene::SpawnedObject;
use crate::HostError;

/// Timing and outcome of the last step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDiagnostics {
    /// Step number, starting at 1.
    pub step: u64,
    pub status: EntryStatus,
    /// Time spent in script `tick` calls.
    pub tick_time: Duration,
    /// Time for the whole step, latch included.
    pub total_time: Duration,
    /// Log records scripts produced during the step.
    pub log_records: usize,
}

impl Default for StepDiagnostics {
    fn default() -> Self {
        Self {
            step: 0,
            status: EntryStatus::Skipped,
            tick_time: Duration::ZERO,
            total_time: Duration::ZERO,
            log_records: 0,
        }
    }
}

/// Binds once, then drives the script lifecycle at a fixed step.
pub struct HostLoop {
    host: NativeHost,
    runtime: ScriptRuntime,
    last_diagnostics: StepDiagnostics,
}

impl HostLoop {
    /// Bind a bridge against `host` and create an empty script runtime.
    pub fn new(host: NativeHost) -> Result<Self, HostError> {
        host.config().validate()?;
        let bridge = host.bind()?;
        Ok(Self {
            host,
            runtime: ScriptRuntime::new(bridge),
            last_diagnostics: StepDiagnostics::default(),
        })
    }

    /// Spawn an object and attach `script` to it.
    pub fn spawn_scripted(
        &mut self,
        name: &str,
        position: Vector3,
        script: Box<dyn Script>,
    ) -> Result<(SpawnedObject, InstanceId), HostError> {
        let obj = self.host.spawn_entity(name, position);
        let id = self.attach(name, obj, script)?;
        Ok((obj, id))
    }

    /// Attach `script` to an existing object.
    pub fn attach(
        &mut self,
        label: &str,
        obj: SpawnedObject,
        script: Box<dyn Script>,
    ) -> Result<InstanceId, HostError> {
        Ok(self.runtime.spawn(label, obj.entity, obj.transform, script)?)
    }

    /// Run `initialize` on every attached script.
    pub fn start(&mut self) -> EntryStatus {
        let status = self.runtime.initialize();
        tracing::info!(
            instances = self.runtime.instance_count(),
            status = ?status,
            "host loop started"
        );
        status
    }

    /// Advance one fixed step.
    pub fn step(&mut self) -> EntryStatus {
        let step_start = Instant::now();
        let (delta, step, logged_before) = self.host.with_state(|s| {
            s.input.latch();
            s.clock.advance();
            (s.clock.delta(), s.clock.steps(), s.log.len() as u64 + s.log.dropped())
        });

        let tick_start = Instant::now();
        let status = self.runtime.tick(delta);
        let tick_time = tick_start.elapsed();

        let logged_after = self
            .host
            .with_state(|s| s.log.len() as u64 + s.log.dropped());
        self.last_diagnostics = StepDiagnostics {
            step,
            status,
            tick_time,
            total_time: step_start.elapsed(),
            log_records: logged_after.saturating_sub(logged_before) as usize,
        };
        tracing::trace!(step, status = ?status, "step complete");
        status
    }

    /// Advance `n` steps. Returns how many of them reported a failure.
    pub fn run_steps(&mut self, n: u64) -> u64 {
        (0..n)
            .filter(|_| self.step() == EntryStatus::Failed)
            .count() as u64
    }

    /// Run `shutdown` on every script.
    pub fn stop(&mut self) -> EntryStatus {
        let status = self.runtime.shutdown();
        tracing::info!(steps = self.step_count(), status = ?status, "host loop stopped");
        status
    }

    // -- accessors ----------------------------------------------------------

    pub fn host(&self) -> &NativeHost {
        &self.host
    }

    pub fn runtime(&self) -> &ScriptRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut ScriptRuntime {
        &mut self.runtime
    }

    pub fn step_count(&self) -> u64 {
        self.host.with_state(|s| s.clock.steps())
    }

    pub fn elapsed(&self) -> f64 {
        self.host.with_state(|s| s.clock.elapsed())
    }

    pub fn last_diagnostics(&self) -> &StepDiagnostics {
        &self.last_diagnostics
    }
}
