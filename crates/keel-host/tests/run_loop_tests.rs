//! Tests for the fixed-step host loop driving real scripts.

use std::sync::{Arc, Mutex};

use keel_bridge::prelude::*;
use keel_host::{HostConfig, HostLoop, NativeHost};

// ---------------------------------------------------------------------------
// Test scripts
// ---------------------------------------------------------------------------

/// Moves right at one unit per second while Space is held.
struct Mover;

impl Script for Mover {
    fn tick(&mut self, base: &ScriptBase, delta: f32) -> anyhow::Result<()> {
        if input::key(base.bridge(), KeyCode::Space)? {
            base.transform().translate(Vector3::new(delta, 0.0, 0.0))?;
        }
        Ok(())
    }
}

/// Records what `Input.GetKeyDown(Space)` said, twice per tick.
struct KeyWatcher {
    seen: Arc<Mutex<Vec<(bool, bool)>>>,
}

impl Script for KeyWatcher {
    fn tick(&mut self, base: &ScriptBase, _delta: f32) -> anyhow::Result<()> {
        let first = input::key_down(base.bridge(), KeyCode::Space)?;
        let second = input::key_down(base.bridge(), KeyCode::Space)?;
        self.seen.lock().unwrap().push((first, second));
        Ok(())
    }
}

/// Fails every tick.
struct Broken;

impl Script for Broken {
    fn tick(&mut self, _base: &ScriptBase, _delta: f32) -> anyhow::Result<()> {
        anyhow::bail!("missing target")
    }
}

/// Logs its own name at startup.
struct Greeter;

impl Script for Greeter {
    fn initialize(&mut self, base: &ScriptBase) -> anyhow::Result<()> {
        let name = base.entity().name()?;
        debug::log_info(base.bridge(), &format!("hello from {name}"))?;
        Ok(())
    }

    fn tick(&mut self, _base: &ScriptBase, _delta: f32) -> anyhow::Result<()> {
        Ok(())
    }
}

fn new_loop(fixed_dt: f32) -> HostLoop {
    keel_host::logging::init_tracing("warn");
    let host = NativeHost::new(HostConfig {
        fixed_dt,
        ..Default::default()
    });
    HostLoop::new(host).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn scripts_see_input_and_fixed_delta() {
    let mut host_loop = new_loop(0.5);
    let (obj, _) = host_loop
        .spawn_scripted("mover", Vector3::ZERO, Box::new(Mover))
        .unwrap();
    assert_eq!(host_loop.start(), EntryStatus::Ok);

    host_loop.run_steps(2);
    host_loop.host().with_state(|s| s.input.press(KeyCode::Space));
    host_loop.run_steps(3);
    host_loop.host().with_state(|s| s.input.release(KeyCode::Space));
    host_loop.run_steps(2);

    let x = host_loop
        .host()
        .with_state(|s| s.scene.transform(obj.transform).unwrap().position.x);
    assert_eq!(x, 1.5);
    assert_eq!(host_loop.step_count(), 7);
    assert_eq!(host_loop.elapsed(), 3.5);
}

#[test]
fn key_down_fires_once_and_is_idempotent_within_a_step() {
    let mut host_loop = new_loop(1.0 / 60.0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let watcher = KeyWatcher {
        seen: Arc::clone(&seen),
    };
    host_loop
        .spawn_scripted("watcher", Vector3::ZERO, Box::new(watcher))
        .unwrap();
    host_loop.start();

    host_loop.host().with_state(|s| s.input.press(KeyCode::Space));
    host_loop.run_steps(3);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(true, true), (false, false), (false, false)]
    );
}

#[test]
fn failing_script_is_reported_and_forwarded() {
    let mut host_loop = new_loop(0.1);
    host_loop
        .spawn_scripted("broken", Vector3::ZERO, Box::new(Broken))
        .unwrap();
    host_loop.start();

    assert_eq!(host_loop.run_steps(2), 2);
    let diagnostics = host_loop.last_diagnostics();
    assert_eq!(diagnostics.step, 2);
    assert_eq!(diagnostics.status, EntryStatus::Failed);
    assert_eq!(diagnostics.log_records, 1);

    let record = host_loop
        .host()
        .with_state(|s| s.log.last().cloned())
        .unwrap();
    assert_eq!(record.severity, LogSeverity::Error);
    assert!(record.message.contains("missing target"));
}

#[test]
fn initialize_can_call_into_the_host() {
    let mut host_loop = new_loop(0.1);
    host_loop
        .spawn_scripted("lamp", Vector3::ZERO, Box::new(Greeter))
        .unwrap();
    assert_eq!(host_loop.start(), EntryStatus::Ok);

    let messages: Vec<String> = host_loop
        .host()
        .with_state(|s| s.log.records().map(|r| r.message.clone()).collect());
    assert_eq!(messages, vec!["hello from lamp".to_owned()]);
}

#[test]
fn steps_before_start_and_after_stop_are_skipped() {
    let mut host_loop = new_loop(0.1);
    host_loop
        .spawn_scripted("mover", Vector3::ZERO, Box::new(Mover))
        .unwrap();

    assert_eq!(host_loop.step(), EntryStatus::Skipped);
    host_loop.start();
    assert_eq!(host_loop.step(), EntryStatus::Ok);
    assert_eq!(host_loop.stop(), EntryStatus::Ok);
    assert_eq!(host_loop.step(), EntryStatus::Skipped);
    assert_eq!(host_loop.stop(), EntryStatus::Skipped);
}
