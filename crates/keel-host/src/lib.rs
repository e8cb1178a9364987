//! Keel Host -- a reference native host for the Keel script bridge.
//!
//! Owns every object scripts can name, answers every operation in the
//! bridge catalog, and drives the script lifecycle at a fixed step. It is
//! small on purpose: a real engine replaces the scene with its own, but the
//! contract it must honour is the one exercised here.
//!
//! # Architecture
//!
//! - **`handles` / `scene`**: generational handles over entity and transform
//!   records. Stale handles are detected, never dereferenced.
//! - **`input`**: device events latched once per step.
//! - **`world_io`**: JSON world documents for `World.Load` / `World.Save`.
//! - **`log_sink`**: bounded store for `Debug.Log` records.
//! - **`host`**: [`NativeHost`], the shared state and the export table.
//! - **`run_loop`**: [`HostLoop`], the fixed-step driver.

#![deny(unsafe_code)]

pub mod config;
pub mod handles;
pub mod host;
pub mod input;
pub mod log_sink;
pub mod logging;
pub mod run_loop;
pub mod scene;
pub mod world_io;

use std::path::PathBuf;

use keel_bridge::{BindError, BridgeError};

pub use config::HostConfig;
pub use handles::HandleAllocator;
pub use host::{Clock, HostState, NativeHost};
pub use input::InputState;
pub use log_sink::{LogRecord, LogSink};
pub use run_loop::{HostLoop, StepDiagnostics};
pub use scene::{EntityRecord, Scene, SpawnedObject, TransformRecord};
pub use world_io::{WorldDocument, WORLD_FORMAT_VERSION};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from host setup and world file handling.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Binding the bridge against this host failed.
    #[error("bridge binding failed: {0}")]
    Bind(#[from] BindError),

    /// A call through the bridge failed during host setup.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A world file could not be read or written.
    #[error("world file I/O failed for {}: {source}", .path.display())]
    WorldIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A world file is not a valid world document.
    #[error("world file {} is malformed: {source}", .path.display())]
    WorldFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A world file was written by an incompatible format version.
    #[error("unsupported world format version {found} (expected {expected})")]
    WorldVersion { found: u32, expected: u32 },

    /// A script-supplied world path is absolute or leaves the world root.
    #[error("world path '{}' escapes the world root", .path.display())]
    PathEscapesRoot { path: PathBuf },

    /// The host configuration is not valid JSON for [`HostConfig`].
    #[error("invalid host configuration: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    /// The fixed step is zero, negative or not finite.
    #[error("fixed_dt must be positive and finite, got {0}")]
    InvalidFixedDt(f32),
}
