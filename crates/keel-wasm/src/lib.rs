//! Keel WASM -- sandboxed WebAssembly scripts on top of the Keel bridge.
//!
//! A script module imports catalog operations from the `"keel"` namespace by
//! their flat symbols and exports the lifecycle entry points. Every import is
//! answered by the same [`Bridge`](keel_bridge::Bridge) native scripts use,
//! so argument checking, null-handle rejection and fault containment apply
//! unchanged.
//!
//! # Architecture
//!
//! - **`host_api`**: lowering of boundary types to WASM values and the
//!   `"keel"` host functions registered on the [`wasmtime::Linker`].
//! - **`module`**: [`WasmScript`], one instantiated module bound to one
//!   entity and transform, with per-call fuel budgets and a memory cap. It
//!   implements [`Script`](keel_bridge::Script), so a host loop can run it
//!   alongside native scripts.
//!
//! Host functions never trap: a rejected or failed call logs a warning and
//! hands the script a neutral value. Traps raised by the script itself
//! (including fuel exhaustion) are caught at the entry point and reported as
//! [`EntryStatus::Failed`](keel_bridge::EntryStatus::Failed).

#![deny(unsafe_code)]

pub mod host_api;
pub mod module;

use keel_bridge::BridgeError;

pub use host_api::{lower_signature, LoweredSignature, ScriptState, WasmType, IMPORT_MODULE};
pub use module::{WasmConfig, WasmScript};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or running a WASM script.
#[derive(Debug, thiserror::Error)]
pub enum WasmError {
    /// The WASM bytes (or WAT text) could not be compiled.
    #[error("failed to compile WASM module: {0}")]
    CompileError(String),

    /// The module does not export a required function.
    #[error("WASM module is missing required export '{name}'")]
    MissingExport {
        /// Name of the missing export.
        name: String,
    },

    /// An entry point is exported with a signature the runtime cannot call.
    #[error("WASM export '{name}' has the wrong signature (expected {expected})")]
    ExportSignature {
        name: String,
        expected: &'static str,
    },

    /// The module imports something no host function answers. Raised at
    /// load time, before any script code runs.
    #[error("WASM import '{module}.{name}' does not resolve to a bridge operation")]
    UnresolvedBinding {
        /// Import namespace as written in the module.
        module: String,
        /// Import name as written in the module.
        name: String,
    },

    /// A `"keel"` import names a host function but declares a different
    /// function type for it.
    #[error("WASM import 'keel.{name}' has type {found}, expected {expected}")]
    ImportSignature {
        name: String,
        expected: String,
        found: String,
    },

    /// The script exhausted its fuel budget for one entry point call.
    #[error("WASM script ran out of fuel (budget: {budget})")]
    OutOfFuel {
        /// The fuel budget that was exhausted.
        budget: u64,
    },

    /// The script trapped (unreachable, out-of-bounds access, etc.).
    #[error("WASM trap: {0}")]
    Trap(String),

    /// The module declares more linear memory than the configured limit.
    #[error("WASM memory limit exceeded (limit: {limit_bytes} bytes)")]
    MemoryLimitExceeded {
        /// The configured memory limit in bytes.
        limit_bytes: usize,
    },

    /// The script could not be bound to its object.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A Wasmtime runtime error that is not a trap.
    #[error("WASM runtime error: {0}")]
    Runtime(String),
}
