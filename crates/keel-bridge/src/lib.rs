//! Keel Bridge -- the handle-based boundary between user scripts and the
//! native engine host.
//!
//! Scripts never see native memory. They hold opaque [`Handle`]s, pass small
//! fixed-layout value aggregates ([`Vector2`], [`Vector3`],
//! [`Quaternion`]) and stable
//! enumerations ([`LogSeverity`], [`KeyCode`]), and reach the host only
//! through a [`BindingTable`] resolved once at load time.
//!
//! # Architecture
//!
//! - **`handle` / `value` / `key` / `severity`**: the primitives that cross
//!   the boundary, with fixed widths, layouts and ordinals.
//! - **`abi` / `catalog`**: the closed set of declared operations and the
//!   tagged values used to marshal their arguments.
//! - **`binding`**: [`NativeExports`] (what the host offers) is resolved into
//!   an immutable [`BindingTable`] shared through a [`Bridge`].
//! - **`entity` / `transform` / `script`**: wrapper objects scripts use
//!   instead of raw handles.
//! - **`debug` / `input` / `world` / `time`**: stateless facades.
//! - **`lifecycle`**: the guarded `initialize` / `tick` / `shutdown` entry
//!   points the host drives.
//!
//! # Example
//!
//! ```
//! use keel_bridge::prelude::*;
//!
//! // A real host registers every catalog operation; binding with an empty
//! // export table fails and names what is missing.
//! let exports = NativeExports::new();
//! let err = Bridge::bind(&exports).unwrap_err();
//! assert!(matches!(err, BindError::Unresolved { .. }));
//! assert!(err.to_string().contains("Debug.Log"));
//! ```

#![deny(unsafe_code)]

pub mod abi;
pub mod binding;
pub mod catalog;
pub mod config;
pub mod debug;
pub mod entity;
pub mod handle;
pub mod input;
pub mod key;
pub mod layout;
pub mod lifecycle;
pub mod script;
pub mod severity;
pub mod time;
pub mod transform;
pub mod value;
pub mod world;

pub use abi::{AbiType, AbiValue};
pub use binding::{BindError, BindingTable, Bridge, NativeExports, NativeFn};
pub use catalog::{abi_fingerprint, OpId, Signature};
pub use config::BridgeConfig;
pub use entity::Entity;
pub use handle::Handle;
pub use key::{KeyCategory, KeyCode};
pub use layout::{Aggregate, AggregateLayout, FieldLayout};
pub use lifecycle::{EntryStatus, InstanceId, LifecyclePhase, LifecycleStage, ScriptRuntime};
pub use script::{Script, ScriptBase};
pub use severity::LogSeverity;
pub use transform::Transform;
pub use value::{Quaternion, Vector2, Vector3};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by a call across the bridge after binding succeeded.
///
/// None of these are fatal to the runtime: they describe one rejected or
/// failed call.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A handle argument carried the reserved null sentinel. The call was
    /// rejected before reaching native code.
    #[error("null handle passed to '{op}' -- the operation was not forwarded to the host")]
    NullHandle {
        /// Dotted name of the rejected operation.
        op: &'static str,
    },

    /// The argument list does not match the declared signature.
    #[error("argument mismatch calling {op}: expected ({expected}), got ({found})")]
    ArgumentMismatch {
        op: String,
        expected: String,
        found: String,
    },

    /// The native implementation returned a value of the wrong type.
    #[error("native '{op}' returned {found}, declared return type is {expected}")]
    ReturnMismatch {
        op: String,
        expected: AbiType,
        found: AbiType,
    },

    /// The native implementation panicked. The panic was caught at the
    /// boundary.
    #[error("native fault in {op}: {message}")]
    NativeFault { op: String, message: String },

    /// No lifecycle entry point is registered under this name.
    #[error("unknown lifecycle entry point '{name}' (expected one of: initialize, tick, shutdown)")]
    UnknownEntryPoint { name: String },

    /// No live script instance has this id.
    #[error("no script instance with id {id}")]
    UnknownInstance { id: u64 },
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for script authors and hosts.
pub mod prelude {
    pub use crate::abi::{AbiType, AbiValue};
    pub use crate::binding::{BindError, BindingTable, Bridge, NativeExports};
    pub use crate::catalog::{OpId, Signature};
    pub use crate::config::BridgeConfig;
    pub use crate::entity::Entity;
    pub use crate::handle::Handle;
    pub use crate::key::KeyCode;
    pub use crate::layout::Aggregate;
    pub use crate::lifecycle::{EntryStatus, ScriptRuntime};
    pub use crate::script::{Script, ScriptBase};
    pub use crate::severity::LogSeverity;
    pub use crate::transform::Transform;
    pub use crate::value::{Quaternion, Vector2, Vector3};
    pub use crate::{debug, input, time, world, BridgeError};
}
