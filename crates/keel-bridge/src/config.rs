//! Bridge configuration.

use serde::{Deserialize, Serialize};

/// Knobs fixed at bind time and carried by the [`BindingTable`](crate::BindingTable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Check argument count and types against the declared signature on
    /// every call. Null-handle rejection happens regardless. Default: `true`.
    pub check_arguments: bool,

    /// Forward faults caught in lifecycle entry points to the host's log
    /// sink as `Error` records, in addition to the local `tracing` event.
    /// Default: `true`.
    pub forward_faults: bool,

    /// Refuse to bind against a host that does not declare an ABI
    /// fingerprint. A declared fingerprint is always checked. Default: `false`.
    pub require_fingerprint: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            check_arguments: true,
            forward_faults: true,
            require_fingerprint: false,
        }
    }
}
