//! The closed catalog of operations scripts may call on the host.
//!
//! Each entry is a full signature: a script-visible dotted name (overloads
//! share it), a flat symbol unique across the catalog, the ordered parameter
//! types and the return type. The binding step resolves every entry to
//! exactly one native function, and [`OpId`] indexes the resulting table.

use std::fmt;

use crate::abi::{type_list, AbiType};
use crate::key::KeyCode;
use crate::layout::Aggregate;
use crate::severity::LogSeverity;
use crate::value::{Quaternion, Vector2, Vector3};

/// A declared boundary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Script-visible name, e.g. `"Transform.SetPosition"`.
    pub name: &'static str,
    /// Flat identifier, unique per signature, e.g. `"transform_set_position"`.
    pub symbol: &'static str,
    /// Ordered parameter types.
    pub params: &'static [AbiType],
    /// Return type.
    pub ret: AbiType,
}

impl fmt::Display for Signature {
    /// `Name(P1, P2) -> R`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            self.name,
            type_list(self.params.iter().copied()),
            self.ret
        )
    }
}

macro_rules! catalog {
    ($($op:ident => $name:literal, $symbol:literal, ($($param:ident),*) -> $ret:ident;)+) => {
        /// Index of a declared operation in the catalog and binding table.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum OpId {
            $($op),+
        }

        impl OpId {
            /// Every operation, in table order.
            pub const ALL: &'static [OpId] = &[$(OpId::$op),+];
        }

        /// Every declared signature, indexed by [`OpId`].
        pub static CATALOG: &[Signature] = &[
            $(Signature {
                name: $name,
                symbol: $symbol,
                params: &[$(AbiType::$param),*],
                ret: AbiType::$ret,
            }),+
        ];
    };
}

catalog! {
    DebugLogText => "Debug.Log", "debug_log_text", (Str, LogSeverity) -> Void;
    DebugLogInt => "Debug.Log", "debug_log_int", (I32, LogSeverity) -> Void;
    DebugLogFloat => "Debug.Log", "debug_log_float", (F32, LogSeverity) -> Void;
    DebugLogBool => "Debug.Log", "debug_log_bool", (Bool, LogSeverity) -> Void;
    DebugLogVector3 => "Debug.Log", "debug_log_vector3", (Vector3, LogSeverity) -> Void;

    InputGetKeyDown => "Input.GetKeyDown", "input_get_key_down", (KeyCode) -> Bool;
    InputGetKey => "Input.GetKey", "input_get_key", (KeyCode) -> Bool;
    InputGetKeyUp => "Input.GetKeyUp", "input_get_key_up", (KeyCode) -> Bool;
    InputGetMousePosition => "Input.GetMousePosition", "input_get_mouse_position", () -> Vector2;
    InputGetMouseDelta => "Input.GetMouseDelta", "input_get_mouse_delta", () -> Vector2;
    InputGetMouseWheelDelta => "Input.GetMouseWheelDelta", "input_get_mouse_wheel_delta", () -> Vector2;

    WorldLoad => "World.Load", "world_load", (Str) -> Bool;
    WorldSave => "World.Save", "world_save", (Str) -> Bool;

    TimeGetDeltaTime => "Time.GetDeltaTime", "time_get_delta_time", () -> F32;

    EntityIsAlive => "Entity.IsAlive", "entity_is_alive", (Handle) -> Bool;
    EntityGetName => "Entity.GetName", "entity_get_name", (Handle) -> Str;
    EntityIsActive => "Entity.IsActive", "entity_is_active", (Handle) -> Bool;
    EntitySetActive => "Entity.SetActive", "entity_set_active", (Handle, Bool) -> Void;
    EntitySetName => "Entity.SetName", "entity_set_name", (Handle, Str) -> Void;

    TransformGetPosition => "Transform.GetPosition", "transform_get_position", (Handle) -> Vector3;
    TransformSetPosition => "Transform.SetPosition", "transform_set_position", (Handle, Vector3) -> Void;
    TransformGetScale => "Transform.GetScale", "transform_get_scale", (Handle) -> Vector3;
    TransformSetScale => "Transform.SetScale", "transform_set_scale", (Handle, Vector3) -> Void;
    TransformTranslate => "Transform.Translate", "transform_translate", (Handle, Vector3) -> Void;
    TransformGetRotation => "Transform.GetRotation", "transform_get_rotation", (Handle) -> Quaternion;
    TransformSetRotation => "Transform.SetRotation", "transform_set_rotation", (Handle, Quaternion) -> Void;
    TransformRotate => "Transform.Rotate", "transform_rotate", (Handle, Quaternion) -> Void;
}

impl OpId {
    /// The declared signature of this operation.
    #[inline]
    pub fn signature(self) -> &'static Signature {
        &CATALOG[self as usize]
    }

    /// Look an operation up by its flat symbol.
    pub fn from_symbol(symbol: &str) -> Option<OpId> {
        OpId::ALL
            .iter()
            .copied()
            .find(|op| op.signature().symbol == symbol)
    }
}

/// Digest of everything both sides must agree on: every signature, both
/// enumeration ordinal tables, and every aggregate layout.
///
/// Two builds of the same declarations produce the same fingerprint; any
/// renumbered key, reordered parameter or changed layout produces a
/// different one.
pub fn abi_fingerprint() -> String {
    let mut hasher = blake3::Hasher::new();
    for signature in CATALOG {
        hasher.update(signature.symbol.as_bytes());
        hasher.update(b"=");
        hasher.update(signature.to_string().as_bytes());
        hasher.update(b"\n");
    }
    for severity in LogSeverity::ALL {
        hasher.update(format!("severity {}={}\n", severity.name(), severity.ordinal()).as_bytes());
    }
    for (name, ordinal) in KeyCode::ordinal_table() {
        hasher.update(format!("key {name}={ordinal}\n").as_bytes());
    }
    hasher.update(Vector2::layout().to_string().as_bytes());
    hasher.update(Vector3::layout().to_string().as_bytes());
    hasher.update(Quaternion::layout().to_string().as_bytes());
    hasher.finalize().to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn op_ids_index_their_own_signature() {
        assert_eq!(OpId::ALL.len(), CATALOG.len());
        for (i, op) in OpId::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
    }

    #[test]
    fn symbols_are_unique() {
        let symbols: HashSet<&str> = CATALOG.iter().map(|s| s.symbol).collect();
        assert_eq!(symbols.len(), CATALOG.len());
    }

    #[test]
    fn overloads_differ_in_parameters() {
        let keys: HashSet<(&str, &[AbiType])> =
            CATALOG.iter().map(|s| (s.name, s.params)).collect();
        assert_eq!(keys.len(), CATALOG.len(), "two entries share name and params");
    }

    #[test]
    fn signature_display_is_canonical() {
        assert_eq!(
            OpId::TransformSetPosition.signature().to_string(),
            "Transform.SetPosition(Handle, Vector3) -> Void"
        );
        assert_eq!(
            OpId::InputGetMouseDelta.signature().to_string(),
            "Input.GetMouseDelta() -> Vector2"
        );
    }

    #[test]
    fn from_symbol_round_trips() {
        assert_eq!(OpId::from_symbol("world_load"), Some(OpId::WorldLoad));
        assert_eq!(OpId::from_symbol("world_delete"), None);
    }

    #[test]
    fn fingerprint_is_stable_within_a_build() {
        let a = abi_fingerprint();
        let b = abi_fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64, "blake3 hex digest");
    }
}
