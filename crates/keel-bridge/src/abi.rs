//! Types and tagged values that may appear in a boundary signature.
//!
//! Only these shapes ever cross: handles, the two vector aggregates, the two
//! enumerations, and a handful of primitives. Anything richer stays on one
//! side or the other.

use std::fmt;

use crate::handle::Handle;
use crate::key::KeyCode;
use crate::severity::LogSeverity;
use crate::value::{Quaternion, Vector2, Vector3};

/// The declared type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiType {
    Void,
    Bool,
    I32,
    F32,
    Str,
    Handle,
    Vector2,
    Vector3,
    Quaternion,
    LogSeverity,
    KeyCode,
}

impl AbiType {
    pub const fn name(self) -> &'static str {
        match self {
            AbiType::Void => "Void",
            AbiType::Bool => "Bool",
            AbiType::I32 => "I32",
            AbiType::F32 => "F32",
            AbiType::Str => "Str",
            AbiType::Handle => "Handle",
            AbiType::Vector2 => "Vector2",
            AbiType::Vector3 => "Vector3",
            AbiType::Quaternion => "Quaternion",
            AbiType::LogSeverity => "LogSeverity",
            AbiType::KeyCode => "KeyCode",
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value in flight across the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum AbiValue {
    Void,
    Bool(bool),
    I32(i32),
    F32(f32),
    Str(String),
    Handle(Handle),
    Vector2(Vector2),
    Vector3(Vector3),
    Quaternion(Quaternion),
    LogSeverity(LogSeverity),
    KeyCode(KeyCode),
}

impl AbiValue {
    /// The [`AbiType`] this value inhabits.
    pub fn abi_type(&self) -> AbiType {
        match self {
            AbiValue::Void => AbiType::Void,
            AbiValue::Bool(_) => AbiType::Bool,
            AbiValue::I32(_) => AbiType::I32,
            AbiValue::F32(_) => AbiType::F32,
            AbiValue::Str(_) => AbiType::Str,
            AbiValue::Handle(_) => AbiType::Handle,
            AbiValue::Vector2(_) => AbiType::Vector2,
            AbiValue::Vector3(_) => AbiType::Vector3,
            AbiValue::Quaternion(_) => AbiType::Quaternion,
            AbiValue::LogSeverity(_) => AbiType::LogSeverity,
            AbiValue::KeyCode(_) => AbiType::KeyCode,
        }
    }

    /// The neutral value of a type: what a host returns when the object a
    /// handle named is gone.
    pub fn neutral(ty: AbiType) -> AbiValue {
        match ty {
            AbiType::Void => AbiValue::Void,
            AbiType::Bool => AbiValue::Bool(false),
            AbiType::I32 => AbiValue::I32(0),
            AbiType::F32 => AbiValue::F32(0.0),
            AbiType::Str => AbiValue::Str(String::new()),
            AbiType::Handle => AbiValue::Handle(Handle::NULL),
            AbiType::Vector2 => AbiValue::Vector2(Vector2::ZERO),
            AbiType::Vector3 => AbiValue::Vector3(Vector3::ZERO),
            AbiType::Quaternion => AbiValue::Quaternion(Quaternion::IDENTITY),
            AbiType::LogSeverity => AbiValue::LogSeverity(LogSeverity::Info),
            AbiType::KeyCode => AbiValue::KeyCode(KeyCode::ALL[0]),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            AbiValue::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector2(&self) -> Option<Vector2> {
        match self {
            AbiValue::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector3(&self) -> Option<Vector3> {
        match self {
            AbiValue::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_quaternion(&self) -> Option<Quaternion> {
        match self {
            AbiValue::Quaternion(q) => Some(*q),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            AbiValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Render a type list as `A, B, C`.
pub(crate) fn type_list(types: impl IntoIterator<Item = AbiType>) -> String {
    types
        .into_iter()
        .map(AbiType::name)
        .collect::<Vec<_>>()
        .join(", ")
}
