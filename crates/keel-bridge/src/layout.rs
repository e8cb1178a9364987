//! Byte layouts of value aggregates that cross the boundary.
//!
//! Both sides describe every aggregate they exchange as an
//! [`AggregateLayout`]. The binding step compares the managed description
//! with the one the host declares and refuses to bind on any disagreement,
//! so a layout drift is caught at load time rather than as corrupted values
//! mid-call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One field of an aggregate: its name, byte offset and byte size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

/// The full byte layout of a value aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateLayout {
    /// Type name both sides agree on (e.g. `"Vector3"`).
    pub name: String,
    /// Total size in bytes.
    pub size: usize,
    /// Required alignment in bytes.
    pub align: usize,
    /// Fields in declaration order.
    pub fields: Vec<FieldLayout>,
}

impl AggregateLayout {
    /// Start describing an aggregate with no fields.
    pub fn new(name: &str, size: usize, align: usize) -> Self {
        Self {
            name: name.to_owned(),
            size,
            align,
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn field(mut self, name: &str, offset: usize, size: usize) -> Self {
        self.fields.push(FieldLayout {
            name: name.to_owned(),
            offset,
            size,
        });
        self
    }
}

impl fmt::Display for AggregateLayout {
    /// Canonical single-line form, e.g. `Vector2{size=8,align=4,x@0:4,y@4:4}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{size={},align={}", self.name, self.size, self.align)?;
        for field in &self.fields {
            write!(f, ",{}@{}:{}", field.name, field.offset, field.size)?;
        }
        f.write_str("}")
    }
}

/// A plain-old-data value aggregate with a published layout.
pub trait Aggregate: bytemuck::Pod {
    /// The layout of `Self` as compiled on the managed side.
    fn layout() -> AggregateLayout;

    /// Decode from exactly `size_of::<Self>()` bytes with no alignment
    /// requirement. Returns `None` if the slice length is wrong.
    fn read_unaligned(bytes: &[u8]) -> Option<Self> {
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }

    /// The raw bytes of `self`, in field order.
    fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
