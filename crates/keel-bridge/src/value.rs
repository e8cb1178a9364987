//! Fixed-layout value aggregates passed by value across the boundary.

use std::mem::{align_of, offset_of, size_of};
use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::layout::{Aggregate, AggregateLayout};

// ---------------------------------------------------------------------------
// Vector2
// ---------------------------------------------------------------------------

/// Two packed `f32`s: `x` then `y`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Default,
    Serialize,
    Deserialize,
    bytemuck_derive::Pod,
    bytemuck_derive::Zeroable,
)]
#[repr(C)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

// ---------------------------------------------------------------------------
// Vector3
// ---------------------------------------------------------------------------

/// Three packed `f32`s: `x`, `y`, then `z`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Default,
    Serialize,
    Deserialize,
    bytemuck_derive::Pod,
    bytemuck_derive::Zeroable,
)]
#[repr(C)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

// ---------------------------------------------------------------------------
// Quaternion
// ---------------------------------------------------------------------------

/// A rotation as four packed `f32`s: the vector part `x`, `y`, `z`, then the
/// scalar `w`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Serialize,
    Deserialize,
    bytemuck_derive::Pod,
    bytemuck_derive::Zeroable,
)]
#[repr(C)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

// Both sides read these as tightly packed floats.
const _: () = assert!(size_of::<Vector2>() == 8 && align_of::<Vector2>() == 4);
const _: () = assert!(size_of::<Vector3>() == 12 && align_of::<Vector3>() == 4);
const _: () = assert!(size_of::<Quaternion>() == 16 && align_of::<Quaternion>() == 4);

impl Vector2 {
    pub const ZERO: Vector2 = Vector2::new(0.0, 0.0);
    pub const ONE: Vector2 = Vector2::new(1.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Componentwise equality within `epsilon`.
    pub fn approx_eq(self, other: Vector2, epsilon: f32) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const ONE: Vector3 = Vector3::new(1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Componentwise equality within `epsilon`.
    pub fn approx_eq(self, other: Vector3, epsilon: f32) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians about `axis`. A zero axis gives the
    /// identity.
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        let len = (axis.x * axis.x + axis.y * axis.y + axis.z * axis.z).sqrt();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let (sin, cos) = (angle * 0.5).sin_cos();
        let k = sin / len;
        Self::new(axis.x * k, axis.y * k, axis.z * k, cos)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Unit-length copy, or the identity if `self` has zero length.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == 0.0 || !len.is_finite() {
            return Self::IDENTITY;
        }
        Self::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }

    /// Componentwise equality within `epsilon`. `q` and `-q` are the same
    /// rotation but compare unequal here.
    pub fn approx_eq(self, other: Quaternion, epsilon: f32) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
            && (self.w - other.w).abs() <= epsilon
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Aggregate for Vector2 {
    fn layout() -> AggregateLayout {
        AggregateLayout::new("Vector2", size_of::<Self>(), align_of::<Self>())
            .field("x", offset_of!(Vector2, x), size_of::<f32>())
            .field("y", offset_of!(Vector2, y), size_of::<f32>())
    }
}

impl Aggregate for Vector3 {
    fn layout() -> AggregateLayout {
        AggregateLayout::new("Vector3", size_of::<Self>(), align_of::<Self>())
            .field("x", offset_of!(Vector3, x), size_of::<f32>())
            .field("y", offset_of!(Vector3, y), size_of::<f32>())
            .field("z", offset_of!(Vector3, z), size_of::<f32>())
    }
}

impl Aggregate for Quaternion {
    fn layout() -> AggregateLayout {
        AggregateLayout::new("Quaternion", size_of::<Self>(), align_of::<Self>())
            .field("x", offset_of!(Quaternion, x), size_of::<f32>())
            .field("y", offset_of!(Quaternion, y), size_of::<f32>())
            .field("z", offset_of!(Quaternion, z), size_of::<f32>())
            .field("w", offset_of!(Quaternion, w), size_of::<f32>())
    }
}

// -- operators ----------------------------------------------------------------

impl Add for Vector2 {
    type Output = Vector2;
    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;
    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, rhs: Vector2) {
        *self = *self + rhs;
    }
}

impl Mul<f32> for Vector2 {
    type Output = Vector2;
    fn mul(self, rhs: f32) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Vector3) {
        *self = *self + rhs;
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Hamilton product: `a * b` applies `b` first, then `a`.
impl Mul for Quaternion {
    type Output = Quaternion;
    fn mul(self, rhs: Quaternion) -> Quaternion {
        let (a, b) = (self, rhs);
        Quaternion::new(
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
