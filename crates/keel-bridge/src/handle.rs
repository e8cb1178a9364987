//! Opaque native object handles.
//!
//! A [`Handle`] is the only thing the managed side knows about a native
//! object. The host mints it when the object is created and invalidates it
//! when the object is destroyed; scripts store and forward it, nothing more.

use std::fmt;

/// An opaque 64-bit identifier for a native object.
///
/// Deliberately offers no ordering and no arithmetic: two handles can only be
/// compared for equality. The raw value [`Handle::NULL`] means "no object"
/// and is rejected by every handle-consuming operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    /// The reserved "no object" sentinel.
    pub const NULL: Handle = Handle(0);

    /// Wrap a raw value received from the host.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value, for handing back to the host.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Whether this is the null sentinel.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Handle(null)")
        } else {
            write!(f, "Handle({:#x})", self.0)
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sentinel_is_zero() {
        assert!(Handle::NULL.is_null());
        assert!(Handle::from_raw(0).is_null());
        assert_eq!(Handle::default(), Handle::NULL);
        assert!(!Handle::from_raw(1).is_null());
    }

    #[test]
    fn raw_value_is_preserved_bit_for_bit() {
        let raw = 0xdead_beef_0000_0042_u64;
        assert_eq!(Handle::from_raw(raw).to_raw(), raw);
        assert_eq!(std::mem::size_of::<Handle>(), std::mem::size_of::<u64>());
    }

    #[test]
    fn debug_formatting_marks_null() {
        assert_eq!(format!("{:?}", Handle::NULL), "Handle(null)");
        assert_eq!(format!("{:?}", Handle::from_raw(0x10)), "Handle(0x10)");
    }
}
