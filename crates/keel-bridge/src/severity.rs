//! Diagnostic log severity.

use std::fmt;

/// Severity tag attached to every diagnostic the script side emits.
///
/// Ordinals are explicit and consumed natively; never renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum LogSeverity {
    #[default]
    Info = 0,
    Warning = 1,
    Error = 2,
}

impl LogSeverity {
    /// Every severity in ordinal order.
    pub const ALL: [LogSeverity; 3] = [LogSeverity::Info, LogSeverity::Warning, LogSeverity::Error];

    #[inline]
    pub const fn ordinal(self) -> u32 {
        self as u32
    }

    pub const fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(LogSeverity::Info),
            1 => Some(LogSeverity::Warning),
            2 => Some(LogSeverity::Error),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            LogSeverity::Info => "Info",
            LogSeverity::Warning => "Warning",
            LogSeverity::Error => "Error",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_pinned() {
        assert_eq!(LogSeverity::Info.ordinal(), 0);
        assert_eq!(LogSeverity::Warning.ordinal(), 1);
        assert_eq!(LogSeverity::Error.ordinal(), 2);
        assert_eq!(LogSeverity::default(), LogSeverity::Info);
    }

    #[test]
    fn out_of_range_ordinal_is_rejected() {
        assert_eq!(LogSeverity::from_ordinal(1), Some(LogSeverity::Warning));
        assert_eq!(LogSeverity::from_ordinal(3), None);
    }
}
