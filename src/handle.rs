//! Opaque handles for tracks, groups and sounds.
//!
//! A handle is a non-zero integer issued by the manager. Zero is reserved as
//! the invalid handle. Values come from per-kind monotonic counters that are
//! never reset, so a stale handle from an earlier session cannot alias a new
//! resource.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::AudioError;

/// Resource category a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Track,
    Group,
    Sound,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Track => write!(f, "track"),
            HandleKind::Group => write!(f, "group"),
            HandleKind::Sound => write!(f, "sound"),
        }
    }
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(u32);

        impl $name {
            pub const INVALID: Self = Self(0);

            pub const fn invalid() -> Self {
                Self::INVALID
            }

            /// Wrap a raw value; zero yields the invalid handle.
            pub const fn from_raw(value: u32) -> Self {
                Self(value)
            }

            pub const fn value(self) -> u32 {
                self.0
            }

            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }

            pub const fn kind() -> HandleKind {
                $kind
            }

            /// Error reported when this handle names no live resource
            pub(crate) fn not_found(self) -> AudioError {
                AudioError::InvalidHandle {
                    kind: $kind,
                    value: self.0,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

define_handle!(
    /// Handle to a layered track
    TrackHandle,
    HandleKind::Track
);
define_handle!(
    /// Handle to a volume bus
    GroupHandle,
    HandleKind::Group
);
define_handle!(
    /// Handle to a loaded sound
    SoundHandle,
    HandleKind::Sound
);

/// Monotonic issuer of handle values, starting at 1
#[derive(Debug)]
pub(crate) struct HandleCounter(AtomicU32);

impl HandleCounter {
    pub(crate) const fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub(crate) fn next(&self) -> u32 {
        loop {
            let value = self.0.fetch_add(1, Ordering::Relaxed);
            if value != 0 {
                return value;
            }
        }
    }
}

impl Default for HandleCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_handle() {
        assert!(!TrackHandle::invalid().is_valid());
        assert_eq!(GroupHandle::default(), GroupHandle::INVALID);
        assert!(SoundHandle::from_raw(7).is_valid());
        assert_eq!(SoundHandle::from_raw(7).value(), 7);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(TrackHandle::from_raw(3).to_string(), "track#3");
        assert_eq!(GroupHandle::kind(), HandleKind::Group);
    }

    #[test]
    fn test_counter_starts_at_one_and_increments() {
        let counter = HandleCounter::new();
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.next(), 3);
    }

    #[test]
    fn test_counter_skips_zero_on_wrap() {
        let counter = HandleCounter(AtomicU32::new(u32::MAX));
        assert_eq!(counter.next(), u32::MAX);
        assert_eq!(counter.next(), 1);
    }
}
