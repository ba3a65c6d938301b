//! Bit flags carried alongside every [`crate::Value`].

use std::ops::{BitOr, BitOrAssign};

/// Flags attached to a published or retained value.
///
/// `RETAIN` and `CONST` occupy the two low-order bits; this layout matches
/// the `Retain` bit reused directly as the wire `port_data` retain bit when
/// a value crosses the port (see `fbp-port`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueFlags(u8);

impl ValueFlags {
    pub const NONE: ValueFlags = ValueFlags(0);
    /// The engine must persist this as the topic's retained value.
    pub const RETAIN: ValueFlags = ValueFlags(1 << 0);
    /// Payload storage is caller-owned and stable for the value's lifetime.
    pub const CONST: ValueFlags = ValueFlags(1 << 1);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> ValueFlags {
        ValueFlags(bits & (Self::RETAIN.0 | Self::CONST.0))
    }

    #[must_use]
    pub const fn contains(self, other: ValueFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn retain(self) -> bool {
        self.contains(Self::RETAIN)
    }

    #[must_use]
    pub const fn is_const(self) -> bool {
        self.contains(Self::CONST)
    }

    /// Flags compared for publish dedup: identical except the (irrelevant)
    /// source-subscriber identity, which is never part of `ValueFlags` to
    /// begin with. Kept as a named method so call sites read intent rather
    /// than a raw `==`.
    #[must_use]
    pub const fn dedup_eq(self, other: ValueFlags) -> bool {
        self.0 == other.0
    }
}

impl BitOr for ValueFlags {
    type Output = ValueFlags;
    fn bitor(self, rhs: ValueFlags) -> ValueFlags {
        ValueFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ValueFlags {
    fn bitor_assign(&mut self, rhs: ValueFlags) {
        self.0 |= rhs.0;
    }
}

/// Flags attached to a subscriber record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriberFlags(u8);

impl SubscriberFlags {
    pub const NONE: SubscriberFlags = SubscriberFlags(0);
    /// Receive normal publishes on this subtree.
    pub const PUB: SubscriberFlags = SubscriberFlags(1 << 0);
    /// On subscribe, immediately replay every retained value at or below topic.
    pub const RETAIN: SubscriberFlags = SubscriberFlags(1 << 1);
    /// Do not receive normal publishes.
    pub const NO_PUB: SubscriberFlags = SubscriberFlags(1 << 2);
    /// Root-only: receive metadata requests.
    pub const REQ: SubscriberFlags = SubscriberFlags(1 << 3);
    /// Root-only: receive metadata responses.
    pub const RSP: SubscriberFlags = SubscriberFlags(1 << 4);

    #[must_use]
    pub const fn contains(self, other: SubscriberFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for SubscriberFlags {
    type Output = SubscriberFlags;
    fn bitor(self, rhs: SubscriberFlags) -> SubscriberFlags {
        SubscriberFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SubscriberFlags {
    fn bitor_assign(&mut self, rhs: SubscriberFlags) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_flags_round_trip_bits() {
        let f = ValueFlags::RETAIN | ValueFlags::CONST;
        assert_eq!(ValueFlags::from_bits(f.bits()), f);
        assert!(f.retain());
        assert!(f.is_const());
    }

    #[test]
    fn subscriber_flags_req_rsp_are_independent_bits() {
        let f = SubscriberFlags::REQ | SubscriberFlags::RSP;
        assert!(f.contains(SubscriberFlags::REQ));
        assert!(f.contains(SubscriberFlags::RSP));
        assert!(!f.contains(SubscriberFlags::PUB));
    }
}
