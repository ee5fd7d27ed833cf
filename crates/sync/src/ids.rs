//! Opaque identifiers used throughout the sync core.
//!
//! Spaces, channels, messages, and addresses are all treated as opaque
//! UTF-8 strings by this crate (see spec §3 — Identifiers); `PeerId` is a
//! 32-bit unsigned integer identifying an entry in the group-keying peer
//! map. None of these types carry validation beyond "it's a string" /
//! "it's a u32" — the host is responsible for giving them meaning.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! opaque_string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self, returning the underlying string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_string_id!(SpaceId, "Identifies a space (a collection of channels).");
opaque_string_id!(ChannelId, "Identifies a channel within a space.");
opaque_string_id!(MessageId, "Identifies a single message within a channel.");
opaque_string_id!(Address, "A member's opaque routing/identity address.");
opaque_string_id!(
    InboxAddress,
    "An opaque routing identifier for direct reply delivery."
);

/// Identifies an entry in a space's group-key peer map.
///
/// Unlike the other identifiers in this module, peer IDs are small
/// integers, not strings (spec §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PeerId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// A `(space, channel)` pair — the key under which the payload cache and
/// most content lives.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey {
    pub space_id: SpaceId,
    pub channel_id: ChannelId,
}

impl ChannelKey {
    pub fn new(space_id: SpaceId, channel_id: ChannelId) -> Self {
        Self {
            space_id,
            channel_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_id_roundtrips_through_json() {
        let id = MessageId::from("m1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"m1\"");
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn peer_id_display() {
        let id = PeerId::from(7);
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn channel_key_equality() {
        let a = ChannelKey::new(SpaceId::from("s1"), ChannelId::from("c1"));
        let b = ChannelKey::new(SpaceId::from("s1"), ChannelId::from("c1"));
        assert_eq!(a, b);
    }
}
