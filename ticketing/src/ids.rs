//! Platform-neutral identifiers.
//!
//! The core never sees the chat platform's own id types; the adapter converts
//! at the boundary. All ids are the platform's 64-bit snowflakes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake!(
    /// A guild member or user.
    UserId
);
snowflake!(
    /// A guild role.
    RoleId
);
snowflake!(
    /// A text channel or category.
    ChannelId
);
snowflake!(
    /// A message inside some channel.
    MessageId
);

/// Tickets are identified by the private channel created for them.
pub type TicketId = ChannelId;

/// Fully-qualified message reference (channel + message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub message: MessageId,
}

/// A user as shown to humans: id for mentions, name for channel naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub name: String,
}

impl Member {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The set of roles a member holds at the moment an event was received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<RoleId>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: RoleId) -> bool {
        self.0.contains(&role)
    }

    pub fn insert(&mut self, role: RoleId) -> bool {
        self.0.insert(role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RoleId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<RoleId> for RoleSet {
    fn from_iter<I: IntoIterator<Item = RoleId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[u64; N]> for RoleSet {
    fn from(raw: [u64; N]) -> Self {
        raw.into_iter().map(RoleId).collect()
    }
}

/// Whoever triggered an interaction, with the roles they held at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user: UserId,
    pub roles: RoleSet,
}

impl Actor {
    pub fn new(user: impl Into<UserId>, roles: RoleSet) -> Self {
        Self {
            user: user.into(),
            roles,
        }
    }
}
