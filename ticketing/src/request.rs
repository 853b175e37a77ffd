//! Immutable request values threaded through the ticket pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TicketError;
use crate::ids::{Member, MessageRef, TicketId, UserId};

/// Whether the customer wants to buy from or sell to the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    Buy,
    Sell,
}

impl TradeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// "Buy" / "Sell", for headings and button labels.
    pub fn title(self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeMode {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(TicketError::InvalidSelection(format!("mode `{other}`"))),
        }
    }
}

/// Spawner kinds offered in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnerType {
    Skeleton,
}

impl SpawnerType {
    pub const ALL: [SpawnerType; 1] = [Self::Skeleton];

    /// Value carried by the select option.
    pub fn value(self) -> &'static str {
        match self {
            Self::Skeleton => "Skeleton",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Skeleton => "Skeleton Spawner",
        }
    }
}

impl fmt::Display for SpawnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for SpawnerType {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpawnerType::ALL
            .into_iter()
            .find(|t| t.value() == s)
            .ok_or_else(|| TicketError::InvalidSelection(format!("spawner `{s}`")))
    }
}

/// Number of spawners on a ticket, always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SpawnerAmount(u8);

impl SpawnerAmount {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(n: u8) -> Result<Self, TicketError> {
        if (Self::MIN..=Self::MAX).contains(&n) {
            Ok(Self(n))
        } else {
            Err(TicketError::InvalidAmount(n))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every selectable amount, ascending.
    pub fn all() -> impl Iterator<Item = SpawnerAmount> {
        (Self::MIN..=Self::MAX).map(SpawnerAmount)
    }
}

impl TryFrom<u8> for SpawnerAmount {
    type Error = TicketError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl From<SpawnerAmount> for u8 {
    fn from(a: SpawnerAmount) -> u8 {
        a.0
    }
}

impl FromStr for SpawnerAmount {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u8 = s
            .parse()
            .map_err(|_| TicketError::InvalidSelection(format!("amount `{s}`")))?;
        Self::new(n)
    }
}

impl fmt::Display for SpawnerAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed menu submission. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRequest {
    pub buyer: Member,
    pub mode: TradeMode,
    pub spawner: SpawnerType,
    pub amount: SpawnerAmount,
}

impl TicketRequest {
    /// `{buyer-name}-{amount}-{mode}`.
    pub fn channel_name(&self) -> String {
        format!("{}-{}-{}", self.buyer.name, self.amount, self.mode)
    }
}

/// Everything a claim needs, carried on the claim control itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimContext {
    pub ticket: TicketId,
    pub buyer: UserId,
    pub mode: TradeMode,
    pub amount: SpawnerAmount,
    /// The notification message holding the claim control.
    pub control: MessageRef,
}
