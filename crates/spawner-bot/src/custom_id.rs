//! Component custom-id codec.
//!
//! Every interactive component the bot renders carries a custom id of the
//! form `spawner:<action>:<fields…>`. Claim buttons embed the ticket,
//! buyer, mode and amount so a claim can be authorized from the click alone.

use std::fmt;

use thiserror::Error;
use ticketing::{
    ChannelId, ClaimContext, MessageRef, SpawnerAmount, TicketId, TradeMode, UserId,
};

pub const PREFIX: &str = "spawner";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomIdError {
    #[error("component `{0}` does not belong to this bot")]
    Foreign(String),
    #[error("malformed component id `{0}`")]
    Malformed(String),
}

/// Claim button payload; becomes a [`ClaimContext`] once the clicked message is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimTarget {
    pub ticket: TicketId,
    pub buyer: UserId,
    pub mode: TradeMode,
    pub amount: SpawnerAmount,
}

impl ClaimTarget {
    pub fn with_control(self, control: MessageRef) -> ClaimContext {
        ClaimContext {
            ticket: self.ticket,
            buyer: self.buyer,
            mode: self.mode,
            amount: self.amount,
            control,
        }
    }
}

impl From<&ClaimContext> for ClaimTarget {
    fn from(ctx: &ClaimContext) -> Self {
        Self {
            ticket: ctx.ticket,
            buyer: ctx.buyer,
            mode: ctx.mode,
            amount: ctx.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentAction {
    SelectSpawner(TradeMode),
    SelectAmount(TradeMode),
    Open(TradeMode),
    Claim(ClaimTarget),
    Close(TicketId),
}

impl fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectSpawner(mode) => write!(f, "{PREFIX}:type:{mode}"),
            Self::SelectAmount(mode) => write!(f, "{PREFIX}:amount:{mode}"),
            Self::Open(mode) => write!(f, "{PREFIX}:open:{mode}"),
            Self::Claim(t) => write!(
                f,
                "{PREFIX}:claim:{}:{}:{}:{}",
                t.ticket, t.buyer, t.mode, t.amount
            ),
            Self::Close(ticket) => write!(f, "{PREFIX}:close:{ticket}"),
        }
    }
}

impl ComponentAction {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn parse(raw: &str) -> Result<Self, CustomIdError> {
        let malformed = || CustomIdError::Malformed(raw.to_string());
        let mut parts = raw.split(':');
        if parts.next() != Some(PREFIX) {
            return Err(CustomIdError::Foreign(raw.to_string()));
        }
        let action = parts.next().ok_or_else(malformed)?;
        let fields: Vec<&str> = parts.collect();

        let mode = |s: &str| s.parse::<TradeMode>().map_err(|_| malformed());
        let snowflake = |s: &str| s.parse::<u64>().map_err(|_| malformed());

        match (action, fields.as_slice()) {
            ("type", [m]) => Ok(Self::SelectSpawner(mode(*m)?)),
            ("amount", [m]) => Ok(Self::SelectAmount(mode(*m)?)),
            ("open", [m]) => Ok(Self::Open(mode(*m)?)),
            ("claim", [ticket, buyer, m, amount]) => Ok(Self::Claim(ClaimTarget {
                ticket: ChannelId(snowflake(*ticket)?),
                buyer: UserId(snowflake(*buyer)?),
                mode: mode(*m)?,
                amount: amount.parse::<SpawnerAmount>().map_err(|_| malformed())?,
            })),
            ("close", [ticket]) => Ok(Self::Close(ChannelId(snowflake(*ticket)?))),
            _ => Err(malformed()),
        }
    }
}
