//! Ticket error taxonomy.
//!
//! Callers render errors to users by class, not by string matching:
//!
//! | Class          | Example                         | Surfaced as            |
//! |----------------|---------------------------------|------------------------|
//! | PolicyDenied   | tier-1 staff claiming 3 spawners| private rejection      |
//! | Transient      | platform 5xx on permission edit | private retry hint     |
//! | Conflict       | second claim on a taken ticket  | private notice         |
//! | Invalid        | incomplete menu selection       | private prompt         |

use std::fmt;

use thiserror::Error;

use crate::ids::TicketId;
use crate::state_machine::IllegalTransition;

/// Failure reported by the chat platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Server-side or transport failure; the same call may succeed later.
    #[error("platform unavailable: {0}")]
    Transient(String),
    /// Target channel, message, member or role no longer exists.
    #[error("not found: {0}")]
    NotFound(String),
    /// The platform refused the call (missing permission, bad request).
    #[error("rejected by platform: {0}")]
    Rejected(String),
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Why a policy gate said no.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Caller lacks the menu command role.
    MenuRole,
    /// No held staff tier covers the ticket amount.
    ClaimCapacity { amount: u8 },
    /// Caller holds no staff role at all.
    NotStaff,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MenuRole => write!(f, "missing menu command role"),
            Self::ClaimCapacity { amount } => {
                write!(f, "no staff tier covers {amount} spawner(s)")
            }
            Self::NotStaff => write!(f, "not a staff member"),
        }
    }
}

/// Coarse classification used by the dispatcher to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    PolicyDenied,
    Transient,
    Conflict,
    Invalid,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyDenied => write!(f, "policy_denied"),
            Self::Transient => write!(f, "transient"),
            Self::Conflict => write!(f, "conflict"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Unified error type for ticket operations.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Policy denied: {0}")]
    PolicyDenied(Denial),

    #[error("Platform call failed: {0}")]
    Sink(#[from] SinkError),

    #[error("Ticket {0} is not tracked")]
    UnknownTicket(TicketId),

    #[error("Ticket {0} has already been claimed")]
    AlreadyClaimed(TicketId),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("Spawner type and amount must both be selected")]
    IncompleteSelection,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Amount {0} is outside 1..=5")]
    InvalidAmount(u8),
}

impl TicketError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PolicyDenied(_) => ErrorClass::PolicyDenied,
            Self::Sink(e) if e.is_transient() => ErrorClass::Transient,
            Self::Sink(_) => ErrorClass::Conflict,
            Self::UnknownTicket(_) | Self::AlreadyClaimed(_) | Self::IllegalTransition(_) => {
                ErrorClass::Conflict
            }
            Self::IncompleteSelection | Self::InvalidSelection(_) | Self::InvalidAmount(_) => {
                ErrorClass::Invalid
            }
        }
    }

    /// Returns `true` if the same action may succeed when simply repeated.
    pub fn is_retriable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}
