//! Ticket State Machine — explicit states and legal transition guards.
//!
//! Every ticket owns one `TicketMachine`. The desk calls `advance()` to move
//! it along; each call validates the edge against the transition table and
//! appends a record to the ticket's transition log.
//!
//! ```text
//! Open ──claim──▶ Claimed ──close──▶ AwaitingScamResponse ──┬─ "no" / timeout ─▶ ClosedClean
//!                                                           └─ "yes" ──────────▶ ClosedScam
//! ```
//!
//! There is no edge out of `Open` other than a claim: the close control is
//! only ever posted after a successful claim.

use std::fmt;
use std::fmt::Write as _;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// The set of ticket states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Channel created, waiting for a merchant.
    Open,
    /// A staff member has taken the ticket.
    Claimed,
    /// Close requested; waiting for the buyer's yes/no scam answer.
    AwaitingScamResponse,
    /// Closed without a scam report; channel deleted.
    ClosedClean,
    /// Buyer reported a scam; channel frozen pending investigation.
    ClosedScam,
}

impl TicketState {
    /// Whether this is a terminal state (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedClean | Self::ClosedScam)
    }

    /// Position along the lifecycle; strictly increases with every transition.
    pub fn stage(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Claimed => 1,
            Self::AwaitingScamResponse => 2,
            Self::ClosedClean | Self::ClosedScam => 3,
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Claimed => write!(f, "Claimed"),
            Self::AwaitingScamResponse => write!(f, "AwaitingScamResponse"),
            Self::ClosedClean => write!(f, "ClosedClean"),
            Self::ClosedScam => write!(f, "ClosedScam"),
        }
    }
}

fn is_legal_transition(from: TicketState, to: TicketState) -> bool {
    use TicketState::*;

    matches!(
        (from, to),
        (Open, Claimed)
            | (Claimed, AwaitingScamResponse)
            | (AwaitingScamResponse, ClosedClean)
            | (AwaitingScamResponse, ClosedScam)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: TicketState,
    pub to: TicketState,
    /// Milliseconds since the ticket was opened.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: TicketState,
    pub to: TicketState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal ticket transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Tracks the current state of one ticket and the log of how it got there.
#[derive(Debug)]
pub struct TicketMachine {
    current: TicketState,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl TicketMachine {
    /// Create a new machine starting at `Open`.
    pub fn new() -> Self {
        Self {
            current: TicketState::Open,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> TicketState {
        self.current
    }

    /// Attempt to advance to `to`.
    pub fn advance(&mut self, to: TicketState, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(
            from = %self.current,
            to = %to,
            reason = reason.unwrap_or(""),
            "Ticket state transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// One-line history, e.g. `Open → ClosedClean (120ms, 3 transitions) [Claimed → …]`.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} → {} ({}ms, {} transitions)",
            TicketState::Open,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        );
        if !self.transitions.is_empty() {
            let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
            let _ = write!(s, " [{}]", states.join(" → "));
        }
        s
    }
}

impl Default for TicketMachine {
    fn default() -> Self {
        Self::new()
    }
}
