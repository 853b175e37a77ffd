//! In-memory registry of live tickets.
//!
//! Each ticket sits behind its own async mutex so that a claim can hold it
//! across the access-grant call; the map itself is only locked briefly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::ids::{TicketId, UserId};
use crate::request::TicketRequest;
use crate::state_machine::{IllegalTransition, TicketMachine, TicketState};

/// One ticket's identity, request and lifecycle.
#[derive(Debug)]
pub struct Ticket {
    pub id: TicketId,
    pub request: TicketRequest,
    machine: TicketMachine,
    claimant: Option<UserId>,
}

impl Ticket {
    pub fn new(id: TicketId, request: TicketRequest) -> Self {
        Self {
            id,
            request,
            machine: TicketMachine::new(),
            claimant: None,
        }
    }

    pub fn state(&self) -> TicketState {
        self.machine.current()
    }

    pub fn claimant(&self) -> Option<UserId> {
        self.claimant
    }

    pub fn machine(&self) -> &TicketMachine {
        &self.machine
    }

    /// `Open → Claimed`, recording the claimant in the same step.
    pub fn claim(&mut self, staff: UserId) -> Result<(), IllegalTransition> {
        let reason = format!("claimed by {staff}");
        self.machine.advance(TicketState::Claimed, Some(&reason))?;
        self.claimant = Some(staff);
        Ok(())
    }

    pub fn advance(&mut self, to: TicketState, reason: &str) -> Result<(), IllegalTransition> {
        self.machine.advance(to, Some(reason))
    }
}

pub type TicketHandle = Arc<tokio::sync::Mutex<Ticket>>;

#[derive(Debug, Clone)]
struct Slot {
    ticket: TicketHandle,
    cancel: CancellationToken,
}

/// Live tickets keyed by channel.
#[derive(Debug, Default)]
pub struct TicketBoard {
    slots: Mutex<HashMap<TicketId, Slot>>,
}

impl TicketBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<TicketId, Slot>> {
        // A poisoned map only means another handler panicked mid-insert.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, ticket: Ticket) -> TicketHandle {
        let id = ticket.id;
        let handle = Arc::new(tokio::sync::Mutex::new(ticket));
        self.slots().insert(
            id,
            Slot {
                ticket: Arc::clone(&handle),
                cancel: CancellationToken::new(),
            },
        );
        handle
    }

    pub fn get(&self, id: TicketId) -> Option<TicketHandle> {
        self.slots().get(&id).map(|s| Arc::clone(&s.ticket))
    }

    /// Token cancelled when the ticket is forgotten.
    pub fn cancel_token(&self, id: TicketId) -> Option<CancellationToken> {
        self.slots().get(&id).map(|s| s.cancel.clone())
    }

    /// Drop a ticket and cancel anything waiting on it.
    pub fn remove(&self, id: TicketId) -> bool {
        match self.slots().remove(&id) {
            Some(slot) => {
                slot.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
