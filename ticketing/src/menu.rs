//! Per-user drafts for the public buy/sell menu.
//!
//! The menu message is shared by everyone in the channel, so selections are
//! keyed by `(menu message, user)`. A draft becomes an immutable
//! [`TicketRequest`] only once both selects have a value. Drafts untouched
//! for [`DRAFT_TTL`] are dropped, as are all drafts of a deleted menu.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::errors::TicketError;
use crate::ids::{Member, MessageId, UserId};
use crate::request::{SpawnerAmount, SpawnerType, TicketRequest, TradeMode};

/// Selections made so far on one menu by one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuDraft {
    pub spawner: Option<SpawnerType>,
    pub amount: Option<SpawnerAmount>,
}

impl MenuDraft {
    pub fn finish(self, buyer: Member, mode: TradeMode) -> Result<TicketRequest, TicketError> {
        match (self.spawner, self.amount) {
            (Some(spawner), Some(amount)) => Ok(TicketRequest {
                buyer,
                mode,
                spawner,
                amount,
            }),
            _ => Err(TicketError::IncompleteSelection),
        }
    }
}

/// How long an abandoned draft is kept.
pub const DRAFT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy)]
struct Entry {
    draft: MenuDraft,
    touched: Instant,
}

#[derive(Debug)]
pub struct SelectionBook {
    drafts: Mutex<HashMap<(MessageId, UserId), Entry>>,
    ttl: Duration,
}

impl Default for SelectionBook {
    fn default() -> Self {
        Self::with_ttl(DRAFT_TTL)
    }
}

impl SelectionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            drafts: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn drafts(&self) -> MutexGuard<'_, HashMap<(MessageId, UserId), Entry>> {
        self.drafts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, menu: MessageId, user: UserId, f: impl FnOnce(&mut MenuDraft)) {
        let now = Instant::now();
        let mut drafts = self.drafts();
        drafts.retain(|_, e| now.duration_since(e.touched) < self.ttl);
        let entry = drafts.entry((menu, user)).or_insert(Entry {
            draft: MenuDraft::default(),
            touched: now,
        });
        f(&mut entry.draft);
        entry.touched = now;
    }

    pub fn select_spawner(&self, menu: MessageId, user: UserId, spawner: SpawnerType) {
        self.update(menu, user, |d| d.spawner = Some(spawner));
    }

    pub fn select_amount(&self, menu: MessageId, user: UserId, amount: SpawnerAmount) {
        self.update(menu, user, |d| d.amount = Some(amount));
    }

    pub fn draft(&self, menu: MessageId, user: UserId) -> MenuDraft {
        let now = Instant::now();
        self.drafts()
            .get(&(menu, user))
            .filter(|e| now.duration_since(e.touched) < self.ttl)
            .map(|e| e.draft)
            .unwrap_or_default()
    }

    /// Build the request from the user's draft. The draft is left in place so a
    /// failed ticket creation can be retried without re-selecting.
    pub fn submit(
        &self,
        menu: MessageId,
        buyer: Member,
        mode: TradeMode,
    ) -> Result<TicketRequest, TicketError> {
        self.draft(menu, buyer.id).finish(buyer, mode)
    }

    pub fn clear(&self, menu: MessageId, user: UserId) {
        self.drafts().remove(&(menu, user));
    }

    /// Drop every draft on a menu message that no longer exists.
    pub fn drop_menu(&self, menu: MessageId) -> usize {
        let mut drafts = self.drafts();
        let before = drafts.len();
        drafts.retain(|(m, _), _| *m != menu);
        before - drafts.len()
    }

    pub fn len(&self) -> usize {
        self.drafts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
