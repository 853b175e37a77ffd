//! Ticket desk — drives tickets through their lifecycle.
//!
//! The desk owns the board and the policy; the platform sink is passed into
//! each call so the adapter can build it from whatever per-event context the
//! client library hands out.
//!
//! ## Lifecycle
//!
//! ```text
//! open(request)          — create channel, register Open ticket, notify staff
//! claim(ctx, actor)      — tier gate, grant access + Claimed as one unit
//! begin_close(id, actor) — staff gate, prompt buyer, AwaitingScamResponse
//! await_verdict(pending) — wait for yes/no/timeout, ClosedClean | ClosedScam
//! forget(id)             — channel vanished; drop ticket, cancel waiters
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::board::{Ticket, TicketBoard, TicketHandle};
use crate::errors::{Denial, SinkError, TicketError};
use crate::ids::{Actor, ChannelId, RoleId, TicketId, UserId};
use crate::policy::RolePolicy;
use crate::request::{ClaimContext, TicketRequest};
use crate::sink::{IncomingMessage, Notice, NotificationSink, ReplySource};
use crate::state_machine::{IllegalTransition, TicketState, TransitionRecord};
use crate::verdict::{await_buyer_verdict, ReplyFilter, ScamAnswer, VerdictOutcome};

/// Why a ticket closed without a scam report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanReason {
    BuyerDeclined,
    TimedOut,
    /// Channel deleted by someone else while the window was open.
    ChannelRemoved,
}

impl CleanReason {
    fn describe(self) -> &'static str {
        match self {
            Self::BuyerDeclined => "buyer answered no",
            Self::TimedOut => "no response within window",
            Self::ChannelRemoved => "channel removed",
        }
    }
}

/// How a close request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseResolution {
    Clean(CleanReason),
    /// Ticket frozen. `stripped` lists the roles actually removed; when
    /// `strip_failed` is set the removal stopped part-way.
    Scam {
        stripped: Vec<RoleId>,
        strip_failed: bool,
    },
}

/// Point-in-time view of a ticket.
#[derive(Debug, Clone)]
pub struct TicketSnapshot {
    pub id: TicketId,
    pub state: TicketState,
    pub claimant: Option<UserId>,
    pub transitions: Vec<TransitionRecord>,
}

impl TicketSnapshot {
    fn of(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            state: ticket.state(),
            claimant: ticket.claimant(),
            transitions: ticket.machine().transitions().to_vec(),
        }
    }
}

/// Result of `await_verdict`.
#[derive(Debug, Clone)]
pub struct Closed {
    pub resolution: CloseResolution,
    pub ticket: TicketSnapshot,
}

/// A ticket in `AwaitingScamResponse`, holding its reply subscription.
pub struct PendingVerdict {
    ticket: TicketHandle,
    id: TicketId,
    buyer: UserId,
    claimant: UserId,
    replies: BoxStream<'static, IncomingMessage>,
    cancel: CancellationToken,
}

impl PendingVerdict {
    pub fn ticket_id(&self) -> TicketId {
        self.id
    }

    pub fn buyer(&self) -> UserId {
        self.buyer
    }
}

pub struct TicketDesk {
    policy: Arc<RolePolicy>,
    board: TicketBoard,
    window: Duration,
}

impl TicketDesk {
    pub fn new(policy: RolePolicy, window: Duration) -> Self {
        Self {
            policy: Arc::new(policy),
            board: TicketBoard::new(),
            window,
        }
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn live_tickets(&self) -> usize {
        self.board.len()
    }

    pub async fn snapshot(&self, id: TicketId) -> Option<TicketSnapshot> {
        let handle = self.board.get(id)?;
        let ticket = handle.lock().await;
        Some(TicketSnapshot::of(&ticket))
    }

    /// Open a ticket for a completed menu submission.
    pub async fn open<S>(&self, sink: &S, request: TicketRequest) -> Result<TicketId, TicketError>
    where
        S: NotificationSink + ?Sized,
    {
        let id = sink.create_ticket_channel(&request).await?;
        self.board.insert(Ticket::new(id, request.clone()));

        info!(
            ticket = %id,
            buyer = %request.buyer.id,
            mode = %request.mode,
            amount = request.amount.get(),
            "Ticket opened"
        );

        let opened = Notice::TicketOpened {
            buyer: request.buyer.id,
            mode: request.mode,
            spawner: request.spawner,
            amount: request.amount,
        };
        if let Err(e) = sink.post_notice(id, opened).await {
            warn!(ticket = %id, error = %e, "Failed to post ticket greeting");
        }
        if let Err(e) = sink.post_claim_request(id, &request).await {
            warn!(ticket = %id, error = %e, "Failed to post claim request; staff will not be notified");
        }

        Ok(id)
    }

    /// Claim a ticket for `actor`.
    ///
    /// The ticket stays locked from the state check through the access grant,
    /// so two concurrent claimants cannot both succeed. If the grant fails the
    /// ticket is left Open and the claim control untouched.
    pub async fn claim<S>(&self, sink: &S, claim: &ClaimContext, actor: &Actor) -> Result<(), TicketError>
    where
        S: NotificationSink + ?Sized,
    {
        if !self.policy.can_claim(&actor.roles, claim.amount) {
            return Err(TicketError::PolicyDenied(Denial::ClaimCapacity {
                amount: claim.amount.get(),
            }));
        }

        let handle = self
            .board
            .get(claim.ticket)
            .ok_or(TicketError::UnknownTicket(claim.ticket))?;
        let mut ticket = handle.lock().await;
        if ticket.state() != TicketState::Open {
            return Err(TicketError::AlreadyClaimed(claim.ticket));
        }

        sink.grant_access(claim.ticket, actor.user).await?;
        ticket.claim(actor.user)?;
        drop(ticket);

        info!(ticket = %claim.ticket, staff = %actor.user, amount = claim.amount.get(), "Ticket claimed");

        if let Err(e) = sink
            .post_notice(claim.ticket, Notice::Claimed { staff: actor.user })
            .await
        {
            warn!(ticket = %claim.ticket, error = %e, "Failed to announce claim");
        }
        if let Err(e) = sink.disable_claim_control(claim).await {
            warn!(ticket = %claim.ticket, error = %e, "Failed to disable claim control");
        }
        if let Err(e) = sink.post_close_control(claim.ticket).await {
            warn!(ticket = %claim.ticket, error = %e, "Failed to post close control");
        }
        Ok(())
    }

    /// Start closing a claimed ticket: prompt the buyer and open the window.
    pub async fn begin_close<S, R>(
        &self,
        sink: &S,
        replies: &R,
        id: TicketId,
        actor: &Actor,
    ) -> Result<PendingVerdict, TicketError>
    where
        S: NotificationSink + ?Sized,
        R: ReplySource + ?Sized,
    {
        if !self.policy.can_close(&actor.roles) {
            return Err(TicketError::PolicyDenied(Denial::NotStaff));
        }

        let handle = self.board.get(id).ok_or(TicketError::UnknownTicket(id))?;
        let cancel = self
            .board
            .cancel_token(id)
            .ok_or(TicketError::UnknownTicket(id))?;

        let mut ticket = handle.lock().await;
        let claimant = match (ticket.state(), ticket.claimant()) {
            (TicketState::Claimed, Some(claimant)) => claimant,
            (from, _) => {
                return Err(IllegalTransition {
                    from,
                    to: TicketState::AwaitingScamResponse,
                }
                .into())
            }
        };
        let buyer = ticket.request.buyer.id;

        // Subscribe before prompting so an instant reply is not missed.
        let stream = replies.subscribe(id);
        sink.post_notice(id, Notice::ScamPrompt { buyer }).await?;
        ticket.advance(
            TicketState::AwaitingScamResponse,
            &format!("close requested by {}", actor.user),
        )?;
        drop(ticket);

        info!(ticket = %id, staff = %actor.user, window_secs = self.window.as_secs(), "Awaiting scam response");

        Ok(PendingVerdict {
            ticket: handle,
            id,
            buyer,
            claimant,
            replies: stream,
            cancel,
        })
    }

    /// Wait out the response window and settle the ticket.
    pub async fn await_verdict<S>(&self, sink: &S, pending: PendingVerdict) -> Result<Closed, TicketError>
    where
        S: NotificationSink + ?Sized,
    {
        let PendingVerdict {
            ticket: handle,
            id,
            buyer,
            claimant,
            replies,
            cancel,
        } = pending;

        let filter = ReplyFilter { channel: id, buyer };
        let outcome = await_buyer_verdict(replies, filter, self.window, cancel).await;

        let resolution = match outcome {
            VerdictOutcome::Answered(ScamAnswer::Yes) => {
                handle
                    .lock()
                    .await
                    .advance(TicketState::ClosedScam, "buyer reported a scam")?;
                self.report_scam(sink, id, buyer, claimant).await
            }
            VerdictOutcome::Answered(ScamAnswer::No) => {
                self.close_clean(sink, &handle, id, CleanReason::BuyerDeclined)
                    .await?
            }
            VerdictOutcome::TimedOut => {
                self.close_clean(sink, &handle, id, CleanReason::TimedOut)
                    .await?
            }
            VerdictOutcome::Cancelled => {
                self.close_clean(sink, &handle, id, CleanReason::ChannelRemoved)
                    .await?
            }
        };

        let ticket = handle.lock().await;
        info!(ticket = %id, summary = %ticket.machine().summary(), "Ticket settled");
        Ok(Closed {
            resolution,
            ticket: TicketSnapshot::of(&ticket),
        })
    }

    /// Drop a ticket whose channel no longer exists.
    pub fn forget(&self, id: TicketId) -> bool {
        let removed = self.board.remove(id);
        if removed {
            info!(ticket = %id, "Ticket channel removed; ticket dropped");
        }
        removed
    }

    async fn close_clean<S>(
        &self,
        sink: &S,
        handle: &TicketHandle,
        id: TicketId,
        reason: CleanReason,
    ) -> Result<CloseResolution, TicketError>
    where
        S: NotificationSink + ?Sized,
    {
        handle
            .lock()
            .await
            .advance(TicketState::ClosedClean, reason.describe())?;
        self.board.remove(id);

        let farewell = match reason {
            CleanReason::BuyerDeclined => Notice::ClosingClean,
            CleanReason::TimedOut => Notice::NoResponse,
            CleanReason::ChannelRemoved => return Ok(CloseResolution::Clean(reason)),
        };
        if let Err(e) = sink.post_notice(id, farewell).await {
            warn!(ticket = %id, error = %e, "Failed to post closing notice");
        }
        if let Err(e) = sink.delete_channel(id).await {
            warn!(ticket = %id, error = %e, "Failed to delete ticket channel");
        }
        Ok(CloseResolution::Clean(reason))
    }

    /// Alert, strip the claimant's staff roles, freeze. No rollback on failure.
    async fn report_scam<S>(&self, sink: &S, id: ChannelId, buyer: UserId, claimant: UserId) -> CloseResolution
    where
        S: NotificationSink + ?Sized,
    {
        warn!(ticket = %id, buyer = %buyer, staff = %claimant, "Scam reported");

        let alert = Notice::ScamAlert {
            alert_role: self.policy.alert_role,
            buyer,
        };
        if let Err(e) = sink.post_notice(id, alert).await {
            warn!(ticket = %id, error = %e, "Failed to post scam alert");
        }

        let mut stripped = Vec::new();
        let result: Result<(), SinkError> = async {
            let roles = sink.member_roles(claimant).await?;
            for role in self.policy.staff_roles_held(&roles) {
                sink.remove_role(claimant, role).await?;
                stripped.push(role);
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(ticket = %id, staff = %claimant, removed = stripped.len(), error = %e, "Staff role removal incomplete");
            if let Err(e) = sink.post_notice(id, Notice::RoleStripFailed).await {
                warn!(ticket = %id, error = %e, "Failed to report role removal error");
            }
            return CloseResolution::Scam {
                stripped,
                strip_failed: true,
            };
        }

        if let Err(e) = sink
            .post_notice(id, Notice::Frozen { staff: claimant })
            .await
        {
            warn!(ticket = %id, error = %e, "Failed to post freeze notice");
        }
        CloseResolution::Scam {
            stripped,
            strip_failed: false,
        }
    }
}
