//! Ticket lifecycle integration tests.
//!
//! Drive the desk end-to-end against an in-memory recording sink; no chat
//! platform connection required. Time is paused so the 60 s response window
//! elapses instantly and deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;

use ticketing::{
    Actor, ChannelId, ClaimContext, CleanReason, CloseResolution, ErrorClass, IncomingMessage,
    Member, MessageId, MessageRef, Notice, NotificationSink, ReplySource, RoleId, RoleSet,
    RolePolicy, SinkError, SpawnerAmount, SpawnerType, StaffRoles, TicketDesk, TicketError,
    TicketId, TicketRequest, TicketState, TradeMode, UserId, DEFAULT_RESPONSE_WINDOW,
};

// ── Recording sink ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Call {
    CreateChannel(String),
    Notice(ChannelId, Notice),
    ClaimRequest(TicketId),
    Grant(ChannelId, UserId),
    DisableClaim(TicketId),
    CloseControl(TicketId),
    Delete(ChannelId),
    RemoveRole(UserId, RoleId),
}

#[derive(Default)]
struct RecordingSink {
    next_channel: AtomicU64,
    calls: Mutex<Vec<Call>>,
    roles: Mutex<HashMap<UserId, RoleSet>>,
    failing_role: Mutex<Option<RoleId>>,
    subscribers: Mutex<Vec<(ChannelId, UnboundedSender<IncomingMessage>)>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        let sink = Self::default();
        sink.next_channel.store(1_000, Ordering::SeqCst);
        Arc::new(sink)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn set_roles(&self, user: UserId, roles: RoleSet) {
        self.roles.lock().unwrap().insert(user, roles);
    }

    fn fail_removal_of(&self, role: RoleId) {
        *self.failing_role.lock().unwrap() = Some(role);
    }

    /// Simulate someone typing in a channel.
    fn say(&self, channel: ChannelId, author: UserId, content: &str) {
        let msg = IncomingMessage::new(channel, author, content);
        for (ch, tx) in self.subscribers.lock().unwrap().iter() {
            if *ch == channel {
                let _ = tx.unbounded_send(msg.clone());
            }
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn create_ticket_channel(&self, request: &TicketRequest) -> Result<ChannelId, SinkError> {
        self.record(Call::CreateChannel(request.channel_name()));
        Ok(ChannelId(self.next_channel.fetch_add(1, Ordering::SeqCst)))
    }

    async fn post_notice(&self, channel: ChannelId, notice: Notice) -> Result<(), SinkError> {
        self.record(Call::Notice(channel, notice));
        Ok(())
    }

    async fn post_claim_request(
        &self,
        ticket: TicketId,
        _request: &TicketRequest,
    ) -> Result<MessageRef, SinkError> {
        self.record(Call::ClaimRequest(ticket));
        Ok(control())
    }

    async fn grant_access(&self, channel: ChannelId, user: UserId) -> Result<(), SinkError> {
        self.record(Call::Grant(channel, user));
        Ok(())
    }

    async fn disable_claim_control(&self, claim: &ClaimContext) -> Result<(), SinkError> {
        self.record(Call::DisableClaim(claim.ticket));
        Ok(())
    }

    async fn post_close_control(&self, ticket: TicketId) -> Result<(), SinkError> {
        self.record(Call::CloseControl(ticket));
        Ok(())
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), SinkError> {
        self.record(Call::Delete(channel));
        Ok(())
    }

    async fn member_roles(&self, user: UserId) -> Result<RoleSet, SinkError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(&user)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_role(&self, user: UserId, role: RoleId) -> Result<(), SinkError> {
        if *self.failing_role.lock().unwrap() == Some(role) {
            return Err(SinkError::Transient("502 Bad Gateway".into()));
        }
        self.record(Call::RemoveRole(user, role));
        Ok(())
    }
}

impl RecordingSink {
    /// End every reply feed for `channel` while the channel itself stays.
    fn drop_feeds(&self, channel: ChannelId) {
        self.subscribers.lock().unwrap().retain(|(c, _)| *c != channel);
    }
}

impl ReplySource for RecordingSink {
    fn subscribe(&self, channel: ChannelId) -> BoxStream<'static, IncomingMessage> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().unwrap().push((channel, tx));
        rx.boxed()
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

const BUYER: UserId = UserId(7);
const MENU_ROLE: u64 = 100;
const TIER1: u64 = 1;
const TIER2: u64 = 2;
const TIER3: u64 = 3;
const ALERT_ROLE: RoleId = RoleId(900);

fn policy() -> RolePolicy {
    RolePolicy {
        menu_role: RoleId(MENU_ROLE),
        staff: StaffRoles {
            tier1: RoleId(TIER1),
            tier2: RoleId(TIER2),
            tier3: RoleId(TIER3),
        },
        alert_role: ALERT_ROLE,
    }
}

fn desk() -> Arc<TicketDesk> {
    Arc::new(TicketDesk::new(policy(), DEFAULT_RESPONSE_WINDOW))
}

fn control() -> MessageRef {
    MessageRef {
        channel: ChannelId(60),
        message: MessageId(61),
    }
}

fn request(amount: u8, mode: TradeMode) -> TicketRequest {
    TicketRequest {
        buyer: Member::new(BUYER, "steve"),
        mode,
        spawner: SpawnerType::Skeleton,
        amount: SpawnerAmount::new(amount).unwrap(),
    }
}

fn claim_ctx(ticket: TicketId, amount: u8, mode: TradeMode) -> ClaimContext {
    ClaimContext {
        ticket,
        buyer: BUYER,
        mode,
        amount: SpawnerAmount::new(amount).unwrap(),
        control: control(),
    }
}

fn staff(id: u64, roles: &[u64]) -> Actor {
    Actor::new(id, roles.iter().copied().map(RoleId).collect())
}

/// Open and claim a ticket; returns its id.
async fn claimed_ticket(desk: &TicketDesk, sink: &RecordingSink, amount: u8, claimant: &Actor) -> TicketId {
    let id = desk.open(sink, request(amount, TradeMode::Buy)).await.unwrap();
    desk.claim(sink, &claim_ctx(id, amount, TradeMode::Buy), claimant)
        .await
        .unwrap();
    id
}

async fn state_of(desk: &TicketDesk, id: TicketId) -> TicketState {
    desk.snapshot(id).await.expect("ticket tracked").state
}

// ── Scenario ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn sell_five_claim_close_no_scam() {
    let desk = desk();
    let sink = RecordingSink::new();

    let id = desk.open(&*sink, request(5, TradeMode::Sell)).await.unwrap();
    assert_eq!(state_of(&desk, id).await, TicketState::Open);
    assert_eq!(sink.calls()[0], Call::CreateChannel("steve-5-sell".into()));
    assert_eq!(sink.count(|c| matches!(c, Call::ClaimRequest(t) if *t == id)), 1);

    let merchant = staff(42, &[TIER3]);
    desk.claim(&*sink, &claim_ctx(id, 5, TradeMode::Sell), &merchant)
        .await
        .unwrap();
    let snap = desk.snapshot(id).await.unwrap();
    assert_eq!(snap.state, TicketState::Claimed);
    assert_eq!(snap.claimant, Some(UserId(42)));
    assert!(sink.calls().contains(&Call::Grant(id, UserId(42))));
    assert!(sink.calls().contains(&Call::DisableClaim(id)));
    assert!(sink.calls().contains(&Call::CloseControl(id)));

    let pending = desk.begin_close(&*sink, &*sink, id, &merchant).await.unwrap();
    assert_eq!(state_of(&desk, id).await, TicketState::AwaitingScamResponse);
    assert!(sink
        .calls()
        .contains(&Call::Notice(id, Notice::ScamPrompt { buyer: BUYER })));

    sink.say(id, BUYER, "no");
    let closed = desk.await_verdict(&*sink, pending).await.unwrap();

    assert_eq!(closed.resolution, CloseResolution::Clean(CleanReason::BuyerDeclined));
    assert_eq!(closed.ticket.state, TicketState::ClosedClean);
    let path: Vec<TicketState> = closed.ticket.transitions.iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            TicketState::Claimed,
            TicketState::AwaitingScamResponse,
            TicketState::ClosedClean
        ]
    );
    assert_eq!(sink.count(|c| *c == Call::Delete(id)), 1);
    assert!(sink.calls().contains(&Call::Notice(id, Notice::ClosingClean)));
    assert_eq!(desk.live_tickets(), 0);
}

// ── Claim gating ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn tier1_only_cannot_claim_three() {
    let desk = desk();
    let sink = RecordingSink::new();
    let id = desk.open(&*sink, request(3, TradeMode::Buy)).await.unwrap();

    let err = desk
        .claim(&*sink, &claim_ctx(id, 3, TradeMode::Buy), &staff(42, &[TIER1]))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::PolicyDenied);
    assert_eq!(state_of(&desk, id).await, TicketState::Open);
    assert_eq!(sink.count(|c| matches!(c, Call::Grant(..))), 0);
}

#[tokio::test]
async fn menu_role_alone_cannot_claim() {
    let desk = desk();
    let sink = RecordingSink::new();
    let id = desk.open(&*sink, request(1, TradeMode::Buy)).await.unwrap();

    let err = desk
        .claim(&*sink, &claim_ctx(id, 1, TradeMode::Buy), &staff(42, &[MENU_ROLE]))
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::PolicyDenied(_)));
}

#[tokio::test]
async fn first_claim_wins() {
    let desk = desk();
    let sink = RecordingSink::new();
    let id = claimed_ticket(&desk, &sink, 2, &staff(42, &[TIER2])).await;

    let err = desk
        .claim(&*sink, &claim_ctx(id, 2, TradeMode::Buy), &staff(43, &[TIER3]))
        .await
        .unwrap_err();

    assert!(matches!(err, TicketError::AlreadyClaimed(t) if t == id));
    assert_eq!(desk.snapshot(id).await.unwrap().claimant, Some(UserId(42)));
    assert_eq!(sink.count(|c| matches!(c, Call::Grant(..))), 1);
    assert_eq!(sink.count(|c| matches!(c, Call::DisableClaim(_))), 1);
}

#[tokio::test]
async fn simultaneous_claims_have_one_winner() {
    let desk = desk();
    let sink = RecordingSink::new();
    let id = desk.open(&*sink, request(1, TradeMode::Buy)).await.unwrap();
    let ctx = claim_ctx(id, 1, TradeMode::Buy);

    let a = staff(42, &[TIER1]);
    let b = staff(43, &[TIER3]);
    let (ra, rb) = tokio::join!(desk.claim(&*sink, &ctx, &a), desk.claim(&*sink, &ctx, &b));

    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(sink.count(|c| matches!(c, Call::Grant(..))), 1);
}

#[tokio::test]
async fn unknown_ticket_claim_is_conflict() {
    let desk = desk();
    let sink = RecordingSink::new();
    let err = desk
        .claim(&*sink, &claim_ctx(ChannelId(404), 1, TradeMode::Buy), &staff(42, &[TIER3]))
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::UnknownTicket(_)));
}

// ── Close gating ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_ticket_cannot_be_closed() {
    let desk = desk();
    let sink = RecordingSink::new();
    let id = desk.open(&*sink, request(1, TradeMode::Buy)).await.unwrap();

    let err = desk
        .begin_close(&*sink, &*sink, id, &staff(42, &[TIER1]))
        .await
        .err()
        .expect("close on open ticket must fail");

    assert!(matches!(err, TicketError::IllegalTransition(_)));
    assert_eq!(state_of(&desk, id).await, TicketState::Open);
    assert_eq!(sink.count(|c| matches!(c, Call::Notice(_, Notice::ScamPrompt { .. }))), 0);
}

#[tokio::test]
async fn any_tier_may_close_regardless_of_amount() {
    let desk = desk();
    let sink = RecordingSink::new();
    let id = claimed_ticket(&desk, &sink, 5, &staff(42, &[TIER3])).await;

    let pending = desk.begin_close(&*sink, &*sink, id, &staff(43, &[TIER1])).await;
    assert!(pending.is_ok());
    assert_eq!(state_of(&desk, id).await, TicketState::AwaitingScamResponse);
}

#[tokio::test]
async fn second_close_while_waiting_is_rejected() {
    let desk = desk();
    let sink = RecordingSink::new();
    let merchant = staff(42, &[TIER2]);
    let id = claimed_ticket(&desk, &sink, 2, &merchant).await;

    let _pending = desk.begin_close(&*sink, &*sink, id, &merchant).await.unwrap();
    let again = desk.begin_close(&*sink, &*sink, id, &merchant).await;
    assert!(matches!(again, Err(TicketError::IllegalTransition(_))));
    assert_eq!(sink.count(|c| matches!(c, Call::Notice(_, Notice::ScamPrompt { .. }))), 1);
}

// ── Response window ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn non_buyer_reply_does_not_resolve() {
    let desk = desk();
    let sink = RecordingSink::new();
    let merchant = staff(42, &[TIER3]);
    let id = claimed_ticket(&desk, &sink, 4, &merchant).await;
    let pending = desk.begin_close(&*sink, &*sink, id, &merchant).await.unwrap();

    let waiter = {
        let desk = Arc::clone(&desk);
        let sink = Arc::clone(&sink);
        tokio::spawn(async move { desk.await_verdict(&*sink, pending).await })
    };

    sink.say(id, UserId(42), "no");
    sink.say(id, UserId(99), "YES");
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(!waiter.is_finished());
    assert_eq!(state_of(&desk, id).await, TicketState::AwaitingScamResponse);

    sink.say(id, BUYER, "No");
    let closed = waiter.await.unwrap().unwrap();
    assert_eq!(closed.resolution, CloseResolution::Clean(CleanReason::BuyerDeclined));
    assert_eq!(sink.count(|c| matches!(c, Call::Notice(_, Notice::ScamAlert { .. }))), 0);
}

#[tokio::test(start_paused = true)]
async fn silence_closes_clean_after_window() {
    let desk = desk();
    let sink = RecordingSink::new();
    let merchant = staff(42, &[TIER1]);
    let id = claimed_ticket(&desk, &sink, 1, &merchant).await;
    let pending = desk.begin_close(&*sink, &*sink, id, &merchant).await.unwrap();

    let start = tokio::time::Instant::now();
    sink.say(id, BUYER, "maybe?");
    let closed = desk.await_verdict(&*sink, pending).await.unwrap();

    assert!(start.elapsed() >= DEFAULT_RESPONSE_WINDOW);
    assert_eq!(closed.resolution, CloseResolution::Clean(CleanReason::TimedOut));
    assert_eq!(closed.ticket.state, TicketState::ClosedClean);
    assert!(sink.calls().contains(&Call::Notice(id, Notice::NoResponse)));
    assert_eq!(sink.count(|c| *c == Call::Delete(id)), 1);
}

#[tokio::test(start_paused = true)]
async fn channel_removed_mid_window_skips_delete() {
    let desk = desk();
    let sink = RecordingSink::new();
    let merchant = staff(42, &[TIER1]);
    let id = claimed_ticket(&desk, &sink, 1, &merchant).await;
    let pending = desk.begin_close(&*sink, &*sink, id, &merchant).await.unwrap();

    let waiter = {
        let desk = Arc::clone(&desk);
        let sink = Arc::clone(&sink);
        tokio::spawn(async move { desk.await_verdict(&*sink, pending).await })
    };
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(desk.forget(id));

    let closed = waiter.await.unwrap().unwrap();
    assert_eq!(closed.resolution, CloseResolution::Clean(CleanReason::ChannelRemoved));
    assert_eq!(closed.ticket.state, TicketState::ClosedClean);
    assert_eq!(sink.count(|c| matches!(c, Call::Delete(_))), 0);
}

#[tokio::test(start_paused = true)]
async fn ended_reply_feed_still_times_out_and_deletes() {
    let desk = desk();
    let sink = RecordingSink::new();
    let merchant = staff(42, &[TIER1]);
    let id = claimed_ticket(&desk, &sink, 1, &merchant).await;
    let pending = desk.begin_close(&*sink, &*sink, id, &merchant).await.unwrap();

    let start = tokio::time::Instant::now();
    sink.drop_feeds(id);
    let closed = desk.await_verdict(&*sink, pending).await.unwrap();

    assert!(start.elapsed() >= DEFAULT_RESPONSE_WINDOW);
    assert_eq!(closed.resolution, CloseResolution::Clean(CleanReason::TimedOut));
    assert!(sink.calls().contains(&Call::Notice(id, Notice::NoResponse)));
    assert_eq!(sink.count(|c| *c == Call::Delete(id)), 1);
    assert_eq!(desk.live_tickets(), 0);
}

// ── Scam report ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn buyer_yes_freezes_and_strips_claimant() {
    let desk = desk();
    let sink = RecordingSink::new();
    let merchant = staff(42, &[TIER2, TIER3]);
    sink.set_roles(UserId(42), RoleSet::from([TIER2, TIER3, MENU_ROLE]));
    let id = claimed_ticket(&desk, &sink, 3, &merchant).await;

    // A different staff member closes; the claimant is still the one stripped.
    let closer = staff(43, &[TIER1]);
    let pending = desk.begin_close(&*sink, &*sink, id, &closer).await.unwrap();
    sink.say(id, BUYER, "YES");
    let closed = desk.await_verdict(&*sink, pending).await.unwrap();

    assert_eq!(
        closed.resolution,
        CloseResolution::Scam {
            stripped: vec![RoleId(TIER2), RoleId(TIER3)],
            strip_failed: false,
        }
    );
    assert_eq!(closed.ticket.state, TicketState::ClosedScam);
    assert_eq!(
        sink.count(|c| matches!(c, Call::Notice(_, Notice::ScamAlert { alert_role, .. }) if *alert_role == ALERT_ROLE)),
        1
    );
    assert_eq!(sink.count(|c| matches!(c, Call::RemoveRole(u, _) if *u == UserId(43))), 0);
    assert!(sink
        .calls()
        .contains(&Call::Notice(id, Notice::Frozen { staff: UserId(42) })));
    assert_eq!(sink.count(|c| matches!(c, Call::Delete(_))), 0);
    // Frozen tickets stay on the board for investigation.
    assert_eq!(state_of(&desk, id).await, TicketState::ClosedScam);
}

#[tokio::test(start_paused = true)]
async fn role_strip_failure_is_reported_not_rolled_back() {
    let desk = desk();
    let sink = RecordingSink::new();
    let merchant = staff(42, &[TIER3]);
    sink.set_roles(UserId(42), RoleSet::from([TIER1, TIER3]));
    sink.fail_removal_of(RoleId(TIER3));
    let id = claimed_ticket(&desk, &sink, 1, &merchant).await;

    let pending = desk.begin_close(&*sink, &*sink, id, &merchant).await.unwrap();
    sink.say(id, BUYER, "yes");
    let closed = desk.await_verdict(&*sink, pending).await.unwrap();

    assert_eq!(
        closed.resolution,
        CloseResolution::Scam {
            stripped: vec![RoleId(TIER1)],
            strip_failed: true,
        }
    );
    assert_eq!(closed.ticket.state, TicketState::ClosedScam);
    assert!(sink.calls().contains(&Call::Notice(id, Notice::RoleStripFailed)));
    assert_eq!(sink.count(|c| matches!(c, Call::Notice(_, Notice::Frozen { .. }))), 0);
}
