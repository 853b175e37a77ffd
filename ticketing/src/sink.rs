//! Contracts the core consumes from the chat platform.
//!
//! `NotificationSink` covers every outbound call (channels, messages,
//! permissions, roles); `ReplySource` is the inbound message feed used by the
//! scam-report window. The Discord adapter implements both; tests provide
//! in-memory versions.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::SinkError;
use crate::ids::{ChannelId, MessageRef, RoleId, RoleSet, TicketId, UserId};
use crate::request::{ClaimContext, SpawnerAmount, SpawnerType, TicketRequest, TradeMode};

/// Messages the lifecycle posts into a ticket channel.
///
/// The adapter owns the wording; the core only decides *which* notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// First message in a new ticket channel.
    TicketOpened {
        buyer: UserId,
        mode: TradeMode,
        spawner: SpawnerType,
        amount: SpawnerAmount,
    },
    Claimed { staff: UserId },
    /// Yes/no question put to the buyer when staff close the ticket.
    ScamPrompt { buyer: UserId },
    NoResponse,
    ClosingClean,
    /// Mentions the alert role; posted once per scam report.
    ScamAlert { alert_role: RoleId, buyer: UserId },
    RoleStripFailed,
    /// Staff roles removed, ticket kept open for review.
    Frozen { staff: UserId },
}

/// A message observed in a ticket channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub channel: ChannelId,
    pub author: UserId,
    pub content: String,
}

impl IncomingMessage {
    pub fn new(channel: ChannelId, author: UserId, content: impl Into<String>) -> Self {
        Self {
            channel,
            author,
            content: content.into(),
        }
    }
}

/// Outbound platform operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Create the private ticket channel, visible to the buyer only.
    async fn create_ticket_channel(&self, request: &TicketRequest) -> Result<ChannelId, SinkError>;

    async fn post_notice(&self, channel: ChannelId, notice: Notice) -> Result<(), SinkError>;

    /// Post the claim control to the staff notification channel.
    async fn post_claim_request(
        &self,
        ticket: TicketId,
        request: &TicketRequest,
    ) -> Result<MessageRef, SinkError>;

    /// Give `user` the same view/send access the buyer has.
    async fn grant_access(&self, channel: ChannelId, user: UserId) -> Result<(), SinkError>;

    async fn disable_claim_control(&self, claim: &ClaimContext) -> Result<(), SinkError>;

    /// Post the staff-only close control inside the ticket channel.
    async fn post_close_control(&self, ticket: TicketId) -> Result<(), SinkError>;

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), SinkError>;

    /// Current roles of a guild member.
    async fn member_roles(&self, user: UserId) -> Result<RoleSet, SinkError>;

    async fn remove_role(&self, user: UserId, role: RoleId) -> Result<(), SinkError>;
}

/// Inbound message feed.
pub trait ReplySource: Send + Sync {
    /// Subscribe to messages posted in `channel` from now on.
    ///
    /// The stream ends when the platform connection goes away.
    fn subscribe(&self, channel: ChannelId) -> BoxStream<'static, IncomingMessage>;
}
