//! Discord implementation of the ticketing sink contracts.
//!
//! Built per event from serenity's `Context`, so it always uses the shard
//! that delivered the interaction. Every serenity error is folded into a
//! [`SinkError`] here; nothing above this module sees serenity error types.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serenity::all::{
    ChannelType, Context, CreateChannel, CreateMessage, EditMessage, GuildId, MessageCollector,
    PermissionOverwrite, PermissionOverwriteType, Permissions,
};
use ticketing::{
    ClaimContext, IncomingMessage, MessageRef, Notice, NotificationSink, ReplySource, RoleSet,
    SinkError, TicketId, TicketRequest,
};

use crate::config::BotConfig;
use crate::custom_id::ClaimTarget;
use crate::render;

fn channel(id: ticketing::ChannelId) -> serenity::all::ChannelId {
    serenity::all::ChannelId::new(id.get())
}

fn user(id: ticketing::UserId) -> serenity::all::UserId {
    serenity::all::UserId::new(id.get())
}

fn role(id: ticketing::RoleId) -> serenity::all::RoleId {
    serenity::all::RoleId::new(id.get())
}

/// Classify a serenity failure by HTTP status.
pub fn classify(err: serenity::Error) -> SinkError {
    let message = err.to_string();
    match &err {
        serenity::Error::Http(http) => match http.status_code() {
            Some(status) if status.is_server_error() => SinkError::Transient(message),
            Some(status) if status.as_u16() == 404 => SinkError::NotFound(message),
            Some(_) => SinkError::Rejected(message),
            // No status: the request never got an answer.
            None => SinkError::Transient(message),
        },
        serenity::Error::Io(_) | serenity::Error::Gateway(_) => SinkError::Transient(message),
        _ => SinkError::Rejected(message),
    }
}

/// View + send, the access a buyer gets on their own ticket.
fn participant(kind: PermissionOverwriteType) -> PermissionOverwrite {
    PermissionOverwrite {
        allow: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
        deny: Permissions::empty(),
        kind,
    }
}

#[derive(Clone)]
pub struct DiscordSink {
    ctx: Context,
    guild: GuildId,
    config: Arc<BotConfig>,
}

impl DiscordSink {
    pub fn new(ctx: Context, guild: GuildId, config: Arc<BotConfig>) -> Self {
        Self { ctx, guild, config }
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    async fn create_ticket_channel(
        &self,
        request: &TicketRequest,
    ) -> Result<ticketing::ChannelId, SinkError> {
        // @everyone shares the guild's id.
        let everyone = serenity::all::RoleId::new(self.guild.get());
        let overwrites = vec![
            PermissionOverwrite {
                allow: Permissions::empty(),
                deny: Permissions::VIEW_CHANNEL,
                kind: PermissionOverwriteType::Role(everyone),
            },
            participant(PermissionOverwriteType::Member(user(request.buyer.id))),
        ];
        let builder = CreateChannel::new(request.channel_name())
            .kind(ChannelType::Text)
            .category(serenity::all::ChannelId::new(self.config.ticket_category_id))
            .permissions(overwrites);

        let created = self
            .guild
            .create_channel(&self.ctx.http, builder)
            .await
            .map_err(classify)?;
        Ok(ticketing::ChannelId(created.id.get()))
    }

    async fn post_notice(&self, id: ticketing::ChannelId, notice: Notice) -> Result<(), SinkError> {
        channel(id)
            .say(&self.ctx.http, render::notice_content(&notice))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn post_claim_request(
        &self,
        ticket: TicketId,
        request: &TicketRequest,
    ) -> Result<MessageRef, SinkError> {
        let target = ClaimTarget {
            ticket,
            buyer: request.buyer.id,
            mode: request.mode,
            amount: request.amount,
        };
        let log = serenity::all::ChannelId::new(self.config.request_log_channel_id);
        let message = CreateMessage::new()
            .content(render::claim_request_content(request))
            .components(vec![render::claim_row(&target, false)]);

        let sent = log
            .send_message(&self.ctx.http, message)
            .await
            .map_err(classify)?;
        Ok(MessageRef {
            channel: ticketing::ChannelId(log.get()),
            message: ticketing::MessageId(sent.id.get()),
        })
    }

    async fn grant_access(
        &self,
        id: ticketing::ChannelId,
        staff: ticketing::UserId,
    ) -> Result<(), SinkError> {
        channel(id)
            .create_permission(
                &self.ctx.http,
                participant(PermissionOverwriteType::Member(user(staff))),
            )
            .await
            .map_err(classify)
    }

    async fn disable_claim_control(&self, claim: &ClaimContext) -> Result<(), SinkError> {
        let row = render::claim_row(&ClaimTarget::from(claim), true);
        channel(claim.control.channel)
            .edit_message(
                &self.ctx.http,
                serenity::all::MessageId::new(claim.control.message.get()),
                EditMessage::new().components(vec![row]),
            )
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn post_close_control(&self, ticket: TicketId) -> Result<(), SinkError> {
        let message = CreateMessage::new()
            .content(render::CLOSE_CONTROL_CONTENT)
            .components(vec![render::close_row(ticket)]);
        channel(ticket)
            .send_message(&self.ctx.http, message)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_channel(&self, id: ticketing::ChannelId) -> Result<(), SinkError> {
        channel(id)
            .delete(&self.ctx.http)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn member_roles(&self, id: ticketing::UserId) -> Result<RoleSet, SinkError> {
        let member = self
            .guild
            .member(&self.ctx, user(id))
            .await
            .map_err(classify)?;
        Ok(member
            .roles
            .iter()
            .map(|r| ticketing::RoleId(r.get()))
            .collect())
    }

    async fn remove_role(
        &self,
        id: ticketing::UserId,
        staff_role: ticketing::RoleId,
    ) -> Result<(), SinkError> {
        self.ctx
            .http
            .remove_member_role(
                self.guild,
                user(id),
                role(staff_role),
                Some("Scam reported; pending investigation"),
            )
            .await
            .map_err(classify)
    }
}

impl ReplySource for DiscordSink {
    fn subscribe(&self, id: ticketing::ChannelId) -> BoxStream<'static, IncomingMessage> {
        MessageCollector::new(self.ctx.shard.clone())
            .channel_id(channel(id))
            .stream()
            .map(|msg| {
                IncomingMessage::new(
                    ticketing::ChannelId(msg.channel_id.get()),
                    ticketing::UserId(msg.author.id.get()),
                    msg.content,
                )
            })
            .boxed()
    }
}
