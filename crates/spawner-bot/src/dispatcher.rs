//! Gateway event routing.
//!
//! ```text
//! /spawner <mode>            ──▶ menu embed + selects + open button
//! spawner:type|amount:<m>    ──▶ SelectionBook draft, acknowledge
//! spawner:open:<m>           ──▶ TicketDesk::open
//! spawner:claim:…            ──▶ TicketDesk::claim
//! spawner:close:<ticket>     ──▶ TicketDesk::begin_close ─▶ await_verdict (spawned)
//! channel delete             ──▶ TicketDesk::forget
//! menu message delete        ──▶ SelectionBook::drop_menu
//! ```
//!
//! Every interaction is acknowledged; failures are answered privately to
//! the clicking user and logged.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ChannelId, Command, CommandDataOptionValue, CommandInteraction, ComponentInteraction,
    ComponentInteractionDataKind, Context, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EventHandler,
    GuildChannel, GuildId, Interaction, Message, MessageId, Ready,
};
use ticketing::{
    Actor, CloseResolution, Member, MessageRef, RoleSet, SpawnerAmount, SpawnerType,
    TicketDesk, TicketError, TradeMode,
};
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::custom_id::{ClaimTarget, ComponentAction};
use crate::gateway::DiscordSink;
use crate::render;

/// Roles of the invoking member; empty outside a guild.
fn role_set<'a>(roles: impl IntoIterator<Item = &'a serenity::all::RoleId>) -> RoleSet {
    roles
        .into_iter()
        .map(|r| ticketing::RoleId(r.get()))
        .collect()
}

fn actor_of(component: &ComponentInteraction) -> Actor {
    Actor::new(
        component.user.id.get(),
        role_set(component.member.iter().flat_map(|m| m.roles.iter())),
    )
}

fn selected_value(component: &ComponentInteraction) -> Option<&str> {
    match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => {
            values.first().map(String::as_str)
        }
        _ => None,
    }
}

fn private(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

pub struct Handler {
    config: Arc<BotConfig>,
    desk: Arc<TicketDesk>,
    menus: ticketing::SelectionBook,
}

impl Handler {
    pub fn new(config: BotConfig) -> Self {
        let desk = TicketDesk::new(config.policy(), config.response_window());
        Self {
            config: Arc::new(config),
            desk: Arc::new(desk),
            menus: ticketing::SelectionBook::new(),
        }
    }

    pub fn desk(&self) -> &TicketDesk {
        &self.desk
    }

    fn sink(&self, ctx: &Context, guild: GuildId) -> DiscordSink {
        DiscordSink::new(ctx.clone(), guild, Arc::clone(&self.config))
    }

    async fn register_commands(&self, ctx: &Context) -> serenity::Result<()> {
        let commands = vec![render::spawner_command()];
        match self.config.guild_id {
            Some(guild) => {
                GuildId::new(guild).set_commands(&ctx.http, commands).await?;
                info!(guild, "Registered /{} for guild", render::COMMAND_NAME);
            }
            None => {
                Command::set_global_commands(&ctx.http, commands).await?;
                info!("Registered /{} globally", render::COMMAND_NAME);
            }
        }
        Ok(())
    }

    async fn on_command(&self, ctx: &Context, command: &CommandInteraction) {
        if command.data.name != render::COMMAND_NAME {
            debug!(name = %command.data.name, "Ignoring unknown command");
            return;
        }

        let roles = role_set(command.member.iter().flat_map(|m| m.roles.iter()));
        let response = if !self.desk.policy().can_invoke_menu(&roles) {
            private(render::error_reply(&TicketError::PolicyDenied(
                ticketing::Denial::MenuRole,
            )))
        } else {
            let mode = command.data.options.iter().find_map(|opt| {
                match (&opt.name[..], &opt.value) {
                    (render::MODE_OPTION, CommandDataOptionValue::String(raw)) => {
                        raw.parse::<TradeMode>().ok()
                    }
                    _ => None,
                }
            });
            match mode {
                Some(mode) => CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .embed(render::menu_embed(mode))
                        .components(render::menu_components(mode)),
                ),
                None => private(render::error_reply(&TicketError::InvalidSelection(
                    "mode must be `buy` or `sell`".to_string(),
                ))),
            }
        };

        if let Err(e) = command.create_response(&ctx.http, response).await {
            warn!(user = %command.user.id, error = %e, "Failed to answer /spawner");
        }
    }

    async fn on_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let action = match ComponentAction::parse(&component.data.custom_id) {
            Ok(action) => action,
            Err(e) => {
                debug!(error = %e, "Ignoring component");
                return;
            }
        };
        let Some(guild) = component.guild_id else {
            self.respond(ctx, component, private("This only works inside the server."))
                .await;
            return;
        };

        match action {
            ComponentAction::SelectSpawner(_) | ComponentAction::SelectAmount(_) => {
                self.on_select(ctx, component, action).await
            }
            ComponentAction::Open(mode) => self.on_open(ctx, component, guild, mode).await,
            ComponentAction::Claim(target) => self.on_claim(ctx, component, guild, target).await,
            ComponentAction::Close(ticket) => self.on_close(ctx, component, guild, ticket).await,
        }
    }

    async fn on_select(&self, ctx: &Context, component: &ComponentInteraction, action: ComponentAction) {
        let menu = ticketing::MessageId(component.message.id.get());
        let user = ticketing::UserId(component.user.id.get());
        let value = selected_value(component).unwrap_or_default();

        let recorded = match action {
            ComponentAction::SelectSpawner(_) => value
                .parse::<SpawnerType>()
                .map(|spawner| self.menus.select_spawner(menu, user, spawner)),
            ComponentAction::SelectAmount(_) => value
                .parse::<SpawnerAmount>()
                .map(|amount| self.menus.select_amount(menu, user, amount)),
            _ => return,
        };

        let response = match recorded {
            Ok(()) => CreateInteractionResponse::Acknowledge,
            Err(e) => private(render::error_reply(&e)),
        };
        self.respond(ctx, component, response).await;
    }

    async fn on_open(&self, ctx: &Context, component: &ComponentInteraction, guild: GuildId, mode: TradeMode) {
        let menu = ticketing::MessageId(component.message.id.get());
        let buyer = Member::new(component.user.id.get(), component.user.name.clone());

        let request = match self.menus.submit(menu, buyer, mode) {
            Ok(request) => request,
            Err(e) => {
                self.respond(ctx, component, private(render::error_reply(&e)))
                    .await;
                return;
            }
        };

        if !self.defer(ctx, component).await {
            return;
        }
        let sink = self.sink(ctx, guild);
        let reply = match self.desk.open(&sink, request).await {
            Ok(ticket) => {
                self.menus.clear(menu, ticketing::UserId(component.user.id.get()));
                render::ticket_created(ticket)
            }
            Err(e) => {
                warn!(user = %component.user.id, error = %e, "Ticket creation failed");
                render::error_reply(&e)
            }
        };
        self.follow_up(ctx, component, reply).await;
    }

    async fn on_claim(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        guild: GuildId,
        target: ClaimTarget,
    ) {
        if !self.defer(ctx, component).await {
            return;
        }
        let claim = target.with_control(MessageRef {
            channel: ticketing::ChannelId(component.channel_id.get()),
            message: ticketing::MessageId(component.message.id.get()),
        });
        let actor = actor_of(component);
        let sink = self.sink(ctx, guild);

        let reply = match self.desk.claim(&sink, &claim, &actor).await {
            Ok(()) => render::ticket_claimed(claim.ticket),
            Err(e) => {
                info!(ticket = %claim.ticket, staff = %actor.user, error = %e, "Claim refused");
                render::error_reply(&e)
            }
        };
        self.follow_up(ctx, component, reply).await;
    }

    async fn on_close(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        guild: GuildId,
        ticket: ticketing::TicketId,
    ) {
        if !self.defer(ctx, component).await {
            return;
        }
        let actor = actor_of(component);
        let sink = self.sink(ctx, guild);

        let pending = match self.desk.begin_close(&sink, &sink, ticket, &actor).await {
            Ok(pending) => pending,
            Err(e) => {
                info!(%ticket, staff = %actor.user, error = %e, "Close refused");
                self.follow_up(ctx, component, render::error_reply(&e)).await;
                return;
            }
        };
        self.follow_up(
            ctx,
            component,
            render::close_started(self.desk.window().as_secs()),
        )
        .await;

        // The window can run for a while; don't hold the event task.
        let desk = Arc::clone(&self.desk);
        tokio::spawn(async move {
            match desk.await_verdict(&sink, pending).await {
                Ok(closed) => match closed.resolution {
                    CloseResolution::Clean(reason) => {
                        info!(%ticket, ?reason, "Ticket closed clean")
                    }
                    CloseResolution::Scam {
                        stripped,
                        strip_failed,
                    } => warn!(
                        %ticket,
                        stripped = stripped.len(),
                        strip_failed,
                        "Ticket frozen after scam report"
                    ),
                },
                Err(e) => error!(%ticket, error = %e, "Failed to settle ticket"),
            }
        });
    }

    async fn respond(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        response: CreateInteractionResponse,
    ) {
        if let Err(e) = component.create_response(&ctx.http, response).await {
            warn!(custom_id = %component.data.custom_id, error = %e, "Failed to answer interaction");
        }
    }

    /// Acknowledge privately before slow work. Returns false if the interaction is gone.
    async fn defer(&self, ctx: &Context, component: &ComponentInteraction) -> bool {
        match component.defer_ephemeral(&ctx.http).await {
            Ok(()) => true,
            Err(e) => {
                warn!(custom_id = %component.data.custom_id, error = %e, "Failed to defer interaction");
                false
            }
        }
    }

    async fn follow_up(&self, ctx: &Context, component: &ComponentInteraction, content: String) {
        let followup = CreateInteractionResponseFollowup::new()
            .content(content)
            .ephemeral(true);
        if let Err(e) = component.create_followup(&ctx.http, followup).await {
            warn!(custom_id = %component.data.custom_id, error = %e, "Failed to send follow-up");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Connected to gateway");
        if let Err(e) = self.register_commands(&ctx).await {
            error!(error = %e, "Failed to register slash commands");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.on_command(&ctx, &command).await,
            Interaction::Component(component) => self.on_component(&ctx, &component).await,
            _ => {}
        }
    }

    async fn channel_delete(
        &self,
        _ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        self.desk.forget(ticketing::ChannelId(channel.id.get()));
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        _channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        let dropped = self
            .menus
            .drop_menu(ticketing::MessageId(deleted_message_id.get()));
        if dropped > 0 {
            debug!(menu = %deleted_message_id, dropped, "Menu deleted; drafts dropped");
        }
    }
}
