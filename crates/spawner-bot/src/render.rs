//! Message wording and component layouts.
//!
//! Text builders are plain functions returning `String` so they can be
//! checked without a gateway; the serenity builders wrap them.

use serenity::all::{
    ButtonStyle, Colour, CommandOptionType, CreateActionRow, CreateButton, CreateCommand,
    CreateCommandOption, CreateEmbed, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption,
};
use ticketing::{
    ChannelId, Denial, ErrorClass, Notice, RoleId, SpawnerAmount, SpawnerType, TicketError,
    TicketId, TicketRequest, TradeMode, UserId,
};

use crate::custom_id::{ClaimTarget, ComponentAction};

pub const COMMAND_NAME: &str = "spawner";
pub const MODE_OPTION: &str = "mode";

const MENU_GREEN: u32 = 0x2ECC71;

pub fn user_mention(user: UserId) -> String {
    format!("<@{user}>")
}

pub fn role_mention(role: RoleId) -> String {
    format!("<@&{role}>")
}

pub fn channel_mention(channel: ChannelId) -> String {
    format!("<#{channel}>")
}

// ── Slash command & menu ─────────────────────────────────────────────────────

pub fn spawner_command() -> CreateCommand {
    CreateCommand::new(COMMAND_NAME)
        .description("Send the spawner buy/sell menu")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, MODE_OPTION, "Choose buy or sell")
                .required(true)
                .add_string_choice("buy", "buy")
                .add_string_choice("sell", "sell"),
        )
}

pub fn menu_embed(mode: TradeMode) -> CreateEmbed {
    let colour = match mode {
        TradeMode::Buy => Colour::new(MENU_GREEN),
        TradeMode::Sell => Colour::ORANGE,
    };
    CreateEmbed::new()
        .title(format!("{} Skeleton Spawners", mode.title()))
        .description(format!(
            "Select your amount and press **{}**.",
            open_button_label(mode)
        ))
        .colour(colour)
}

pub fn open_button_label(mode: TradeMode) -> String {
    format!("{} Spawner(s)", mode.title())
}

pub fn menu_components(mode: TradeMode) -> Vec<CreateActionRow> {
    let spawners = SpawnerType::ALL
        .into_iter()
        .map(|t| CreateSelectMenuOption::new(t.label(), t.value()))
        .collect();
    let amounts = SpawnerAmount::all()
        .map(|a| CreateSelectMenuOption::new(a.to_string(), a.to_string()))
        .collect();

    vec![
        CreateActionRow::SelectMenu(
            CreateSelectMenu::new(
                ComponentAction::SelectSpawner(mode).encode(),
                CreateSelectMenuKind::String { options: spawners },
            )
            .placeholder("Select spawner type..."),
        ),
        CreateActionRow::SelectMenu(
            CreateSelectMenu::new(
                ComponentAction::SelectAmount(mode).encode(),
                CreateSelectMenuKind::String { options: amounts },
            )
            .placeholder("Select amount..."),
        ),
        CreateActionRow::Buttons(vec![CreateButton::new(ComponentAction::Open(mode).encode())
            .label(open_button_label(mode))
            .style(ButtonStyle::Success)]),
    ]
}

// ── Staff notification ───────────────────────────────────────────────────────

pub fn claim_request_content(request: &TicketRequest) -> String {
    format!(
        "New `{}` request from {} (**{} {}(s)**)",
        request.mode,
        user_mention(request.buyer.id),
        request.amount,
        request.spawner.label()
    )
}

pub fn claim_row(target: &ClaimTarget, disabled: bool) -> CreateActionRow {
    CreateActionRow::Buttons(vec![CreateButton::new(ComponentAction::Claim(*target).encode())
        .label("Claim Ticket")
        .style(ButtonStyle::Primary)
        .disabled(disabled)])
}

pub const CLOSE_CONTROL_CONTENT: &str = "Only staff can close this ticket.";

pub fn close_row(ticket: TicketId) -> CreateActionRow {
    CreateActionRow::Buttons(vec![CreateButton::new(ComponentAction::Close(ticket).encode())
        .label("Close Ticket")
        .style(ButtonStyle::Danger)])
}

// ── Ticket channel notices ───────────────────────────────────────────────────

pub fn notice_content(notice: &Notice) -> String {
    match notice {
        Notice::TicketOpened {
            buyer,
            mode,
            spawner,
            amount,
        } => format!(
            "🎟️ **{} Ticket for {}**\nSpawner: **{}**\nAmount: **{}**\nPlease wait for a merchant to be available.",
            mode.title(),
            user_mention(*buyer),
            spawner,
            amount
        ),
        Notice::Claimed { staff } => format!("{} has claimed this ticket!", user_mention(*staff)),
        Notice::ScamPrompt { buyer } => format!(
            "{}, did you get scammed? Reply **yes** or **no**.",
            user_mention(*buyer)
        ),
        Notice::NoResponse => "⏳ No response. Closing ticket.".to_string(),
        Notice::ClosingClean => "Thank you! Closing the ticket.".to_string(),
        Notice::ScamAlert { alert_role, buyer } => format!(
            "🚨 {} Scam reported by {}!",
            role_mention(*alert_role),
            user_mention(*buyer)
        ),
        Notice::RoleStripFailed => "⚠ Discord error during role removal.".to_string(),
        Notice::Frozen { staff } => format!(
            "⚠ {}'s staff role has been removed pending investigation.\nThe ticket will remain open.",
            user_mention(*staff)
        ),
    }
}

// ── Private replies ──────────────────────────────────────────────────────────

pub fn ticket_created(ticket: TicketId) -> String {
    format!("Your ticket has been created: {}", channel_mention(ticket))
}

pub fn ticket_claimed(ticket: TicketId) -> String {
    format!("Ticket claimed! View it: {}", channel_mention(ticket))
}

pub fn close_started(window_secs: u64) -> String {
    format!("Asked the buyer about the trade; waiting up to {window_secs}s for an answer.")
}

/// Private reply for a failed ticket operation.
pub fn error_reply(err: &TicketError) -> String {
    match err {
        TicketError::PolicyDenied(Denial::MenuRole) => {
            "❌ You do not have permission to use this command.".to_string()
        }
        TicketError::PolicyDenied(Denial::ClaimCapacity { .. }) => {
            "❌ You don't have permission to claim this ticket.".to_string()
        }
        TicketError::PolicyDenied(Denial::NotStaff) => {
            "❌ Only staff members can close tickets.".to_string()
        }
        TicketError::IncompleteSelection => {
            "Please select both spawner type and amount.".to_string()
        }
        TicketError::AlreadyClaimed(_) => "This ticket has already been claimed.".to_string(),
        TicketError::UnknownTicket(_) => "This ticket is no longer active.".to_string(),
        TicketError::IllegalTransition(t) => {
            format!("This ticket can't be closed right now (it is {}).", t.from)
        }
        e if e.class() == ErrorClass::Transient => "⚠ Discord API error, try again.".to_string(),
        e => format!("⚠ Something went wrong: {e}"),
    }
}
