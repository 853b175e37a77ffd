use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serenity::all::{Client, GatewayIntents};
use spawner_bot::config::{self, BotConfig};
use spawner_bot::Handler;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "spawner-bot", about = "Spawner buy/sell ticketing bot for Discord")]
struct Cli {
    /// Path to the TOML config file; defaults apply if it does not exist.
    #[arg(long, default_value = "spawner-bot.toml")]
    config: PathBuf,

    /// Print the resolved configuration as JSON and exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = BotConfig::load(&cli.config)?;

    if cli.check_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let token = config::discord_token()?;
    info!(
        category = config.ticket_category_id,
        request_log = config.request_log_channel_id,
        guild = ?config.guild_id,
        window_secs = config.response_window_secs,
        "Spawner bot starting"
    );

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(Handler::new(config))
        .await
        .context("Failed to build Discord client")?;

    client.start().await.context("Discord client stopped")?;
    Ok(())
}
