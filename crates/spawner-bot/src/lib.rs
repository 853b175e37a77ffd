//! Discord adapter for the spawner ticketing core.
//!
//! | Module       | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | `config`     | TOML + environment configuration                     |
//! | `custom_id`  | Encode/decode component custom ids                   |
//! | `render`     | Message wording, embeds and component rows           |
//! | `gateway`    | `NotificationSink` / `ReplySource` over serenity     |
//! | `dispatcher` | Gateway event handler routing to the ticket desk     |

pub mod config;
pub mod custom_id;
pub mod dispatcher;
pub mod gateway;
pub mod render;

pub use config::BotConfig;
pub use dispatcher::Handler;
