//! Ticketing core for the spawner trading bot.
//!
//! Platform-agnostic: role policy, the ticket state machine, the lifecycle
//! desk and the sink contracts the Discord adapter implements.
//!
//! | Module          | Purpose                                             |
//! |-----------------|-----------------------------------------------------|
//! | `ids`           | Snowflake newtypes, role sets, actors               |
//! | `policy`        | Staff tiers and claim/close/menu predicates         |
//! | `request`       | Immutable menu submission and claim context values  |
//! | `state_machine` | Ticket states and legal transitions                 |
//! | `errors`        | Sink and ticket error taxonomy                      |
//! | `sink`          | `NotificationSink` / `ReplySource` contracts        |
//! | `verdict`       | Buyer yes/no response window                        |
//! | `board`         | In-memory registry of live tickets                  |
//! | `desk`          | Lifecycle service tying it all together             |
//! | `menu`          | Per-user menu selection drafts                      |

pub mod board;
pub mod desk;
pub mod errors;
pub mod ids;
pub mod menu;
pub mod policy;
pub mod request;
pub mod sink;
pub mod state_machine;
pub mod verdict;

pub use desk::{CleanReason, CloseResolution, Closed, PendingVerdict, TicketDesk, TicketSnapshot};
pub use errors::{Denial, ErrorClass, SinkError, TicketError};
pub use ids::{Actor, ChannelId, Member, MessageId, MessageRef, RoleId, RoleSet, TicketId, UserId};
pub use menu::{MenuDraft, SelectionBook, DRAFT_TTL};
pub use policy::{RolePolicy, StaffRoles, StaffTier};
pub use request::{ClaimContext, SpawnerAmount, SpawnerType, TicketRequest, TradeMode};
pub use sink::{IncomingMessage, Notice, NotificationSink, ReplySource};
pub use state_machine::{IllegalTransition, TicketMachine, TicketState, TransitionRecord};
pub use verdict::{ScamAnswer, VerdictOutcome, DEFAULT_RESPONSE_WINDOW};
