//! The buyer's scam-report window.
//!
//! A single-shot timed subscription: resolves on the first qualifying reply,
//! on timeout, or on cancellation, whichever comes first. Messages that do not
//! qualify are skipped without touching the deadline.

use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::ids::{ChannelId, UserId};
use crate::sink::IncomingMessage;

/// Default length of the response window.
pub const DEFAULT_RESPONSE_WINDOW: Duration = Duration::from_secs(60);

/// The buyer's answer to "did you get scammed?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScamAnswer {
    Yes,
    No,
}

impl ScamAnswer {
    /// Case-insensitive exact match; anything else is not an answer.
    pub fn parse(content: &str) -> Option<Self> {
        if content.eq_ignore_ascii_case("yes") {
            Some(Self::Yes)
        } else if content.eq_ignore_ascii_case("no") {
            Some(Self::No)
        } else {
            None
        }
    }
}

/// Which messages count as a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFilter {
    pub channel: ChannelId,
    pub buyer: UserId,
}

impl ReplyFilter {
    pub fn answer(&self, msg: &IncomingMessage) -> Option<ScamAnswer> {
        if msg.channel != self.channel || msg.author != self.buyer {
            return None;
        }
        ScamAnswer::parse(&msg.content)
    }
}

/// How the window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictOutcome {
    Answered(ScamAnswer),
    TimedOut,
    /// Ticket channel went away before an answer.
    Cancelled,
}

/// Wait for the buyer's answer.
pub async fn await_buyer_verdict(
    mut replies: BoxStream<'static, IncomingMessage>,
    filter: ReplyFilter,
    window: Duration,
    cancel: CancellationToken,
) -> VerdictOutcome {
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    // An ended feed says nothing about the channel; keep waiting out the window.
    let mut feed_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return VerdictOutcome::Cancelled,
            _ = &mut deadline => return VerdictOutcome::TimedOut,
            next = replies.next(), if feed_open => match next {
                Some(msg) => {
                    if let Some(answer) = filter.answer(&msg) {
                        return VerdictOutcome::Answered(answer);
                    }
                    tracing::trace!(author = %msg.author, "Ignoring non-answer in ticket channel");
                }
                None => {
                    tracing::debug!(channel = %filter.channel, "Reply feed ended before the window closed");
                    feed_open = false;
                }
            },
        }
    }
}
