//! Remote-chat boundary traits and the typed reply model.
//!
//! The remote service answers with a deeply nested ad-hoc envelope; it is
//! parsed into [`UpstreamReply`] right here at the boundary so schema drift
//! never leaks into the session controller or the formatter.

use async_trait::async_trait;

use relaybot_core::config::IdentityConfig;
use relaybot_core::types::Tone;

use crate::error::{ChatError, Result};

/// Author role the remote service uses for its own messages.
pub const BOT_ROLE: &str = "bot";

/// An open conversational session against one upstream identity.
///
/// The remote service has no notion of concurrent turns on one session, so
/// callers must serialize `ask`/`reset` (the session controller does).
#[async_trait]
pub trait ChatSession: Send {
    /// Send one user turn with the given tone.
    async fn ask(&mut self, text: &str, tone: Tone) -> Result<UpstreamReply>;

    /// Tear down and reopen the conversation on the same identity.
    async fn reset(&mut self) -> Result<()>;

    /// Best-effort teardown. The identity may already be unreachable.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for sessions, one per upstream identity.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn open(&self, identity: &IdentityConfig) -> Result<Box<dyn ChatSession>>;
}

/// Typed view of one upstream exchange.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    /// Result code; anything but `"Success"` means the turn failed upstream.
    pub result_value: String,
    /// Optional human-readable detail accompanying a non-success result.
    pub result_message: Option<String>,
    /// Raw throttling counters, when present.
    pub throttling: Option<QuotaCounters>,
    /// The final message of the exchange, when present.
    pub message: Option<UpstreamMessage>,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        self.result_value == "Success"
    }

    /// The reason string surfaced to the user for a non-success result.
    pub fn failure_reason(&self) -> String {
        self.result_message
            .clone()
            .unwrap_or_else(|| self.result_value.clone())
    }
}

/// The last message of an exchange.
#[derive(Debug, Clone)]
pub struct UpstreamMessage {
    pub author: String,
    pub text: String,
    /// Suggested follow-up prompts, in upstream order. Best-effort: absent
    /// sub-fields become an empty list.
    pub suggested_replies: Vec<String>,
    /// Text blocks of the first attached card. Block 0 holds citations when
    /// it starts with a `[1]` marker; block 1 holds the learn-more links.
    pub card_blocks: Vec<String>,
}

impl UpstreamMessage {
    pub fn is_bot_authored(&self) -> bool {
        self.author == BOT_ROLE
    }

    /// Citations block, recognised only when the first card block opens
    /// with a `[1]` citation marker.
    pub fn citations_block(&self) -> Option<String> {
        self.card_blocks
            .first()
            .filter(|b| b.trim_start().starts_with("[1]"))
            .cloned()
    }

    /// Links block (second card block), when present.
    pub fn links_block(&self) -> Option<String> {
        self.card_blocks.get(1).cloned()
    }
}

/// Throttling counters as they arrived, before validation.
///
/// The service has been observed sending these both as numbers and as
/// numeric strings. Quota gates throttling, so unlike citations/links a
/// malformed value fails the turn instead of silently vanishing.
#[derive(Debug, Clone)]
pub struct QuotaCounters {
    pub current: serde_json::Value,
    pub max: serde_json::Value,
}

impl QuotaCounters {
    /// Validate and convert to `(current, max)`, enforcing `current <= max`.
    pub fn parse(&self) -> Result<(u32, u32)> {
        let current = parse_count(&self.current, "current quota")?;
        let max = parse_count(&self.max, "max quota")?;
        if current > max {
            return Err(ChatError::MalformedReply(format!(
                "quota counters out of range: {current} > {max}"
            )));
        }
        Ok((current, max))
    }
}

fn parse_count(value: &serde_json::Value, what: &str) -> Result<u32> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ChatError::MalformedReply(format!("{what} is not a valid count: {n}"))),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| ChatError::MalformedReply(format!("{what} is not a valid count: {s:?}"))),
        other => Err(ChatError::MalformedReply(format!(
            "{what} has unexpected type: {other}"
        ))),
    }
}
