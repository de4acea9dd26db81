//! Session controller — owns the active identity and tone, interprets
//! upstream throttling/error signals, and enforces idle-based renewal.
//!
//! All mutating operations must be serialized by the caller (the dispatch
//! loop holds one `tokio::sync::Mutex` around the controller for the whole
//! of a turn) so at most one conversational turn is in flight upstream.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use relaybot_core::config::{FormatConfig, IdentityConfig};
use relaybot_core::types::{Tone, TurnResult};

use crate::client::{ChatBackend, ChatSession, UpstreamReply};
use crate::error::{ChatError, Result};

/// Pure snapshot of the controller state, for presence lines and commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub tone: Tone,
    /// 1-based, for display.
    pub identity_index: usize,
    pub identity_count: usize,
}

struct SessionState {
    active_identity: usize,
    active_tone: Tone,
    format: FormatConfig,
    last_activity: Option<DateTime<Utc>>,
}

pub struct SessionController {
    backend: Arc<dyn ChatBackend>,
    identities: Vec<IdentityConfig>,
    session: Box<dyn ChatSession>,
    state: SessionState,
    idle_reset: Duration,
}

impl SessionController {
    /// Open a session against the first identity. `identities` is fixed for
    /// the process lifetime and must be non-empty (validated at config load).
    pub async fn connect(
        backend: Arc<dyn ChatBackend>,
        identities: Vec<IdentityConfig>,
        format: FormatConfig,
        idle_reset_minutes: i64,
    ) -> Result<Self> {
        assert!(!identities.is_empty(), "identity list must be non-empty");

        let session = backend.open(&identities[0]).await?;
        Ok(Self {
            backend,
            identities,
            session,
            state: SessionState {
                active_identity: 0,
                active_tone: Tone::default(),
                format,
                last_activity: None,
            },
            idle_reset: Duration::minutes(idle_reset_minutes),
        })
    }

    /// Send one user turn and interpret the upstream result.
    ///
    /// Upstream non-success and malformed replies trigger exactly one reset
    /// and come back as a failure [`TurnResult`]. An access-denial anywhere
    /// is surfaced verbatim with no further reset. Any other reset failure
    /// propagates as an error — the session is broken and the user must be
    /// told.
    pub async fn converse(&mut self, text: &str) -> Result<TurnResult> {
        let tone = self.state.active_tone;
        self.state.last_activity = Some(Utc::now());

        let reply = match self.session.ask(text, tone).await {
            Ok(reply) => reply,
            Err(ChatError::AccessDenied(message)) => {
                warn!(%message, "upstream denied access");
                return Ok(TurnResult::failure(message));
            }
            Err(e) => return Err(e),
        };

        match self.interpret(reply) {
            Ok(turn) => Ok(turn),
            Err(reason) => {
                warn!(%reason, "upstream turn failed, resetting conversation");
                match self.session.reset().await {
                    Ok(()) => Ok(TurnResult::failure_after_reset(reason)),
                    Err(ChatError::AccessDenied(message)) => Ok(TurnResult::failure(message)),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Turn a typed upstream reply into a [`TurnResult`], or a failure
    /// reason that warrants a reset.
    fn interpret(&self, reply: UpstreamReply) -> std::result::Result<TurnResult, String> {
        if !reply.is_success() {
            return Err(reply.failure_reason());
        }

        // An empty or non-bot-authored reply is treated exactly like a
        // non-success result.
        let message = match reply.message {
            Some(m) if m.is_bot_authored() && !m.text.is_empty() => m,
            _ => return Err("upstream reply was empty or not authored by the bot".to_string()),
        };

        // Quota gates throttling: a malformed counter fails the whole turn
        // instead of being dropped like the decorative blocks.
        let (current_quota, max_quota) = match &reply.throttling {
            Some(counters) => match counters.parse() {
                Ok((current, max)) => (Some(current), Some(max)),
                Err(e) => return Err(e.to_string()),
            },
            None => (None, None),
        };

        let citations_block = message.citations_block();
        let links_block = message.links_block();

        Ok(TurnResult::success(
            message.text,
            current_quota,
            max_quota,
            message.suggested_replies,
            links_block,
            citations_block,
        ))
    }

    /// Reset the conversation on the current identity.
    pub async fn reset(&mut self) -> Result<()> {
        self.session.reset().await?;
        self.state.last_activity = None;
        Ok(())
    }

    /// Switch tone. The remote service cannot change tone mid-conversation,
    /// so this always resets the session.
    pub async fn switch_tone(&mut self, tone: Tone) -> Result<()> {
        self.state.active_tone = tone;
        self.reset().await?;
        info!(tone = tone.as_str(), "switched chat tone");
        Ok(())
    }

    /// Advance to the next identity (cyclic). The previous session is closed
    /// best-effort: it may already be stale, so teardown failures are
    /// swallowed with a warning. Opening the new session is not best-effort.
    pub async fn switch_identity(&mut self) -> Result<SessionStatus> {
        if let Err(e) = self.session.close().await {
            warn!(error = %e, "teardown of previous identity failed");
        }

        let next = (self.state.active_identity + 1) % self.identities.len();
        self.session = self.backend.open(&self.identities[next]).await?;
        self.state.active_identity = next;
        self.state.last_activity = None;

        let status = self.status();
        info!(
            identity = %self.identities[next].name,
            index = status.identity_index,
            count = status.identity_count,
            "switched identity"
        );
        Ok(status)
    }

    /// Reset the session when the previous turn is older than the idle
    /// horizon. Returns whether a reset happened. Purely a comparison of
    /// wall-clock time at the start of the next turn; no background timer.
    pub async fn idle_check(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let Some(last) = self.state.last_activity else {
            return Ok(false);
        };
        let elapsed = now - last;
        if elapsed < self.idle_reset {
            return Ok(false);
        }

        info!(
            idle_minutes = elapsed.num_minutes(),
            "conversation idle past threshold, resetting session"
        );
        self.reset().await?;
        Ok(true)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            tone: self.state.active_tone,
            identity_index: self.state.active_identity + 1,
            identity_count: self.identities.len(),
        }
    }

    /// Current formatting toggles, read by the dispatch loop per turn.
    pub fn format_options(&self) -> FormatConfig {
        self.state.format.clone()
    }

    pub fn toggle_citations(&mut self) -> bool {
        self.state.format.show_citations = !self.state.format.show_citations;
        self.state.format.show_citations
    }

    pub fn toggle_links(&mut self) -> bool {
        self.state.format.show_links = !self.state.format.show_links;
        self.state.format.show_links
    }

    pub fn toggle_limits(&mut self) -> bool {
        self.state.format.show_limits = !self.state.format.show_limits;
        self.state.format.show_limits
    }
}
