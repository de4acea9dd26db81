//! Dispatch loop state — the bridge between Discord events and the session
//! controller, plus the single-slot replay cache.
//!
//! One `tokio::sync::Mutex` serializes every mutating controller operation
//! together with the replay-slot update, for the duration of a turn, so at
//! most one conversational turn is in flight upstream at any time and the
//! slot always holds the newest turn. Delivery runs after the lock is
//! dropped: a captured `TurnResult` and its `RenderPart`s are immutable.

use chrono::Utc;
use serenity::model::id::{ChannelId, MessageId};
use tokio::sync::Mutex;
use tracing::warn;

use relaybot_chat::session::{SessionController, SessionStatus};
use relaybot_chat::ChatError;
use relaybot_core::types::{Tone, TurnResult};
use relaybot_format::RenderPart;

/// Where a turn's output goes: the channel, and the message to thread under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryContext {
    pub channel_id: ChannelId,
    pub reply_to: MessageId,
}

/// The last delivered turn, kept already formatted for replay.
#[derive(Debug, Clone)]
pub struct CachedTurn {
    pub context: DeliveryContext,
    pub parts: Vec<RenderPart>,
}

pub struct Dispatcher {
    controller: Mutex<SessionController>,
    last_turn: Mutex<Option<CachedTurn>>,
}

impl Dispatcher {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller: Mutex::new(controller),
            last_turn: Mutex::new(None),
        }
    }

    /// Run one conversational turn: idle check, converse, format, and
    /// overwrite the single replay slot — all under the controller lock,
    /// so a slower concurrent turn can never clobber the slot with an
    /// older exchange. Delivery happens after the lock is dropped.
    ///
    /// Transport-level failures become a failure turn so the user-facing
    /// path is the same whether the turn succeeded or not.
    pub async fn run_turn(&self, context: DeliveryContext, text: &str) -> Vec<RenderPart> {
        let mut controller = self.controller.lock().await;

        if let Err(e) = controller.idle_check(Utc::now()).await {
            // A failed idle reset surfaces on the converse below anyway.
            warn!(error = %e, "idle reset failed");
        }

        let turn = match controller.converse(text).await {
            Ok(turn) => turn,
            Err(e) => {
                warn!(error = %e, "conversational turn failed");
                TurnResult::failure(e.to_string())
            }
        };

        let parts = relaybot_format::format(&turn, &controller.format_options());
        *self.last_turn.lock().await = Some(CachedTurn {
            context,
            parts: parts.clone(),
        });
        parts
    }

    /// The cached last turn, if any. Read-only: replaying changes nothing.
    pub async fn replay(&self) -> Option<CachedTurn> {
        self.last_turn.lock().await.clone()
    }

    pub async fn reset(&self) -> Result<(), ChatError> {
        self.controller.lock().await.reset().await
    }

    pub async fn switch_tone(&self, tone: Tone) -> Result<SessionStatus, ChatError> {
        let mut controller = self.controller.lock().await;
        controller.switch_tone(tone).await?;
        Ok(controller.status())
    }

    pub async fn switch_identity(&self) -> Result<SessionStatus, ChatError> {
        self.controller.lock().await.switch_identity().await
    }

    pub async fn status(&self) -> SessionStatus {
        self.controller.lock().await.status()
    }

    pub async fn toggle_citations(&self) -> bool {
        self.controller.lock().await.toggle_citations()
    }

    pub async fn toggle_links(&self) -> bool {
        self.controller.lock().await.toggle_links()
    }

    pub async fn toggle_limits(&self) -> bool {
        self.controller.lock().await.toggle_limits()
    }
}
