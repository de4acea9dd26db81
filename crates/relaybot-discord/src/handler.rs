use std::sync::{Arc, OnceLock};

use serenity::all::ActivityData;
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::{Message, MessageType};
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::model::user::OnlineStatus;
use serenity::prelude::{Context, EventHandler};
use tracing::{info, warn};

use relaybot_chat::session::SessionStatus;
use relaybot_core::config::DiscordConfig;

use crate::dispatch::{DeliveryContext, Dispatcher};
use crate::plan::plan_delivery;
use crate::send;

/// Serenity event handler wired to the dispatch loop.
pub struct RelayHandler {
    pub dispatcher: Arc<Dispatcher>,
    pub config: DiscordConfig,
    pub bot_id: OnceLock<UserId>,
}

#[async_trait]
impl EventHandler for RelayHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();

        set_presence(&ctx, self.dispatcher.status().await);
        info!(name = %ready.user.name, "Discord bot connected");

        crate::commands::register_commands(&ctx).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Human-authored, non-system messages only.
        if msg.author.bot {
            return;
        }
        if !matches!(msg.kind, MessageType::Regular | MessageType::InlineReply) {
            return;
        }

        let is_guild = msg.guild_id.is_some();

        if is_guild && self.config.require_mention {
            let Some(bot_id) = self.bot_id.get() else {
                return;
            };
            if !msg.mentions_user_id(*bot_id) {
                return;
            }
        }

        if !is_guild && !self.config.dm_allowed {
            return;
        }

        let content = strip_mention(&msg.content).trim().to_string();
        if content.is_empty() {
            return;
        }

        let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

        let dispatcher = Arc::clone(&self.dispatcher);
        let http = Arc::clone(&ctx.http);
        let context = DeliveryContext {
            channel_id: msg.channel_id,
            reply_to: msg.id,
        };

        tokio::spawn(async move {
            run_and_deliver(dispatcher, http, context, content).await;
        });
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                crate::commands::handle_interaction(&self.dispatcher, &ctx, &command).await;
            }
            Interaction::Component(component) => {
                // A quick-reply button: the custom_id is the reply label,
                // re-entering the normal turn pipeline as typed input.
                if let Err(e) = component
                    .create_response(
                        &ctx.http,
                        serenity::builder::CreateInteractionResponse::Acknowledge,
                    )
                    .await
                {
                    warn!(error = %e, "failed to acknowledge quick-reply button");
                }

                let label = component.data.custom_id.clone();
                let context = DeliveryContext {
                    channel_id: component.channel_id,
                    reply_to: component.message.id,
                };

                let _ = component.channel_id.broadcast_typing(&ctx.http).await;

                let dispatcher = Arc::clone(&self.dispatcher);
                let http = Arc::clone(&ctx.http);
                tokio::spawn(async move {
                    run_and_deliver(dispatcher, http, context, label).await;
                });
            }
            _ => {}
        }
    }
}

/// The full turn pipeline: converse, cache for replay, plan, deliver.
pub(crate) async fn run_and_deliver(
    dispatcher: Arc<Dispatcher>,
    http: Arc<serenity::http::Http>,
    context: DeliveryContext,
    text: String,
) {
    let parts = dispatcher.run_turn(context, &text).await;

    let plan = plan_delivery(parts);
    if let Err(e) = send::deliver(&http, context, plan).await {
        warn!(error = %e, channel = %context.channel_id, "Discord delivery failed");
    }
}

/// Presence line mirroring the active tone and identity, e.g.
/// `Balanced, Profile: (1/3)`.
pub(crate) fn set_presence(ctx: &Context, status: SessionStatus) {
    let line = format!(
        "{}, Profile: ({}/{})",
        status.tone.display(),
        status.identity_index,
        status.identity_count
    );
    ctx.set_presence(Some(ActivityData::playing(line)), OnlineStatus::Online);
}

/// Remove an @mention prefix (e.g. `<@123456789>`) from a message.
fn strip_mention(s: &str) -> &str {
    let trimmed = s.trim_start();
    if trimmed.starts_with("<@") {
        if let Some(end) = trimmed.find('>') {
            return trimmed[end + 1..].trim_start();
        }
    }
    trimmed
}
