//! Slash commands — `/reset`, `/style`, `/profile`, `/toggle`, `/replay`.
//!
//! Registration happens in `ready()`; interactions are dispatched from
//! `interaction_create` in the event handler.

use std::sync::Arc;

use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};
use serenity::model::application::{CommandInteraction, CommandOptionType};
use serenity::prelude::Context;
use tracing::{info, warn};

use relaybot_core::types::Tone;

use crate::dispatch::Dispatcher;
use crate::handler::set_presence;
use crate::plan::plan_delivery;

/// Register global slash commands. Call from `ready()`.
pub async fn register_commands(ctx: &Context) {
    let commands = vec![
        CreateCommand::new("reset").description("Reset the conversation"),
        CreateCommand::new("style")
            .description("Switch chat style")
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "creative",
                "Switch chat style to Creative",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "balanced",
                "Switch chat style to Balanced",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "precise",
                "Switch chat style to Precise",
            )),
        CreateCommand::new("profile").description("Switch to the next profile"),
        CreateCommand::new("toggle")
            .description("Toggle chat configuration")
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "citations",
                "Toggle if showing citations",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "links",
                "Toggle if showing links",
            ))
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "limits",
                "Toggle if showing limits",
            )),
        CreateCommand::new("replay").description("Send the last response again"),
    ];

    match serenity::model::application::Command::set_global_commands(&ctx.http, commands).await {
        Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
        Err(e) => warn!(error = %e, "failed to register global slash commands"),
    }
}

/// Dispatch a slash command interaction to the appropriate handler.
pub async fn handle_interaction(
    dispatcher: &Arc<Dispatcher>,
    ctx: &Context,
    command: &CommandInteraction,
) {
    let result = match command.data.name.as_str() {
        "reset" => handle_reset(dispatcher, ctx, command).await,
        "style" => handle_style(dispatcher, ctx, command).await,
        "profile" => handle_profile(dispatcher, ctx, command).await,
        "toggle" => handle_toggle(dispatcher, ctx, command).await,
        "replay" => handle_replay(dispatcher, ctx, command).await,
        _ => {
            respond(ctx, command, "Unknown command.").await;
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!(command = %command.data.name, error = %e, "slash command error");
    }
}

fn subcommand(command: &CommandInteraction) -> Option<&str> {
    command.data.options.first().map(|o| o.name.as_str())
}

async fn handle_reset(
    dispatcher: &Arc<Dispatcher>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    let message = match dispatcher.reset().await {
        Ok(()) => "Reset the conversation".to_string(),
        Err(e) => format!("Reset failed: {e}"),
    };
    respond(ctx, command, &message).await;
    Ok(())
}

async fn handle_style(
    dispatcher: &Arc<Dispatcher>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    let Some(tone) = subcommand(command).and_then(Tone::parse) else {
        respond(ctx, command, "Unknown style.").await;
        return Ok(());
    };

    let message = match dispatcher.switch_tone(tone).await {
        Ok(status) => {
            set_presence(ctx, status);
            format!("Switch chat style to {}", tone.display())
        }
        Err(e) => format!("Style switch failed: {e}"),
    };
    respond(ctx, command, &message).await;
    Ok(())
}

async fn handle_profile(
    dispatcher: &Arc<Dispatcher>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    let message = match dispatcher.switch_identity().await {
        Ok(status) => {
            set_presence(ctx, status);
            info!(
                index = status.identity_index,
                count = status.identity_count,
                "switched profile"
            );
            format!(
                "Switch to profile: {}/{}",
                status.identity_index, status.identity_count
            )
        }
        Err(e) => format!("Profile switch failed: {e}"),
    };
    respond(ctx, command, &message).await;
    Ok(())
}

async fn handle_toggle(
    dispatcher: &Arc<Dispatcher>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    let message = match subcommand(command) {
        Some("citations") => format!(
            "Toggle configuration - showing citations. Current value: {}",
            dispatcher.toggle_citations().await
        ),
        Some("links") => format!(
            "Toggle configuration - showing links. Current value: {}",
            dispatcher.toggle_links().await
        ),
        Some("limits") => format!(
            "Toggle configuration - showing limits. Current value: {}",
            dispatcher.toggle_limits().await
        ),
        _ => "Unknown toggle.".to_string(),
    };
    respond(ctx, command, &message).await;
    Ok(())
}

/// `/replay` — re-deliver the cached last turn without a new upstream call.
/// With no cached turn this reports absence and changes nothing.
async fn handle_replay(
    dispatcher: &Arc<Dispatcher>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    let Some(cached) = dispatcher.replay().await else {
        respond(ctx, command, "Nothing to replay yet.").await;
        return Ok(());
    };

    respond(ctx, command, "Replaying the last response.").await;

    let plan = plan_delivery(cached.parts);
    if let Err(e) = crate::send::deliver(&ctx.http, cached.context, plan).await {
        warn!(error = %e, "replay delivery failed");
    }
    Ok(())
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: &str) {
    let _ = command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await;
}
