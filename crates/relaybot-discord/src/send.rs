//! Executes a delivery plan against the Discord REST API.

use serenity::builder::{
    CreateActionRow, CreateAttachment, CreateButton, CreateEmbed, CreateMessage,
};
use serenity::http::Http;
use serenity::model::application::ButtonStyle;
use serenity::model::channel::MessageReference;

use relaybot_format::SummaryPanel;

use crate::dispatch::DeliveryContext;
use crate::plan::OutboundMessage;

/// Discord caps button custom_ids at 100 and labels at 80 characters.
const CUSTOM_ID_MAX: usize = 100;
const LABEL_MAX: usize = 80;

/// Send each planned message in order. Messages flagged `reply` reference
/// the triggering message so threading is preserved.
pub async fn deliver(
    http: &Http,
    context: DeliveryContext,
    plan: Vec<OutboundMessage>,
) -> Result<(), serenity::Error> {
    for outbound in plan {
        let mut message = CreateMessage::new();

        if let Some(content) = &outbound.content {
            message = message.content(content);
        }
        if let Some((bytes, filename)) = outbound.attachment {
            message = message.add_file(CreateAttachment::bytes(bytes, filename));
        }
        if let Some(panel) = &outbound.panel {
            message = message.embed(panel_embed(panel));
        }
        if let Some(replies) = &outbound.quick_replies {
            message = message.components(vec![quick_reply_row(replies)]);
        }
        if outbound.reply {
            message = message.reference_message(MessageReference::from((
                context.channel_id,
                context.reply_to,
            )));
        }

        context.channel_id.send_message(http, message).await?;
    }
    Ok(())
}

fn panel_embed(panel: &SummaryPanel) -> CreateEmbed {
    let mut embed = CreateEmbed::new();
    if !panel.title.is_empty() {
        embed = embed.title(&panel.title);
    }
    if !panel.body.is_empty() {
        embed = embed.description(&panel.body);
    }
    for (name, value) in &panel.fields {
        embed = embed.field(name, value, false);
    }
    embed
}

/// One button per quick reply. The custom_id carries the label itself:
/// activation re-enters the normal turn pipeline with that text, no
/// per-button state to look up.
fn quick_reply_row(replies: &[String]) -> CreateActionRow {
    let buttons = replies
        .iter()
        .map(|label| {
            CreateButton::new(truncate(label, CUSTOM_ID_MAX))
                .label(truncate(label, LABEL_MAX))
                .style(ButtonStyle::Secondary)
        })
        .collect();
    CreateActionRow::Buttons(buttons)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
