//! Pure delivery planning — maps a formatted part sequence onto concrete
//! outbound messages before any network call happens.
//!
//! The rule: text segments go out as successive messages, the first as a
//! reply to the triggering message to preserve threading; the final message
//! of the batch carries the summary panel and the quick-reply buttons. An
//! attachment fallback supersedes all text segments and collapses the batch
//! into a single reply.

use relaybot_format::{RenderPart, SummaryPanel};

/// One message to send, in batch order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    /// Sent as a reply to the triggering message when true.
    pub reply: bool,
    pub content: Option<String>,
    pub attachment: Option<(Vec<u8>, String)>,
    pub panel: Option<SummaryPanel>,
    pub quick_replies: Option<Vec<String>>,
}

pub fn plan_delivery(parts: Vec<RenderPart>) -> Vec<OutboundMessage> {
    let mut texts: Vec<String> = Vec::new();
    let mut attachment: Option<(Vec<u8>, String)> = None;
    let mut panel: Option<SummaryPanel> = None;
    let mut quick_replies: Option<Vec<String>> = None;

    for part in parts {
        match part {
            RenderPart::TextSegment(text) => texts.push(text),
            RenderPart::AttachmentFallback { content, filename } => {
                attachment = Some((content, filename));
            }
            RenderPart::SummaryPanel(p) => panel = Some(p),
            RenderPart::QuickReplySet(replies) => quick_replies = Some(replies),
        }
    }

    if let Some(attachment) = attachment {
        return vec![OutboundMessage {
            reply: true,
            content: None,
            attachment: Some(attachment),
            panel,
            quick_replies,
        }];
    }

    if texts.is_empty() {
        if panel.is_none() && quick_replies.is_none() {
            return Vec::new();
        }
        return vec![OutboundMessage {
            reply: true,
            panel,
            quick_replies,
            ..Default::default()
        }];
    }

    let last = texts.len() - 1;
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| OutboundMessage {
            reply: i == 0,
            content: Some(text),
            attachment: None,
            panel: if i == last { panel.take() } else { None },
            quick_replies: if i == last { quick_replies.take() } else { None },
        })
        .collect()
}
