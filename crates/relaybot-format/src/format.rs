//! Response formatting — turns one [`TurnResult`] into an ordered sequence
//! of renderable parts.
//!
//! Pure: identical inputs always yield a structurally identical part
//! sequence, and neither the turn nor the options are mutated. Delivery
//! order downstream follows part order here.

use std::sync::OnceLock;

use regex::Regex;

use relaybot_core::config::{FormatConfig, TEXT_SPLIT_THRESHOLD};
use relaybot_core::types::TurnResult;

use crate::segment::{self, SegmentError};

/// Filename used when a response can only be delivered as an attachment.
pub const FALLBACK_FILENAME: &str = "response.md";

/// Hard ceiling for the raw citations block shown in the panel body.
const CITATIONS_CEILING: usize = 4095;
const CITATIONS_TOO_LONG: &str = "Citations cannot show: too long";

/// Hard ceiling for the raw links block shown as a single field.
const LINKS_CEILING: usize = 1023;
const LINKS_TOO_LONG: &str = "Message cannot show: too long.";

/// One renderable unit of a formatted turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPart {
    TextSegment(String),
    SummaryPanel(SummaryPanel),
    QuickReplySet(Vec<String>),
    /// Substitute for all text segments when segmentation cannot satisfy
    /// the length limit without breaking a code block.
    AttachmentFallback { content: Vec<u8>, filename: String },
}

/// Structured summary shown alongside the final message of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryPanel {
    pub title: String,
    pub body: String,
    pub fields: Vec<(String, String)>,
}

/// Format a turn with the standard per-message limit.
pub fn format(turn: &TurnResult, options: &FormatConfig) -> Vec<RenderPart> {
    format_with_limit(turn, options, TEXT_SPLIT_THRESHOLD)
}

/// Format a turn with an explicit per-message limit.
pub fn format_with_limit(
    turn: &TurnResult,
    options: &FormatConfig,
    limit: usize,
) -> Vec<RenderPart> {
    let mut parts = text_parts(&turn.message_text, limit);

    if let Some(panel) = summary_panel(turn, options) {
        parts.push(RenderPart::SummaryPanel(panel));
    }

    if !turn.quick_replies.is_empty() {
        parts.push(RenderPart::QuickReplySet(turn.quick_replies.clone()));
    }

    parts
}

fn text_parts(text: &str, limit: usize) -> Vec<RenderPart> {
    if text.len() <= limit {
        return vec![RenderPart::TextSegment(text.to_string())];
    }

    match segment::split(text, limit) {
        Ok(segments) => segments.into_iter().map(RenderPart::TextSegment).collect(),
        Err(SegmentError::NoValidBreakPoint) => vec![RenderPart::AttachmentFallback {
            content: text.as_bytes().to_vec(),
            filename: FALLBACK_FILENAME.to_string(),
        }],
    }
}

/// Build the summary panel, or nothing when no enabled section contributes.
fn summary_panel(turn: &TurnResult, options: &FormatConfig) -> Option<SummaryPanel> {
    let mut panel = SummaryPanel::default();
    let mut has_value = false;

    if options.show_citations {
        if let Some(citations) = turn.citations_block.as_deref() {
            if !citations.is_empty() {
                has_value = true;
                add_citations(citations, &mut panel);
            }
        }
    }

    if options.show_links {
        if let Some(links) = turn.links_block.as_deref() {
            if !links.is_empty() {
                has_value = true;
                add_links(links, &mut panel);
            }
        }
    }

    if options.show_limits {
        if let (Some(current), Some(max)) = (turn.current_quota, turn.max_quota) {
            has_value = true;
            panel
                .fields
                .push(("Limit".to_string(), format!("({current}/{max})")));
        }
    }

    has_value.then_some(panel)
}

/// Entries of the form `[n]: url "title"`.
fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\[(\d+)\]: (\S+) "([^"]+)""#).expect("valid citation pattern"))
}

/// Entries of the form `[n. host](url)`.
fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([0-9]+\. \S+)\]\((\S+)\)").expect("valid link pattern"))
}

fn add_citations(citations: &str, panel: &mut SummaryPanel) {
    let mut any = false;
    for caps in citation_re().captures_iter(citations) {
        any = true;
        let (num, url, title) = (&caps[1], &caps[2], &caps[3]);
        panel
            .fields
            .push((format!("[{num}]"), format!("[{title}]({url})")));
    }

    if any {
        panel.title = "Citations".to_string();
    } else {
        // Unparseable block: show it verbatim, within the ceiling.
        panel.body = if citations.len() > CITATIONS_CEILING {
            CITATIONS_TOO_LONG.to_string()
        } else {
            citations.to_string()
        };
    }
}

fn add_links(links: &str, panel: &mut SummaryPanel) {
    let mut any = false;
    for caps in link_re().captures_iter(links) {
        any = true;
        let (host, url) = (&caps[1], &caps[2]);
        panel.fields.push((host.to_string(), format!("[Link]({url})")));
    }

    if !any {
        let value = if links.len() > LINKS_CEILING {
            LINKS_TOO_LONG.to_string()
        } else {
            links.to_string()
        };
        panel.fields.push(("Links".to_string(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(citations: bool, links: bool, limits: bool) -> FormatConfig {
        FormatConfig {
            show_citations: citations,
            show_links: links,
            show_limits: limits,
        }
    }

    fn turn_with(citations: Option<&str>, links: Option<&str>) -> TurnResult {
        TurnResult::success(
            "hello".to_string(),
            Some(4),
            Some(20),
            vec![],
            links.map(String::from),
            citations.map(String::from),
        )
    }

    #[test]
    fn short_text_is_one_segment() {
        let turn = TurnResult::success("hi".into(), None, None, vec![], None, None);
        let parts = format(&turn, &options(true, true, true));
        assert_eq!(parts, vec![RenderPart::TextSegment("hi".to_string())]);
    }

    #[test]
    fn long_text_becomes_ordered_segments() {
        let text = "first paragraph\n\nsecond paragraph\n\nthird paragraph";
        let turn = TurnResult::success(text.into(), None, None, vec![], None, None);
        let parts = format_with_limit(&turn, &options(false, false, false), 20);

        let segments: Vec<&str> = parts
            .iter()
            .map(|p| match p {
                RenderPart::TextSegment(s) => s.as_str(),
                other => panic!("unexpected part: {other:?}"),
            })
            .collect();
        assert_eq!(
            segments,
            vec!["first paragraph", "second paragraph", "third paragraph"]
        );
    }

    #[test]
    fn unsplittable_text_falls_back_to_an_attachment() {
        let text = "```\nthis code block alone exceeds the limit\n```";
        let turn = TurnResult::success(
            text.into(),
            Some(4),
            Some(20),
            vec!["More".to_string()],
            None,
            None,
        );
        let parts = format_with_limit(&turn, &options(false, false, true), 10);

        assert!(matches!(
            &parts[0],
            RenderPart::AttachmentFallback { content, filename }
                if filename == FALLBACK_FILENAME && content == text.as_bytes()
        ));
        assert!(!parts.iter().any(|p| matches!(p, RenderPart::TextSegment(_))));
        // Panel and quick replies still follow the fallback.
        assert!(matches!(&parts[1], RenderPart::SummaryPanel(_)));
        assert!(matches!(&parts[2], RenderPart::QuickReplySet(_)));
    }

    #[test]
    fn panel_includes_limit_and_parsed_citation_fields() {
        let turn = turn_with(Some("[1]: http://a \"Title\""), None);
        let parts = format(&turn, &options(true, false, true));

        let panels: Vec<&SummaryPanel> = parts
            .iter()
            .filter_map(|p| match p {
                RenderPart::SummaryPanel(panel) => Some(panel),
                _ => None,
            })
            .collect();
        assert_eq!(panels.len(), 1);

        let panel = panels[0];
        assert_eq!(panel.title, "Citations");
        assert!(panel
            .fields
            .contains(&("[1]".to_string(), "[Title](http://a)".to_string())));
        assert!(panel
            .fields
            .contains(&("Limit".to_string(), "(4/20)".to_string())));
    }

    #[test]
    fn unparseable_citations_show_verbatim_with_ceiling() {
        let turn = turn_with(Some("not a citation list"), None);
        let parts = format(&turn, &options(true, false, false));
        match &parts[1] {
            RenderPart::SummaryPanel(panel) => {
                assert_eq!(panel.body, "not a citation list");
                assert!(panel.title.is_empty());
            }
            other => panic!("unexpected part: {other:?}"),
        }

        let huge = "x".repeat(CITATIONS_CEILING + 1);
        let turn = turn_with(Some(&huge), None);
        let parts = format(&turn, &options(true, false, false));
        match &parts[1] {
            RenderPart::SummaryPanel(panel) => assert_eq!(panel.body, CITATIONS_TOO_LONG),
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn parsed_links_become_host_fields() {
        let turn = turn_with(None, Some("[1. a.com](http://a) [2. b.org](http://b)"));
        let parts = format(&turn, &options(false, true, false));
        match &parts[1] {
            RenderPart::SummaryPanel(panel) => {
                assert_eq!(
                    panel.fields,
                    vec![
                        ("1. a.com".to_string(), "[Link](http://a)".to_string()),
                        ("2. b.org".to_string(), "[Link](http://b)".to_string()),
                    ]
                );
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn unparseable_links_become_a_single_field_with_ceiling() {
        let huge = "y".repeat(LINKS_CEILING + 1);
        let turn = turn_with(None, Some(&huge));
        let parts = format(&turn, &options(false, true, false));
        match &parts[1] {
            RenderPart::SummaryPanel(panel) => {
                assert_eq!(
                    panel.fields,
                    vec![("Links".to_string(), LINKS_TOO_LONG.to_string())]
                );
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn no_enabled_section_means_no_panel() {
        let turn = turn_with(Some("[1]: http://a \"Title\""), Some("[1. a.com](http://a)"));
        let parts = format(&turn, &options(false, false, false));
        assert_eq!(parts.len(), 1);
        assert!(matches!(&parts[0], RenderPart::TextSegment(_)));
    }

    #[test]
    fn quick_replies_keep_their_order() {
        let turn = TurnResult::success(
            "pick one".into(),
            None,
            None,
            vec!["first".to_string(), "second".to_string()],
            None,
            None,
        );
        let parts = format(&turn, &options(false, false, false));
        assert_eq!(
            parts[1],
            RenderPart::QuickReplySet(vec!["first".to_string(), "second".to_string()])
        );
    }

    #[test]
    fn formatting_is_deterministic() {
        let turn = turn_with(Some("[1]: http://a \"Title\""), Some("[1. a.com](http://a)"));
        let opts = options(true, true, true);
        assert_eq!(format(&turn, &opts), format(&turn, &opts));
    }
}
