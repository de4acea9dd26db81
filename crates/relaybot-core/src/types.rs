use serde::{Deserialize, Serialize};

/// Conversation tone offered by the remote chat service.
///
/// The service cannot change tone mid-conversation; switching always starts
/// a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Creative,
    #[default]
    Balanced,
    Precise,
}

impl Tone {
    /// Wire/display name ("creative", "balanced", "precise").
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Creative => "creative",
            Tone::Balanced => "balanced",
            Tone::Precise => "precise",
        }
    }

    /// Capitalised form for presence lines and command replies.
    pub fn display(&self) -> &'static str {
        match self {
            Tone::Creative => "Creative",
            Tone::Balanced => "Balanced",
            Tone::Precise => "Precise",
        }
    }

    pub fn parse(s: &str) -> Option<Tone> {
        match s.to_ascii_lowercase().as_str() {
            "creative" => Some(Tone::Creative),
            "balanced" => Some(Tone::Balanced),
            "precise" => Some(Tone::Precise),
            _ => None,
        }
    }
}

/// One completed exchange with the remote chat service, parsed into a typed
/// value at the boundary. Immutable after construction; the dispatch loop
/// keeps the most recent one as the single replay slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub success: bool,
    pub message_text: String,
    pub current_quota: Option<u32>,
    pub max_quota: Option<u32>,
    pub quick_replies: Vec<String>,
    pub links_block: Option<String>,
    pub citations_block: Option<String>,
    pub failure_reason: Option<String>,
}

impl TurnResult {
    /// A successful turn. `current`/`max` are the remote throttling counters;
    /// decorative sub-fields default to absent rather than failing the turn.
    pub fn success(
        message_text: String,
        current_quota: Option<u32>,
        max_quota: Option<u32>,
        quick_replies: Vec<String>,
        links_block: Option<String>,
        citations_block: Option<String>,
    ) -> Self {
        Self {
            success: true,
            message_text,
            current_quota,
            max_quota,
            quick_replies,
            links_block,
            citations_block,
            failure_reason: None,
        }
    }

    /// A failed turn where no reset took place (access denial, transport
    /// failure). The reason is shown to the user verbatim. Quota, quick
    /// replies and blocks are absent, never stale.
    pub fn failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            success: false,
            message_text: reason.clone(),
            current_quota: None,
            max_quota: None,
            quick_replies: Vec::new(),
            links_block: None,
            citations_block: None,
            failure_reason: Some(reason),
        }
    }

    /// A failed turn after the conversation was torn down and reopened,
    /// with the upstream reason folded into the user-visible text.
    pub fn failure_after_reset(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            message_text: format!("Error: conversation has been reset. Reason: {reason}"),
            ..Self::failure(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_round_trips_through_parse() {
        for t in [Tone::Creative, Tone::Balanced, Tone::Precise] {
            assert_eq!(Tone::parse(t.as_str()), Some(t));
            assert_eq!(Tone::parse(t.display()), Some(t));
        }
        assert_eq!(Tone::parse("chaotic"), None);
    }

    #[test]
    fn failure_turn_carries_no_stale_fields() {
        let t = TurnResult::failure("Throttled");
        assert!(!t.success);
        assert_eq!(t.failure_reason.as_deref(), Some("Throttled"));
        assert!(t.current_quota.is_none());
        assert!(t.max_quota.is_none());
        assert!(t.quick_replies.is_empty());
        assert!(t.links_block.is_none());
        assert!(t.citations_block.is_none());
    }

    #[test]
    fn failure_text_only_mentions_a_reset_when_one_happened() {
        let denied = TurnResult::failure("Account blocked.");
        assert_eq!(denied.message_text, "Account blocked.");

        let reset = TurnResult::failure_after_reset("Throttled");
        assert_eq!(
            reset.message_text,
            "Error: conversation has been reset. Reason: Throttled"
        );
        assert_eq!(reset.failure_reason.as_deref(), Some("Throttled"));
    }
}
