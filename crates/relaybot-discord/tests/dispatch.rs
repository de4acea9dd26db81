//! Dispatch loop behavior — the single replay slot and turn pipeline —
//! against a scripted in-memory backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serenity::model::id::{ChannelId, MessageId};

use relaybot_chat::client::{ChatBackend, ChatSession, UpstreamMessage, UpstreamReply};
use relaybot_chat::error::ChatError;
use relaybot_chat::session::SessionController;
use relaybot_core::config::{FormatConfig, IdentityConfig};
use relaybot_core::types::Tone;
use relaybot_discord::dispatch::{DeliveryContext, Dispatcher};
use relaybot_format::RenderPart;

#[derive(Clone)]
struct MockBackend {
    asks: Arc<Mutex<VecDeque<Result<UpstreamReply, ChatError>>>>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            asks: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn script_reply(&self, text: &str) {
        self.asks.lock().unwrap().push_back(Ok(bot_reply(text)));
    }

    fn script_error(&self, err: ChatError) {
        self.asks.lock().unwrap().push_back(Err(err));
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn open(&self, _identity: &IdentityConfig) -> Result<Box<dyn ChatSession>, ChatError> {
        Ok(Box::new(MockSession {
            backend: self.clone(),
        }))
    }
}

struct MockSession {
    backend: MockBackend,
}

#[async_trait]
impl ChatSession for MockSession {
    async fn ask(&mut self, _text: &str, _tone: Tone) -> Result<UpstreamReply, ChatError> {
        self.backend
            .asks
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted ask")
    }

    async fn reset(&mut self) -> Result<(), ChatError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChatError> {
        Ok(())
    }
}

fn bot_reply(text: &str) -> UpstreamReply {
    UpstreamReply {
        result_value: "Success".to_string(),
        result_message: None,
        throttling: None,
        message: Some(UpstreamMessage {
            author: "bot".to_string(),
            text: text.to_string(),
            suggested_replies: Vec::new(),
            card_blocks: Vec::new(),
        }),
    }
}

async fn dispatcher(backend: &MockBackend) -> Dispatcher {
    let controller = SessionController::connect(
        Arc::new(backend.clone()),
        vec![IdentityConfig {
            name: "primary".to_string(),
            token: "token-primary".to_string(),
        }],
        FormatConfig::default(),
        30,
    )
    .await
    .unwrap();
    Dispatcher::new(controller)
}

fn context(channel: u64, message: u64) -> DeliveryContext {
    DeliveryContext {
        channel_id: ChannelId::new(channel),
        reply_to: MessageId::new(message),
    }
}

#[tokio::test]
async fn replay_before_any_turn_reports_absence() {
    let backend = MockBackend::new();
    let dispatcher = dispatcher(&backend).await;

    assert!(dispatcher.replay().await.is_none());
    // Asking again does not conjure one up, and the session is untouched.
    assert!(dispatcher.replay().await.is_none());

    let status = dispatcher.status().await;
    assert_eq!(status.tone, Tone::Balanced);
    assert_eq!(status.identity_index, 1);
}

#[tokio::test]
async fn replay_slot_holds_the_newest_turn() {
    let backend = MockBackend::new();
    backend.script_reply("First answer.");
    backend.script_reply("Second answer.");
    let dispatcher = dispatcher(&backend).await;

    let first = dispatcher.run_turn(context(10, 100), "one").await;
    assert_eq!(
        first,
        vec![RenderPart::TextSegment("First answer.".to_string())]
    );

    let second = dispatcher.run_turn(context(20, 200), "two").await;

    let cached = dispatcher.replay().await.expect("a cached turn");
    assert_eq!(cached.context, context(20, 200));
    assert_eq!(cached.parts, second);
    assert_eq!(
        cached.parts,
        vec![RenderPart::TextSegment("Second answer.".to_string())]
    );
}

#[tokio::test]
async fn replay_does_not_consume_the_slot() {
    let backend = MockBackend::new();
    backend.script_reply("Still here.");
    let dispatcher = dispatcher(&backend).await;

    dispatcher.run_turn(context(10, 100), "hello").await;
    let once = dispatcher.replay().await.expect("a cached turn");
    let twice = dispatcher.replay().await.expect("the same cached turn");
    assert_eq!(once.parts, twice.parts);
    assert_eq!(once.context, twice.context);
}

#[tokio::test]
async fn transport_failure_becomes_a_failure_turn_and_is_cached() {
    let backend = MockBackend::new();
    backend.script_error(ChatError::Api {
        status: 502,
        message: "bad gateway".to_string(),
    });
    let dispatcher = dispatcher(&backend).await;

    let parts = dispatcher.run_turn(context(10, 100), "hello").await;
    assert_eq!(
        parts,
        vec![RenderPart::TextSegment(
            "upstream API error (status 502): bad gateway".to_string()
        )]
    );

    // The failure turn occupies the replay slot like any other.
    let cached = dispatcher.replay().await.expect("a cached turn");
    assert_eq!(cached.parts, parts);
}
