//! Reqwest-backed implementation of the remote-chat boundary.
//!
//! Talks to the relay gateway's JSON API. The response envelope mirrors the
//! remote service's own shape (`item.result` / `item.throttling` /
//! `item.messages`) and is parsed into [`UpstreamReply`] before anything
//! else sees it.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use relaybot_core::config::IdentityConfig;
use relaybot_core::types::Tone;

use crate::client::{ChatBackend, ChatSession, QuotaCounters, UpstreamMessage, UpstreamReply};
use crate::error::{ChatError, Result};

pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn open(&self, identity: &IdentityConfig) -> Result<Box<dyn ChatSession>> {
        let url = format!("{}/sessions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&identity.token)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let opened: OpenedSession = resp
            .json()
            .await
            .map_err(|e| ChatError::MalformedReply(e.to_string()))?;

        debug!(identity = %identity.name, session = %opened.session_id, "opened upstream session");

        Ok(Box::new(HttpChatSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: identity.token.clone(),
            session_id: opened.session_id,
        }))
    }
}

struct HttpChatSession {
    client: reqwest::Client,
    base_url: String,
    token: String,
    session_id: String,
}

#[async_trait]
impl ChatSession for HttpChatSession {
    async fn ask(&mut self, text: &str, tone: Tone) -> Result<UpstreamReply> {
        let url = format!("{}/sessions/{}/ask", self.base_url, self.session_id);
        let body = serde_json::json!({ "text": text, "tone": tone.as_str() });

        debug!(tone = tone.as_str(), "sending upstream ask");

        let resp = self.client.post(&url).bearer_auth(&self.token).json(&body).send().await?;
        let resp = check_status(resp).await?;

        let envelope: AskEnvelope = resp
            .json()
            .await
            .map_err(|e| ChatError::MalformedReply(e.to_string()))?;

        Ok(envelope.into_reply())
    }

    async fn reset(&mut self) -> Result<()> {
        let url = format!("{}/sessions/{}/reset", self.base_url, self.session_id);
        let resp = self.client.post(&url).bearer_auth(&self.token).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let url = format!("{}/sessions/{}", self.base_url, self.session_id);
        let resp = self.client.delete(&url).bearer_auth(&self.token).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

/// Map HTTP status to the error taxonomy. 401/403 mean the identity itself
/// is rejected, which is surfaced to the user verbatim.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %text, "upstream API error");

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let message = if text.is_empty() {
            format!("Access denied by the remote service (status {})", status.as_u16())
        } else {
            text
        };
        return Err(ChatError::AccessDenied(message));
    }

    Err(ChatError::Api {
        status: status.as_u16(),
        message: text,
    })
}

#[derive(Debug, Deserialize)]
struct OpenedSession {
    session_id: String,
}

// Wire structs mirroring the remote envelope. Unknown fields are ignored.

#[derive(Debug, Deserialize)]
struct AskEnvelope {
    item: AskItem,
}

#[derive(Debug, Deserialize)]
struct AskItem {
    result: WireResult,
    throttling: Option<WireThrottling>,
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    value: String,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireThrottling {
    num_user_messages_in_conversation: serde_json::Value,
    max_num_user_messages_in_conversation: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    author: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    suggested_responses: Vec<WireSuggestion>,
    #[serde(default)]
    adaptive_cards: Vec<WireCard>,
}

#[derive(Debug, Deserialize)]
struct WireSuggestion {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireCard {
    #[serde(default)]
    body: Vec<WireCardBlock>,
}

#[derive(Debug, Deserialize)]
struct WireCardBlock {
    #[serde(default)]
    text: String,
}

impl AskEnvelope {
    fn into_reply(self) -> UpstreamReply {
        let throttling = self.item.throttling.map(|t| QuotaCounters {
            current: t.num_user_messages_in_conversation,
            max: t.max_num_user_messages_in_conversation,
        });

        // Only the final message of the exchange matters.
        let message = self.item.messages.into_iter().last().map(|m| UpstreamMessage {
            author: m.author,
            text: m.text,
            suggested_replies: m
                .suggested_responses
                .into_iter()
                .map(|s| s.text)
                .filter(|t| !t.is_empty())
                .collect(),
            card_blocks: m
                .adaptive_cards
                .into_iter()
                .next()
                .map(|c| c.body.into_iter().map(|b| b.text).collect())
                .unwrap_or_default(),
        });

        UpstreamReply {
            result_value: self.item.result.value,
            result_message: self.item.result.message,
            throttling,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_into_typed_reply() {
        let json = r#"{
            "item": {
                "result": { "value": "Success", "message": null },
                "throttling": {
                    "numUserMessagesInConversation": 4,
                    "maxNumUserMessagesInConversation": "20"
                },
                "messages": [
                    { "author": "user", "text": "hi" },
                    {
                        "author": "bot",
                        "text": "hello there",
                        "suggestedResponses": [
                            { "text": "Tell me more" },
                            { "text": "" }
                        ],
                        "adaptiveCards": [
                            { "body": [
                                { "text": "[1]: http://a \"Title\"" },
                                { "text": "[1. a.com](http://a)" }
                            ] }
                        ]
                    }
                ]
            }
        }"#;

        let envelope: AskEnvelope = serde_json::from_str(json).unwrap();
        let reply = envelope.into_reply();

        assert!(reply.is_success());
        let quota = reply.throttling.unwrap().parse().unwrap();
        assert_eq!(quota, (4, 20));

        let msg = reply.message.unwrap();
        assert!(msg.is_bot_authored());
        assert_eq!(msg.text, "hello there");
        assert_eq!(msg.suggested_replies, vec!["Tell me more".to_string()]);
        assert_eq!(msg.citations_block().as_deref(), Some("[1]: http://a \"Title\""));
        assert_eq!(msg.links_block().as_deref(), Some("[1. a.com](http://a)"));
    }

    #[test]
    fn missing_optional_sections_default_to_absent() {
        let json = r#"{
            "item": {
                "result": { "value": "Throttled", "message": "slow down" },
                "messages": []
            }
        }"#;

        let envelope: AskEnvelope = serde_json::from_str(json).unwrap();
        let reply = envelope.into_reply();

        assert!(!reply.is_success());
        assert_eq!(reply.failure_reason(), "slow down");
        assert!(reply.throttling.is_none());
        assert!(reply.message.is_none());
    }
}
