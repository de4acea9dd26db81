pub mod client;
pub mod error;
pub mod http;
pub mod session;

pub use client::{ChatBackend, ChatSession, UpstreamMessage, UpstreamReply};
pub use error::ChatError;
pub use http::HttpChatBackend;
pub use session::{SessionController, SessionStatus};
