//! Remote live-session boundary: wire protocol, traits, websocket client.

pub mod client;
pub mod protocol;
pub mod session;

pub use client::GeminiLiveConnector;
pub use session::{
    LiveConnector, LiveSession, MockLiveConnector, MockLiveHandle, ServiceEvent, SessionSetup,
};
