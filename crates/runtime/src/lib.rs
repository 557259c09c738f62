//! Godel runtime: browser process lifecycle, transport and CDP correlation.
//!
//! - **Launcher**: locating a Chromium build, starting it with remote
//!   debugging enabled and reading its DevTools endpoint
//! - **Transport**: WebSocket framing split into sender and receiver halves
//! - **Connection**: request/response correlation by id, per-request
//!   timeouts, and event subscriptions filtered by session and method
//!
//! ```text
//! ┌──────────────┐
//! │   godel-rs   │  Browser / BrowserContext / Page
//! └──────┬───────┘
//!        │ send(method, params, session)
//! ┌──────▼───────┐
//! │ godel-runtime│  This crate
//! │  ┌────────┐  │
//! │  │ Conn   │  │  id correlation, subscriptions
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │Launcher│  │  Chromium process
//! │  └────────┘  │
//! └──────────────┘
//! ```

pub mod connection;
pub mod error;
pub mod launcher;
pub mod transport;

pub use connection::{Connection, EventFilter, Subscription};
pub use error::{Error, Result};
pub use launcher::{BrowserProcess, discover_ws_endpoint, find_browser_executable};
pub use transport::{
	Transport, TransportParts, TransportReceiver, WebSocketTransport, WebSocketTransportReceiver,
	WebSocketTransportSender,
};
