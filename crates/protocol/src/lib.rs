//! Wire types for the Chrome DevTools Protocol.
//!
//! Only the domains the terminal automation needs are modelled here:
//! `Target` for isolated browser contexts and flattened page sessions,
//! `Runtime` for script evaluation, `Input` for synthesized keyboard and
//! mouse events, `Network` for traffic capture and `Browser` for download
//! handling.
//!
//! Types in this crate are plain data. Behaviour lives in `godel-runtime`
//! (transport and correlation) and `godel-rs` (the page API).

pub mod browser;
pub mod input;
pub mod message;
pub mod network;
pub mod options;
pub mod runtime;
pub mod target;

pub use browser::*;
pub use input::*;
pub use message::*;
pub use network::*;
pub use options::*;
pub use runtime::*;
pub use target::*;
