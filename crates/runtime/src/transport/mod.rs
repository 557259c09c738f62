//! WebSocket transport for the DevTools socket.
//!
//! The transport is split into a sender half, driven by the connection's
//! writer task, and a receiver half that decodes every text frame into JSON
//! and forwards it over an unbounded channel.

#[cfg(test)]
mod tests;

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::{Error, Result};

/// Outbound half of a transport.
pub trait Transport: Send {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Inbound half of a transport; runs until the peer closes.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves plus the channel the receiver feeds.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Chromium sends large `Runtime.evaluate` results and screenshots; lift the
/// default frame ceiling.
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Connects to a `ws://` DevTools endpoint.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		let mut config = WebSocketConfig::default();
		config.max_message_size = Some(MAX_MESSAGE_SIZE);
		config.max_frame_size = Some(MAX_MESSAGE_SIZE);

		let (stream, _) = tokio_tungstenite::connect_async_with_config(url, Some(config), false)
			.await
			.map_err(|e| Error::ConnectionFailed(format!("{url}: {e}")))?;

		tracing::debug!(target = "godel", %url, "DevTools socket connected");
		Ok(Self::from_stream(stream))
	}

	/// Wraps an already-established WebSocket stream.
	pub fn from_stream<S>(stream: WebSocketStream<S>) -> TransportParts
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let (sink, stream) = stream.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		TransportParts {
			sender: Box::new(WebSocketTransportSender { sink }),
			receiver: Box::new(WebSocketTransportReceiver { stream, message_tx }),
			message_rx,
		}
	}
}

pub struct WebSocketTransportSender<S> {
	sink: SplitSink<WebSocketStream<S>, WsMessage>,
}

impl<S> Transport for WebSocketTransportSender<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink
				.send(WsMessage::Text(text.into()))
				.await
				.map_err(|e| Error::TransportError(format!("Failed to write frame: {e}")))
		})
	}
}

pub struct WebSocketTransportReceiver<S> {
	stream: SplitStream<WebSocketStream<S>>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<S> WebSocketTransportReceiver<S> {
	/// Forwards one decoded frame. Returns false once nobody is listening.
	fn forward(&self, raw: &str) -> bool {
		match serde_json::from_str::<Value>(raw) {
			Ok(value) => self.message_tx.send(value).is_ok(),
			Err(e) => {
				tracing::warn!(target = "godel", error = %e, "Dropping undecodable frame");
				true
			}
		}
	}
}

impl<S> TransportReceiver for WebSocketTransportReceiver<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			let mut this = *self;
			while let Some(frame) = this.stream.next().await {
				let frame =
					frame.map_err(|e| Error::TransportError(format!("Failed to read frame: {e}")))?;
				let keep_going = match frame {
					WsMessage::Text(text) => this.forward(&text),
					WsMessage::Binary(bytes) => match std::str::from_utf8(&bytes) {
						Ok(text) => this.forward(text),
						Err(_) => true,
					},
					WsMessage::Close(_) => {
						tracing::debug!(target = "godel", "DevTools socket closed by peer");
						break;
					}
					_ => true,
				};
				if !keep_going {
					break;
				}
			}
			Ok(())
		})
	}
}
