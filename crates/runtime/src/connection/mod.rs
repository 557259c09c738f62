//! CDP connection layer.
//!
//! Implements request/response correlation on top of the transport:
//! - Generating sequential request ids
//! - Correlating responses with pending requests (per-request timeout)
//! - Routing events to subscribers filtered by session id and method prefix
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send`] with method, params and session
//! 2. Connection allocates an id and a oneshot channel
//! 3. Request is queued for the writer task
//! 4. Dispatch loop receives the response and completes the oneshot
//! 5. Events are cloned to every subscription whose filter matches


use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::DashMap;
use godel_protocol::{DEFAULT_TIMEOUT_MS, ErrorPayload, Event, Message, Request};
use serde_json::Value;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Pending request callbacks keyed by request id.
type CallbackMap = Arc<TokioMutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

type SubscriberMap = Arc<DashMap<u64, Subscriber>>;

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
	id: u64,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: u64, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}

		let id = self.id;
		let callbacks = Arc::clone(&self.callbacks);

		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(async move {
				if callbacks.lock().await.remove(&id).is_some() {
					tracing::debug!(id, "CancelGuard: removed orphaned callback");
				}
			});
		}
	}
}

/// Future returned by [`Connection::send`] with automatic cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Which events a [`Subscription`] receives.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
	session_id: Option<String>,
	prefixes: Vec<String>,
}

impl EventFilter {
	/// Every event on the socket.
	pub fn all() -> Self {
		Self::default()
	}

	/// Events emitted by one attached session.
	pub fn session(session_id: impl Into<String>) -> Self {
		Self {
			session_id: Some(session_id.into()),
			prefixes: Vec::new(),
		}
	}

	/// Restricts to methods starting with `prefix` (e.g. `"Network."`).
	/// Multiple prefixes are alternatives.
	pub fn method_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefixes.push(prefix.into());
		self
	}

	pub fn matches(&self, event: &Event) -> bool {
		if let Some(ref session_id) = self.session_id {
			if event.session_id.as_deref() != Some(session_id.as_str()) {
				return false;
			}
		}
		self.prefixes.is_empty() || self.prefixes.iter().any(|p| event.method.starts_with(p))
	}
}

struct Subscriber {
	filter: EventFilter,
	tx: mpsc::UnboundedSender<Event>,
}

/// Stream of events matching an [`EventFilter`]. Unregisters on drop.
pub struct Subscription {
	id: u64,
	rx: mpsc::UnboundedReceiver<Event>,
	subscribers: SubscriberMap,
}

impl Subscription {
	/// Next matching event, or `None` once the connection has closed.
	pub async fn recv(&mut self) -> Option<Event> {
		self.rx.recv().await
	}

	/// Next buffered event without waiting.
	pub fn try_recv(&mut self) -> Option<Event> {
		self.rx.try_recv().ok()
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.subscribers.remove(&self.id);
	}
}

/// CDP connection to a browser endpoint.
///
/// One connection carries the browser target and every flattened page
/// session; commands are routed by their optional `sessionId`.
pub struct Connection {
	/// Sequential request ID counter (atomic for thread safety)
	last_id: AtomicU64,
	/// Pending request callbacks keyed by request ID
	callbacks: CallbackMap,
	/// Channel for sending outbound messages to the writer task
	outbound_tx: mpsc::UnboundedSender<Value>,
	/// Transport sender (taken by run() to start writer task)
	transport_sender: TokioMutex<Option<Box<dyn Transport>>>,
	/// Receiver for incoming messages from transport
	message_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	/// Receiver half of transport (owned by run loop, only needed once)
	transport_receiver: TokioMutex<Option<Box<dyn TransportReceiver>>>,
	/// Receiver for outbound messages (taken by run() to start writer task)
	outbound_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
	subscribers: SubscriberMap,
	next_subscriber: AtomicU64,
	default_timeout: Duration,
	closed: AtomicBool,
}

impl Connection {
	/// Create a new Connection with the given transport
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		Self {
			last_id: AtomicU64::new(1),
			callbacks: Arc::new(TokioMutex::new(HashMap::new())),
			outbound_tx,
			transport_sender: TokioMutex::new(Some(sender)),
			message_rx: TokioMutex::new(Some(message_rx)),
			transport_receiver: TokioMutex::new(Some(receiver)),
			outbound_rx: TokioMutex::new(Some(outbound_rx)),
			subscribers: Arc::new(DashMap::new()),
			next_subscriber: AtomicU64::new(0),
			default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
			closed: AtomicBool::new(false),
		}
	}

	/// Overrides the per-command timeout used by [`Connection::send`].
	pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
		self.default_timeout = timeout;
		self
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Sends a command and awaits its result with the default timeout.
	pub async fn send(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		self.send_with_timeout(method, params, session_id, self.default_timeout)
			.await
	}

	/// Sends a command and awaits its result.
	pub async fn send_with_timeout(
		&self,
		method: &str,
		params: Value,
		session_id: Option<&str>,
		timeout: Duration,
	) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(id, method, session = session_id.unwrap_or("-"), "Sending command");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().await.insert(id, tx);
		let guard = CancelGuard::new(id, Arc::clone(&self.callbacks));

		let request = Request {
			id,
			method: method.to_string(),
			params: if params.is_null() {
				Value::Object(Default::default())
			} else {
				params
			},
			session_id: session_id.map(str::to_string),
		};

		if self.outbound_tx.send(serde_json::to_value(&request)?).is_err() {
			tracing::error!("Failed to queue message: outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		match tokio::time::timeout(timeout, ResponseFuture { rx, guard }).await {
			Ok(result) => result.map_err(|e| match e {
				Error::Remote {
					code, message, data, ..
				} => Error::Remote {
					method: method.to_string(),
					code,
					message,
					data,
				},
				other => other,
			}),
			Err(_) => Err(Error::Timeout(format!(
				"{method} after {}ms",
				timeout.as_millis()
			))),
		}
	}

	/// Registers a new event subscription.
	pub fn subscribe(&self, filter: EventFilter) -> Subscription {
		let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = mpsc::unbounded_channel();
		if !self.is_closed() {
			self.subscribers.insert(id, Subscriber { filter, tx });
		}
		Subscription {
			id,
			rx,
			subscribers: Arc::clone(&self.subscribers),
		}
	}

	/// Run the message dispatch loop until the socket closes.
	///
	/// Afterwards every pending request fails with [`Error::ChannelClosed`]
	/// and every subscription ends.
	pub async fn run(self: &Arc<Self>) -> Result<()> {
		let (Some(transport_receiver), Some(mut transport_sender), Some(mut outbound_rx), Some(mut message_rx)) = (
			self.transport_receiver.lock().await.take(),
			self.transport_sender.lock().await.take(),
			self.outbound_rx.lock().await.take(),
			self.message_rx.lock().await.take(),
		) else {
			return Err(Error::ProtocolError(
				"run() can only be called once".to_string(),
			));
		};

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = transport_receiver.run().await {
				tracing::error!("Transport read error: {}", e);
			}
		});

		let writer_handle = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(e) = transport_sender.send(message).await {
					tracing::error!("Transport write error: {}", e);
					break;
				}
			}
		});

		while let Some(message_value) = message_rx.recv().await {
			match serde_json::from_value::<Message>(message_value) {
				Ok(message) => {
					if let Err(e) = self.dispatch_internal(message).await {
						tracing::debug!("Error dispatching message: {}", e);
					}
				}
				Err(e) => {
					tracing::error!("Failed to parse message: {}", e);
				}
			}
		}

		self.shutdown().await;
		writer_handle.abort();
		let _ = reader_handle.await;
		Ok(())
	}

	async fn shutdown(&self) {
		self.closed.store(true, Ordering::SeqCst);
		let pending: Vec<_> = self.callbacks.lock().await.drain().collect();
		if !pending.is_empty() {
			tracing::debug!(count = pending.len(), "Failing pending requests after close");
		}
		for (_, callback) in pending {
			let _ = callback.send(Err(Error::ChannelClosed));
		}
		self.subscribers.clear();
	}

	/// Dispatch an incoming message (test-only public version)
	#[cfg(test)]
	pub async fn dispatch(&self, message: Message) -> Result<()> {
		self.dispatch_internal(message).await
	}

	async fn dispatch_internal(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let callback = self
					.callbacks
					.lock()
					.await
					.remove(&response.id)
					.ok_or_else(|| {
						Error::ProtocolError(format!(
							"Cannot find request to respond: id={}",
							response.id
						))
					})?;

				let result = match response.error {
					Some(error) => Err(parse_protocol_error(error)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};

				let _ = callback.send(result);
				Ok(())
			}
			Message::Event(event) => {
				self.subscribers.retain(|_, subscriber| {
					if !subscriber.filter.matches(&event) {
						return true;
					}
					subscriber.tx.send(event.clone()).is_ok()
				});
				Ok(())
			}
			Message::Unknown(value) => {
				tracing::debug!(
					"Unknown message type (forward-compatible, ignored): {}",
					value
				);
				Ok(())
			}
		}
	}
}

/// Converts an [`ErrorPayload`] into [`Error::Remote`]; the method name is
/// filled in by the caller that knows it.
fn parse_protocol_error(error: ErrorPayload) -> Error {
	Error::Remote {
		method: String::new(),
		code: error.code,
		message: error.message,
		data: error.data,
	}
}
