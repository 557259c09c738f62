use futures_util::{SinkExt, StreamExt};
use tokio::io::duplex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::Role;

use super::*;

async fn socket_pair() -> (
	TransportParts,
	WebSocketStream<tokio::io::DuplexStream>,
) {
	let (client_io, server_io) = duplex(1024 * 1024);
	let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
	let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
	(WebSocketTransport::from_stream(client), server)
}

#[tokio::test]
async fn test_send_message() {
	let (parts, mut server) = socket_pair().await;
	let TransportParts { mut sender, .. } = parts;

	let message = serde_json::json!({"id": 1, "method": "Target.getTargets", "params": {}});
	sender.send(message.clone()).await.unwrap();

	let frame = server.next().await.unwrap().unwrap();
	let received: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
	assert_eq!(received, message);
}

#[tokio::test]
async fn test_multiple_messages_in_sequence() {
	let (parts, mut server) = socket_pair().await;
	let TransportParts {
		receiver,
		mut message_rx,
		..
	} = parts;
	let read_task = tokio::spawn(receiver.run());

	let messages = vec![
		serde_json::json!({"id": 1, "result": {}}),
		serde_json::json!({"method": "Page.loadEventFired", "params": {"timestamp": 1.0}}),
		serde_json::json!({"id": 2, "result": {"targetId": "T"}}),
	];
	for msg in &messages {
		server
			.send(WsMessage::Text(msg.to_string().into()))
			.await
			.unwrap();
	}

	for expected in &messages {
		let received = message_rx.recv().await.unwrap();
		assert_eq!(&received, expected);
	}

	server.close(None).await.unwrap();
	assert!(read_task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_large_message() {
	let (parts, mut server) = socket_pair().await;
	let TransportParts {
		receiver,
		mut message_rx,
		..
	} = parts;
	let read_task = tokio::spawn(receiver.run());

	let large = serde_json::json!({"id": 1, "result": {"value": "x".repeat(200_000)}});
	server
		.send(WsMessage::Text(large.to_string().into()))
		.await
		.unwrap();

	assert_eq!(message_rx.recv().await.unwrap(), large);

	drop(server);
	let _ = read_task.await;
}

#[tokio::test]
async fn test_undecodable_frame_is_skipped() {
	let (parts, mut server) = socket_pair().await;
	let TransportParts {
		receiver,
		mut message_rx,
		..
	} = parts;
	let read_task = tokio::spawn(receiver.run());

	server
		.send(WsMessage::Text("not json".to_string().into()))
		.await
		.unwrap();
	server
		.send(WsMessage::Text(r#"{"id":5,"result":{}}"#.to_string().into()))
		.await
		.unwrap();

	let received = message_rx.recv().await.unwrap();
	assert_eq!(received["id"], 5);

	server.close(None).await.unwrap();
	let _ = read_task.await;
}

#[tokio::test]
async fn test_receiver_stops_when_listener_dropped() {
	let (parts, mut server) = socket_pair().await;
	let TransportParts {
		receiver,
		message_rx,
		..
	} = parts;
	drop(message_rx);
	let read_task = tokio::spawn(receiver.run());

	server
		.send(WsMessage::Text(r#"{"id":1,"result":{}}"#.to_string().into()))
		.await
		.unwrap();

	assert!(read_task.await.unwrap().is_ok());
}
