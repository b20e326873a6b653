//! WebSocket endpoint
//!
//! One task per client. The task registers a connection, subscribes it to the
//! channel named by the request path, then forwards queued notifications to
//! the socket until the client goes away. Inbound messages are ignored apart
//! from close; pings are answered by the WebSocket layer. A write that does not
//! complete within one ping interval ends the session.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};

use super::error::ApiResult;
use super::routes::scoped_channel;
use super::state::AppState;
use crate::registry::{ChannelName, Registry};

/// Upgrade handler for `GET /ws/{project_id}/{collection}`
pub async fn websocket_handler(
    State(state): State<AppState>,
    Path((project_id, collection)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let channel = scoped_channel(&project_id, &collection)?;
    let permit = state.try_admit().inspect_err(|_| {
        tracing::warn!(
            project_id = %project_id,
            collection = %collection,
            "Connection rejected: limit reached"
        );
    })?;

    let ping_interval = state.config.ping_interval;

    Ok(ws
        .max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket: WebSocket| async move {
            let _permit = permit;
            let (sink, stream) = socket.split();
            run_session(sink, stream, state.registry, channel, ping_interval).await;
        })
        .into_response())
}

/// Drive one client session until the client leaves or the transport fails
///
/// The connection is always removed from the registry before returning.
pub(crate) async fn run_session<W, R, E>(
    mut sink: W,
    mut stream: R,
    registry: Arc<Registry>,
    channel: ChannelName,
    ping_interval: Duration,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut connection = registry.connect().await;
    let id = connection.id();

    if let Err(e) = registry.subscribe(id, channel.clone()).await {
        tracing::warn!(connection_id = %id, channel = %channel, error = %e, "Subscribe failed");
        registry.disconnect(id).await;
        return;
    }

    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            notification = connection.recv() => {
                let Some(notification) = notification else {
                    break "removed from registry";
                };
                let text = match Utf8Bytes::try_from(notification.payload.clone()) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(
                            connection_id = %id,
                            error = %e,
                            "Skipping non UTF-8 payload"
                        );
                        continue;
                    }
                };
                let frame = Message::Text(text);
                if let Err(reason) = send_frame(&mut sink, frame, ping_interval).await {
                    tracing::warn!(connection_id = %id, reason = reason, "WebSocket send failed");
                    break reason;
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break "closed by client",
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %id, error = %e, "WebSocket receive error");
                    break "receive error";
                }
            },
            _ = ping.tick() => {
                let frame = Message::Ping(Bytes::new());
                if let Err(reason) = send_frame(&mut sink, frame, ping_interval).await {
                    tracing::debug!(connection_id = %id, reason = reason, "Keep-alive ping failed");
                    break reason;
                }
            }
        }
    };

    registry.disconnect(id).await;
    let _ = tokio::time::timeout(ping_interval, sink.close()).await;

    tracing::info!(
        connection_id = %id,
        channel = %channel,
        reason = reason,
        "WebSocket session ended"
    );
}

/// Write one frame, giving up after `limit`
async fn send_frame<W>(sink: &mut W, frame: Message, limit: Duration) -> Result<(), &'static str>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match tokio::time::timeout(limit, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Sink error");
            Err("send failed")
        }
        Err(_) => Err("send timed out"),
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;
    use serde_json::json;

    use super::*;
    use crate::registry::Event;

    type Inbound = mpsc::UnboundedSender<Result<Message, String>>;
    type Outbound = mpsc::UnboundedReceiver<Message>;

    async fn start(
        registry: &Arc<Registry>,
        channel: &ChannelName,
        ping_interval: Duration,
    ) -> (Inbound, Outbound, tokio::task::JoinHandle<()>) {
        let (out_tx, out_rx) = mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded::<Result<Message, String>>();

        let task = tokio::spawn(run_session(
            out_tx,
            in_rx,
            Arc::clone(registry),
            channel.clone(),
            ping_interval,
        ));

        while registry.subscribers(channel).await.is_empty() {
            tokio::task::yield_now().await;
        }

        (in_tx, out_rx, task)
    }

    #[tokio::test]
    async fn test_session_forwards_events_as_text() {
        let registry = Arc::new(Registry::new());
        let channel = ChannelName::scoped("proj", "notes");
        let (in_tx, mut out_rx, task) = start(&registry, &channel, Duration::from_secs(30)).await;

        registry
            .publish(channel.clone(), Event::create(json!({"id": "1", "text": "hi"})))
            .await;

        match out_rx.next().await {
            Some(Message::Text(text)) => {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(
                    value,
                    json!({"action": "create", "document": {"id": "1", "text": "hi"}})
                );
            }
            other => panic!("expected text frame, got {:?}", other),
        }

        // Client chatter is ignored, close ends the session
        in_tx.unbounded_send(Ok(Message::Text("hello".into()))).unwrap();
        in_tx.unbounded_send(Ok(Message::Close(None))).unwrap();
        task.await.unwrap();

        assert_eq!(registry.connection_count().await, 0);
        assert!(registry.subscribers(&channel).await.is_empty());
    }

    #[tokio::test]
    async fn test_session_ends_on_stream_end() {
        let registry = Arc::new(Registry::new());
        let channel = ChannelName::new("notes");
        let (in_tx, _out_rx, task) = start(&registry, &channel, Duration::from_secs(30)).await;

        drop(in_tx);
        task.await.unwrap();

        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_session_ends_on_receive_error() {
        let registry = Arc::new(Registry::new());
        let channel = ChannelName::new("notes");
        let (in_tx, _out_rx, task) = start(&registry, &channel, Duration::from_secs(30)).await;

        in_tx.unbounded_send(Err("connection reset".to_string())).unwrap();
        task.await.unwrap();

        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_send_failure_disconnects() {
        let registry = Arc::new(Registry::new());
        let channel = ChannelName::new("notes");
        let (_in_tx, out_rx, task) = start(&registry, &channel, Duration::from_secs(30)).await;

        // Socket writes now fail
        drop(out_rx);
        registry.publish(channel.clone(), Event::delete("1")).await;
        task.await.unwrap();

        assert!(registry.subscribers(&channel).await.is_empty());
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_session_sends_keepalive_pings() {
        let registry = Arc::new(Registry::new());
        let channel = ChannelName::new("notes");
        let (in_tx, mut out_rx, task) =
            start(&registry, &channel, Duration::from_millis(20)).await;

        assert!(matches!(out_rx.next().await, Some(Message::Ping(_))));

        drop(in_tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stalled_socket_times_out() {
        let registry = Arc::new(Registry::new());
        let channel = ChannelName::new("notes");
        // Room for a single frame, and nobody reads it
        let (out_tx, _out_rx) = mpsc::channel::<Message>(0);
        let (_in_tx, in_rx) = mpsc::unbounded::<Result<Message, String>>();

        let task = tokio::spawn(run_session(
            out_tx,
            in_rx,
            Arc::clone(&registry),
            channel.clone(),
            Duration::from_millis(50),
        ));

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("session should end once a write stalls")
            .unwrap();
        assert_eq!(registry.connection_count().await, 0);
        assert!(registry.subscribers(&channel).await.is_empty());
    }

    #[tokio::test]
    async fn test_registry_disconnect_ends_session() {
        let registry = Arc::new(Registry::new());
        let channel = ChannelName::new("notes");
        let (_in_tx, _out_rx, task) = start(&registry, &channel, Duration::from_secs(30)).await;

        let id = registry.subscribers(&channel).await[0];
        registry.disconnect(id).await;

        task.await.unwrap();
    }
}
