use std::collections::VecDeque;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::packet::{self, EnginePacket, OpenHandshake, SocketPacket};
use super::EventSink;
use crate::config::ChannelConfig;
use crate::error::{ChannelError, PacketError};
use crate::event::{AppEvent, ClientEvent, ServerEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to the realtime channel task. Emits are queued and flushed whenever
/// a session is up, so nothing sent while disconnected is lost.
pub struct SocketClient {
    outbound: UnboundedSender<String>,
}

impl SocketClient {
    pub fn spawn(
        runtime: &Handle,
        server_url: &str,
        config: ChannelConfig,
        sink: EventSink,
    ) -> Result<Self, ChannelError> {
        let url = channel_url(server_url)?;
        let (outbound, rx) = mpsc::unbounded_channel();
        runtime.spawn(run(url, config, sink, rx));
        Ok(Self { outbound })
    }

    pub fn emit(&self, event: &ClientEvent) {
        debug!(event = event.name(), "queueing channel emit");
        if self.outbound.send(packet::encode_event(event)).is_err() {
            warn!(event = event.name(), "channel task stopped; emit dropped");
        }
    }
}

/// Maps the HTTP server URL onto its Socket.IO websocket endpoint.
pub fn channel_url(server_url: &str) -> Result<Url, ChannelError> {
    let mut url = Url::parse(server_url).map_err(|err| ChannelError::Url(err.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ChannelError::Url(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| ChannelError::Url(format!("cannot use scheme {scheme} for {server_url}")))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

enum SessionEnd {
    Dropped(String),
    ClientClosed,
}

/// Attempt bookkeeping for the reconnect loop.
#[derive(Debug, Default)]
struct Reconnect {
    attempt: u32,
}

#[derive(Debug, PartialEq, Eq)]
enum NextStep {
    Connect,
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

impl Reconnect {
    fn next_step(&self, config: &ChannelConfig) -> NextStep {
        match self.attempt {
            0 => NextStep::Connect,
            attempt if attempt > config.reconnection_attempts => NextStep::GiveUp,
            attempt => NextStep::Retry {
                attempt,
                delay: config.reconnect_delay(attempt),
            },
        }
    }

    fn connect_failed(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Returns the attempt count when this connect ends a reconnect cycle.
    fn connected(&mut self) -> Option<u32> {
        let attempts = std::mem::take(&mut self.attempt);
        (attempts > 0).then_some(attempts)
    }

    fn dropped(&mut self) {
        self.attempt = 1;
    }
}

async fn run(
    url: Url,
    config: ChannelConfig,
    sink: EventSink,
    mut outbound: UnboundedReceiver<String>,
) {
    let mut backlog = VecDeque::new();
    let mut reconnect = Reconnect::default();

    loop {
        match reconnect.next_step(&config) {
            NextStep::Connect => {}
            NextStep::GiveUp => {
                warn!(attempts = config.reconnection_attempts, "giving up on channel");
                sink.send(AppEvent::Server(ServerEvent::ReconnectFailed));
                return;
            }
            NextStep::Retry { attempt, delay } => {
                sleep(delay).await;
                info!(attempt, "reconnecting channel");
                sink.send(AppEvent::Server(ServerEvent::ReconnectAttempt { attempt }));
            }
        }

        let connect_timeout = config.connect_timeout_ms;
        let session = timeout(Duration::from_millis(connect_timeout), handshake(&url))
            .await
            .unwrap_or(Err(ChannelError::Timeout(connect_timeout)));

        let (stream, open) = match session {
            Ok(session) => session,
            Err(err) => {
                warn!(%err, %url, "channel connect failed");
                sink.send(AppEvent::Server(ServerEvent::ConnectError {
                    message: err.to_string(),
                }));
                reconnect.connect_failed();
                continue;
            }
        };

        info!(sid = %open.sid, "channel connected");
        sink.send(AppEvent::Server(ServerEvent::Connected));
        if let Some(attempts) = reconnect.connected() {
            sink.send(AppEvent::Server(ServerEvent::Reconnected { attempts }));
        }

        match serve(stream, &open, &sink, &mut outbound, &mut backlog).await {
            SessionEnd::Dropped(reason) => {
                info!(%reason, "channel disconnected");
                sink.send(AppEvent::Server(ServerEvent::Disconnected { reason }));
                reconnect.dropped();
            }
            SessionEnd::ClientClosed => {
                debug!("channel client dropped; stopping");
                return;
            }
        }
    }
}

async fn handshake(url: &Url) -> Result<(WsStream, OpenHandshake), ChannelError> {
    let (mut stream, _response) = connect_async(url.as_str()).await?;

    let open = match next_packet(&mut stream).await? {
        EnginePacket::Open(open) => open,
        other => {
            return Err(ChannelError::Handshake(format!(
                "expected open packet, got {other:?}"
            )));
        }
    };

    stream.send(text_frame(packet::CONNECT)).await?;
    loop {
        match next_packet(&mut stream).await? {
            EnginePacket::Message(SocketPacket::Connect(_)) => break,
            EnginePacket::Message(SocketPacket::ConnectError(payload)) => {
                return Err(ChannelError::Rejected(packet::connect_error_message(&payload)));
            }
            EnginePacket::Ping => stream.send(text_frame(packet::PONG)).await?,
            EnginePacket::Close => {
                return Err(ChannelError::Handshake("closed during handshake".to_string()));
            }
            other => debug!(?other, "ignoring packet during handshake"),
        }
    }

    Ok((stream, open))
}

async fn next_packet(stream: &mut WsStream) -> Result<EnginePacket, ChannelError> {
    loop {
        match stream.next().await {
            None | Some(Ok(Message::Close(_))) => {
                return Err(ChannelError::Handshake("connection closed".to_string()));
            }
            Some(Err(err)) => return Err(err.into()),
            Some(Ok(Message::Text(text))) => return Ok(packet::decode(text.as_str())?),
            Some(Ok(_)) => continue,
        }
    }
}

async fn serve(
    stream: WsStream,
    open: &OpenHandshake,
    sink: &EventSink,
    outbound: &mut UnboundedReceiver<String>,
    backlog: &mut VecDeque<String>,
) -> SessionEnd {
    let (mut writer, mut reader) = stream.split();
    let liveness = Duration::from_millis(open.ping_interval + open.ping_timeout);
    let mut deadline = Instant::now() + liveness;

    while let Some(frame) = backlog.pop_front() {
        if let Err(err) = writer.send(text_frame(frame.clone())).await {
            backlog.push_front(frame);
            return SessionEnd::Dropped(format!("transport error: {err}"));
        }
    }

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => {
                return SessionEnd::Dropped("ping timeout".to_string());
            }
            incoming = reader.next() => {
                let message = match incoming {
                    None => return SessionEnd::Dropped("transport close".to_string()),
                    Some(Err(err)) => {
                        return SessionEnd::Dropped(format!("transport error: {err}"));
                    }
                    Some(Ok(message)) => message,
                };
                deadline = Instant::now() + liveness;

                let text = match message {
                    Message::Text(text) => text,
                    Message::Close(_) => return SessionEnd::Dropped("transport close".to_string()),
                    _ => continue,
                };
                match packet::decode(text.as_str()) {
                    Ok(EnginePacket::Ping) => {
                        if let Err(err) = writer.send(text_frame(packet::PONG)).await {
                            return SessionEnd::Dropped(format!("transport error: {err}"));
                        }
                    }
                    Ok(EnginePacket::Close) => {
                        return SessionEnd::Dropped("transport close".to_string());
                    }
                    Ok(EnginePacket::Message(SocketPacket::Disconnect)) => {
                        return SessionEnd::Dropped("io server disconnect".to_string());
                    }
                    Ok(EnginePacket::Message(SocketPacket::Event { name, payload })) => {
                        dispatch(sink, &name, payload);
                    }
                    Ok(other) => debug!(?other, "ignoring channel packet"),
                    Err(PacketError::Binary) => warn!("skipping binary channel packet"),
                    Err(err) => warn!(%err, frame = text.as_str(), "dropping malformed channel packet"),
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return SessionEnd::ClientClosed;
                };
                if let Err(err) = writer.send(text_frame(frame.clone())).await {
                    backlog.push_back(frame);
                    return SessionEnd::Dropped(format!("transport error: {err}"));
                }
            }
        }
    }
}

fn dispatch(sink: &EventSink, name: &str, payload: Value) {
    match ServerEvent::decode(name, payload) {
        Ok(Some(event)) => {
            debug!(event = name, "channel event");
            sink.send(AppEvent::Server(event));
        }
        Ok(None) => debug!(event = name, "ignoring unknown channel event"),
        Err(err) => warn!(event = name, %err, "dropping malformed channel event"),
    }
}

fn text_frame(frame: impl Into<String>) -> Message {
    let frame: String = frame.into();
    Message::Text(frame.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui;
    use serde_json::json;
    use std::sync::mpsc;
    use tokio::net::TcpListener;

    fn channel_config(reconnection_attempts: u32) -> ChannelConfig {
        ChannelConfig {
            reconnection_attempts,
            reconnection_delay_ms: 10,
            reconnection_delay_max_ms: 10,
            connect_timeout_ms: 2_000,
        }
    }

    fn open_frame(ping_ms: u64) -> String {
        format!(
            r#"0{{"sid":"s1","upgrades":[],"pingInterval":{ping_ms},"pingTimeout":{ping_ms},"maxPayload":1000000}}"#
        )
    }

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(_)) => continue,
                other => panic!("expected a text frame, got {other:?}"),
            }
        }
    }

    /// Accepts one client and completes the Engine.IO open and namespace connect.
    async fn accept_session(listener: &TcpListener, ping_ms: u64) -> WebSocketStream<TcpStream> {
        let (tcp, _) = listener.accept().await.expect("client connects");
        let mut ws = tokio_tungstenite::accept_async(tcp)
            .await
            .expect("websocket upgrade");
        ws.send(text_frame(open_frame(ping_ms)))
            .await
            .expect("open frame sent");
        assert_eq!(next_text(&mut ws).await, packet::CONNECT);
        ws.send(text_frame(r#"40{"sid":"n1"}"#))
            .await
            .expect("connect ack sent");
        ws
    }

    async fn wait_for(
        rx: &mpsc::Receiver<AppEvent>,
        seen: &mut Vec<ServerEvent>,
        done: impl Fn(&ServerEvent) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            while let Ok(event) = rx.try_recv() {
                if let AppEvent::Server(event) = event {
                    let finished = done(&event);
                    seen.push(event);
                    if finished {
                        return;
                    }
                }
            }
            assert!(Instant::now() < deadline, "timed out; saw {seen:?}");
            sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn first_connect_is_immediate() {
        let reconnect = Reconnect::default();
        assert_eq!(reconnect.next_step(&channel_config(3)), NextStep::Connect);
    }

    #[test]
    fn failed_connects_count_up_until_attempts_run_out() {
        let config = ChannelConfig {
            reconnection_attempts: 2,
            reconnection_delay_ms: 1000,
            reconnection_delay_max_ms: 5000,
            connect_timeout_ms: 2_000,
        };
        let mut reconnect = Reconnect::default();
        reconnect.connect_failed();
        assert_eq!(
            reconnect.next_step(&config),
            NextStep::Retry {
                attempt: 1,
                delay: Duration::from_millis(1000)
            }
        );
        reconnect.connect_failed();
        assert_eq!(
            reconnect.next_step(&config),
            NextStep::Retry {
                attempt: 2,
                delay: Duration::from_millis(2000)
            }
        );
        reconnect.connect_failed();
        assert_eq!(reconnect.next_step(&config), NextStep::GiveUp);
    }

    #[test]
    fn connect_after_retries_reports_attempts_and_resets() {
        let config = channel_config(5);
        let mut reconnect = Reconnect::default();
        assert_eq!(reconnect.connected(), None);

        reconnect.dropped();
        reconnect.connect_failed();
        assert!(matches!(
            reconnect.next_step(&config),
            NextStep::Retry { attempt: 2, .. }
        ));
        assert_eq!(reconnect.connected(), Some(2));
        assert_eq!(reconnect.next_step(&config), NextStep::Connect);
    }

    #[test]
    fn drop_restarts_counting_at_one() {
        let mut reconnect = Reconnect::default();
        reconnect.connect_failed();
        reconnect.connect_failed();
        assert_eq!(reconnect.connected(), Some(2));
        reconnect.dropped();
        assert!(matches!(
            reconnect.next_step(&channel_config(5)),
            NextStep::Retry { attempt: 1, .. }
        ));
    }

    #[tokio::test]
    async fn queued_emit_flushes_on_connect_and_retries_are_bounded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let server_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let (tx, rx) = mpsc::channel();
        let sink = EventSink::new(tx, egui::Context::default());

        let client = SocketClient::spawn(&Handle::current(), &server_url, channel_config(1), sink)
            .expect("channel task starts");
        let message = ClientEvent::SendMessage {
            message: "hello".to_string(),
        };
        client.emit(&message);

        let mut ws = accept_session(&listener, 5_000).await;
        assert_eq!(next_text(&mut ws).await, packet::encode_event(&message));
        drop(ws);
        drop(listener);

        let mut seen = Vec::new();
        wait_for(&rx, &mut seen, |event| *event == ServerEvent::ReconnectFailed).await;
        assert_eq!(seen.len(), 5, "saw {seen:?}");
        assert_eq!(seen[0], ServerEvent::Connected);
        assert!(matches!(seen[1], ServerEvent::Disconnected { .. }));
        assert_eq!(seen[2], ServerEvent::ReconnectAttempt { attempt: 1 });
        assert!(matches!(seen[3], ServerEvent::ConnectError { .. }));
    }

    #[tokio::test]
    async fn silent_server_times_out_and_reconnect_reports_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let server_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let (tx, rx) = mpsc::channel();
        let sink = EventSink::new(tx, egui::Context::default());

        let client = SocketClient::spawn(&Handle::current(), &server_url, channel_config(3), sink)
            .expect("channel task starts");

        let _silent = accept_session(&listener, 40).await;
        let mut seen = Vec::new();
        wait_for(&rx, &mut seen, |event| {
            matches!(event, ServerEvent::Disconnected { .. })
        })
        .await;
        assert_eq!(
            seen.last(),
            Some(&ServerEvent::Disconnected {
                reason: "ping timeout".to_string()
            })
        );

        let _second = accept_session(&listener, 5_000).await;
        wait_for(&rx, &mut seen, |event| {
            matches!(event, ServerEvent::Reconnected { .. })
        })
        .await;
        assert_eq!(
            seen[seen.len() - 3..],
            [
                ServerEvent::ReconnectAttempt { attempt: 1 },
                ServerEvent::Connected,
                ServerEvent::Reconnected { attempts: 1 },
            ]
        );
        drop(client);
    }

    #[test]
    fn channel_url_follows_server_scheme() {
        let url = channel_url("http://127.0.0.1:5001").expect("http maps");
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:5001/socket.io/?EIO=4&transport=websocket"
        );
        let url = channel_url("https://manus.example.com/app").expect("https maps");
        assert_eq!(
            url.as_str(),
            "wss://manus.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert!(matches!(channel_url("ftp://host"), Err(ChannelError::Url(_))));
        assert!(matches!(channel_url("not a url"), Err(ChannelError::Url(_))));
    }

    #[test]
    fn dispatch_forwards_known_events_only() {
        let (tx, rx) = mpsc::channel();
        let sink = EventSink::new(tx, egui::Context::default());

        dispatch(&sink, "mystery", Value::Null);
        dispatch(&sink, "file_update", json!({"content": 3}));
        dispatch(&sink, "thinking", Value::Null);

        let received: Vec<AppEvent> = rx.try_iter().collect();
        assert_eq!(received.len(), 1);
        assert!(matches!(
            received[0],
            AppEvent::Server(ServerEvent::Thinking)
        ));
    }
}
