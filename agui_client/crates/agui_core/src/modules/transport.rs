use crate::modules::backoff::Backoff;
use crate::modules::config::ClientConfig;
use crate::modules::frames::{decode_frame, encode_frame, FrameEvent, RenderInstruction};
use crate::modules::protocol::ClientFrame;
use crate::modules::view::{ActionSink, SendOutcome};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Everything the adapter reports, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Status {
        state: ConnectionState,
        retry_in: Option<Duration>,
    },
    ConnectionEstablished {
        thread_id: String,
    },
    Render(RenderInstruction),
    Message(String),
    /// The adapter task has stopped; no further events follow.
    Closed,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
}

enum AdapterCommand {
    Send(ClientFrame),
    Close,
}

/// Owns the websocket for one conversation thread.
pub struct TransportAdapter {
    sender: ActionSender,
    task: Option<JoinHandle<()>>,
}

impl TransportAdapter {
    /// Opens `<endpoint>/<thread_id>`. Resolves once: connected, or the first attempt's error.
    pub async fn connect(
        config: ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<AdapterEvent>), TransportError> {
        let url = config.thread_url();
        let socket = open(&url).await?;
        tracing::info!(thread_id = %config.thread_id, %url, "agui connected");

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);

        let _ = event_tx.try_send(AdapterEvent::Status {
            state: ConnectionState::Connected,
            retry_in: None,
        });

        let sender = ActionSender {
            thread_id: Arc::from(config.thread_id.as_str()),
            commands: cmd_tx,
            state: state_rx,
        };
        let actor = Actor {
            url,
            backoff: Backoff::new(config.reconnect),
            commands: cmd_rx,
            events: event_tx,
            state: state_tx,
        };
        let task = tokio::spawn(actor.run(socket));

        Ok((
            Self {
                sender,
                task: Some(task),
            },
            event_rx,
        ))
    }

    pub fn thread_id(&self) -> &str {
        &self.sender.thread_id
    }

    pub fn state(&self) -> ConnectionState {
        self.sender.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.sender.state.clone()
    }

    pub fn actions(&self) -> ActionSender {
        self.sender.clone()
    }

    /// The adapter as the callback renderers bind their actions to.
    pub fn sink(&self) -> Arc<dyn ActionSink> {
        Arc::new(self.sender.clone())
    }

    pub fn send_user_action(&self, action: &str, extra: Map<String, Value>) -> SendOutcome {
        self.sender.send_user_action(action, extra)
    }

    pub fn send_user_message(&self, content: &str) -> SendOutcome {
        self.sender.send_user_message(content)
    }

    /// Closes the socket (or cancels a pending reconnect) and waits for the task to finish.
    pub async fn close(mut self) {
        let _ = self.sender.commands.send(AdapterCommand::Close).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TransportAdapter {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Cloneable handle for sending user-originated frames through an adapter.
#[derive(Clone)]
pub struct ActionSender {
    thread_id: Arc<str>,
    commands: mpsc::Sender<AdapterCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ActionSender {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn send_user_message(&self, content: &str) -> SendOutcome {
        self.enqueue(ClientFrame::user_message(content, &*self.thread_id))
    }

    fn enqueue(&self, frame: ClientFrame) -> SendOutcome {
        if self.state() != ConnectionState::Connected {
            tracing::debug!(thread_id = %self.thread_id, "not connected; dropping outbound frame");
            return SendOutcome::NotConnected;
        }
        match self.commands.try_send(AdapterCommand::Send(frame)) {
            Ok(()) => SendOutcome::Sent,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(thread_id = %self.thread_id, "outbound queue full; dropping frame");
                SendOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(thread_id = %self.thread_id, "adapter stopped; dropping frame");
                SendOutcome::NotConnected
            }
        }
    }
}

impl ActionSink for ActionSender {
    fn send_user_action(&self, action: &str, data: Map<String, Value>) -> SendOutcome {
        self.enqueue(ClientFrame::user_action(action, &*self.thread_id, data))
    }
}

/// Decodes one inbound text frame. Malformed frames are logged and dropped.
pub fn on_frame(raw: &str) -> Option<AdapterEvent> {
    match decode_frame(raw) {
        Ok(FrameEvent::Render(instruction)) => Some(AdapterEvent::Render(instruction)),
        Ok(FrameEvent::Message(content)) => Some(AdapterEvent::Message(content)),
        Ok(FrameEvent::ConnectionEstablished { thread_id }) => {
            tracing::info!(%thread_id, "agent confirmed connection");
            Some(AdapterEvent::ConnectionEstablished { thread_id })
        }
        Ok(FrameEvent::Ignored) => {
            tracing::trace!("ignoring frame of unhandled type");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping inbound frame");
            None
        }
    }
}

async fn open(url: &Url) -> Result<WsStream, TransportError> {
    tokio_tungstenite::connect_async(url.as_str())
        .await
        .map(|(socket, _)| socket)
        .map_err(|source| TransportError::Connect {
            url: url.to_string(),
            source,
        })
}

enum Exit {
    /// Close requested, or nobody is listening any more.
    Stopped,
    /// Socket failed or the peer closed it.
    Lost,
}

enum Reconnect {
    Connected(WsStream),
    Failed,
    Cancelled,
}

struct Actor {
    url: Url,
    backoff: Backoff,
    commands: mpsc::Receiver<AdapterCommand>,
    events: mpsc::Sender<AdapterEvent>,
    state: watch::Sender<ConnectionState>,
}

impl Actor {
    async fn run(mut self, socket: WsStream) {
        let mut socket = Some(socket);
        loop {
            if let Some(ws) = socket.take() {
                let exit = self.pump(ws).await;
                self.state.send_replace(ConnectionState::Disconnected);
                if matches!(exit, Exit::Stopped) {
                    break;
                }
            }

            let Some(delay) = self.backoff.next_delay() else {
                tracing::info!(url = %self.url, "reconnect policy exhausted");
                break;
            };
            let retrying = AdapterEvent::Status {
                state: ConnectionState::Disconnected,
                retry_in: Some(delay),
            };
            if !self.emit(retrying).await {
                break;
            }

            match self.reconnect(delay).await {
                Reconnect::Connected(mut ws) => {
                    tracing::info!(url = %self.url, "agui reconnected");
                    self.backoff.reset();
                    let connected = AdapterEvent::Status {
                        state: ConnectionState::Connected,
                        retry_in: None,
                    };
                    if !self.emit(connected).await {
                        let _ = ws.close(None).await;
                        break;
                    }
                    self.state.send_replace(ConnectionState::Connected);
                    socket = Some(ws);
                }
                Reconnect::Failed => {}
                Reconnect::Cancelled => break,
            }
        }
        self.finish();
    }

    async fn pump(&mut self, ws: WsStream) -> Exit {
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    if let Some(exit) = apply_command(&mut write, cmd).await {
                        return exit;
                    }
                }
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Some(event) = on_frame(text.as_str()) else { continue };
                        // A slow consumer must not hold up sends or close.
                        let permit = loop {
                            tokio::select! {
                                permit = self.events.reserve() => match permit {
                                    Ok(permit) => break permit,
                                    Err(_) => {
                                        tracing::debug!("event receiver dropped; stopping adapter");
                                        return Exit::Stopped;
                                    }
                                },
                                cmd = self.commands.recv() => {
                                    if let Some(exit) = apply_command(&mut write, cmd).await {
                                        return exit;
                                    }
                                }
                            }
                        };
                        permit.send(event);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "agent closed the connection");
                        return Exit::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket read failed");
                        return Exit::Lost;
                    }
                    None => return Exit::Lost,
                },
            }
        }
    }

    /// Sleeps, then tries once. A close request cancels either step.
    async fn reconnect(&mut self, delay: Duration) -> Reconnect {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = self.commands.recv() => {
                    if !drop_while_disconnected(cmd) {
                        return Reconnect::Cancelled;
                    }
                }
            }
        }

        let attempt = open(&self.url);
        tokio::pin!(attempt);
        loop {
            tokio::select! {
                res = &mut attempt => {
                    return match res {
                        Ok(ws) => Reconnect::Connected(ws),
                        Err(e) => {
                            tracing::warn!(error = %e, attempt = self.backoff.attempts(), "reconnect failed");
                            Reconnect::Failed
                        }
                    };
                }
                cmd = self.commands.recv() => {
                    if !drop_while_disconnected(cmd) {
                        return Reconnect::Cancelled;
                    }
                }
            }
        }
    }

    /// Delivers an event while no socket is pumped. False when the adapter should stop.
    async fn emit(&mut self, event: AdapterEvent) -> bool {
        loop {
            tokio::select! {
                permit = self.events.reserve() => {
                    return match permit {
                        Ok(permit) => {
                            permit.send(event);
                            true
                        }
                        Err(_) => false,
                    };
                }
                cmd = self.commands.recv() => {
                    if !drop_while_disconnected(cmd) {
                        return false;
                    }
                }
            }
        }
    }

    /// Last status and `Closed`. Never waits on the consumer; the channel closes either way.
    fn finish(&self) {
        let state = *self.state.borrow();
        if self
            .events
            .try_send(AdapterEvent::Status {
                state,
                retry_in: None,
            })
            .is_err()
            || self.events.try_send(AdapterEvent::Closed).is_err()
        {
            tracing::debug!("event queue full; final events dropped");
        }
    }
}

/// Writes a queued frame, or closes the socket. Returns how the pump ends, if it does.
async fn apply_command(
    write: &mut SplitSink<WsStream, Message>,
    cmd: Option<AdapterCommand>,
) -> Option<Exit> {
    match cmd {
        Some(AdapterCommand::Send(frame)) => {
            let payload = match encode_frame(&frame) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping outbound frame");
                    return None;
                }
            };
            if let Err(e) = write.send(Message::Text(payload.into())).await {
                tracing::warn!(error = %e, "websocket send failed");
                return Some(Exit::Lost);
            }
            None
        }
        Some(AdapterCommand::Close) | None => {
            let _ = write.send(Message::Close(None)).await;
            let _ = write.close().await;
            Some(Exit::Stopped)
        }
    }
}

/// Returns false when the command means the adapter should stop.
fn drop_while_disconnected(cmd: Option<AdapterCommand>) -> bool {
    match cmd {
        Some(AdapterCommand::Send(_)) => {
            tracing::debug!("not connected; dropping outbound frame");
            true
        }
        Some(AdapterCommand::Close) | None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_ui_component_yields_one_render_event() {
        let event = on_frame(
            r#"{"type":"ui_component","data":{"name":"quote_approval_card","props":{"vendor":"Acme","total_amount":300}}}"#,
        );
        assert_eq!(
            event,
            Some(AdapterEvent::Render(RenderInstruction {
                component_name: "quote_approval_card".to_string(),
                props: json!({"vendor": "Acme", "total_amount": 300}),
            }))
        );
    }

    #[test]
    fn malformed_and_unknown_frames_yield_nothing() {
        assert_eq!(on_frame("{invalid"), None);
        assert_eq!(on_frame("[]"), None);
        assert_eq!(on_frame(r#"{"type":"heartbeat"}"#), None);
        assert_eq!(on_frame(r#"{"type":"ui_component","data":{"name":[]}}"#), None);
    }

    #[test]
    fn message_frame_yields_text() {
        assert_eq!(
            on_frame(r#"{"type":"message","data":{"content":"Quotes are in."}}"#),
            Some(AdapterEvent::Message("Quotes are in.".to_string()))
        );
    }

    #[tokio::test]
    async fn sender_drops_frames_while_disconnected() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(4);
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let sender = ActionSender {
            thread_id: Arc::from("t-1"),
            commands: cmd_tx,
            state: state_rx,
        };

        assert_eq!(
            sender.send_user_action("approve_quote", Map::new()),
            SendOutcome::NotConnected
        );
        assert_eq!(sender.send_user_message("hi"), SendOutcome::NotConnected);
        assert!(cmd_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sender_stamps_thread_id_when_connected() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(1);
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let sender = ActionSender {
            thread_id: Arc::from("t-1"),
            commands: cmd_tx,
            state: state_rx,
        };

        assert_eq!(sender.send_user_action("approve_quote", Map::new()), SendOutcome::Sent);
        assert_eq!(sender.send_user_message("again"), SendOutcome::Dropped);

        match cmd_rx.try_recv() {
            Ok(AdapterCommand::Send(frame)) => assert_eq!(frame.thread_id(), "t-1"),
            _ => panic!("expected one queued frame"),
        }
        assert!(cmd_rx.try_recv().is_err());
    }
}
