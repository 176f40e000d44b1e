use crate::protocol::{ClientFrame, InboundMsg, OutboundMsg, ServerFrame};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::protocol::Message;

struct ActiveClient {
    ws: tungstenite::WebSocket<TcpStream>,
    thread_id: String,
    socket_addr: SocketAddr,
}

pub struct NetworkThread {
    listen_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkThread {
    pub fn spawn_with_addr(
        addr: &str,
        in_tx: Sender<InboundMsg>,
        out_rx: Receiver<OutboundMsg>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let listen_addr = listener.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);

        let join_handle =
            thread::spawn(move || run_server(listener, in_tx, out_rx, shutdown_for_thread));

        Ok(Self {
            listen_addr,
            shutdown,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut h) = self.join_handle.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_server(
    listener: TcpListener,
    in_tx: Sender<InboundMsg>,
    out_rx: Receiver<OutboundMsg>,
    shutdown: Arc<AtomicBool>,
) {
    let mut active: Option<ActiveClient> = None;

    while !shutdown.load(Ordering::Relaxed) {
        // One conversation at a time: a new client replaces the old one.
        loop {
            match listener.accept() {
                Ok((stream, socket_addr)) => {
                    let Some(client) = accept_client(stream, socket_addr) else {
                        continue;
                    };

                    if let Some(mut prev) = active.take() {
                        let _ = prev.ws.close(None);
                        let _ = prev.ws.flush();
                        let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                    }

                    if in_tx
                        .try_send(InboundMsg::ClientConnected {
                            socket_addr,
                            thread_id: client.thread_id.clone(),
                        })
                        .is_err()
                    {
                        tracing::warn!(%socket_addr, "agent loop busy; refusing client");
                        let mut ws = client.ws;
                        let _ = ws.close(None);
                        let _ = ws.flush();
                        continue;
                    }

                    tracing::info!(%socket_addr, thread_id = %client.thread_id, "client connected");
                    active = Some(client);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "ws accept failed");
                    break;
                }
            }
        }

        // Flush everything the agent queued since the last pass.
        if let Some(client) = active.as_mut() {
            loop {
                let result = match out_rx.try_recv() {
                    Ok(OutboundMsg::Send { frame }) => send_server_frame(&mut client.ws, &frame),
                    Ok(OutboundMsg::Raw { text }) => send_text(&mut client.ws, text),
                    Ok(OutboundMsg::Kick) => Err(()),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                };
                if result.is_err() {
                    tracing::info!(socket_addr = %client.socket_addr, "dropping client");
                    let _ = client.ws.close(None);
                    let _ = client.ws.flush();
                    active = None;
                    let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                    break;
                }
            }
        } else {
            // Nobody to deliver to.
            while let Ok(msg) = out_rx.try_recv() {
                if matches!(msg, OutboundMsg::Send { .. } | OutboundMsg::Raw { .. }) {
                    tracing::debug!("no client connected; discarding outbound frame");
                }
            }
        }

        // One client frame per pass; the short read timeout bounds the wait.
        if let Some(client) = active.as_mut() {
            match client.ws.read() {
                Ok(msg) => {
                    if handle_inbound(&in_tx, client, msg).is_err() {
                        let _ = client.ws.close(None);
                        let _ = client.ws.flush();
                        active = None;
                        let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                    }
                }
                Err(tungstenite::Error::Io(e))
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => {
                    tracing::debug!(error = %e, "client read ended");
                    active = None;
                    let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                }
            }
        } else {
            // Idle until someone connects.
            thread::sleep(Duration::from_millis(25));
        }
    }

    if let Some(mut client) = active {
        let _ = client.ws.close(None);
        let _ = client.ws.flush();
    }
}

fn accept_client(stream: TcpStream, socket_addr: SocketAddr) -> Option<ActiveClient> {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_nodelay(true);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(200)));

    let mut path = String::new();
    let handshake = tungstenite::accept_hdr(stream, |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        Ok::<Response, ErrorResponse>(resp)
    })
    .map_err(|e| e.to_string());

    let ws = match handshake {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(%socket_addr, error = %e, "ws handshake failed");
            return None;
        }
    };
    let _ = ws
        .get_ref()
        .set_read_timeout(Some(Duration::from_millis(30)));

    Some(ActiveClient {
        ws,
        thread_id: thread_id_from_path(&path),
        socket_addr,
    })
}

/// Last non-empty path segment, or a random id when the path has none.
pub fn thread_id_from_path(path: &str) -> String {
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            thread_rng()
                .sample_iter(&Alphanumeric)
                .take(16)
                .map(char::from)
                .collect()
        })
}

fn handle_inbound(
    in_tx: &Sender<InboundMsg>,
    client: &mut ActiveClient,
    msg: Message,
) -> Result<(), ()> {
    let text = match msg {
        Message::Text(s) => s,
        Message::Binary(_) => return Ok(()),
        Message::Ping(payload) => {
            let _ = client.ws.send(Message::Pong(payload));
            return Ok(());
        }
        Message::Pong(_) => return Ok(()),
        Message::Close(_) => return Err(()),
        Message::Frame(_) => return Ok(()),
    };

    let frame: ClientFrame = match serde_json::from_str(&text) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring invalid client frame");
            return Ok(());
        }
    };

    if frame.thread_id() != client.thread_id {
        tracing::warn!(
            expected = %client.thread_id,
            got = %frame.thread_id(),
            "ignoring frame for another thread"
        );
        return Ok(());
    }

    if in_tx.try_send(InboundMsg::Frame { frame }).is_err() {
        tracing::warn!("agent loop busy; dropping client frame");
    }

    Ok(())
}

fn send_server_frame(
    ws: &mut tungstenite::WebSocket<TcpStream>,
    frame: &ServerFrame,
) -> Result<(), ()> {
    let payload = serde_json::to_string(frame).map_err(|_| ())?;
    send_text(ws, payload)
}

fn send_text(ws: &mut tungstenite::WebSocket<TcpStream>, text: String) -> Result<(), ()> {
    ws.send(Message::Text(text.into())).map_err(|_| ())
}
