mod agent_loop;
mod net;
mod protocol;

pub use crate::agent_loop::AgentLoop;
pub use crate::net::{thread_id_from_path, NetworkThread};
pub use crate::protocol::{InboundMsg, OutboundMsg, INBOUND_CAP, OUTBOUND_CAP};

use crate::protocol::{ClientFrame, ServerFrame};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(10);

/// Network thread plus a thread ticking the agent loop. Stops on drop.
pub struct AgentServer {
    net: NetworkThread,
    agent: Arc<Mutex<AgentLoop>>,
    outbound_tx: Sender<OutboundMsg>,
    shutdown: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl AgentServer {
    pub fn start(addr: &str) -> io::Result<Self> {
        let (in_tx, in_rx) = bounded(INBOUND_CAP);
        let (out_tx, out_rx) = bounded(OUTBOUND_CAP);

        let net = NetworkThread::spawn_with_addr(addr, in_tx, out_rx)?;
        let agent = Arc::new(Mutex::new(AgentLoop::new(in_rx, out_tx.clone())));
        let shutdown = Arc::new(AtomicBool::new(false));

        let ticker = {
            let agent = Arc::clone(&agent);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    if let Ok(mut agent) = agent.lock() {
                        agent.tick();
                    }
                    thread::sleep(TICK);
                }
            })
        };

        Ok(Self {
            net,
            agent,
            outbound_tx: out_tx,
            shutdown,
            ticker: Some(ticker),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.net.listen_addr()
    }

    /// `ws://<addr>/ws`, the base a client appends its thread id to.
    pub fn ws_base_url(&self) -> String {
        format!("ws://{}/ws", self.addr())
    }

    /// Queues a frame for the connected client. False when the outbound queue is full.
    pub fn push(&self, frame: ServerFrame) -> bool {
        self.enqueue(OutboundMsg::Send { frame })
    }

    /// Queues text that is written as-is, valid JSON or not.
    pub fn push_raw(&self, text: impl Into<String>) -> bool {
        self.enqueue(OutboundMsg::Raw { text: text.into() })
    }

    /// Drops the connected client without a reply.
    pub fn kick(&self) -> bool {
        self.enqueue(OutboundMsg::Kick)
    }

    fn enqueue(&self, msg: OutboundMsg) -> bool {
        match self.outbound_tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("outbound queue full; message dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("network thread stopped; message dropped");
                false
            }
        }
    }

    pub fn received(&self) -> Vec<ClientFrame> {
        self.agent
            .lock()
            .map(|a| a.received().to_vec())
            .unwrap_or_default()
    }

    pub fn active_thread_id(&self) -> Option<String> {
        self.agent
            .lock()
            .ok()
            .and_then(|a| a.active_thread_id().map(str::to_string))
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
        self.net.shutdown();
    }
}

impl Drop for AgentServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
