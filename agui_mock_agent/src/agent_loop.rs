use crate::protocol::{ClientFrame, InboundMsg, OutboundMsg, ServerFrame};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use serde_json::{json, Map, Value};

/// Scripted stand-in for the procurement agent: answers each client frame with canned frames.
pub struct AgentLoop {
    inbound_rx: Receiver<InboundMsg>,
    outbound_tx: Sender<OutboundMsg>,

    active_thread_id: Option<String>,
    received: Vec<ClientFrame>,
    next_quote: u32,
}

impl AgentLoop {
    pub fn new(inbound_rx: Receiver<InboundMsg>, outbound_tx: Sender<OutboundMsg>) -> Self {
        Self {
            inbound_rx,
            outbound_tx,
            active_thread_id: None,
            received: Vec::new(),
            next_quote: 1001,
        }
    }

    pub fn tick(&mut self) {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(InboundMsg::ClientConnected { thread_id, .. }) => {
                    self.active_thread_id = Some(thread_id.clone());
                    self.send(ServerFrame::ConnectionEstablished { thread_id });
                }
                Ok(InboundMsg::ClientDisconnected) => {
                    self.active_thread_id = None;
                }
                Ok(InboundMsg::Frame { frame }) => {
                    self.respond(&frame);
                    self.received.push(frame);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    pub fn active_thread_id(&self) -> Option<&str> {
        self.active_thread_id.as_deref()
    }

    /// Every client frame seen so far, in arrival order.
    pub fn received(&self) -> &[ClientFrame] {
        &self.received
    }

    pub fn try_send(&mut self, msg: OutboundMsg) {
        let _ = self.outbound_tx.try_send(msg);
    }

    fn send(&mut self, frame: ServerFrame) {
        self.try_send(OutboundMsg::Send { frame });
    }

    fn respond(&mut self, frame: &ClientFrame) {
        match frame {
            ClientFrame::UserMessage { content, .. } => {
                self.send(ServerFrame::message(format!(
                    "Got it: \"{content}\". Here is the best quote so far."
                )));
                let quote_id = format!("Q-{}", self.next_quote);
                self.next_quote += 1;
                self.send(ServerFrame::ui_component(
                    "quote_approval_card",
                    json!({
                        "quote_id": quote_id,
                        "vendor": "Acme Industrial Supply",
                        "total_amount": 300,
                        "currency": "USD",
                        "delivery_days": 5,
                    }),
                ));
            }
            ClientFrame::UserAction { action, extra, .. } => self.respond_to_action(action, extra),
        }
    }

    fn respond_to_action(&mut self, action: &str, extra: &Map<String, Value>) {
        let vendor = extra
            .get("vendor")
            .and_then(Value::as_str)
            .unwrap_or("the vendor")
            .to_string();
        match action {
            "approve_quote" => {
                let amount = extra.get("total_amount").cloned().unwrap_or(Value::Null);
                self.send(ServerFrame::ui_component(
                    "payment_confirmation",
                    json!({
                        "payment_id": format!("PAY-{}", self.next_quote),
                        "quote_id": extra.get("quote_id").cloned().unwrap_or(Value::Null),
                        "vendor": vendor,
                        "amount": amount,
                        "currency": extra.get("currency").cloned().unwrap_or(json!("USD")),
                        "status": "pending",
                    }),
                ));
            }
            "reject_quote" => {
                self.send(ServerFrame::message(format!(
                    "Rejected {vendor}. Asking the other vendors for revised quotes."
                )));
            }
            "confirm_payment" => {
                self.send(ServerFrame::message(format!("Payment to {vendor} submitted.")));
            }
            other => {
                self.send(ServerFrame::message(format!("Noted action \"{other}\".")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn agent() -> (AgentLoop, Sender<InboundMsg>, Receiver<OutboundMsg>) {
        let (in_tx, in_rx) = bounded(16);
        let (out_tx, out_rx) = bounded(16);
        (AgentLoop::new(in_rx, out_tx), in_tx, out_rx)
    }

    fn sent_frames(out_rx: &Receiver<OutboundMsg>) -> Vec<ServerFrame> {
        out_rx
            .try_iter()
            .filter_map(|m| match m {
                OutboundMsg::Send { frame } => Some(frame),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn connect_announces_thread() {
        let (mut agent, in_tx, out_rx) = agent();
        in_tx
            .send(InboundMsg::ClientConnected {
                socket_addr: "127.0.0.1:1".parse().unwrap(),
                thread_id: "t-1".to_string(),
            })
            .unwrap();
        agent.tick();

        assert_eq!(agent.active_thread_id(), Some("t-1"));
        assert_eq!(
            sent_frames(&out_rx),
            vec![ServerFrame::ConnectionEstablished {
                thread_id: "t-1".to_string()
            }]
        );
    }

    #[test]
    fn approve_quote_yields_payment_confirmation() {
        let (mut agent, in_tx, out_rx) = agent();
        let mut extra = Map::new();
        extra.insert("vendor".to_string(), json!("Acme"));
        extra.insert("total_amount".to_string(), json!(300));
        in_tx
            .send(InboundMsg::Frame {
                frame: ClientFrame::user_action("approve_quote", "t-1", extra),
            })
            .unwrap();
        agent.tick();

        let frames = sent_frames(&out_rx);
        assert_eq!(frames.len(), 1);
        let ServerFrame::UiComponent { data } = &frames[0] else {
            panic!("expected ui_component, got {:?}", frames[0]);
        };
        assert_eq!(data.name, "payment_confirmation");
        assert_eq!(data.props["vendor"], json!("Acme"));
        assert_eq!(data.props["amount"], json!(300));
        assert_eq!(agent.received().len(), 1);
    }

    #[test]
    fn user_message_gets_text_then_quote_card() {
        let (mut agent, in_tx, out_rx) = agent();
        in_tx
            .send(InboundMsg::Frame {
                frame: ClientFrame::user_message("need 20 laptops", "t-1"),
            })
            .unwrap();
        agent.tick();

        let frames = sent_frames(&out_rx);
        assert!(matches!(&frames[0], ServerFrame::Message { data } if data.content.contains("need 20 laptops")));
        assert!(matches!(&frames[1], ServerFrame::UiComponent { data } if data.name == "quote_approval_card"));
    }
}
