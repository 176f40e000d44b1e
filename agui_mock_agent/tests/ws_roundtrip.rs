use agui_mock_agent::AgentServer;
use serde_json::{json, Map};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use supplygraph_protocol::{ClientFrame, ServerFrame};
use tungstenite::Message;

type Ws = tungstenite::WebSocket<TcpStream>;

fn connect(server: &AgentServer, thread_id: &str) -> Ws {
    let addr = server.addr();
    let stream = TcpStream::connect(addr).expect("tcp connect");
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(200)));
    let (ws, _) = tungstenite::client(format!("ws://{addr}/ws/{thread_id}"), stream)
        .expect("ws connect");
    let _ = ws.get_ref().set_read_timeout(Some(Duration::from_millis(50)));
    ws
}

fn read_server_frame(ws: &mut Ws, timeout: Duration) -> ServerFrame {
    let deadline = Instant::now() + timeout;
    loop {
        match ws.read() {
            Ok(Message::Text(s)) => return serde_json::from_str(&s).expect("valid server json"),
            Ok(_) => continue,
            Err(tungstenite::Error::Io(e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                if Instant::now() >= deadline {
                    panic!("timeout waiting for server frame");
                }
            }
            Err(e) => panic!("ws read failed: {e:?}"),
        }
    }
}

fn send(ws: &mut Ws, frame: &ClientFrame) {
    ws.send(Message::Text(serde_json::to_string(frame).unwrap().into()))
        .unwrap();
}

fn wait_for_received(server: &AgentServer, n: usize) -> Vec<ClientFrame> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let got = server.received();
        if got.len() >= n {
            return got;
        }
        if Instant::now() >= deadline {
            panic!("agent saw {} frame(s), expected {n}", got.len());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn connection_message_and_approval_flow() {
    let server = AgentServer::start("127.0.0.1:0").expect("start agent");
    let mut ws = connect(&server, "thread-42");

    match read_server_frame(&mut ws, Duration::from_secs(2)) {
        ServerFrame::ConnectionEstablished { thread_id } => assert_eq!(thread_id, "thread-42"),
        other => panic!("expected connection_established, got: {other:?}"),
    }

    send(&mut ws, &ClientFrame::user_message("quotes for 20 monitors", "thread-42"));

    match read_server_frame(&mut ws, Duration::from_secs(2)) {
        ServerFrame::Message { data } => assert!(data.content.contains("20 monitors")),
        other => panic!("expected message, got: {other:?}"),
    }
    let quote = match read_server_frame(&mut ws, Duration::from_secs(2)) {
        ServerFrame::UiComponent { data } => {
            assert_eq!(data.name, "quote_approval_card");
            data.props
        }
        other => panic!("expected ui_component, got: {other:?}"),
    };

    let mut extra = Map::new();
    extra.insert("quote_id".to_string(), quote["quote_id"].clone());
    extra.insert("vendor".to_string(), quote["vendor"].clone());
    extra.insert("total_amount".to_string(), quote["total_amount"].clone());
    send(&mut ws, &ClientFrame::user_action("approve_quote", "thread-42", extra));

    match read_server_frame(&mut ws, Duration::from_secs(2)) {
        ServerFrame::UiComponent { data } => {
            assert_eq!(data.name, "payment_confirmation");
            assert_eq!(data.props["vendor"], quote["vendor"]);
            assert_eq!(data.props["amount"], json!(300));
            assert_eq!(data.props["status"], json!("pending"));
        }
        other => panic!("expected payment_confirmation, got: {other:?}"),
    }

    let received = wait_for_received(&server, 2);
    assert!(matches!(&received[1], ClientFrame::UserAction { action, .. } if action == "approve_quote"));
}

#[test]
fn frames_for_another_thread_are_ignored() {
    let server = AgentServer::start("127.0.0.1:0").expect("start agent");
    let mut ws = connect(&server, "mine");
    let _ = read_server_frame(&mut ws, Duration::from_secs(2));

    send(&mut ws, &ClientFrame::user_message("sneaky", "someone-else"));
    send(&mut ws, &ClientFrame::user_message("legit", "mine"));

    let received = wait_for_received(&server, 1);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], ClientFrame::user_message("legit", "mine"));
}

#[test]
fn raw_frames_are_written_verbatim() {
    let server = AgentServer::start("127.0.0.1:0").expect("start agent");
    let mut ws = connect(&server, "raw");
    let _ = read_server_frame(&mut ws, Duration::from_secs(2));

    server.push_raw("{invalid");
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match ws.read() {
            Ok(Message::Text(s)) => {
                assert_eq!(s.as_str(), "{invalid");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                assert!(Instant::now() < deadline, "timeout waiting for raw frame");
            }
            Err(e) => panic!("ws read failed: {e:?}"),
        }
    }
}

#[test]
fn pushes_report_whether_they_were_queued() {
    let mut server = AgentServer::start("127.0.0.1:0").expect("start agent");
    assert!(server.push(ServerFrame::message("hello")));
    assert!(server.push_raw("{}"));

    server.shutdown();
    assert!(!server.push(ServerFrame::message("too late")));
    assert!(!server.push_raw("{}"));
    assert!(!server.kick());
}
