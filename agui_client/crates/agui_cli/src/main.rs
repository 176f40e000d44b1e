use agui_core::backoff::ReconnectPolicy;
use agui_core::config::{tune_policy, ClientConfig};
use agui_core::dispatcher::Dispatcher;
use agui_core::registry::ComponentRegistry;
use agui_core::transport::{ActionSender, AdapterEvent, ConnectionState, TransportAdapter};
use agui_core::view::{SendOutcome, View};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agui")]
struct Args {
    /// Base websocket endpoint; the thread id is appended. Falls back to AGUI_WS_URL.
    #[arg(long)]
    ws_url: Option<String>,

    /// Conversation thread. Falls back to AGUI_THREAD_ID, then a generated id.
    #[arg(long)]
    thread_id: Option<String>,

    /// Reconnect attempts after a dropped connection (0 disables reconnecting).
    #[arg(long)]
    reconnect_attempts: Option<u32>,

    #[arg(long)]
    reconnect_step_ms: Option<u64>,

    /// Send this message right after connecting.
    #[arg(long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    eprintln!("thread: {}", config.thread_id);

    let dispatcher = Dispatcher::new(Arc::new(ComponentRegistry::procurement()));
    let (adapter, mut events) = TransportAdapter::connect(config).await?;
    let actions = adapter.actions();

    if let Some(message) = args.message.as_deref() {
        report(adapter.send_user_message(message));
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut last_view: Option<View> = None;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    AdapterEvent::Status { state, retry_in } => print_status(state, retry_in),
                    AdapterEvent::ConnectionEstablished { thread_id } => {
                        eprintln!("agent ready on thread {thread_id}");
                    }
                    AdapterEvent::Message(content) => println!("agent: {content}"),
                    AdapterEvent::Render(instruction) => {
                        let view = dispatcher.dispatch(&instruction, adapter.sink());
                        print!("{view}");
                        last_view = Some(view);
                    }
                    AdapterEvent::Closed => {
                        eprintln!("connection closed");
                        break;
                    }
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(line.trim(), &actions, last_view.as_ref()) {
                    break;
                }
            }
        }
    }

    adapter.close().await;
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if args.ws_url.is_some() || args.thread_id.is_some() {
        let endpoint = args
            .ws_url
            .clone()
            .unwrap_or_else(|| config.endpoint.to_string());
        let thread_id = args
            .thread_id
            .clone()
            .unwrap_or_else(|| config.thread_id.clone());
        let reconnect = config.reconnect;
        config = ClientConfig::new(&endpoint, thread_id)?.with_reconnect(reconnect);
    }
    config.reconnect = tune_policy(
        config.reconnect,
        args.reconnect_attempts,
        args.reconnect_step_ms.map(Duration::from_millis),
    );
    if config.reconnect == ReconnectPolicy::Never {
        tracing::debug!("reconnect disabled");
    }
    Ok(config)
}

/// Returns false when the user asked to quit.
fn handle_line(line: &str, actions: &ActionSender, last_view: Option<&View>) -> bool {
    if line.is_empty() {
        return true;
    }
    if line == "/quit" {
        return false;
    }
    if let Some(n) = line.strip_prefix('/').and_then(|n| n.parse::<usize>().ok()) {
        match last_view.and_then(|v| v.fire(n)) {
            Some(outcome) => report(outcome),
            None => eprintln!("no action [{n}] on the current view"),
        }
        return true;
    }
    report(actions.send_user_message(line));
    true
}

fn report(outcome: SendOutcome) {
    match outcome {
        SendOutcome::Sent => {}
        SendOutcome::NotConnected => eprintln!("not connected; message dropped"),
        SendOutcome::Dropped => eprintln!("outbound queue full; message dropped"),
    }
}

fn print_status(state: ConnectionState, retry_in: Option<Duration>) {
    match (state, retry_in) {
        (ConnectionState::Connected, _) => eprintln!("status: connected"),
        (ConnectionState::Disconnected, Some(delay)) => {
            eprintln!("status: disconnected (retrying in {}ms)", delay.as_millis())
        }
        (ConnectionState::Disconnected, None) => eprintln!("status: disconnected"),
    }
}
