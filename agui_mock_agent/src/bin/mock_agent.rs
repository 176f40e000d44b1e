use agui_mock_agent::AgentServer;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

fn parse_arg_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    let addr = parse_arg_value(&args, "--addr")
        .or_else(|| std::env::var("AGUI_MOCK_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let addr_file = parse_arg_value(&args, "--addr-file").map(PathBuf::from);
    let run_for_ms = parse_arg_value(&args, "--run-for-ms")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis);

    let mut server = match AgentServer::start(&addr) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(%addr, error = %e, "mock agent failed to bind");
            std::process::exit(1);
        }
    };

    if let Some(path) = &addr_file {
        if let Err(e) = fs::write(path, server.addr().to_string()) {
            tracing::warn!(path = %path.display(), error = %e, "could not write addr file");
        }
    }

    println!("mock_agent listening on {}/<thread_id>", server.ws_base_url());

    let start = Instant::now();
    loop {
        thread::sleep(Duration::from_millis(100));
        if let Some(max) = run_for_ms {
            if start.elapsed() >= max {
                break;
            }
        }
    }

    server.shutdown();
}
