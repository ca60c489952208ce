//! HTTP API for session monitoring
//!
//! Provides JSON endpoints for the current session and counter totals.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::counters::{MetricsSnapshot, METRICS};
use crate::session::SessionSnapshot;

/// API response for /session endpoint
#[derive(Serialize)]
struct SessionResponse<'a> {
    #[serde(flatten)]
    session: &'a SessionSnapshot,
    connected: bool,
}

/// Start the status API server
///
/// Binds before returning so the caller learns the actual port, then serves
/// from a background thread:
/// - GET /session - Current state, address and attempt
/// - GET /stats - Session counters
pub fn start_api_server(
    addr: SocketAddr,
    session: watch::Receiver<SessionSnapshot>,
) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind(addr)?;
    let local_addr = listener.local_addr()?;

    thread::spawn(move || {
        if let Err(e) = run_api_server(listener, session) {
            error!(error = %e, "API server error");
        }
    });
    info!(addr = %local_addr, "Status API server started");

    Ok(local_addr)
}

fn run_api_server(listener: TcpListener, session: watch::Receiver<SessionSnapshot>) -> std::io::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let session = session.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_request(stream, &session) {
                        debug!(error = %e, "Request handling error");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
            }
        }
    }

    Ok(())
}

fn handle_request(mut stream: TcpStream, session: &watch::Receiver<SessionSnapshot>) -> std::io::Result<()> {
    let mut buffer = [0u8; 1024];
    let n = stream.read(&mut buffer)?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);
    let first_line = request.lines().next().unwrap_or("");

    // Parse request path
    let path = first_line.split_whitespace().nth(1).unwrap_or("/");

    let snapshot = session.borrow().clone();
    let (status, body) = route(path, &snapshot, &METRICS.snapshot());

    let response = format!(
        "HTTP/1.1 {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok(())
}

fn route(path: &str, session: &SessionSnapshot, stats: &MetricsSnapshot) -> (&'static str, String) {
    match path {
        "/session" => {
            let response = SessionResponse {
                session,
                connected: matches!(session.state, crate::session::ConnectionState::Connected),
            };
            ("200 OK", serde_json::to_string_pretty(&response).unwrap_or_default())
        }
        "/stats" => ("200 OK", serde_json::to_string_pretty(stats).unwrap_or_default()),
        "/" => {
            let help = r#"{
  "endpoints": {
    "/session": "Current session state",
    "/stats": "Session counters"
  }
}"#;
            ("200 OK", help.to_string())
        }
        _ => ("404 Not Found", r#"{"error": "Not found"}"#.to_string()),
    }
}
