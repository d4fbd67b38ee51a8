//! Blocking HTTP listener built on tiny_http
//!
//! Each request is handled on its own thread. Ctrl+C flips a flag that the
//! accept loop polls between `recv_timeout` calls.

use super::{App, Request, Response};
use crate::config::ServerConfig;
use crate::error::Result;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Bind the configured address and serve until Ctrl+C.
pub fn serve(config: &ServerConfig, app: Arc<App>) -> Result<()> {
    let address = config.address();
    let server = tiny_http::Server::http(&address).map_err(|e| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("failed to bind {}: {}", address, e),
        )
    })?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }

    info!(address = %address, routes = app.router().len(), "listening");

    while running.load(Ordering::SeqCst) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => {
                let app = Arc::clone(&app);
                thread::spawn(move || handle_connection(&app, request));
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "failed to accept request"),
        }
    }

    info!("shutdown signal received, stopping server");
    Ok(())
}

fn handle_connection(app: &App, mut raw: tiny_http::Request) {
    let remote = raw
        .remote_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let request = match read_request(&mut raw) {
        Ok(request) => request,
        Err(e) => {
            warn!(remote = %remote, error = %e, "failed to read request body");
            let _ = send_response(raw, &Response::with_content(400, "text/plain", "Bad Request"));
            return;
        }
    };

    let response = app.handle(&request);
    info!(
        remote = %remote,
        method = %request.method,
        path = %request.path,
        status = response.status,
        "request"
    );

    if let Err(e) = send_response(raw, &response) {
        warn!(remote = %remote, error = %e, "failed to send response");
    }
}

/// Convert a tiny_http request, reading its body in full.
pub fn read_request(raw: &mut tiny_http::Request) -> io::Result<Request> {
    let mut body = String::new();
    raw.as_reader().read_to_string(&mut body)?;

    let mut request = Request::new(&raw.method().to_string(), raw.url());
    for header in raw.headers() {
        request = request.with_header(header.field.as_str().as_str(), header.value.as_str());
    }
    Ok(request.with_body(&body))
}

fn send_response(raw: tiny_http::Request, response: &Response) -> io::Result<()> {
    let mut out = tiny_http::Response::from_data(response.payload().to_vec())
        .with_status_code(response.status);

    for (name, value) in &response.headers {
        if let Ok(header) = tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            out.add_header(header);
        }
    }
    for cookie in &response.cookies {
        if let Ok(header) = tiny_http::Header::from_bytes(&b"Set-Cookie"[..], cookie.as_bytes()) {
            out.add_header(header);
        }
    }

    raw.respond(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tiny_http::{Header, Method, TestRequest};

    #[test]
    fn test_read_request() {
        let mut raw: tiny_http::Request = TestRequest::new()
            .with_method(Method::Post)
            .with_path("/login?next=home")
            .with_header(Header::from_bytes(&b"Cookie"[..], &b"sid=abc; theme=dark"[..]).unwrap())
            .with_body("user=eve")
            .into();

        let request = read_request(&mut raw).unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/login");
        assert_eq!(request.query, "next=home");
        assert_eq!(request.cookie("theme"), Some("dark"));
        assert_eq!(request.form_fields()["user"], "eve");
    }
}
