//! Accept loop: one thread per request, image work on the rayon pool

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use tiny_http::Server;

use crate::http::{read_body, BodyError, Reply, Request};
use crate::routes::App;

pub fn serve(app: App, bind: &str) -> Result<()> {
    let server = Server::http(bind).map_err(|e| anyhow::anyhow!("Failed to bind {bind}: {e}"))?;

    tracing::info!(
        "Listening on http://{bind} with {} image worker threads",
        rayon::current_num_threads()
    );

    run(server, Arc::new(app))
}

/// Each request gets its own thread, which owns the socket for the whole
/// exchange. A client that stalls mid-body only ties up that thread; the
/// decode/composite step runs on the rayon pool.
pub fn run(server: Server, app: Arc<App>) -> Result<()> {
    for request in server.incoming_requests() {
        let app = Arc::clone(&app);
        thread::Builder::new()
            .name("request".to_string())
            .spawn(move || respond(app, request))
            .context("Failed to spawn request thread")?;
    }

    Ok(())
}

fn respond(app: Arc<App>, mut request: tiny_http::Request) {
    let started = Instant::now();

    let content_type = request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Content-Type"))
        .map(|header| header.value.as_str().to_string());
    let declared = request.body_length();
    let mut req = Request::new(request.method().clone(), request.url());
    req.content_type = content_type;

    let method = req.method.clone();
    let path = req.path.clone();

    let reply = match read_body(request.as_reader(), declared, app.max_body()) {
        Ok(body) => {
            req.body = body;
            handle_on_pool(app, req)
        }
        Err(BodyError::TooLarge(limit)) => {
            tracing::warn!("{method} {path}: body over {limit} bytes");
            Reply::too_large(limit)
        }
        Err(e) => {
            tracing::warn!("{method} {path}: {e}");
            Reply::json_error(400, "Could not read request body")
        }
    };

    let status = reply.status;
    if let Err(e) = request.respond(reply.into_response()) {
        tracing::warn!("Failed to send response for {path}: {e}");
    }

    tracing::info!(
        method = %method,
        path = %path,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
}

fn handle_on_pool(app: Arc<App>, req: Request) -> Reply {
    let (tx, rx) = mpsc::channel();
    rayon::spawn(move || {
        // the receiver only goes away if this thread is gone too
        let _ = tx.send(app.handle(&req));
    });
    rx.recv().unwrap_or_else(|_| {
        tracing::error!("Request handler panicked");
        Reply::json_error(500, "Internal server error")
    })
}
