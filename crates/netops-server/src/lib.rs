//! HTTP/JSON front end for the netops slice bandwidth agent.
//!
//! Exposes the three controller RPCs (`/v1/slice-qos-profile`,
//! `/v1/slice-lifecycle-event`, `/v1/connection-context`) plus a read-only
//! view of the policy store (`/v1/slices`) and `/health`. Requests are served
//! by a pool of worker threads pulling from one shared `tiny_http::Server`.
//!
//! The [`TestServer`] helper starts a server backed by the in-memory shaping
//! backend on a random port for integration testing.

pub mod service;
pub mod shutdown;

pub use service::{Code, NetOpsService, RequestContext, Status};

use netops_core::Engine;
use netops_tc::MockBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, error, info, warn};

/// Request header carrying the caller's deadline in unix epoch milliseconds.
pub const DEADLINE_HEADER: &str = "x-netops-deadline-ms";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Core(#[from] netops_core::CoreError),
}

pub fn bind(addr: &str) -> Result<Arc<Server>, ServerError> {
    Server::http(addr)
        .map(Arc::new)
        .map_err(|source| ServerError::Bind {
            addr: addr.to_owned(),
            source,
        })
}

fn json_header() -> Option<Header> {
    Header::from_bytes("Content-Type", "application/json").ok()
}

fn respond_json(req: Request, status: u16, body: &impl Serialize) {
    let body = match serde_json::to_vec(body) {
        Ok(body) => body,
        Err(e) => {
            error!("failed to encode response: {e}");
            let _ = req.respond(Response::empty(500));
            return;
        }
    };
    let mut response = Response::from_data(body).with_status_code(status);
    if let Some(header) = json_header() {
        response = response.with_header(header);
    }
    let _ = req.respond(response);
}

fn respond_status(req: Request, status: &Status) {
    respond_json(req, status.code.http_status(), &status.to_response());
}

fn respond_err(req: Request, http_status: u16, code: &str, message: &str) {
    respond_json(
        req,
        http_status,
        &netops_schema::ErrorResponse {
            code: code.to_owned(),
            message: message.to_owned(),
        },
    );
}

fn read_body(req: &mut Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    if req.as_reader().read_to_end(&mut body).is_ok() {
        Some(body)
    } else {
        None
    }
}

/// Parse a request body. An empty body or a JSON `null` is an absent message.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, Status> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map_err(|e| Status::invalid_argument(format!("invalid request body: {e}")))
}

fn parse_deadline(value: &str) -> Option<SystemTime> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|ms| UNIX_EPOCH + Duration::from_millis(ms))
}

fn request_context(service: &NetOpsService, req: &Request) -> RequestContext {
    let deadline = req
        .headers()
        .iter()
        .find(|h| h.field.equiv(DEADLINE_HEADER))
        .and_then(|h| {
            let parsed = parse_deadline(h.value.as_str());
            if parsed.is_none() {
                warn!("ignoring malformed {DEADLINE_HEADER} header: {}", h.value);
            }
            parsed
        });
    RequestContext::new(deadline, service.shutdown_requested())
}

fn handle_rpc<T: DeserializeOwned>(
    mut req: Request,
    method: &Method,
    call: impl FnOnce(Option<T>) -> Result<netops_schema::StatusResponse, Status>,
) {
    if *method != Method::Post {
        respond_err(req, 405, "MethodNotAllowed", "method not allowed");
        return;
    }
    let Some(body) = read_body(&mut req) else {
        respond_err(req, 500, Code::Internal.as_str(), "read error");
        return;
    };
    match parse_body(&body).and_then(call) {
        Ok(resp) => respond_json(req, 200, &resp),
        Err(status) => respond_status(req, &status),
    }
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(service: &NetOpsService, req: Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let ctx = request_context(service, &req);
    let path = url.split('?').next().unwrap_or_default();

    match path {
        "/v1/slice-qos-profile" => handle_rpc(req, &method, |body| {
            service.update_slice_qos_profile(&ctx, body)
        }),
        "/v1/slice-lifecycle-event" => handle_rpc(req, &method, |body| {
            service.update_slice_lifecycle_event(&ctx, body)
        }),
        "/v1/connection-context" => handle_rpc(req, &method, |body| {
            service.update_connection_context(&ctx, body)
        }),
        "/v1/slices" if method == Method::Get => match service.slices() {
            Ok(slices) => respond_json(req, 200, &slices),
            Err(status) => respond_status(req, &status),
        },
        _ if path.starts_with("/v1/slices/") && method == Method::Get => {
            let slice_id = &path["/v1/slices/".len()..];
            match service.slice(slice_id) {
                Ok(slice) => respond_json(req, 200, &slice),
                Err(status) => respond_status(req, &status),
            }
        }
        "/health" if method == Method::Get => {
            respond_json(req, 200, &serde_json::json!({ "status": "ok" }));
        }
        "/v1/slices" | "/health" => {
            respond_err(req, 405, "MethodNotAllowed", "method not allowed");
        }
        _ if path.starts_with("/v1/slices/") => {
            respond_err(req, 405, "MethodNotAllowed", "method not allowed");
        }
        _ => respond_err(req, 404, Code::NotFound.as_str(), "not found"),
    }
}

fn worker_loop(service: &NetOpsService, server: &Server) {
    loop {
        match server.recv() {
            Ok(req) => handle_request(service, req),
            Err(e) => {
                if service.shutdown_requested() {
                    server.unblock();
                    break;
                }
                warn!("failed to receive request: {e}");
            }
        }
    }
}

fn spawn_workers(
    service: &Arc<NetOpsService>,
    server: &Arc<Server>,
    workers: usize,
) -> Result<Vec<JoinHandle<()>>, ServerError> {
    (0..workers.max(1))
        .map(|i| {
            let service = Arc::clone(service);
            let server = Arc::clone(server);
            std::thread::Builder::new()
                .name(format!("netops-worker-{i}"))
                .spawn(move || worker_loop(&service, &server))
                .map_err(ServerError::from)
        })
        .collect()
}

/// Serve requests on `server` with `workers` threads until shutdown is
/// requested, blocking the current thread.
pub fn run_server(
    service: &Arc<NetOpsService>,
    server: &Arc<Server>,
    workers: usize,
) -> Result<(), ServerError> {
    let handles = spawn_workers(service, server, workers)?;
    info!("serving with {} worker threads", handles.len());
    for handle in handles {
        if handle.join().is_err() {
            error!("worker thread panicked");
        }
    }
    info!("server stopped");
    Ok(())
}

/// A test helper that starts a netops server on a random port in background
/// threads, backed by an in-memory shaping backend.
///
/// Drop the `TestServer` to stop the server.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub backend: Arc<MockBackend>,
    pub service: Arc<NetOpsService>,
    server: Arc<Server>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start() -> Result<Self, ServerError> {
        let server = bind("127.0.0.1:0")?;
        let port = server.server_addr().to_ip().map_or(0, |addr| addr.port());
        let url = format!("http://127.0.0.1:{port}");

        let backend = Arc::new(MockBackend::new("eth0"));
        let engine = Arc::new(Engine::new(backend.clone()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let service = Arc::new(NetOpsService::with_shutdown(engine, Arc::clone(&shutdown)));
        let handles = spawn_workers(&service, &server, 2)?;

        Ok(Self {
            url,
            port,
            backend,
            service,
            server,
            shutdown,
            handles,
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        shutdown::request_shutdown(&self.shutdown, &self.server);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
