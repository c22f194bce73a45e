//! HTTP front end.
//!
//! - `GET /config` returns the last accepted request config.
//! - `POST /config` takes a `PacketConfig`, stages the capture and replies
//!   with the `AnalysisResult`.

use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use tokio::sync::Mutex;

use crate::config::PacketConfig;
use crate::error::SeqError;
use crate::AnalysisOptions;

pub struct ServiceState {
    config: Mutex<PacketConfig>,
    staging: PathBuf,
    options: AnalysisOptions,
}

impl ServiceState {
    pub fn new(staging: PathBuf, options: AnalysisOptions) -> ServiceState {
        ServiceState {
            config: Mutex::new(PacketConfig::default()),
            staging,
            options,
        }
    }

    pub async fn current_config(&self) -> PacketConfig {
        self.config.lock().await.clone()
    }
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(listener: TcpListener, state: Arc<ServiceState>, shutdown: F) -> Result<(), SeqError>
where
    F: Future<Output = ()>,
{
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;

    let make_svc = make_service_fn(move |_conn| {
        let state = Arc::clone(&state);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = Arc::clone(&state);
                handle_request(req, state)
            }))
        }
    });

    let server = Server::from_tcp(listener)
        .map_err(|e| SeqError::Fatal(format!("bind {}: {}", addr, e)))?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown);

    log::info!("Listening on http://{}", addr);
    log::info!("Endpoints: GET /config, POST /config");

    server.await.map_err(|e| SeqError::Fatal(format!("server error: {}", e)))
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, state: Arc<ServiceState>) -> Result<(), SeqError> {
    let listener = TcpListener::bind(addr)?;
    serve_listener(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("Shutting down");
    })
    .await
}

async fn handle_request(req: Request<Body>, state: Arc<ServiceState>) -> Result<Response<Body>, Infallible> {
    log::debug!("{} {}", req.method(), req.uri().path());

    if req.uri().path() != "/config" {
        return Ok(error_response(StatusCode::NOT_FOUND, "not found"));
    }
    let method = req.method().clone();
    let resp = match method {
        Method::GET => get_config(&state).await,
        Method::POST => post_config(req, &state).await,
        _ => error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
    };
    log::info!("/config -> {}", resp.status());
    Ok(resp)
}

async fn get_config(state: &ServiceState) -> Response<Body> {
    let config = state.current_config().await;
    match serde_json::to_string(&config) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn post_config(req: Request<Body>, state: &ServiceState) -> Response<Body> {
    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let request: PacketConfig = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    if let Err(e) = request.validate() {
        return error_response(StatusCode::BAD_REQUEST, &e.to_string());
    }
    *state.config.lock().await = request.clone();

    let staging = state.staging.clone();
    let options = state.options.clone();
    let outcome = tokio::task::spawn_blocking(move || crate::run(&request, &staging, &options)).await;

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            log::error!("analysis failed: {}", e);
            return error_response(status_for(&e), &e.to_string());
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("analysis task failed: {}", e)),
    };
    match serde_json::to_string(&result) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn status_for(err: &SeqError) -> StatusCode {
    match err {
        SeqError::Config(_) | SeqError::Acquire(_) | SeqError::SourceUnavailable(_) | SeqError::RetainedOverflow { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_response(status: StatusCode, body: String) -> Response<Body> {
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    resp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, serde_json::json!({ "error": message }).to_string())
}
