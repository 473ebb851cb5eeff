//! HTTP server setup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing;

use davsync_core::error::AppError;

use crate::api::{ApiHandler, ApiRoute};
use crate::auth::SessionDecoder;
use crate::backend::{DavBody, full_body};
use crate::context::DavContext;
use crate::handler::DavHandler;

/// Routes requests to the WebDAV handler or the JSON endpoints.
#[derive(Debug)]
pub struct Router {
    dav: DavHandler,
    api: ApiHandler,
    sessions: SessionDecoder,
}

impl Router {
    /// Create a router over the shared adapter state.
    pub fn new(ctx: Arc<DavContext>, sessions: SessionDecoder) -> Self {
        Self {
            dav: DavHandler::new(Arc::clone(&ctx)),
            api: ApiHandler::new(ctx),
            sessions,
        }
    }

    /// Answer one request with a fully collected body.
    pub async fn route(&self, req: Request<Bytes>) -> Response<DavBody> {
        let identity = self.sessions.current_session(req.headers());
        let path = req.uri().path();

        if self.dav.context().client_path(path).ok().flatten().is_some() {
            return self.dav.handle(&identity, req).await;
        }
        if let Some(route) = ApiRoute::match_path(path) {
            return self.api.handle(route, &identity, req).await;
        }

        tracing::debug!("No route for {} {}", req.method(), path);
        let mut response = Response::new(full_body(Bytes::new()));
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
    }
}

/// Server configuration and state
#[derive(Debug)]
pub struct WebDavServer {
    /// Request router
    router: Arc<Router>,
    /// Listen address
    addr: SocketAddr,
}

impl WebDavServer {
    /// Create a new server
    pub fn new(router: Router, addr: SocketAddr) -> Self {
        Self {
            router: Arc::new(router),
            addr,
        }
    }

    /// Start the server and run until `cancel` turns true.
    pub async fn start(&self, mut cancel: watch::Receiver<bool>) -> Result<(), AppError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", self.addr, e)))?;

        tracing::info!("WebDAV server listening on {}", self.addr);

        let router = Arc::clone(&self.router);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let router = Arc::clone(&router);
                            tokio::spawn(async move {
                                Self::handle_connection(router, stream, peer_addr).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!("WebDAV server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle a single TCP connection using hyper
    async fn handle_connection(
        router: Arc<Router>,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) {
        let io = hyper_util::rt::TokioIo::new(stream);

        let service = hyper::service::service_fn(move |req: Request<Incoming>| {
            let router = Arc::clone(&router);
            async move {
                let (parts, body) = req.into_parts();

                let body_bytes = match http_body_util::BodyExt::collect(body).await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) => {
                        tracing::error!("Failed to read request body from {}: {}", peer_addr, e);
                        let mut response = Response::new(full_body(Bytes::new()));
                        *response.status_mut() = StatusCode::BAD_REQUEST;
                        return Ok::<_, hyper::Error>(response);
                    }
                };

                let req = Request::from_parts(parts, body_bytes);
                tracing::trace!("{} {} from {}", req.method(), req.uri(), peer_addr);
                Ok::<_, hyper::Error>(router.route(req).await)
            }
        });

        let conn = hyper::server::conn::http1::Builder::new().serve_connection(io, service);

        if let Err(e) = conn.await {
            tracing::error!("Connection error from {}: {}", peer_addr, e);
        }
    }
}
