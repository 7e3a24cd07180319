//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. WebSocket upgrades
//! ride the same listener via `with_upgrades`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::directory::UserDirectory;
use crate::hub::NotificationHub;
use crate::mentors::MentorRegistry;
use crate::routes;
use crate::store::TicketStore;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Ticket persistence, either MongoDB or the chat channel
    pub store: Arc<dyn TicketStore>,
    /// Fan-out hub feeding live sessions
    pub hub: Arc<NotificationHub>,
    /// Mentor roster and access tokens
    pub mentors: Arc<dyn MentorRegistry>,
    /// User directory for mentee verification
    pub directory: Arc<dyn UserDirectory>,
    /// Process start, for uptime reporting
    pub started: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        store: Arc<dyn TicketStore>,
        hub: Arc<NotificationHub>,
        mentors: Arc<dyn MentorRegistry>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            args,
            store,
            hub,
            mentors,
            directory,
            started: Instant::now(),
        }
    }
}

/// Run the HTTP server until the process exits
pub async fn run(state: Arc<AppState>) -> crate::types::Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Helpline listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - unknown mentees are accepted");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Health and build info
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)).await)
        }
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // Mentee REST surface
        (Method::POST, "/mentee") => {
            to_boxed(routes::handle_create_ticket(Arc::clone(&state), req).await)
        }
        (Method::GET, p) if p.starts_with("/mentee/") => {
            let ticket_id = p.strip_prefix("/mentee/").unwrap_or("");
            to_boxed(routes::handle_get_ticket(Arc::clone(&state), req, ticket_id).await)
        }

        // Mentee live sessions: attach by id or create from the query string
        (Method::GET, "/ws/mentee") => {
            to_boxed(routes::handle_mentee_ws(Arc::clone(&state), req, None).await)
        }
        (Method::GET, p) if p.starts_with("/ws/mentee/") => {
            let ticket_id = p.strip_prefix("/ws/mentee/").unwrap_or("").to_string();
            to_boxed(routes::handle_mentee_ws(Arc::clone(&state), req, Some(ticket_id)).await)
        }

        // Mentor live sessions
        (Method::GET, p) if p.starts_with("/ws/mentor/") => {
            let token = p.strip_prefix("/ws/mentor/").unwrap_or("");
            to_boxed(routes::handle_mentor_ws(Arc::clone(&state), req, token).await)
        }

        // Mentor roster and administration
        (Method::GET, "/mentor") => {
            to_boxed(routes::handle_mentor_roster(Arc::clone(&state), req).await)
        }
        (Method::POST, "/mentor/authorize") => {
            to_boxed(routes::handle_authorize_mentor(Arc::clone(&state), req).await)
        }
        (Method::POST, "/mentor/unauthorize") => {
            to_boxed(routes::handle_unauthorize_mentor(Arc::clone(&state), req).await)
        }

        // Claimed queue before the plain token lookup, the path is longer
        (Method::GET, p) if p.starts_with("/mentor/") && p.ends_with("/tickets") => {
            let token = p
                .strip_prefix("/mentor/")
                .and_then(|s| s.strip_suffix("/tickets"))
                .unwrap_or("");
            to_boxed(routes::handle_mentor_tickets(Arc::clone(&state), req, token).await)
        }
        (Method::GET, p) if p.starts_with("/mentor/") => {
            let token = p.strip_prefix("/mentor/").unwrap_or("");
            to_boxed(routes::handle_mentor_self(Arc::clone(&state), req, token).await)
        }

        (Method::OPTIONS, _) => to_boxed(routes::preflight_response()),

        _ => to_boxed(routes::not_found_response(&path)),
    };

    Ok(response)
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}
