//! HTTP surface for `ticketd`
//!
//! One router per area, merged into a single app with request tracing and a
//! request timeout. Handlers resolve the caller, hand off to
//! [`lifecycle::TicketService`] and map errors through [`ApiError`].

pub mod auth;
pub mod error;
pub mod extract;
mod admin;
mod manager;
mod system;
mod team_lead;
mod tickets;
mod triage;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::error_handling::HandleErrorLayer;
use axum::Router;
use lifecycle::SharedTicketService;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use auth::Caller;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::{ApiJson, ApiPath, ApiQuery};

/// Application state shared across handlers
pub struct AppState {
    pub service: SharedTicketService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: SharedTicketService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

pub(crate) type AppStateArc = Arc<AppState>;

/// Build the full application router. A request running past
/// `request_timeout` gets a JSON 408.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(tickets::routes())
        .merge(triage::routes())
        .merge(triage::engineer_routes())
        .merge(team_lead::routes())
        .merge(manager::routes())
        .merge(admin::routes())
        .merge(system::routes())
        .with_state(Arc::new(state))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(error::handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
}
