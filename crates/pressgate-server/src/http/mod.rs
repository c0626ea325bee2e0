//! HTTP transport for the update gateway.
//!
//! | Route | Method | Purpose |
//! |---|---|---|
//! | `/`, `/api` | GET | Package check (`type=plugin|theme`) or key delivery (`type=auth`) |
//! | `/health` | GET | Liveness probe, never touches the store |
//! | `/cron` | any | Always 403; jobs run only through `pressgate-cron` |
//!
//! Any other verb on the gateway routes answers 403.

mod routes;


use axum::Router;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

use crate::gateway::UpdateGateway;

pub use routes::{cron, gateway, health};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: UpdateGateway,
}

/// Build the gateway router.
///
/// Handlers read the peer address from `ConnectInfo`, so the router must be
/// served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(gateway))
        .route("/api", any(gateway))
        .route("/health", get(health))
        .route("/cron", any(cron))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
