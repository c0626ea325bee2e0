//! Handlers mapping gateway outcomes onto HTTP responses.
//!
//! Authentication refusals carry no body. Archives are streamed from disk.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use super::AppState;
use crate::gateway::{Caller, GatewayOutcome, PackageRef};

/// `/` and `/api`: the gateway protocol.
///
/// An unparseable query string is handled as an empty one so the verb and
/// block checks still run before the request is rejected as malformed.
pub async fn gateway(
    method: Method,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            debug!(ip = %peer.ip(), %rejection, "Unparseable query string");
            HashMap::new()
        }
    };
    let caller = Caller {
        ip: peer.ip(),
        read_only: method == Method::GET,
    };

    match state.gateway.handle(&caller, &params).await {
        Ok(outcome) => respond(outcome).await,
        Err(e) => {
            error!(ip = %peer.ip(), error = %e, "Gateway request failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `/cron`: background jobs are command-line only.
pub async fn cron() -> StatusCode {
    StatusCode::FORBIDDEN
}

async fn respond(outcome: GatewayOutcome) -> Response {
    match outcome {
        GatewayOutcome::UpdateAvailable(package) => stream_package(&package).await,
        GatewayOutcome::NoUpdate => StatusCode::NO_CONTENT.into_response(),
        GatewayOutcome::KeyDelivered(key) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            key,
        )
            .into_response(),
        GatewayOutcome::BadRequest(rejection) => {
            (StatusCode::BAD_REQUEST, rejection.to_string()).into_response()
        }
        GatewayOutcome::Forbidden => StatusCode::FORBIDDEN.into_response(),
    }
}

/// Stream an archive from disk as `application/zip`.
///
/// The archive can vanish between the gateway's existence check and the
/// open here; that is answered like a stale catalog row, with 204.
async fn stream_package(package: &PackageRef) -> Response {
    let file = match tokio::fs::File::open(&package.path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %package.path.display(), "Archive disappeared before streaming");
            return StatusCode::NO_CONTENT.into_response();
        }
        Err(e) => {
            error!(path = %package.path.display(), error = %e, "Failed to open archive");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            error!(path = %package.path.display(), error = %e, "Failed to stat archive");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", package.file_name),
            ),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}
