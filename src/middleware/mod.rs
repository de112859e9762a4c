use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::Request};

pub mod access_log;
pub mod cors;
pub mod rate_limit;
pub mod request_id;

/// Peer address of the connection, or `"unknown"` when the server was not
/// started with connect info.
pub fn client_ip<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}
