//! Shared helpers for route handlers.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};

use crate::middleware::get_client_id;

/// Caller's address: the TCP peer, or what a trusted proxy reports.
///
/// The peer is only known when the server was started with connect info.
pub fn client_ip(request: &Request, trusted_proxies: &[IpAddr]) -> Option<String> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    get_client_id(peer, request.headers(), trusted_proxies)
}
