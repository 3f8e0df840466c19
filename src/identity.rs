//! Resolves the originating address of a request.
//!
//! The result is only ever used as an opaque quota key. Forwarding headers are
//! taken at face value, so a client that forges them gets a fresh quota.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;

pub const UNKNOWN_CLIENT: &str = "unknown";

type Extractor = fn(&HeaderMap, Option<SocketAddr>) -> Option<String>;

// Tried in order, first non-empty value wins
const EXTRACTORS: [Extractor; 3] = [forwarded_for, real_ip, remote_addr];

pub fn forwarded_for(headers: &HeaderMap, _: Option<SocketAddr>) -> Option<String> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    non_empty(value.split(',').next()?)
}

/// `X-Real-IP`, trimmed. A blank value counts as absent so the next extractor
/// gets a chance, the same rule as for `X-Forwarded-For`.
pub fn real_ip(headers: &HeaderMap, _: Option<SocketAddr>) -> Option<String> {
    non_empty(headers.get("x-real-ip")?.to_str().ok()?)
}

pub fn remote_addr(_: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
    remote.map(|addr| addr.ip().to_string())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn client_identifier(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(headers, remote))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Extractor handing handlers the resolved client identifier. The remote
/// address is only known when the server was started with connect info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientId(client_identifier(&parts.headers, remote)))
    }
}
