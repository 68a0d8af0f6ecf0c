//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderName,
};

/// Header carrying the client address when running behind a proxy.
#[derive(Debug, Clone)]
pub struct ClientIpHeader(pub HeaderName);

impl ClientIpHeader {
    /// Parse a header name such as `X-Forwarded-For`.
    pub fn parse(name: &str) -> Result<Self, String> {
        HeaderName::try_from(name)
            .map(Self)
            .map_err(|e| format!("Invalid IP header name '{}': {}", name, e))
    }

    /// First address in the header value (`X-Forwarded-For` style lists).
    fn extract(&self, value: &str) -> Result<String, &'static str> {
        let first = value.split(',').next().unwrap_or("").trim();
        first
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain an address")
    }
}

/// Extract the client IP address.
///
/// With an `ip_header` configured, the header is authoritative and a missing
/// or invalid header is an error (no fallback to the socket address).
/// Otherwise the `ConnectInfo` socket address is used.
pub fn extract_client_ip(
    request: &Request,
    ip_header: Option<&ClientIpHeader>,
) -> Result<String, &'static str> {
    match ip_header {
        Some(header) => {
            let value = request
                .headers()
                .get(&header.0)
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            header.extract(value)
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}
