//! Client metadata read from request headers.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, Extensions, HeaderMap},
};
use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};

use crate::state::AppState;

/// Address of the directly connected peer, when the server recorded one.
pub fn peer_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Originating client address. Forwarding headers are read only when the
/// peer is a trusted proxy; `x-forwarded-for` is walked from the right and
/// the first hop that is not itself a trusted proxy wins.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted_proxies.contains(&peer) {
        return Some(peer);
    }

    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        for hop in forwarded.rsplit(',') {
            match hop.trim().parse::<IpAddr>() {
                Ok(ip) if trusted_proxies.contains(&ip) => continue,
                Ok(ip) => return Some(ip),
                Err(_) => return Some(peer),
            }
        }
    }

    header_str(headers, "x-real-ip")
        .and_then(|value| value.trim().parse().ok())
        .or(Some(peer))
}

/// Extractor form of [`client_ip`] for handlers that store the address.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl ClientIp {
    pub fn to_string_opt(self) -> Option<String> {
        self.0.map(|ip| ip.to_string())
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(
            &parts.headers,
            peer_ip(&parts.extensions),
            &state.config.trusted_proxies,
        )))
    }
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    header_str(headers, USER_AGENT.as_str()).map(|value| value.to_string())
}

pub fn referrer(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "referer").map(|value| value.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn untrusted_peer_ignores_forwarding_headers() {
        let mut headers = forwarded("203.0.113.9");
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.10"));
        assert_eq!(
            client_ip(&headers, Some(ip("198.51.100.7")), &[]),
            Some(ip("198.51.100.7"))
        );
    }

    #[test]
    fn trusted_proxy_yields_rightmost_untrusted_hop() {
        let proxies = [ip("10.0.0.1"), ip("10.0.0.2")];
        let headers = forwarded("1.1.1.1, 203.0.113.9, 10.0.0.2");
        assert_eq!(
            client_ip(&headers, Some(ip("10.0.0.1")), &proxies),
            Some(ip("203.0.113.9"))
        );
    }

    #[test]
    fn trusted_proxy_falls_back_to_real_ip_then_peer() {
        let proxies = [ip("10.0.0.1")];
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.5"));
        assert_eq!(
            client_ip(&headers, Some(ip("10.0.0.1")), &proxies),
            Some(ip("203.0.113.5"))
        );
        assert_eq!(
            client_ip(&forwarded("not-an-ip"), Some(ip("10.0.0.1")), &proxies),
            Some(ip("10.0.0.1"))
        );
    }

    #[test]
    fn missing_peer_is_unknown() {
        assert_eq!(client_ip(&forwarded("203.0.113.9"), None, &[]), None);
    }
}
