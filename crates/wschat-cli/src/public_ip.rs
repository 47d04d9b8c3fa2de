//! Public-IP discovery over HTTP.
//!
//! Queries an endpoint that answers with the caller's address as plain text,
//! so a server can tell its peer where to connect.

use std::net::IpAddr;
use std::time::Duration;

use tracing::debug;
use wschat_core::config::DiscoveryConfig;

use crate::error::DiscoveryError;

/// Longest body echoed back in an error.
const MAX_ECHOED_BODY: usize = 64;

/// Ask the configured endpoint for this host's public address.
pub async fn discover_public_ip(config: &DiscoveryConfig) -> Result<IpAddr, DiscoveryError> {
    // Install rustls crypto provider (required by reqwest with rustls-no-provider)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    debug!(endpoint = %config.endpoint, "Querying public IP");
    let resp = http.get(&config.endpoint).send().await?;
    if !resp.status().is_success() {
        return Err(DiscoveryError::Status(resp.status().as_u16()));
    }
    parse_ip_body(&resp.text().await?)
}

/// Parse a plain-text address body, tolerating surrounding whitespace.
pub fn parse_ip_body(body: &str) -> Result<IpAddr, DiscoveryError> {
    let trimmed = body.trim();
    trimmed.parse().map_err(|_| {
        DiscoveryError::InvalidBody(trimmed.chars().take(MAX_ECHOED_BODY).collect())
    })
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve exactly one canned HTTP response on a loopback port.
    async fn one_shot_http(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn config_for(endpoint: String) -> DiscoveryConfig {
        DiscoveryConfig {
            endpoint,
            timeout_secs: 5,
        }
    }

    #[test]
    fn parses_v4_and_v6_bodies() {
        assert_eq!(
            parse_ip_body("203.0.113.7\n").unwrap(),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            parse_ip_body("  2001:db8::1 ").unwrap(),
            "2001:db8::1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn rejects_non_address_body() {
        let err = parse_ip_body("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidBody(ref b) if b.contains("rate limited")));
    }

    #[test]
    fn long_bodies_are_truncated_in_errors() {
        let body = "x".repeat(500);
        match parse_ip_body(&body).unwrap_err() {
            DiscoveryError::InvalidBody(echoed) => assert_eq!(echoed.len(), MAX_ECHOED_BODY),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn discovers_address_from_endpoint() {
        let endpoint = one_shot_http("200 OK", "198.51.100.23").await;
        let ip = discover_public_ip(&config_for(endpoint)).await.unwrap();
        assert_eq!(ip, "198.51.100.23".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let endpoint = one_shot_http("503 Service Unavailable", "busy").await;
        let err = discover_public_ip(&config_for(endpoint)).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Status(503)), "{err:?}");
    }
}
