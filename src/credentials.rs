//! Immutable credential record (§3 Data Model).
//!
//! Constructed once by the bootstrap collaborator and shared read-only
//! across every Worker — there is no interior mutability here, unlike the
//! teacher's `Credentials`, which supports runtime refresh for STS-style
//! rotating tokens we have no use for.

use url::Url;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub endpoint_url: Url,
}

impl Credentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
        endpoint_url: Url,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            endpoint_url,
        }
    }

    /// Whether the endpoint requires TLS. Plain `http://` endpoints are used
    /// against local test doubles (MinIO, mock servers); everything else is
    /// signed and transported over TLS.
    pub fn is_tls(&self) -> bool {
        self.endpoint_url.scheme() != "http"
    }

    pub fn host(&self) -> &str {
        self.endpoint_url.host_str().unwrap_or("")
    }

    pub fn port(&self) -> u16 {
        self.endpoint_url
            .port_or_known_default()
            .unwrap_or(if self.is_tls() { 443 } else { 80 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_inferred_from_scheme() {
        let https = Credentials::new("a", "b", "us-east-1", Url::parse("https://s3.amazonaws.com").unwrap());
        assert!(https.is_tls());
        let http = Credentials::new("a", "b", "us-east-1", Url::parse("http://localhost:9000").unwrap());
        assert!(!http.is_tls());
        assert_eq!(http.port(), 9000);
    }
}
