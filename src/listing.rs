//! The Listing Client: one signed `ListObjects`/`ListObjectsV2` round trip
//! (§4.2, C1/C2).
//!
//! Composes [`crate::signing`], [`crate::transport`] and [`crate::xml`]. It
//! performs no retries of its own — that policy belongs to the Worker
//! (§4.5) — and surfaces transport failures and parse failures as distinct
//! [`S3Error`] variants so the caller can apply exactly that policy.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::http::{HeaderMap, Method, Request};
use hyper::Body;
use time::OffsetDateTime;

use crate::credentials::Credentials;
use crate::error::S3Error;
use crate::resolver::EndpointResolver;
use crate::signing::{self, uri_encode_path, uri_encode_query};
use crate::transport::Connection;
use crate::xml::{self, ListingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub fn parse(raw: &str) -> Result<Self, S3Error> {
        match raw {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(S3Error::UnknownApiVersion(other.to_string())),
        }
    }
}

/// One page's worth of request parameters. `continuation_token` doubles as
/// v1's `marker` and v2's `continuation-token`, since a Worker only ever
/// tracks one cursor at a time regardless of API version (§4.5).
#[derive(Debug, Clone)]
pub struct ListParams {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: Option<u32>,
    pub continuation_token: Option<String>,
    pub encoding_type_url: bool,
    pub fetch_owner: bool,
    pub start_after: Option<String>,
}

impl ListParams {
    pub fn root(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: String::new(),
            delimiter: Some("/".to_string()),
            max_keys: None,
            continuation_token: None,
            encoding_type_url: false,
            fetch_owner: false,
            start_after: None,
        }
    }
}

/// Abstraction over "issue one signed listing request", so the Worker's
/// retry/pagination/abandonment logic (§4.5) can be driven by a fake in
/// tests instead of a live server.
#[async_trait]
pub trait Lister: Send + Sync {
    async fn list(&self, version: ApiVersion, params: &ListParams) -> Result<ListingResult, S3Error>;
}

pub struct ListingClient {
    credentials: Arc<Credentials>,
    resolver: Arc<EndpointResolver>,
}

impl ListingClient {
    pub fn new(credentials: Arc<Credentials>, resolver: Arc<EndpointResolver>) -> Self {
        Self { credentials, resolver }
    }
}

#[async_trait]
impl Lister for ListingClient {
    async fn list(&self, version: ApiVersion, params: &ListParams) -> Result<ListingResult, S3Error> {
        let query = match version {
            ApiVersion::V2 => build_query_v2(params),
            ApiVersion::V1 => build_query_v1(params),
        };
        let path = format!("/{}", uri_encode_path(&params.bucket));
        let target = if query.is_empty() {
            path.clone()
        } else {
            format!("{path}?{query}")
        };

        let mut headers = HeaderMap::new();
        let now = OffsetDateTime::now_utc();
        signing::sign_request("GET", &path, &query, &mut headers, b"", &self.credentials, now)?;

        let mut builder = Request::builder().method(Method::GET).uri(&target);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(Body::empty())
            .map_err(|err| S3Error::Transport(err.to_string()))?;

        let addrs = self.resolver.resolve();
        let mut connection =
            Connection::connect(&addrs, self.credentials.host(), self.credentials.is_tls()).await?;
        let response = connection.send(request).await?;

        let status = response.status();
        let body_bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|err| S3Error::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(S3Error::Transport(format!("unexpected status {status}")));
        }
        let body = std::str::from_utf8(&body_bytes)?;
        match version {
            ApiVersion::V2 => xml::parse_list_objects_v2(body).map_err(S3Error::from),
            ApiVersion::V1 => xml::parse_list_objects_v1(body).map_err(S3Error::from),
        }
    }
}

fn build_query_v2(params: &ListParams) -> String {
    let mut parts = vec!["list-type=2".to_string()];
    if let Some(token) = &params.continuation_token {
        parts.push(format!("continuation-token={}", uri_encode_query(token)));
    }
    if let Some(delim) = &params.delimiter {
        parts.push(format!("delimiter={}", uri_encode_query(delim)));
    }
    if params.encoding_type_url {
        parts.push("encoding-type=url".to_string());
    }
    if params.fetch_owner {
        parts.push("fetch-owner=true".to_string());
    }
    if !params.prefix.is_empty() {
        parts.push(format!("prefix={}", encode_prefix(params)));
    }
    if let Some(start_after) = &params.start_after {
        parts.push(format!("start-after={}", uri_encode_query(start_after)));
    }
    if let Some(max_keys) = params.max_keys {
        parts.push(format!("max-keys={max_keys}"));
    }
    parts.join("&")
}

fn build_query_v1(params: &ListParams) -> String {
    let mut parts = vec![];
    if let Some(delim) = &params.delimiter {
        parts.push(format!("delimiter={}", uri_encode_query(delim)));
    }
    if params.encoding_type_url {
        parts.push("encoding-type=url".to_string());
    }
    if let Some(marker) = &params.continuation_token {
        parts.push(format!("marker={}", uri_encode_query(marker)));
    }
    if !params.prefix.is_empty() {
        parts.push(format!("prefix={}", encode_prefix(params)));
    }
    if let Some(max_keys) = params.max_keys {
        parts.push(format!("max-keys={max_keys}"));
    }
    parts.join("&")
}

/// `encoding_type=url` suppresses client-side percent-encoding of `prefix`
/// only (§9 Open Question 1): the server already treats `prefix` specially
/// under that mode, and double-encoding would corrupt the filter.
fn encode_prefix(params: &ListParams) -> String {
    if params.encoding_type_url {
        params.prefix.clone()
    } else {
        uri_encode_query(&params.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_query_order_matches_contract() {
        let params = ListParams {
            bucket: "b".into(),
            prefix: "a/b/".into(),
            delimiter: Some("/".into()),
            max_keys: Some(1000),
            continuation_token: Some("tok".into()),
            encoding_type_url: false,
            fetch_owner: true,
            start_after: Some("a/b/z".into()),
        };
        let query = build_query_v2(&params);
        assert_eq!(
            query,
            "list-type=2&continuation-token=tok&delimiter=%2F&fetch-owner=true&prefix=a%2Fb%2F&start-after=a%2Fb%2Fz&max-keys=1000"
        );
    }

    #[test]
    fn encoding_type_url_leaves_prefix_unencoded() {
        let mut params = ListParams::root("b");
        params.prefix = "a/b/".into();
        params.encoding_type_url = true;
        let query = build_query_v2(&params);
        assert!(query.contains("prefix=a/b/"));
        assert!(query.contains("encoding-type=url"));
    }

    #[test]
    fn api_version_parses_known_strings_only() {
        assert_eq!(ApiVersion::parse("v1").unwrap(), ApiVersion::V1);
        assert_eq!(ApiVersion::parse("v2").unwrap(), ApiVersion::V2);
        assert!(ApiVersion::parse("v3").is_err());
    }
}
