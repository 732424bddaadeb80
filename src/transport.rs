//! A tagged-union transport stream (plain TCP or TLS) and the HTTP/1.1
//! connection built on top of it (§4.3, §9).
//!
//! [`Stream`] hides the TCP/TLS distinction behind a uniform
//! `AsyncRead`/`AsyncWrite` so everything above it — `hyper`'s HTTP/1.1
//! framing, and above that the Listing Client — never branches on it. This
//! is the direct Rust counterpart of the boost::beast tagged-union stream
//! the original implementation uses for the same purpose.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::client::conn::http1::{self, SendRequest};
use hyper::{Request, Response};
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::{client::TlsStream, TlsConnector};
use tracing::debug;

use crate::error::S3Error;

/// Deadline covering DNS-to-handshake-complete, per §5.
const CONNECT_DEADLINE: Duration = Duration::from_secs(300);

pub enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A single HTTP/1.1 connection, with its driving task already spawned.
pub struct Connection {
    sender: SendRequest<hyper::Body>,
}

impl Connection {
    /// DNS resolution is the caller's job (via [`crate::resolver::EndpointResolver`]);
    /// this performs TCP connect, optional TLS handshake with SNI, and the
    /// HTTP/1.1 handshake, all under one 300-second deadline.
    pub async fn connect(addrs: &[SocketAddr], host: &str, tls: bool) -> Result<Self, S3Error> {
        timeout(CONNECT_DEADLINE, Self::connect_inner(addrs, host, tls))
            .await
            .map_err(|_| S3Error::Transport("connect deadline exceeded".to_string()))?
    }

    async fn connect_inner(addrs: &[SocketAddr], host: &str, tls: bool) -> Result<Self, S3Error> {
        let tcp = connect_tcp(addrs).await?;
        let io: Stream = if tls {
            Stream::Tls(Box::new(connect_tls(tcp, host).await?))
        } else {
            Stream::Plain(tcp)
        };
        let (sender, conn) = http1::handshake(io)
            .await
            .map_err(|err| S3Error::Transport(err.to_string()))?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!(%err, "connection task ended");
            }
        });
        Ok(Self { sender })
    }

    pub async fn send(&mut self, req: Request<hyper::Body>) -> Result<Response<hyper::Body>, S3Error> {
        self.sender
            .send_request(req)
            .await
            .map_err(|err| S3Error::Transport(err.to_string()))
    }
}

async fn connect_tcp(addrs: &[SocketAddr]) -> Result<TcpStream, S3Error> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err.to_string()),
        }
    }
    Err(S3Error::Transport(
        last_err.unwrap_or_else(|| "no resolved addresses to connect to".to_string()),
    ))
}

async fn connect_tls(tcp: TcpStream, host: &str) -> Result<TlsStream<TcpStream>, S3Error> {
    let mut roots = RootCertStore::empty();
    roots.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
    }));
    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(host)
        .map_err(|_| S3Error::Transport(format!("invalid DNS name for SNI: {host:?}")))?;
    connector
        .connect(server_name, tcp)
        .await
        .map_err(|err| S3Error::Transport(err.to_string()))
}
