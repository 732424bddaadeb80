//! Error taxonomy for the crawler, grounded in §7 of the specification.

use thiserror::Error;

/// The specific way a `ListBucketResult` document failed to parse (§4.2, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The XML document has no `ListBucketResult` root element.
    RootMissing,
    /// A field carried a value outside its known enum domain
    /// (`StorageClass`, `ChecksumAlgorithm`, `ChecksumType`).
    UnknownEnum(String),
    /// `IsTruncated` was present but was neither `"true"` nor `"false"`.
    InvalidBool(String),
    /// The response was truncated but did not carry the expected
    /// continuation cursor (`NextMarker` / `NextContinuationToken`).
    MissingContinuation,
    /// The document was not well-formed XML at all.
    Malformed(String),
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootMissing => write!(f, "missing ListBucketResult root"),
            Self::UnknownEnum(v) => write!(f, "unrecognized enum value {v:?}"),
            Self::InvalidBool(v) => write!(f, "invalid boolean value {v:?}"),
            Self::MissingContinuation => write!(f, "truncated response missing continuation token"),
            Self::Malformed(msg) => write!(f, "malformed XML: {msg}"),
        }
    }
}

/// Top-level error type threaded through signing, listing, and transport.
#[derive(Debug, Error)]
pub enum S3Error {
    /// DNS failure, connect failure, TLS failure, I/O error, or a non-2xx
    /// HTTP status. Retried up to 5x per page by the Worker (§7).
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed XML, missing root, unknown enum, malformed boolean, or a
    /// missing continuation token. Never retried (§7).
    #[error("parse error: {0}")]
    Parse(ParseErrorKind),

    /// A response echoed its own input token back as the next cursor.
    #[error("protocol anomaly: repeated pagination token for prefix {0:?}")]
    RepeatedToken(Option<String>),

    #[error("invalid HMAC key length")]
    InvalidKeyLength(#[from] hmac::digest::InvalidLength),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Header(#[from] hyper::http::header::ToStrError),

    #[error(transparent)]
    InvalidHeaderValue(#[from] hyper::http::header::InvalidHeaderValue),

    #[error(transparent)]
    Time(#[from] time::error::Format),

    #[error("unknown API version {0:?} (expected \"v1\" or \"v2\")")]
    UnknownApiVersion(String),

    #[error("unknown output format {0:?} (expected \"plain\" or \"json\")")]
    UnknownOutputFormat(String),
}

impl From<ParseErrorKind> for S3Error {
    fn from(kind: ParseErrorKind) -> Self {
        S3Error::Parse(kind)
    }
}
