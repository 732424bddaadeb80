//! The Output Writer: a lock-free buffer queue drained on a tick (§4.7, C7).
//!
//! Workers format each page's objects into one byte buffer and push it here
//! without blocking; a single task drains the queue every 10ms and writes
//! whatever has accumulated to the sink. This keeps the hot listing path
//! free of any lock contention on the actual output stream.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_queue::SegQueue;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::time;
use tracing::{error, warn};

use crate::error::S3Error;
use crate::xml::{Owner, RestoreStatus, Object};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Result<Self, S3Error> {
        match raw {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(S3Error::UnknownOutputFormat(other.to_string())),
        }
    }
}

#[derive(Serialize)]
struct JsonObject<'a> {
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum_algorithm: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<&'a Owner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restore_status: Option<&'a RestoreStatus>,
}

/// Format a page's objects into one buffer, one object per line. An object
/// missing its key is skipped with a warning rather than written blank or
/// aborting the whole page (§4.7 edge case).
pub fn format_objects(objects: &[Object], format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Plain => {
            let mut buf = Vec::new();
            for obj in objects {
                match &obj.key {
                    Some(key) => {
                        buf.extend_from_slice(key.as_bytes());
                        buf.push(b'\n');
                    }
                    None => warn!("skipping object with no key"),
                }
            }
            buf
        }
        OutputFormat::Json => {
            let mut buf = Vec::new();
            for obj in objects {
                let Some(key) = obj.key.as_deref() else {
                    warn!("skipping object with no key");
                    continue;
                };
                let json_obj = JsonObject {
                    key,
                    etag: obj.etag.as_deref(),
                    size: obj.size,
                    last_modified: obj.last_modified.as_deref(),
                    storage_class: obj.storage_class.map(|s| s.as_str()),
                    checksum_algorithm: obj.checksum_algorithm.map(|c| c.as_str()),
                    checksum_type: obj.checksum_type.map(|c| c.as_str()),
                    owner: obj.owner.as_ref(),
                    restore_status: obj.restore_status.as_ref(),
                };
                if let Ok(mut line) = serde_json::to_vec(&json_obj) {
                    buf.append(&mut line);
                    buf.push(b'\n');
                }
            }
            buf
        }
    }
}

#[derive(Default)]
pub struct OutputWriter {
    queue: SegQueue<Vec<u8>>,
}

impl OutputWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, buffer: Vec<u8>) {
        if !buffer.is_empty() {
            self.queue.push(buffer);
        }
    }

    /// Drains on a 10ms tick until `shutdown` resolves, then drains once
    /// more so nothing buffered is lost.
    pub async fn run<W: AsyncWrite + Unpin>(&self, mut sink: W, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = time::interval(Duration::from_millis(10));
        loop {
            tokio::select! {
                _ = ticker.tick() => self.drain(&mut sink).await,
                _ = &mut shutdown => {
                    self.drain(&mut sink).await;
                    break;
                }
            }
        }
    }

    async fn drain<W: AsyncWrite + Unpin>(&self, sink: &mut W) {
        let mut wrote_any = false;
        while let Some(buf) = self.queue.pop() {
            if let Err(err) = sink.write_all(&buf).await {
                error!(%err, "output sink write failed");
                return;
            }
            wrote_any = true;
        }
        if wrote_any {
            if let Err(err) = sink.flush().await {
                error!(%err, "output sink flush failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::StorageClass;

    fn object(key: &str) -> Object {
        Object {
            key: Some(key.to_string()),
            etag: None,
            size: Some(10),
            last_modified: None,
            storage_class: Some(StorageClass::Standard),
            checksum_algorithm: None,
            checksum_type: None,
            owner: None,
            restore_status: None,
        }
    }

    fn keyless_object() -> Object {
        Object {
            key: None,
            etag: None,
            size: None,
            last_modified: None,
            storage_class: None,
            checksum_algorithm: None,
            checksum_type: None,
            owner: None,
            restore_status: None,
        }
    }

    #[test]
    fn plain_format_is_one_key_per_line() {
        let objects = vec![object("a"), object("b/c")];
        let buf = format_objects(&objects, OutputFormat::Plain);
        assert_eq!(String::from_utf8(buf).unwrap(), "a\nb/c\n");
    }

    #[test]
    fn plain_format_skips_objects_with_no_key() {
        let objects = vec![object("a"), keyless_object(), object("b")];
        let buf = format_objects(&objects, OutputFormat::Plain);
        assert_eq!(String::from_utf8(buf).unwrap(), "a\nb\n");
    }

    #[test]
    fn json_format_skips_objects_with_no_key() {
        let objects = vec![keyless_object(), object("a")];
        let buf = format_objects(&objects, OutputFormat::Json);
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("\"key\":\"a\""));
    }

    #[test]
    fn json_format_omits_null_fields() {
        let objects = vec![object("a")];
        let buf = format_objects(&objects, OutputFormat::Json);
        let line = String::from_utf8(buf).unwrap();
        assert!(line.contains("\"key\":\"a\""));
        assert!(line.contains("\"storage_class\":\"STANDARD\""));
        assert!(!line.contains("etag"));
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        assert!(OutputFormat::parse("yaml").is_err());
    }
}
