//! The Worker: drains one prefix at a time from the Frontier to completion
//! (§4.5, C5).
//!
//! Each page is retried up to five times with a one-second backoff on
//! transport failure; a parse failure is never retried. A page that echoes
//! back its own input token as the next cursor is a protocol anomaly — the
//! prefix is abandoned (logged, not fatal) rather than looping forever.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::S3Error;
use crate::frontier::Frontier;
use crate::listing::{ApiVersion, ListParams, Lister};
use crate::metrics::Metrics;
use crate::writer::{format_objects, OutputFormat, OutputWriter};
use crate::xml::ListingResult;

const MAX_RETRIES: u32 = 5;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const EMPTY_FRONTIER_POLL: Duration = Duration::from_millis(100);

pub struct Worker {
    id: usize,
    bucket: String,
    api_version: ApiVersion,
    delimiter: Option<String>,
    encoding_type_url: bool,
    fetch_owner: bool,
    output_format: OutputFormat,
    client: Arc<dyn Lister>,
    frontier: Arc<Frontier>,
    writer: Arc<OutputWriter>,
    metrics: Arc<Metrics>,
}

#[allow(clippy::too_many_arguments)]
impl Worker {
    pub fn new(
        id: usize,
        bucket: String,
        api_version: ApiVersion,
        delimiter: Option<String>,
        encoding_type_url: bool,
        fetch_owner: bool,
        output_format: OutputFormat,
        client: Arc<dyn Lister>,
        frontier: Arc<Frontier>,
        writer: Arc<OutputWriter>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            id,
            bucket,
            api_version,
            delimiter,
            encoding_type_url,
            fetch_owner,
            output_format,
            client,
            frontier,
            writer,
            metrics,
        }
    }

    /// Drains prefixes until the whole crawl is done, or this worker is
    /// asked to step down by the Autoscaler (§4.5, §4.6).
    pub async fn run(self) {
        self.metrics.active_workers.fetch_add(1, Ordering::SeqCst);
        loop {
            if self.should_terminate_early() {
                debug!(worker = self.id, "stepping down: above target worker count");
                break;
            }
            match self.frontier.pop_one() {
                Some((depth, prefix)) => {
                    if let Err(err) = self.process_prefix(depth, prefix).await {
                        warn!(worker = self.id, %err, "abandoning prefix");
                    }
                }
                None => {
                    if self.is_done() {
                        break;
                    }
                    sleep(EMPTY_FRONTIER_POLL).await;
                }
            }
        }
        self.metrics.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    fn should_terminate_early(&self) -> bool {
        self.metrics.active_workers() > self.metrics.target_workers()
    }

    /// True once the frontier is empty and no other worker is mid-page —
    /// an in-flight page could still discover and push new children
    /// (§4.9).
    fn is_done(&self) -> bool {
        self.frontier.is_empty() && self.metrics.ops_in_flight.load(Ordering::SeqCst) == 0
    }

    async fn process_prefix(&self, depth: u32, prefix: String) -> Result<(), S3Error> {
        let mut token: Option<String> = None;
        loop {
            let params = ListParams {
                bucket: self.bucket.clone(),
                prefix: prefix.clone(),
                delimiter: self.delimiter.clone(),
                max_keys: None,
                continuation_token: token.clone(),
                encoding_type_url: self.encoding_type_url,
                fetch_owner: self.fetch_owner,
                start_after: None,
            };
            let result = self.list_one(&params).await?;

            self.write_objects(&result);
            if !result.common_prefixes.is_empty() {
                let batch = result.common_prefixes.iter().map(|cp| cp.prefix.clone()).collect();
                self.frontier.push(depth + 1, batch);
            }

            if !result.is_truncated {
                return Ok(());
            }
            let next = result.next_token().map(str::to_string);
            if next.is_some() && next == token {
                return Err(S3Error::RepeatedToken(next));
            }
            token = next;
        }
    }

    async fn list_one(&self, params: &ListParams) -> Result<ListingResult, S3Error> {
        self.metrics.ops_in_flight.fetch_add(1, Ordering::SeqCst);
        let outcome = self.list_one_with_retries(params).await;
        self.metrics.ops_in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn list_one_with_retries(&self, params: &ListParams) -> Result<ListingResult, S3Error> {
        let mut attempt = 0;
        loop {
            self.metrics.record_op();
            match self.client.list(self.api_version, params).await {
                Ok(result) => return Ok(result),
                Err(err @ S3Error::Parse(_)) => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        return Err(err);
                    }
                    warn!(worker = self.id, attempt, %err, "retrying listing request");
                    sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }

    fn write_objects(&self, result: &ListingResult) {
        if result.contents.is_empty() {
            return;
        }
        self.metrics.record_objects(result.contents.len() as u64);
        self.writer.push(format_objects(&result.contents, self.output_format));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::xml::{CommonPrefix, Object};

    /// Replays a fixed sequence of pages (or transport errors), one per
    /// call, regardless of the requested token — used to drive the
    /// pagination and retry/abandonment scenarios (S4/S5) without a server.
    struct ScriptedLister {
        pages: Mutex<Vec<Result<ListingResult, S3Error>>>,
    }

    #[async_trait]
    impl Lister for ScriptedLister {
        async fn list(&self, _version: ApiVersion, _params: &ListParams) -> Result<ListingResult, S3Error> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                panic!("script exhausted");
            }
            pages.remove(0)
        }
    }

    fn page(contents: Vec<Object>, truncated: bool, next: Option<&str>) -> ListingResult {
        ListingResult {
            common_prefixes: vec![],
            contents,
            is_truncated: truncated,
            next_marker: None,
            next_continuation_token: next.map(str::to_string),
        }
    }

    fn object(key: &str) -> Object {
        Object {
            key: Some(key.to_string()),
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

    fn test_worker(client: Arc<dyn Lister>) -> Worker {
        let metrics = Arc::new(Metrics::new());
        let frontier = Arc::new(Frontier::new(metrics.clone()));
        metrics.set_target_workers(1);
        Worker::new(
            0,
            "bucket".into(),
            ApiVersion::V2,
            Some("/".into()),
            false,
            false,
            OutputFormat::Plain,
            client,
            frontier,
            Arc::new(OutputWriter::new()),
            metrics,
        )
    }

    /// S4 — a truncated, then non-truncated page is fully drained.
    #[tokio::test]
    async fn pagination_drains_all_pages() {
        let lister = Arc::new(ScriptedLister {
            pages: Mutex::new(vec![
                Ok(page(vec![object("a")], true, Some("tok1"))),
                Ok(page(vec![object("b")], false, None)),
            ]),
        });
        let worker = test_worker(lister);
        worker.process_prefix(0, String::new()).await.unwrap();
        assert_eq!(worker.metrics.total_objects_found.load(Ordering::SeqCst), 2);
    }

    /// S5 — a page that echoes its own continuation token is abandoned,
    /// not looped on forever.
    #[tokio::test]
    async fn repeated_token_is_abandoned() {
        let lister = Arc::new(ScriptedLister {
            pages: Mutex::new(vec![
                Ok(page(vec![object("a")], true, Some("tok1"))),
                Ok(page(vec![object("b")], true, Some("tok1"))),
            ]),
        });
        let worker = test_worker(lister);
        let err = worker.process_prefix(0, String::new()).await.unwrap_err();
        assert!(matches!(err, S3Error::RepeatedToken(Some(tok)) if tok == "tok1"));
    }

    #[tokio::test]
    async fn parse_error_is_never_retried() {
        let lister = Arc::new(ScriptedLister {
            pages: Mutex::new(vec![Err(S3Error::Parse(crate::error::ParseErrorKind::RootMissing))]),
        });
        let worker = test_worker(lister);
        let err = worker.process_prefix(0, String::new()).await.unwrap_err();
        assert!(matches!(err, S3Error::Parse(_)));
    }

    #[tokio::test]
    async fn discovered_common_prefixes_are_pushed_one_level_deeper() {
        let lister = Arc::new(ScriptedLister {
            pages: Mutex::new(vec![Ok(ListingResult {
                common_prefixes: vec![
                    CommonPrefix { prefix: "a/b/".into() },
                    CommonPrefix { prefix: "a/c/".into() },
                ],
                contents: vec![],
                is_truncated: false,
                next_marker: None,
                next_continuation_token: None,
            })]),
        });
        let worker = test_worker(lister);
        worker.frontier.pop_one(); // drain the seeded root entry first
        worker.process_prefix(0, "a/".to_string()).await.unwrap();
        // both siblings from the one response were pushed as a single batch
        // entry, so the frontier's queue length rose by 2 from one push.
        assert_eq!(worker.metrics.queue_len(), 2);
        let (depth1, _) = worker.frontier.pop_one().unwrap();
        let (depth2, _) = worker.frontier.pop_one().unwrap();
        assert_eq!((depth1, depth2), (1, 1));
        assert!(worker.frontier.pop_one().is_none());
    }
}
