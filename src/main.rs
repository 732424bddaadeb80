use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::fs::File;
use tokio::io::{stdout, AsyncWrite};
use url::Url;

use s3crawl::autoscaler::AutoscalerConfig;
use s3crawl::coordinator::{self, CoordinatorConfig};
use s3crawl::credentials::Credentials;
use s3crawl::listing::ApiVersion;
use s3crawl::writer::OutputFormat;

/// Enumerate every object in an S3-compatible bucket, as fast as the
/// server allows.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bucket to enumerate.
    #[arg(long)]
    bucket: String,

    /// Endpoint URL, e.g. `https://s3.us-east-1.amazonaws.com`.
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Signing region.
    #[arg(long)]
    region: Option<String>,

    /// Access key; falls back to `AWS_ACCESS_KEY_ID`.
    #[arg(long)]
    access_key: Option<String>,

    /// Secret key; falls back to `AWS_SECRET_ACCESS_KEY`.
    #[arg(long)]
    secret_key: Option<String>,

    /// `v1` or `v2`.
    #[arg(long, default_value = "v2")]
    api_version: String,

    /// `plain` or `json`.
    #[arg(long, default_value = "plain")]
    output_format: String,

    /// Output file; defaults to stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Delimiter used to discover common prefixes. Empty string disables
    /// prefix-tree traversal and lists the bucket flat.
    #[arg(long, default_value = "/")]
    delimiter: String,

    /// Request `encoding-type=url` and leave `prefix` unencoded on the wire
    /// to match (§9 Open Question 1).
    #[arg(long)]
    encoding_type_url: bool,

    /// Ask the server to include object owner information.
    #[arg(long)]
    fetch_owner: bool,

    /// How often the autoscaler recomputes the target worker count, in
    /// milliseconds.
    #[arg(long, default_value_t = 1000)]
    scaling_interval_ms: u64,

    /// Growth multiplier applied when workers are undersized relative to
    /// demand.
    #[arg(long, default_value_t = 1.2)]
    scale_up_factor: f64,

    /// Shrink multiplier applied when workers are oversized relative to
    /// demand.
    #[arg(long, default_value_t = 0.8)]
    scale_down_factor: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let access_key = args
        .access_key
        .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())
        .context("no access key: pass --access-key or set AWS_ACCESS_KEY_ID")?;
    let secret_key = args
        .secret_key
        .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok())
        .context("no secret key: pass --secret-key or set AWS_SECRET_ACCESS_KEY")?;
    let region = args
        .region
        .or_else(|| std::env::var("AWS_REGION").ok())
        .unwrap_or_else(|| "us-east-1".to_string());
    let endpoint_url = args
        .endpoint_url
        .or_else(|| std::env::var("AWS_ENDPOINT_URL").ok())
        .unwrap_or_else(|| format!("https://s3.{region}.amazonaws.com"));
    let endpoint_url = Url::parse(&endpoint_url).context("invalid endpoint URL")?;

    let credentials = Arc::new(Credentials::new(access_key, secret_key, region, endpoint_url));

    let api_version = ApiVersion::parse(&args.api_version)?;
    let output_format = OutputFormat::parse(&args.output_format)?;
    let delimiter = if args.delimiter.is_empty() {
        None
    } else {
        Some(args.delimiter)
    };

    let config = CoordinatorConfig {
        bucket: args.bucket.clone(),
        api_version,
        delimiter,
        encoding_type_url: args.encoding_type_url,
        fetch_owner: args.fetch_owner,
        output_format,
        autoscaler: AutoscalerConfig {
            interval: Duration::from_millis(args.scaling_interval_ms),
            scale_up_factor: args.scale_up_factor,
            scale_down_factor: args.scale_down_factor,
        },
    };

    let metrics = match args.output {
        Some(path) => {
            let file = File::create(&path)
                .await
                .with_context(|| format!("failed to create output file {}", path.display()))?;
            run_to_sink(credentials, config, file).await?
        }
        None => run_to_sink(credentials, config, stdout()).await?,
    };

    let snapshot = metrics.snapshot();
    tracing::info!(
        bucket = %args.bucket,
        total_ops = snapshot.total_ops,
        total_objects_found = snapshot.total_objects_found,
        "crawl complete"
    );

    Ok(())
}

async fn run_to_sink<W>(
    credentials: Arc<Credentials>,
    config: CoordinatorConfig,
    sink: W,
) -> anyhow::Result<Arc<s3crawl::metrics::Metrics>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    coordinator::run(credentials, config, sink)
        .await
        .context("crawl failed")
}
