use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use demo_client::{diag, BodyCapture, Dispatcher, Target};

/// Fetch one or more URLs concurrently, or stream one generated upload.
#[derive(Debug, Parser)]
#[command(name = "demo-client")]
struct Args {
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// Record body sizes only, don't print the data.
    #[arg(short, long)]
    quiet: bool,

    /// TLS key log file, for external decryption tooling.
    #[arg(long, value_name = "FILE")]
    keylog: Option<PathBuf>,

    /// Skip certificate verification.
    #[arg(long)]
    insecure: bool,

    /// Write a per-run trace file in the current directory.
    #[arg(long)]
    qlog: bool,

    /// Post a generated payload; arguments become `<url> <size-in-MB>`.
    #[arg(short, long)]
    post: bool,

    /// Per-request deadline in seconds. No deadline when omitted.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// URLs to fetch (exactly one URL plus a size with --post).
    #[arg(required = true)]
    urls: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    // The key log travels through the environment, so it must be exported
    // here, before the runtime spawns worker threads that may read it.
    if let Some(path) = &args.keylog {
        diag::init_key_log(path)
            .with_context(|| format!("cannot create key log file {}", path.display()))?;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?
        .block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(args.insecure)
        .build()
        .context("failed to build HTTP client")?;

    let capture = if args.quiet {
        BodyCapture::Count
    } else {
        BodyCapture::Full
    };
    let dispatcher = Dispatcher::new(client, capture, args.timeout_secs.map(Duration::from_secs));

    let records = if args.post {
        let (url, size) = match args.urls.as_slice() {
            [url, size] => (url.as_str(), size.as_str()),
            _ => bail!("post mode expects exactly <url> <size-in-MB>"),
        };
        let mebibytes: u64 = size
            .parse()
            .with_context(|| format!("invalid size '{size}', expected an integer number of MB"))?;
        vec![dispatcher.post_generated(url, mebibytes).await]
    } else {
        let targets = args.urls.iter().map(Target::get).collect();
        dispatcher.fetch_all(targets).await
    };

    let mut failures = 0usize;
    for record in &records {
        match &record.outcome {
            Ok(body) => match &body.body {
                Some(bytes) => {
                    tracing::info!(url = %record.target.url, "response body:");
                    tracing::info!("{}", String::from_utf8_lossy(bytes));
                }
                None => {
                    tracing::info!(url = %record.target.url, bytes = body.len, "response body drained");
                }
            },
            Err(err) => {
                failures += 1;
                tracing::error!(url = %record.target.url, error = %err, "request failed");
            }
        }
    }

    if args.qlog {
        let trace = diag::RunTrace::from_records(&records);
        let path = trace.write().context("failed to write run trace")?;
        tracing::info!(path = %path.display(), "wrote run trace");
    }

    if failures > 0 {
        bail!("{failures} of {} request(s) failed", records.len());
    }
    Ok(())
}
