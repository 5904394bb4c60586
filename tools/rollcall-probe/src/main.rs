//! Command-line probe for the Rollcall offline worker.
//!
//! Runs a worker against the real network so a deployment config can be
//! checked before it ships.
//!
//! ## Usage
//!
//! ```bash
//! # Validate a config and print its cache generation
//! rollcall-probe check --config rollcall.json
//!
//! # Install and activate, downloading the app shell
//! rollcall-probe warm --config rollcall.json
//!
//! # Warm up, drop the network, then see what pages would get
//! rollcall-probe fetch --config rollcall.json --offline / /report.pdf
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use rollcall_common::{
    init_logging, LogConfig, LogFormat, OptionExt, ResultExt, RollcallError,
};
use rollcall_net::{Fetcher, HttpFetcher, LoaderConfig, NetError, Request, Response};
use rollcall_sw::{
    ControlReply, FetchDecision, OfflineWorker, WorkerConfig, WorkerEvent,
    OFFLINE_HEADER,
};
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "rollcall-probe")]
#[command(about = "Command-line probe for the Rollcall offline worker")]
struct Cli {
    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config and print the cache generation
    Check {
        /// Config file (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Install and activate, downloading the app shell
    Warm {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Warm up, then fetch URLs through the worker
    Fetch {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Drop the network after warming up
        #[arg(long)]
        offline: bool,
        /// Paths or absolute URLs to request
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

/// Network that can be switched off.
struct SwitchableFetcher {
    inner: HttpFetcher,
    online: AtomicBool,
}

impl SwitchableFetcher {
    fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for SwitchableFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(NetError::RequestFailed(format!("{}: network switched off", request.url)));
        }
        self.inner.fetch(request).await
    }
}

fn load_config(path: Option<&Path>) -> rollcall_common::Result<WorkerConfig> {
    let config = match path {
        Some(path) => WorkerConfig::from_path(path)
            .config_context(format!("loading {}", path.display()))?,
        None => {
            let config = WorkerConfig::default();
            config.validate()?;
            config
        }
    };
    Ok(config)
}

fn build_worker(
    config: WorkerConfig,
) -> anyhow::Result<(OfflineWorker, Arc<SwitchableFetcher>)> {
    let inner = HttpFetcher::new(LoaderConfig {
        origin: Some(config.origin.clone()),
        ..LoaderConfig::default()
    })
    .context("building HTTP client")?;
    let fetcher = Arc::new(SwitchableFetcher {
        inner,
        online: AtomicBool::new(true),
    });

    let (worker, mut events) =
        OfflineWorker::new(config, fetcher.clone()).map_err(RollcallError::from)?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Host event");
        }
    });
    Ok((worker, fetcher))
}

async fn warm(worker: &OfflineWorker) -> anyhow::Result<()> {
    let (install, activated) = worker.start().await.map_err(RollcallError::from)?;

    println!("Install:");
    println!("  Precached:   {}", install.precached);
    if let Some(failure) = &install.failure {
        println!("  Failure:     {failure}");
    }
    match activated {
        Some(report) => {
            println!("Activate:");
            println!("  Deleted:     {}", report.deleted.join(", "));
            println!("  Claimed:     {}", report.claimed);
        }
        None => println!("Waiting for activation"),
    }
    Ok(())
}

async fn check(worker: &OfflineWorker) -> anyhow::Result<()> {
    let (tx, rx) = oneshot::channel();
    worker
        .dispatch(WorkerEvent::Message {
            data: serde_json::json!({"type": "GET_VERSION"}),
            reply: Some(tx),
        })
        .await;
    let reply = rx.await.context("worker dropped the reply")?;
    let info = match reply {
        ControlReply::Version(info) => Some(info),
        ControlReply::Ack { .. } => None,
    }
    .ok_or_not_found("version reply")?;

    let config = worker.config();
    println!("Origin:   {}", config.origin);
    println!("Caches:   {}", config.managed_cache_names().join(", "));
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Where a response handed out by the worker came from.
fn response_source(response: &Response) -> &'static str {
    if response.from_cache {
        "cache"
    } else if response.header(OFFLINE_HEADER).is_some() {
        "fallback"
    } else {
        "network"
    }
}

async fn fetch(worker: &OfflineWorker, urls: &[String]) -> anyhow::Result<()> {
    for raw in urls {
        let url = worker
            .config()
            .resolve(raw)
            .map_err(RollcallError::from)?;
        let request = Request::get(url);

        match worker.handle_fetch(&request).await {
            FetchDecision::PassThrough => println!("{raw}: passed through"),
            FetchDecision::Respond(response) => println!(
                "{raw}: {} from {} ({} bytes)",
                response.status,
                response_source(&response),
                response.body.len()
            ),
        }
    }
    worker.settle().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    init_logging(log_config.with_format(cli.log_format));

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(config.as_deref())?;
            let (worker, _) = build_worker(config)?;
            check(&worker).await?;
        }

        Commands::Warm { config } => {
            let config = load_config(config.as_deref())?;
            let (worker, _) = build_worker(config)?;
            warm(&worker).await?;
            worker.settle().await;
        }

        Commands::Fetch {
            config,
            offline,
            urls,
        } => {
            let config = load_config(config.as_deref())?;
            let (worker, network) = build_worker(config)?;
            warm(&worker).await?;
            if offline {
                info!("Network switched off");
                network.go_offline();
            }
            fetch(&worker, &urls).await?;
        }
    }

    Ok(())
}
