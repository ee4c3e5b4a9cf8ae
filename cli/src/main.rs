//! Snakepit CLI - fetch URLs with bounded concurrency.
//!
//! URLs come from the command line or, when none are given, from stdin one per
//! line. Stdin is read lazily on its own thread, so the input may be unbounded
//! and may arrive slowly (`tail -f urls | snakepit`). Each response is
//! printed as `status<TAB>url` the moment it settles; failures are printed as
//! `error<TAB>message`.
//!
//! ```text
//! main() -> config::load() + flags -> Pit::new(HttpTransport, urls) -> process()
//!                                                                       |
//!                                                                       v
//!                                                  stdout, in settlement order
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `info` filter) so
//! stdout stays machine-readable.

mod config;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures_util::stream::{self, BoxStream, StreamExt};
use snakepit_core::Pit;
use snakepit_transport::{HttpDescriptor, HttpTransport, get};
use snakepit_types::{ExecutionConfig, options};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Lines read ahead of the pool.
const STDIN_LINE_BUFFER: usize = 1;

#[derive(Debug, Parser)]
#[command(name = "snakepit", version)]
#[command(about = "Fetch URLs concurrently and print each response as it settles")]
struct Cli {
    /// URLs to fetch (read from stdin, one per line, when omitted)
    urls: Vec<String>,
    /// Config file to use instead of ~/.snakepit/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Maximum number of requests in flight
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,
    /// Total timeout per request, in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<f64>,
    /// Report failures and keep going instead of stopping at the first one
    #[arg(long)]
    keep_going: bool,
}

impl Cli {
    /// Options given on the command line, which win over the config file.
    fn overrides(&self) -> ExecutionConfig {
        let mut config = ExecutionConfig::new();
        if let Some(concurrency) = self.concurrency {
            config.insert(options::CONCURRENCY, concurrency);
        }
        if let Some(timeout) = self.timeout {
            config.insert(options::TIMEOUT, timeout);
        }
        if self.keep_going {
            config.insert(options::ON_ERROR, "continue");
        }
        config
    }

    fn source(self) -> Result<BoxStream<'static, HttpDescriptor>> {
        if self.urls.is_empty() {
            Ok(stdin_lines()?.map(|line| get(&line)).boxed())
        } else {
            Ok(stream::iter(self.urls).map(|url| get(&url)).boxed())
        }
    }
}

/// Non-blank, trimmed lines of stdin.
///
/// A blocking read would stall the driver, so a reader thread feeds a small
/// channel instead. The thread stops once the stream is dropped and another
/// line arrives.
fn stdin_lines() -> Result<BoxStream<'static, String>> {
    let (tx, rx) = mpsc::channel(STDIN_LINE_BUFFER);
    thread::Builder::new()
        .name("snakepit-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "Stopped reading stdin");
                        break;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if tx.blocking_send(line.to_string()).is_err() {
                    break;
                }
            }
        })
        .context("spawning stdin reader")?;

    Ok(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    })
    .boxed())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = config::load(cli.config.as_deref()).context("loading config")?;
    config.merge(cli.overrides());

    let transport = HttpTransport::from_config(&config)?;
    let mut pit = Pit::from_stream(transport, cli.source()?, config);
    let responses = pit.process()?;

    let mut stdout = io::stdout().lock();
    let mut failed = 0usize;
    for response in responses {
        match response {
            Ok(response) => {
                writeln!(stdout, "{}\t{}", response.status().as_u16(), response.url())?;
            }
            Err(e) => {
                failed += 1;
                tracing::debug!(error = ?e, "Request failed");
                writeln!(stdout, "error\t{e}")?;
            }
        }
    }
    stdout.flush()?;

    if failed > 0 {
        bail!("{failed} request(s) failed");
    }
    Ok(())
}
