//! notiq: line-driven front end for the notification queue.
//! Each stdin line is enqueued; the queue commits on its timer and the
//! shared arbiter renders to stdout.

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use notiq_core::{FilterSet, Reachability};
use notiq_queue::{BatchQueue, PresentationArbiter, WatchOracle};

mod cli;
mod config;
mod console;

use console::{ConsolePresenter, Input};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("NOTIQ_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = config::NotiqConfig::resolve(&args)?;
    run(config, args.offline, args.json).await
}

async fn run(config: config::NotiqConfig, offline: bool, json: bool) -> anyhow::Result<()> {
    let arbiter = PresentationArbiter::init_shared(
        Arc::new(ConsolePresenter::new(json)),
        config.arbiter.clone(),
    );
    arbiter.set_filter_out_messages(config.filter_out_messages.clone());

    let initial = if offline {
        Reachability::Unreachable
    } else {
        Reachability::Reachable
    };
    let oracle = Arc::new(WatchOracle::new(initial));
    arbiter.set_reachability(&oracle);
    let watcher = arbiter.watch_reachability(oracle.subscribe());

    let queue = Arc::new(BatchQueue::with_config(
        Arc::clone(&arbiter),
        FilterSet::from_signatures(config.filters.iter().cloned()),
        config.queue.clone(),
    ));

    tracing::info!(
        interval_ms = config.queue.despatch_interval_ms,
        %initial,
        "notiq started, reading stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                None
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match console::parse_line(&line) {
            Input::Message(message) => queue.add_message(message),
            Input::Alert { alert, modal } => queue.add_alert(alert, modal),
            Input::Error(error) => queue.add_error(error),
            Input::ParseError(error) => queue.add_parse_error(error),
            Input::Commit => {
                // A modal wait inside the commit must not block /dismiss.
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let report = queue.commit().await;
                    tracing::debug!(?report, "explicit commit finished");
                });
            }
            Input::Dismiss => arbiter.dismiss_modal(),
            Input::Online => oracle.set(Reachability::Reachable),
            Input::Offline => oracle.set(Reachability::Unreachable),
            Input::Stats => {
                println!("{}", serde_json::to_string(&arbiter.stats())?);
            }
            Input::Quit => break,
            Input::Unknown(cmd) => tracing::warn!(command = %cmd, "unknown command"),
        }
    }

    let report = queue.commit().await;
    watcher.abort();
    tracing::info!(
        shown = report.shown,
        deferred_left = arbiter.deferred_len(),
        "notiq stopped"
    );
    Ok(())
}
