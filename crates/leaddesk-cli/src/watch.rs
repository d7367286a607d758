//! Terminal front end for the live lead feed.
//!
//! `r` + Enter retries the live subscription, a bare Enter refreshes once,
//! `q` + Enter (or Ctrl-C) exits.

use std::sync::Arc;

use leaddesk_feed::{FeedState, FeedStatus, HttpLeadFeed, LiveFeed};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchInput {
    RetryLive,
    Refresh,
    Quit,
    Unknown,
}

pub(crate) fn parse_input(line: &str) -> WatchInput {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => WatchInput::Refresh,
        "r" | "retry" => WatchInput::RetryLive,
        "q" | "quit" | "exit" => WatchInput::Quit,
        _ => WatchInput::Unknown,
    }
}

pub(crate) fn render_status(status: &FeedStatus) -> String {
    let mut line = format!("[{}] {} leads", status.state, status.leads.len());
    if let Some(top) = status.leads.first() {
        line.push_str(&format!(
            " | latest: {} {} score {}",
            top.display_name(),
            top.phone,
            top.lead_score.map_or_else(|| "-".to_string(), |s| s.to_string()),
        ));
    }
    if status.state == FeedState::DegradedPolling {
        if let Some(error) = &status.last_error {
            line.push_str(&format!(" | error: {error}"));
        }
    }
    line
}

pub(crate) async fn run_watch(url: &str) -> anyhow::Result<()> {
    let source = HttpLeadFeed::new(url)?;
    let feed = LiveFeed::spawn(Arc::new(source));
    let mut status = feed.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("watching {url} (r = retry live, Enter = refresh, q = quit)");
    println!("{}", render_status(&status.borrow_and_update()));

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    anyhow::bail!("feed driver stopped");
                }
                println!("{}", render_status(&status.borrow_and_update()));
            }
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(()) };
                match parse_input(&line) {
                    WatchInput::RetryLive => feed.retry_live().await?,
                    WatchInput::Refresh => feed.refresh().await?,
                    WatchInput::Quit => return Ok(()),
                    WatchInput::Unknown => println!("unknown input {line:?}; use r, Enter or q"),
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
