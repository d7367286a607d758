//! HTTP source: `GET /api/v1/leads` for pulls and the server-sent event
//! stream at `GET /api/v1/leads/stream` for the live subscription.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use leaddesk_core::{Contact, ContactChange};
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::error::FeedError;
use crate::source::{ChangeStream, FeedEvent, LeadFeedSource};

const USER_AGENT: &str = concat!("leaddesk-feed/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PULL_TIMEOUT: Duration = Duration::from_secs(15);
const PULL_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Clone)]
pub struct HttpLeadFeed {
    client: reqwest::Client,
    leads_url: String,
    stream_url: String,
}

impl HttpLeadFeed {
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidBaseUrl`] unless `base_url` is an
    /// `http(s)://` URL, or [`FeedError::Http`] if the client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, FeedError> {
        let base = base_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(FeedError::InvalidBaseUrl(base_url.to_string()));
        }

        // No overall timeout: the event stream stays open indefinitely.
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            leads_url: format!("{base}/api/v1/leads"),
            stream_url: format!("{base}/api/v1/leads/stream"),
        })
    }
}

#[async_trait]
impl LeadFeedSource for HttpLeadFeed {
    async fn subscribe(&self) -> Result<ChangeStream, FeedError> {
        let response = self
            .client
            .get(&self.stream_url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = check_status(response).await?;

        let bytes = Box::pin(response.bytes_stream());
        let events = futures::stream::unfold(
            (bytes, SseDecoder::default()),
            |(mut bytes, mut decoder)| async move {
                loop {
                    if let Some(frame) = decoder.next_frame() {
                        match decode_frame(&frame) {
                            Some(item) => return Some((item, (bytes, decoder))),
                            None => continue,
                        }
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => decoder.push(&chunk),
                        Some(Err(e)) => return Some((Err(FeedError::Http(e)), (bytes, decoder))),
                        None => return None,
                    }
                }
            },
        );
        Ok(events.boxed())
    }

    async fn fetch_leads(&self) -> Result<Vec<Contact>, FeedError> {
        let response = self
            .client
            .get(&self.leads_url)
            .query(&[("limit", PULL_LIMIT)])
            .timeout(PULL_TIMEOUT)
            .send()
            .await?;
        let response = check_status(response).await?;
        let envelope: Envelope<Vec<Contact>> = response.json().await?;
        Ok(envelope.data)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FeedError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FeedError::Status {
        status: status.as_u16(),
        body,
    })
}

fn decode_frame(frame: &SseFrame) -> Option<Result<FeedEvent, FeedError>> {
    match frame.event.as_deref() {
        Some("ready") => Some(
            serde_json::from_str::<Vec<Contact>>(&frame.data)
                .map(FeedEvent::Snapshot)
                .map_err(FeedError::from),
        ),
        Some("contact") => Some(
            serde_json::from_str::<ContactChange>(&frame.data)
                .map(FeedEvent::Change)
                .map_err(FeedError::from),
        ),
        other => {
            tracing::debug!(event = ?other, "ignoring unknown feed event");
            None
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct SseFrame {
    event: Option<String>,
    data: String,
}

/// Incremental `text/event-stream` framer. Frames end at a blank line;
/// comment lines and frames without `data` are skipped.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    fn next_frame(&mut self) -> Option<SseFrame> {
        loop {
            let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw[..end]);

            let mut frame = SseFrame::default();
            let mut has_data = false;
            for line in text.lines() {
                if line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                    None => (line, ""),
                };
                match field {
                    "event" => frame.event = Some(value.to_string()),
                    "data" => {
                        if has_data {
                            frame.data.push('\n');
                        }
                        frame.data.push_str(value);
                        has_data = true;
                    }
                    _ => {}
                }
            }
            if has_data {
                return Some(frame);
            }
        }
    }
}
