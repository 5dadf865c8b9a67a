//! HTTP/SSE transport for the streaming analyze endpoint
//!
//! [`HttpStreamTransport`] `POST`s `{"question": "..."}` to the configured
//! stream URL and decodes the `text/event-stream` response body into
//! [`StreamEvent`]s.
//!
//! # Event mapping
//!
//! | SSE event                         | Result                          |
//! |-----------------------------------|---------------------------------|
//! | default / `message` / `token`     | `Token(data)` (empty skipped)   |
//! | `data: [DONE]` or `event: done`   | `Complete`                      |
//! | `event: error`                    | `Error(data)`                   |
//! | `event: query_type`               | `QueryType(data)`               |
//! | `event: ping` or `data: [PING]`   | ignored                         |
//! | any other `event:` name           | ignored                         |
//!
//! A body that ends without `done`, a chunk read failure, invalid UTF-8 and
//! an elapsed idle deadline all surface as a terminal `Error`. Fragments
//! already delivered stay delivered.

use std::ops::ControlFlow;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Result, RaidscopeError};
use crate::transport::{EventSink, StreamEvent, StreamTransport, TokenStream};

/// Longest slice of an error response body kept in diagnostics.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 200;

/// Largest undelimited event the decoder will buffer.
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Request body shared by the streaming and non-streaming analyze endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest<'a> {
    /// The user's question
    pub question: &'a str,
}

/// Streaming transport backed by `reqwest`.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use url::Url;
/// use raidscope::transport::http::HttpStreamTransport;
///
/// let transport = HttpStreamTransport::new(
///     Url::parse("http://localhost:8000/api/analyze/stream").unwrap(),
///     Duration::from_secs(10),
///     Some(Duration::from_secs(120)),
/// )
/// .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct HttpStreamTransport {
    http_client: reqwest::Client,
    endpoint: Url,
    idle_timeout: Option<Duration>,
}

impl HttpStreamTransport {
    /// Build a transport targeting `endpoint`.
    ///
    /// No whole-request timeout is set: answers may legitimately stream for
    /// minutes. Silence is bounded by `idle_timeout` instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        endpoint: Url,
        connect_timeout: Duration,
        idle_timeout: Option<Duration>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(RaidscopeError::Request)?;

        Ok(Self {
            http_client,
            endpoint,
            idle_timeout,
        })
    }

    /// Build a transport from the `api` configuration section.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        Self::new(api.stream_url()?, api.connect_timeout(), api.idle_timeout())
    }

    /// The stream endpoint this transport posts to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl StreamTransport for HttpStreamTransport {
    fn open(&self, question: &str) -> TokenStream {
        let request = self
            .http_client
            .post(self.endpoint.clone())
            .header(ACCEPT, "text/event-stream")
            .json(&AnalyzeRequest { question });
        let idle_timeout = self.idle_timeout;
        let endpoint = self.endpoint.clone();

        tracing::debug!(endpoint = %endpoint, "Opening analyze stream");

        TokenStream::spawn(move |sink| async move {
            if let Err(e) = stream_answer(request, idle_timeout, &sink).await {
                tracing::warn!(endpoint = %endpoint, "Analyze stream failed: {}", e);
                sink.error(e.to_string());
            }
        })
    }
}

/// Send the request and pump its body into `sink`.
///
/// Returns `Ok` once a terminal event has been emitted (or the consumer went
/// away); returns `Err` for failures the caller should report as the
/// terminal event.
async fn stream_answer(
    request: reqwest::RequestBuilder,
    idle_timeout: Option<Duration>,
    sink: &EventSink,
) -> std::result::Result<(), RaidscopeError> {
    let response = with_idle_deadline(idle_timeout, request.send())
        .await?
        .map_err(|e| RaidscopeError::Transport(describe_request_error(&e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = with_idle_deadline(idle_timeout, response.text())
            .await?
            .unwrap_or_default();
        return Err(RaidscopeError::Http {
            status: status.as_u16(),
            body: truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS),
        });
    }

    if let Some(content_type) = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        if !content_type.contains("text/event-stream") {
            tracing::debug!(
                content_type,
                "Analyze stream has unexpected content type, decoding as SSE anyway"
            );
        }
    }

    parse_sse_stream(response.bytes_stream(), idle_timeout, sink).await
}

async fn with_idle_deadline<F: std::future::Future>(
    idle_timeout: Option<Duration>,
    fut: F,
) -> std::result::Result<F::Output, RaidscopeError> {
    match idle_timeout {
        Some(deadline) => tokio::time::timeout(deadline, fut)
            .await
            .map_err(|_| RaidscopeError::IdleTimeout(deadline.as_secs())),
        None => Ok(fut.await),
    }
}

fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_connect() {
        format!("could not connect to the analysis service ({})", error)
    } else if error.is_timeout() {
        format!("request timed out ({})", error)
    } else {
        error.to_string()
    }
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// SSE parser
// ---------------------------------------------------------------------------

/// Decode an SSE byte stream and forward the resulting events to `sink`.
///
/// Bytes are buffered across chunks so multi-byte characters and events may
/// be split anywhere. Returns `Ok` once a terminal event was emitted or the
/// consumer stopped listening.
///
/// # Errors
///
/// - [`RaidscopeError::Transport`] when a chunk read fails
/// - [`RaidscopeError::Framing`] on invalid UTF-8 or when the body ends
///   without a terminal event
/// - [`RaidscopeError::IdleTimeout`] when no chunk arrives within
///   `idle_timeout`
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    idle_timeout: Option<Duration>,
    sink: &EventSink,
) -> std::result::Result<(), RaidscopeError> {
    let mut decoder = SseDecoder::default();

    tokio::pin!(byte_stream);

    loop {
        let next = with_idle_deadline(idle_timeout, byte_stream.next()).await?;
        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                return Err(RaidscopeError::Transport(format!(
                    "connection lost while streaming: {}",
                    e
                )))
            }
            None => break,
        };

        for frame in decoder.push(&chunk)? {
            if dispatch_frame(frame, sink).is_break() {
                return Ok(());
            }
        }
    }

    if let Some(frame) = decoder.finish()? {
        if dispatch_frame(frame, sink).is_break() {
            return Ok(());
        }
    }

    Err(RaidscopeError::Framing(
        "stream ended before completion".to_string(),
    ))
}

fn dispatch_frame(frame: SseFrame, sink: &EventSink) -> ControlFlow<()> {
    let Some(event) = frame.into_event() else {
        return ControlFlow::Continue(());
    };
    let terminal = event.is_terminal();

    if !sink.emit(event) || terminal {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

/// One decoded SSE event block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// Value of the `id:` field, if any
    pub id: Option<String>,
}

impl SseFrame {
    /// Parse the text between two blank-line delimiters.
    ///
    /// # Examples
    ///
    /// ```
    /// use raidscope::transport::http::SseFrame;
    ///
    /// let frame = SseFrame::parse("event: token\ndata:  world");
    /// assert_eq!(frame.event.as_deref(), Some("token"));
    /// // Only the single separator space is stripped.
    /// assert_eq!(frame.data, " world");
    /// ```
    pub fn parse(block: &str) -> Self {
        let mut frame = SseFrame::default();
        let mut data_lines: Vec<&str> = Vec::new();

        for line in block.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "data" => data_lines.push(value),
                "event" => frame.event = Some(value.trim().to_string()),
                "id" => frame.id = Some(value.to_string()),
                // Reconnection is not attempted, so `retry` carries no meaning.
                "retry" => {}
                _ => {}
            }
        }

        frame.data = data_lines.join("\n");
        frame
    }

    /// Map the frame onto a stream event; `None` for frames to skip.
    pub fn into_event(self) -> Option<StreamEvent> {
        let kind = self
            .event
            .as_deref()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match kind.as_str() {
            "ping" => None,
            "done" => Some(StreamEvent::Complete),
            "error" => {
                let message = self.data.trim();
                Some(StreamEvent::Error(if message.is_empty() {
                    "stream reported an error".to_string()
                } else {
                    message.to_string()
                }))
            }
            "query_type" => {
                let tag = self.data.trim();
                (!tag.is_empty()).then(|| StreamEvent::QueryType(tag.to_string()))
            }
            "" | "message" | "token" => {
                if self.data.eq_ignore_ascii_case("[done]") {
                    Some(StreamEvent::Complete)
                } else if self.data.eq_ignore_ascii_case("[ping]") || self.data.is_empty() {
                    None
                } else {
                    Some(StreamEvent::Token(self.data))
                }
            }
            other => {
                tracing::debug!(event = other, "Skipping unrecognised stream event");
                None
            }
        }
    }
}

/// Incremental splitter from raw bytes to [`SseFrame`]s.
///
/// Each byte is scanned for a delimiter once; only the last three bytes of
/// an unfinished buffer are revisited, since a delimiter may straddle two
/// chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    scan_from: usize,
}

impl SseDecoder {
    /// Feed a chunk and return every event block it completed.
    ///
    /// # Errors
    ///
    /// Returns [`RaidscopeError::Framing`] if a completed block is not UTF-8
    /// or an unfinished event grows beyond [`MAX_EVENT_BYTES`].
    pub fn push(&mut self, chunk: &[u8]) -> std::result::Result<Vec<SseFrame>, RaidscopeError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some((end, delimiter_len)) =
            find_event_boundary(&self.buffer, self.scan_from.max(consumed))
        {
            frames.push(SseFrame::parse(decode_block(&self.buffer[consumed..end])?));
            consumed = end + delimiter_len;
        }

        self.buffer.drain(..consumed);
        self.scan_from = self.buffer.len().saturating_sub(3);

        if self.buffer.len() > MAX_EVENT_BYTES {
            self.buffer.clear();
            self.scan_from = 0;
            return Err(RaidscopeError::Framing("event too large".to_string()));
        }
        Ok(frames)
    }

    /// Flush a trailing block left without its blank-line delimiter.
    pub fn finish(&mut self) -> std::result::Result<Option<SseFrame>, RaidscopeError> {
        self.scan_from = 0;
        if self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
            self.buffer.clear();
            return Ok(None);
        }
        let block = std::mem::take(&mut self.buffer);
        Ok(Some(SseFrame::parse(decode_block(&block)?)))
    }

    /// Bytes held for an event that is not complete yet.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_block(block: &[u8]) -> std::result::Result<&str, RaidscopeError> {
    std::str::from_utf8(block)
        .map_err(|e| RaidscopeError::Framing(format!("invalid UTF-8 in event: {}", e)))
}

/// Position of the first blank line at or after `from`, with the length of
/// its delimiter.
fn find_event_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buffer.len()).find_map(|i| {
        let rest = &buffer[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}
