use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use task_stream::{
    ConnectRequest, EventQuery, EventTransport, FrameStream, QueryError, StreamEvent,
    TransportError,
};

use crate::config::HttpConfig;
use crate::error::{parse_error_message, HttpError};
use crate::headers::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
use crate::sse::{FrameResult, SseFrameParser};
use crate::url::{events_url, stream_url};

/// SSE live stream plus JSON history query against one task event API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    http: Client,
    config: Arc<HttpConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventsBody {
    Wrapped { events: Vec<StreamEvent> },
    Bare(Vec<StreamEvent>),
}

impl EventsBody {
    fn into_events(self) -> Vec<StreamEvent> {
        match self {
            Self::Wrapped { events } | Self::Bare(events) => events,
        }
    }
}

impl HttpEventSource {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        let http = Client::builder().build().map_err(HttpError::from)?;
        Ok(Self::with_client(http, config))
    }

    /// Reuse an existing `reqwest` client, e.g. one with custom TLS roots.
    pub fn with_client(http: Client, config: HttpConfig) -> Self {
        Self {
            http,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn build_headers(&self, accept: &str) -> Result<HeaderMap, HttpError> {
        let headers = build_headers(&self.config, accept);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            let name =
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| HttpError::InvalidHeader {
                    name: key.clone(),
                    reason: "invalid header name",
                })?;
            let value = HeaderValue::from_str(&value).map_err(|_| HttpError::InvalidHeader {
                name: key.clone(),
                reason: "invalid header value",
            })?;
            out.insert(name, value);
        }
        Ok(out)
    }

    pub fn build_stream_request(
        &self,
        request: &ConnectRequest,
    ) -> Result<RequestBuilder, HttpError> {
        let url = stream_url(&self.config.base_url, request)?;
        let headers = self.build_headers(ACCEPT_EVENT_STREAM)?;
        Ok(self.http.get(url).headers(headers))
    }

    pub fn build_events_request(
        &self,
        task_id: &str,
        since_seq: u64,
        limit: u32,
    ) -> Result<RequestBuilder, HttpError> {
        let url = events_url(&self.config.base_url, task_id, since_seq, limit)?;
        let headers = self.build_headers(ACCEPT_JSON)?;
        let mut builder = self.http.get(url).headers(headers);
        if let Some(timeout) = self.config.query_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder)
    }

    /// Open the live stream. Resolves once the server answered with a
    /// success status; frames are read lazily from the returned stream.
    pub async fn open_stream(&self, request: &ConnectRequest) -> Result<FrameStream, HttpError> {
        debug!(
            task_id = %request.task_id,
            since_seq = request.since_seq,
            "opening event stream"
        );
        let response = self.build_stream_request(request)?.send().await?;
        let response = ensure_success(response).await?;
        Ok(frames_from_bytes(response.bytes_stream()))
    }

    /// One page of history with `seq > since_seq`.
    pub async fn fetch_events(
        &self,
        task_id: &str,
        since_seq: u64,
        limit: u32,
    ) -> Result<Vec<StreamEvent>, HttpError> {
        debug!(task_id, since_seq, limit, "querying event history");
        let response = self
            .build_events_request(task_id, since_seq, limit)?
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        decode_events(&body)
    }
}

impl EventTransport for HttpEventSource {
    fn open(
        &self,
        request: &ConnectRequest,
    ) -> BoxFuture<'static, Result<FrameStream, TransportError>> {
        let source = self.clone();
        let request = request.clone();
        async move {
            source
                .open_stream(&request)
                .await
                .map_err(TransportError::from)
        }
        .boxed()
    }
}

impl EventQuery for HttpEventSource {
    fn events_since(
        &self,
        task_id: &str,
        since_seq: u64,
        limit: u32,
    ) -> BoxFuture<'static, Result<Vec<StreamEvent>, QueryError>> {
        let source = self.clone();
        let task_id = task_id.to_owned();
        async move {
            source
                .fetch_events(&task_id, since_seq, limit)
                .await
                .map_err(QueryError::from)
        }
        .boxed()
    }
}

async fn ensure_success(response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_error_message(status, &body);
    warn!(status = status.as_u16(), %message, "request rejected");
    Err(HttpError::Status(status, message))
}

/// Decode a history response: `{"events": [...]}` or a bare array.
pub fn decode_events(body: &str) -> Result<Vec<StreamEvent>, HttpError> {
    serde_json::from_str::<EventsBody>(body)
        .map(EventsBody::into_events)
        .map_err(|error| HttpError::Decode(error.to_string()))
}

struct FrameReader<S> {
    bytes: Pin<Box<S>>,
    parser: SseFrameParser,
    pending: VecDeque<Result<String, TransportError>>,
    done: bool,
}

/// Turn a byte stream into SSE data frames. A read error is yielded once and
/// ends the stream. A frame that is not valid UTF-8 is yielded as an error in
/// its place.
pub fn frames_from_bytes<S, B, E>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let reader = FrameReader {
        bytes: Box::pin(bytes),
        parser: SseFrameParser::default(),
        pending: VecDeque::new(),
        done: false,
    };

    futures_util::stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(frame) = reader.pending.pop_front() {
                return Some((frame, reader));
            }
            if reader.done {
                return None;
            }

            match reader.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = reader.parser.feed(chunk.as_ref());
                    reader.pending.extend(frames.into_iter().map(into_transport));
                }
                Some(Err(error)) => {
                    reader.done = true;
                    let error = TransportError::new(format!("stream read failed: {error}"));
                    return Some((Err(error), reader));
                }
                None => {
                    reader.done = true;
                    let trailing = reader.parser.finish();
                    reader.pending.extend(trailing.map(into_transport));
                }
            }
        }
    })
    .boxed()
}

fn into_transport(frame: FrameResult) -> Result<String, TransportError> {
    frame.map_err(|error| TransportError::new(error.to_string()))
}
