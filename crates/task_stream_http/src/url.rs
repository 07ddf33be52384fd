use task_stream::config::DEFAULT_BASE_URL;
use task_stream::ConnectRequest;
use url::Url;

use crate::error::HttpError;

/// Normalize a configured base URL: trimmed, defaulted when blank, without a
/// trailing slash.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// `{base}/tasks/{task_id}/events/stream?since_seq=..&batch_size=..&flush_interval=..`
pub fn stream_url(base_url: &str, request: &ConnectRequest) -> Result<Url, HttpError> {
    let mut url = task_events_url(base_url, &request.task_id, &["stream"])?;
    url.query_pairs_mut()
        .append_pair("since_seq", &request.since_seq.to_string())
        .append_pair("batch_size", &request.batch_size.to_string())
        .append_pair(
            "flush_interval",
            &request.flush_interval.as_millis().to_string(),
        );
    Ok(url)
}

/// `{base}/tasks/{task_id}/events?since_seq=..&limit=..`
pub fn events_url(
    base_url: &str,
    task_id: &str,
    since_seq: u64,
    limit: u32,
) -> Result<Url, HttpError> {
    let mut url = task_events_url(base_url, task_id, &[])?;
    url.query_pairs_mut()
        .append_pair("since_seq", &since_seq.to_string())
        .append_pair("limit", &limit.to_string());
    Ok(url)
}

fn task_events_url(base_url: &str, task_id: &str, suffix: &[&str]) -> Result<Url, HttpError> {
    let normalized = normalize_base_url(base_url);
    let mut url = Url::parse(&normalized)
        .map_err(|error| HttpError::InvalidBaseUrl(format!("{normalized}: {error}")))?;

    if task_id.trim().is_empty() {
        return Err(HttpError::InvalidBaseUrl(
            "task id must not be empty".to_owned(),
        ));
    }

    url.path_segments_mut()
        .map_err(|()| HttpError::InvalidBaseUrl(format!("{normalized}: cannot be a base")))?
        .pop_if_empty()
        .push("tasks")
        .push(task_id)
        .push("events")
        .extend(suffix);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
