use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::StreamError;
use crate::event::StreamEvent;
use crate::transport::EventQuery;

/// Out-of-band retrieval of the events inside a detected gap.
#[derive(Clone)]
pub struct RecoveryFetcher {
    query: Arc<dyn EventQuery>,
    task_id: Arc<str>,
    page_size: u32,
}

impl RecoveryFetcher {
    pub fn new(query: Arc<dyn EventQuery>, task_id: impl Into<Arc<str>>, page_size: u32) -> Self {
        Self {
            query,
            task_id: task_id.into(),
            page_size: page_size.max(1),
        }
    }

    /// Fetch events with `since < seq < until`, ascending and unique by `seq`.
    ///
    /// An empty result is valid: the producer may never have emitted events
    /// for part of a range.
    pub fn fetch(
        &self,
        since: u64,
        until: u64,
    ) -> BoxFuture<'static, Result<Vec<StreamEvent>, StreamError>> {
        let query = Arc::clone(&self.query);
        let task_id = Arc::clone(&self.task_id);
        let page_size = self.page_size;

        Box::pin(async move {
            let mut recovered = BTreeMap::new();
            let mut cursor = since;

            while cursor.saturating_add(1) < until {
                let remaining = until - cursor - 1;
                let limit = page_size.min(u32::try_from(remaining).unwrap_or(u32::MAX));
                let page = query
                    .events_since(&task_id, cursor, limit)
                    .await
                    .map_err(|error| StreamError::recovery_failed(since, until, error.to_string()))?;

                let page_len = page.len();
                let Some(highest) = page.iter().map(|event| event.seq).max() else {
                    break;
                };
                if highest <= cursor {
                    return Err(StreamError::recovery_failed(
                        since,
                        until,
                        format!("query returned no events past seq {cursor}"),
                    ));
                }

                for event in page {
                    if event.seq > since && event.seq < until {
                        recovered.entry(event.seq).or_insert(event);
                    }
                }

                if page_len < limit as usize {
                    break;
                }
                cursor = highest;
            }

            tracing::debug!(
                task_id = %task_id,
                since,
                until,
                recovered = recovered.len(),
                "gap recovery fetched"
            );
            Ok(recovered.into_values().collect())
        })
    }
}

impl std::fmt::Debug for RecoveryFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryFetcher")
            .field("task_id", &self.task_id)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
