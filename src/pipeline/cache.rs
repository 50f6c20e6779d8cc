//! Response cache: bounded, TTL-checked, shared by handle.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::flow::FlowState;
use crate::pipeline::types::{CandidateResponse, CandidateStatus, Channel, ResponseSource};

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Build the cache key from everything that shapes a response.
pub fn cache_key(
    candidate_id: &str,
    text: &str,
    status: CandidateStatus,
    flow: FlowState,
    channel: Channel,
) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    format!(
        "{}|{}|{}|{}|{}",
        candidate_id.trim().to_lowercase(),
        text,
        status.as_str(),
        flow.as_str(),
        channel.as_str()
    )
}

/// Whether a response may be stored.
///
/// Escalations and flow replies (slot offers, bookings) are never cached.
pub fn is_cacheable(response: &CandidateResponse, flow_reply: bool) -> bool {
    !flow_reply
        && !response.escalate
        && matches!(
            response.source,
            ResponseSource::Internal | ResponseSource::Generative
        )
}

struct CacheEntry {
    response: CandidateResponse,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, oldest at the front.
    order: VecDeque<String>,
}

/// Bounded key → response map. Evicts the oldest insert on overflow and
/// never serves an expired entry.
pub struct ResponseCache {
    inner: RwLock<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<CandidateResponse> {
        let now = Instant::now();
        {
            let inner = self.inner.read().await;
            match inner.entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.response.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it.
        let mut inner = self.inner.write().await;
        if inner
            .entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= now)
        {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            debug!(key, "Cache entry expired");
        }
        None
    }

    /// Insert or replace. Last write wins.
    pub async fn insert(&self, key: String, response: CandidateResponse) {
        let mut inner = self.inner.write().await;
        let entry = CacheEntry {
            response,
            expires_at: Instant::now() + self.ttl,
        };
        if inner.entries.insert(key.clone(), entry).is_some() {
            inner.order.retain(|k| k != &key);
        }
        inner.order.push_back(key);

        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            debug!(key = %oldest, "Cache entry evicted");
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::IntentCategory;

    fn response(content: &str) -> CandidateResponse {
        CandidateResponse::text(
            content,
            IntentCategory::Greeting,
            0.8,
            ResponseSource::Internal,
        )
    }

    #[test]
    fn key_normalizes_text() {
        let a = cache_key(
            "c-1",
            "  Hello   THERE ",
            CandidateStatus::Active,
            FlowState::InitialEngagement,
            Channel::Whatsapp,
        );
        let b = cache_key(
            "c-1",
            "hello there",
            CandidateStatus::Active,
            FlowState::InitialEngagement,
            Channel::Whatsapp,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn key_separates_channels_and_candidates() {
        let base = |cid: &str, ch: Channel| {
            cache_key(cid, "hi", CandidateStatus::Active, FlowState::InitialEngagement, ch)
        };
        assert_ne!(base("c-1", Channel::Web), base("c-1", Channel::Sms));
        assert_ne!(base("c-1", Channel::Web), base("c-2", Channel::Web));
    }

    #[test]
    fn only_plain_responses_are_cacheable() {
        let plain = response("Hello there, how can we help today?");
        assert!(is_cacheable(&plain, false));
        assert!(!is_cacheable(&plain, true));
        assert!(!is_cacheable(&plain.clone().escalating(), false));
        let mut cached = plain;
        cached.source = ResponseSource::Cache;
        assert!(!is_cacheable(&cached, false));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_never_served() {
        let cache = ResponseCache::new(10, Duration::from_secs(300));
        cache.insert("k".into(), response("Hello there, friend!")).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn overflow_evicts_oldest_first() {
        let cache = ResponseCache::new(2, DEFAULT_TTL);
        cache.insert("a".into(), response("first response here")).await;
        cache.insert("b".into(), response("second response here")).await;
        cache.insert("c".into(), response("third response here")).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn rewrite_refreshes_position() {
        let cache = ResponseCache::new(2, DEFAULT_TTL);
        cache.insert("a".into(), response("first response here")).await;
        cache.insert("b".into(), response("second response here")).await;
        cache.insert("a".into(), response("first response again")).await;
        cache.insert("c".into(), response("third response here")).await;

        assert!(cache.get("b").await.is_none());
        assert_eq!(
            cache.get("a").await.map(|r| r.content),
            Some("first response again".to_string())
        );
    }
}
