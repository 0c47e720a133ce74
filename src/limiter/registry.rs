//! Process-wide limiter registry keyed by node tag.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::LimitConfig;
use crate::limiter::Limiter;
use crate::observability::metrics;
use crate::panel::UserInfo;

/// Shared registry of per-node limiters.
///
/// Owned by the process and handed to every controller and engine by
/// reference. Other subsystems look limiters up by tag here, not through the
/// controller that registered them.
#[derive(Debug, Default)]
pub struct LimiterRegistry {
    limiters: DashMap<String, Arc<Limiter>>,
}

impl LimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a limiter for `tag`, replacing any stale entry.
    pub fn add(&self, tag: &str, config: &LimitConfig, users: &[UserInfo]) -> Arc<Limiter> {
        let limiter = Arc::new(Limiter::new(tag, config.clone(), users));
        if self
            .limiters
            .insert(tag.to_string(), limiter.clone())
            .is_some()
        {
            tracing::warn!(tag = %tag, "Replaced stale limiter");
        }
        metrics::record_limiters(self.limiters.len());
        limiter
    }

    /// Remove the limiter for `tag`. Absent tags are ignored.
    pub fn remove(&self, tag: &str) {
        if self.limiters.remove(tag).is_some() {
            tracing::debug!(tag = %tag, "Limiter removed");
            metrics::record_limiters(self.limiters.len());
        }
    }

    pub fn get(&self, tag: &str) -> Option<Arc<Limiter>> {
        self.limiters.get(tag).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
