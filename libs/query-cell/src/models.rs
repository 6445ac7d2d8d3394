use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use shared_models::error::AppError;

// ==============================================================================
// CACHE KEYS
// ==============================================================================

/// Resource path plus request parameters. Parameters are kept sorted, so two
/// keys built with the same parameters in a different order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QueryKey {
    segments: Vec<String>,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    /// Absent parameters are left out of the key entirely.
    pub fn with_optional_param<V: ToString>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_param(name, value),
            None => self,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Resource family, e.g. `appointments` for `appointments/doctor?page=2`.
    pub fn family(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// True when `prefix`'s segments lead this key's segments and every
    /// parameter of `prefix` is present here with the same value.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments.iter().zip(&prefix.segments).all(|(a, b)| a == b)
            && prefix
                .params
                .iter()
                .all(|(name, value)| self.params.get(name) == Some(value))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, name, value)?;
        }
        Ok(())
    }
}

// ==============================================================================
// POLICIES AND STATE
// ==============================================================================

/// How long a result is served without refetching (`stale_time`), and how
/// long an entry nobody observes is kept before eviction (`gc_time`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub stale_time: Duration,
    pub gc_time: Duration,
}

impl CachePolicy {
    pub const fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self { stale_time, gc_time }
    }

    pub const fn minutes(stale: u64, gc: u64) -> Self {
        Self::new(Duration::from_secs(stale * 60), Duration::from_secs(gc * 60))
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::minutes(0, 5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

/// What an observer of a key sees.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<AppError>,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub updated_at: Option<Instant>,
}

impl<T> QueryState<T> {
    pub fn pending() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: true,
            updated_at: None,
        }
    }

    /// No data yet and a request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub deduplicated: u64,
    pub invalidations: u64,
    pub evictions: u64,
    pub total_entries: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64
        }
    }
}
