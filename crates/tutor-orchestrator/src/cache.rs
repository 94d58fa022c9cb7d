//! Response cache keyed by subject and normalized question.
//!
//! The cache sits in front of the whole pipeline: a hit skips every stage and
//! every generation call. It is unbounded with no expiry. The first response
//! stored for a key is kept; later writes for the same key are ignored.
//!
//! One [`ResponseCache`] is created at startup and shared (via `Arc`) by
//! every [`Tutor`](crate::Tutor), so lifetime and test isolation stay explicit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::subject::Subject;

/// Cache key: subject plus lower-cased, trimmed question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    subject: Subject,
    question: String,
}

impl CacheKey {
    /// Builds a normalized key.
    ///
    /// # Examples
    ///
    /// ```
    /// use tutor_orchestrator::{CacheKey, Subject};
    ///
    /// assert_eq!(
    ///     CacheKey::new(Subject::Physics, "What Is Pressure?"),
    ///     CacheKey::new(Subject::Physics, " what is pressure? "),
    /// );
    /// ```
    #[must_use]
    pub fn new(subject: Subject, question: &str) -> Self {
        Self {
            subject,
            question: question.trim().to_lowercase(),
        }
    }

    /// The subject component.
    #[must_use]
    pub const fn subject(&self) -> Subject {
        self.subject
    }

    /// The normalized question component.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }
}

/// Hit/miss counters for the response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that found a response.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Number of stored responses.
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 when nothing was looked up.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Process-wide map from [`CacheKey`] to final response text.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a cached response.
    pub fn get(&self, subject: Subject, question: &str) -> Option<String> {
        let key = CacheKey::new(subject, question);
        let found = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Stores a response unless one already exists for the key.
    ///
    /// Returns `true` if the response was inserted.
    pub fn put(&self, subject: Subject, question: &str, response: impl Into<String>) -> bool {
        let key = CacheKey::new(subject, question);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, response.into());
        true
    }

    /// Number of stored responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
