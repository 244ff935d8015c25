//! Storage collaborators.
//!
//! Ingestion hands finished [`Report`]s to a [`ReportStore`]. Implementations
//! must enforce `uuid` uniqueness, cut bounded string columns down to their
//! declared widths, return frames in ascending `frame_num` order, and delete a
//! report's frames and dump together with the report.

pub mod database;
pub mod schema;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::CrashStoreResult;
use crate::models::Report;

/// Occurrence count of one report signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCount {
    pub signature: String,
    pub count: i64,
}

pub trait ReportStore {
    /// Persist `report` with its frames and dump; returns the assigned id.
    fn save(&self, report: &Report) -> CrashStoreResult<i64>;

    fn load(&self, id: i64) -> CrashStoreResult<Option<Report>>;

    fn load_by_uuid(&self, uuid: &str) -> CrashStoreResult<Option<Report>>;

    /// Delete a report and everything it owns. Returns `false` when no such
    /// report exists.
    fn delete(&self, id: i64) -> CrashStoreResult<bool>;

    /// Most frequent signatures, optionally restricted to a product and
    /// version, ordered by count descending then signature.
    fn top_signatures(
        &self,
        product: Option<&str>,
        version: Option<&str>,
        limit: usize,
    ) -> CrashStoreResult<Vec<SignatureCount>>;

    /// Save each report independently; one failure does not stop the rest.
    fn save_all(&self, reports: &[Report]) -> Vec<CrashStoreResult<i64>> {
        reports.iter().map(|report| self.save(report)).collect()
    }
}

// ---------------------------------------------------------------------------
// Fetch counters
// ---------------------------------------------------------------------------

/// Hit/miss tally for one fetched item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    pub hits: u64,
    pub misses: u64,
}

impl FetchStats {
    pub fn both(&self) -> u64 {
        self.hits + self.misses
    }

    /// Share of hits in percent, rounded to one decimal; `None` before the
    /// first fetch.
    pub fn hits_percentage(&self) -> Option<f64> {
        let both = self.both();
        if both == 0 {
            return None;
        }
        Some((1000.0 * self.hits as f64 / both as f64).round() / 10.0)
    }
}

/// Hit/miss counters keyed by an opaque item name.
pub trait FetchCounters {
    fn record_hit(&self, item: &str) -> CrashStoreResult<()>;
    fn record_miss(&self, item: &str) -> CrashStoreResult<()>;
    fn fetch_stats(&self, item: &str) -> CrashStoreResult<FetchStats>;
}

/// Storage key of a counter item: hex SHA-256 of its name.
pub fn item_key(item: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_percentage_rounds_to_one_decimal() {
        let stats = FetchStats { hits: 1, misses: 2 };
        assert_eq!(stats.both(), 3);
        assert_eq!(stats.hits_percentage(), Some(33.3));
        assert_eq!(FetchStats { hits: 2, misses: 1 }.hits_percentage(), Some(66.7));
        assert_eq!(FetchStats { hits: 5, misses: 0 }.hits_percentage(), Some(100.0));
    }

    #[test]
    fn hits_percentage_without_fetches_is_none() {
        assert_eq!(FetchStats::default().hits_percentage(), None);
    }

    #[test]
    fn item_key_is_stable_hex_digest() {
        let key = item_key("report");
        assert_eq!(key.len(), 64);
        assert_eq!(key, item_key("report"));
        assert_ne!(key, item_key("frames"));
    }
}
