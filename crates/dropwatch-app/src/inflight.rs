//! Per-path mutual exclusion for concurrent dispatches.
//!
//! A path is claimed with an atomic insert-if-absent and released when the
//! returned [`InFlightClaim`] drops, whatever way the dispatch ended.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dropwatch_telemetry::Metrics;

/// Set of paths currently being dispatched, keyed by absolute path.
#[derive(Clone)]
pub struct InFlight {
    entries: Arc<DashMap<PathBuf, DateTime<Utc>>>,
    metrics: Metrics,
}

impl InFlight {
    /// Create an empty set reporting its size through `metrics`.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            metrics,
        }
    }

    /// Claim `path`, or return `None` when another dispatch already holds it.
    #[must_use]
    pub fn claim(&self, path: &Path) -> Option<InFlightClaim> {
        let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                self.metrics.inc_inflight();
                Some(InFlightClaim {
                    entries: Arc::clone(&self.entries),
                    metrics: self.metrics.clone(),
                    key,
                })
            }
        }
    }
}

/// Guard proving exclusive ownership of a path; releases it on drop.
pub struct InFlightClaim {
    entries: Arc<DashMap<PathBuf, DateTime<Utc>>>,
    metrics: Metrics,
    key: PathBuf,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        if self.entries.remove(&self.key).is_some() {
            self.metrics.dec_inflight();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_until_release() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let inflight = InFlight::new(metrics.clone());
        let path = Path::new("/downloads/report.pdf");

        let claim = inflight
            .claim(path)
            .ok_or_else(|| anyhow::anyhow!("first claim succeeds"))?;
        assert!(inflight.claim(path).is_none());
        assert_eq!(metrics.snapshot().inflight_dispatches, 1);

        drop(claim);
        assert_eq!(metrics.snapshot().inflight_dispatches, 0);
        assert!(inflight.claim(path).is_some());
        Ok(())
    }

    #[test]
    fn relative_and_absolute_spellings_share_a_claim() -> anyhow::Result<()> {
        let inflight = InFlight::new(Metrics::new()?);
        let absolute = std::path::absolute("incoming/movie.mkv")?;
        let _claim = inflight
            .claim(Path::new("incoming/movie.mkv"))
            .ok_or_else(|| anyhow::anyhow!("first claim succeeds"))?;
        assert!(inflight.claim(&absolute).is_none());
        Ok(())
    }

    #[test]
    fn claims_are_independent_per_path() -> anyhow::Result<()> {
        let inflight = InFlight::new(Metrics::new()?);
        let _first = inflight.claim(Path::new("/downloads/a.zip"));
        assert!(inflight.claim(Path::new("/downloads/b.zip")).is_some());
        Ok(())
    }
}
