//! Dispatch audit artifacts
//!
//! Every dispatch attempt, successful or not, real or simulated, leaves
//! exactly one artifact holding the exact payload bytes that were (or
//! would have been) sent. Filenames carry the route id and a nanosecond
//! timestamp, so the directory is append-only and safe under concurrent
//! batches without locking.

use crate::Result;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes per-day closure audit artifacts
#[derive(Debug, Clone)]
pub struct AuditWriter {
    audit_dir: PathBuf,
}

impl AuditWriter {
    /// New writer rooted at `audit_dir`
    pub fn new(audit_dir: impl Into<PathBuf>) -> Self {
        Self {
            audit_dir: audit_dir.into(),
        }
    }

    /// Artifact root
    pub fn audit_dir(&self) -> &Path {
        &self.audit_dir
    }

    /// Record one dispatch attempt's payload. Returns the artifact path.
    pub fn record(&self, date: NaiveDate, route_id: u32, payload: &str) -> Result<PathBuf> {
        let day_dir = self.audit_dir.join(date.format("%Y-%m-%d").to_string());
        std::fs::create_dir_all(&day_dir)?;

        let filename = format!(
            "route-{}-{}.xml",
            route_id,
            Utc::now().format("%Y%m%dT%H%M%S%f")
        );
        let path = day_dir.join(filename);
        std::fs::write(&path, payload)?;

        info!("Recorded closure payload for route {} at {}", route_id, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_is_byte_exact_and_unique() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AuditWriter::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2025, 6, 28).unwrap();

        let first = writer.record(date, 42, "<payload>1</payload>").unwrap();
        let second = writer.record(date, 42, "<payload>2</payload>").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with(dir.path().join("2025-06-28")));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "<payload>1</payload>");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "<payload>2</payload>");
    }
}
