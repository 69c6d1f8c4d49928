//! Manifest for a generation run.
//!
//! Writes `proto-stress.json` next to the generated programs so a run can
//! be reproduced from its seed and profile.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::profile::GenerationConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "proto-stress.json";

/// Aggregate outcome of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub requested: usize,
    pub generated: usize,
    /// Programs aborted by a fatal fault.
    pub failed: usize,
    /// Programs that stopped early because nothing applied.
    pub stalled: usize,
    pub total_operations: usize,
    pub deepest_nesting: usize,
}

/// The complete manifest written to `proto-stress.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub seed: u64,
    pub profile: String,
    pub generation: GenerationConfig,
    pub summary: RunSummary,
    pub generated_at: String,
    pub version: String,
}

impl Manifest {
    pub fn new(
        seed: u64,
        profile: String,
        generation: GenerationConfig,
        summary: RunSummary,
    ) -> Self {
        Self {
            seed,
            profile,
            generation,
            summary,
            generated_at: iso_timestamp(),
            version: VERSION.to_string(),
        }
    }

    /// Write the manifest to `dir` as `proto-stress.json`.
    pub fn write_to_dir(&self, dir: &Path) -> io::Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }
}

/// Current time as `YYYY-MM-DDTHH:MM:SSZ`.
fn iso_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let (year, month, day) = days_to_ymd(secs / 86400);
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Civil date from days since 1970-01-01 (Howard Hinnant's algorithm).
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_serializes_to_json() {
        let summary = RunSummary {
            requested: 4,
            generated: 3,
            failed: 1,
            ..RunSummary::default()
        };
        let manifest = Manifest::new(
            12345,
            "deep-nesting".to_string(),
            GenerationConfig::default(),
            summary,
        );
        let json = serde_json::to_string(&manifest).expect("should serialize");
        assert!(json.contains("\"seed\":12345"));
        assert!(json.contains("\"profile\":\"deep-nesting\""));
        assert!(json.contains("\"failed\":1"));
        assert!(json.contains("\"mode\":\"aggressive\""));
    }

    #[test]
    fn manifest_round_trips_summary() {
        let manifest = Manifest::new(
            1,
            "default".into(),
            GenerationConfig::default(),
            RunSummary::default(),
        );
        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, manifest.summary);
        assert_eq!(back.generation, manifest.generation);
    }

    #[test]
    fn iso_timestamp_format() {
        let ts = iso_timestamp();
        assert_eq!(ts.len(), 20, "timestamp should be 20 chars: {ts}");
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn days_to_ymd_known_dates() {
        assert_eq!(days_to_ymd(0), (1970, 1, 1));
        assert_eq!(days_to_ymd(19723), (2024, 1, 1));
    }
}
