pub mod digest;
pub mod table;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

pub use digest::{to_digest, EMPTY_DIGEST};
pub use table::{from_csv, to_csv, CsvRow};

/// Artifact file name for a run date
pub fn artifact_name(date: NaiveDate) -> String {
    format!("penny_scan_{}.csv", date.format("%Y-%m-%d"))
}

/// Write the CSV artifact into `dir`, creating it if needed
pub fn write_artifact(dir: &Path, date: NaiveDate, contents: &[u8]) -> Result<PathBuf> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).context("Failed to create output directory")?;
    }

    let path = dir.join(artifact_name(date));
    fs::write(&path, contents)
        .with_context(|| format!("Failed to write artifact {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(artifact_name(date), "penny_scan_2026-10-19.csv");
    }

    #[test]
    fn test_write_artifact_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("runs").join("today");
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let path = write_artifact(&nested, date, b"ticker\n").unwrap();

        assert_eq!(path, nested.join("penny_scan_2026-10-19.csv"));
        assert_eq!(fs::read(&path).unwrap(), b"ticker\n");
    }
}
