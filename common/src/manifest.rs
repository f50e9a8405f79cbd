use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::{read_to_string, write};

use crate::stats::Summary;

pub const MANIFEST_FILE: &str = "run.json";

/// A collected series as it was written to the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub bench: String,
    pub variant: String,
    pub file: PathBuf,
    pub secondary: Option<i64>,
    /// Primary parameter of every line in `file`, in order
    pub params: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub bench: String,
    pub file: PathBuf,
    pub summary: Summary,
}

/// What the last runs wrote to the data directory, so charts can be redrawn
/// without running anything
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub name: String,
    pub updated: Option<String>,
    pub series: Vec<SeriesEntry>,
    pub summaries: Vec<SummaryEntry>,
}

impl RunManifest {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(MANIFEST_FILE)
    }

    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        let data = read_to_string(&path)
            .await
            .wrap_err_with(|| format!("Read {}", path.display()))?;
        serde_json::from_str(&data).wrap_err_with(|| format!("Parse {}", path.display()))
    }

    /// The manifest of earlier runs, or an empty one if there is none yet
    pub async fn load_or_default(data_dir: &Path) -> Result<Self> {
        if Self::path(data_dir).exists() {
            Self::load(data_dir).await
        } else {
            Ok(Self::default())
        }
    }

    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = Self::path(data_dir);
        write(&path, serde_json::to_string_pretty(self)?)
            .await
            .wrap_err_with(|| format!("Write {}", path.display()))
    }

    /// Forgets everything recorded for `bench`, before it is collected again
    pub fn clear_bench(&mut self, bench: &str) {
        self.series.retain(|x| x.bench != bench);
        self.summaries.retain(|x| x.bench != bench);
    }

    pub fn record_series(&mut self, entry: SeriesEntry) {
        self.series.retain(|x| x.file != entry.file);
        self.series.push(entry);
    }

    pub fn record_summary(&mut self, entry: SummaryEntry) {
        self.summaries.retain(|x| x.file != entry.file);
        self.summaries.push(entry);
    }

    pub fn series_for<'a>(&'a self, bench: &'a str) -> impl Iterator<Item = &'a SeriesEntry> {
        self.series.iter().filter(move |x| x.bench == bench)
    }

    pub fn summary_for(&self, bench: &str) -> Option<&SummaryEntry> {
        self.summaries.iter().find(|x| x.bench == bench)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bench: &str, secondary: Option<i64>) -> SeriesEntry {
        SeriesEntry {
            bench: bench.to_owned(),
            variant: "pthread".to_owned(),
            file: PathBuf::from(format!("{bench}{secondary:?}.dat")),
            secondary,
            params: vec![1, 2, 3],
        }
    }

    #[test]
    fn rerecording_replaces_the_entry() {
        let mut manifest = RunManifest::default();
        manifest.record_series(entry("a", None));
        manifest.record_series(entry("b", Some(1)));
        manifest.record_series(entry("b", Some(11)));

        let mut again = entry("a", None);
        again.params = vec![5];
        manifest.record_series(again);

        assert_eq!(manifest.series.len(), 3);
        assert_eq!(manifest.series_for("a").next().unwrap().params, vec![5]);
        manifest.clear_bench("b");
        assert_eq!(manifest.series_for("b").count(), 0);
    }

    #[tokio::test]
    async fn round_trips_through_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            RunManifest::load_or_default(dir.path()).await.unwrap(),
            RunManifest::default()
        );

        let mut manifest = RunManifest {
            name: "graphs".to_owned(),
            ..Default::default()
        };
        manifest.record_series(entry("a", Some(3)));
        manifest.save(dir.path()).await.unwrap();
        assert_eq!(RunManifest::load(dir.path()).await.unwrap(), manifest);
    }
}
