use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{OpenOptions, create_dir_all, read_to_string, remove_file},
    io::AsyncWriteExt,
};
use tracing::debug;

use crate::{extract::Record, util::index_suffix};

/// Identifies one persisted series: the program that produced it and the
/// secondary parameter it was swept with, if any
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub program: String,
    pub index: Option<i64>,
}

impl SeriesKey {
    pub fn new(program: impl Into<String>, index: Option<i64>) -> Self {
        Self {
            program: program.into(),
            index,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.program, index_suffix(self.index))
    }
}

/// Tab-delimited sample file, rebuilt from scratch on every collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesFile {
    path: PathBuf,
}

impl SeriesFile {
    pub fn new(data_dir: &Path, key: &SeriesKey) -> Self {
        Self {
            path: data_dir.join(format!("{key}.dat")),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes whatever an earlier run left behind
    pub async fn reset(&self) -> Result<()> {
        match remove_file(&self.path).await {
            Ok(()) => debug!("Removed stale {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .wrap_err_with(|| format!("Remove stale {}", self.path.display()));
            }
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).await?;
        }
        Ok(())
    }

    pub async fn append(&self, record: &Record) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(Vec::new());
        writer.write_record(record.fields())?;
        let line = writer
            .into_inner()
            .map_err(|err| eyre!("Encode sample line: {}", err.error()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .wrap_err_with(|| format!("Open {}", self.path.display()))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn read(&self) -> Result<Vec<Record>> {
        let data = read_to_string(&self.path)
            .await
            .wrap_err_with(|| format!("Read {}", self.path.display()))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.wrap_err_with(|| format!("Parse {}", self.path.display()))?;
            records.push(Record::new(row.iter().map(|x| x.to_owned()).collect()));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> Record {
        Record::new(fields.iter().map(|x| (*x).to_owned()).collect())
    }

    #[test]
    fn key_names_follow_index() {
        assert_eq!(
            SeriesKey::new("pthread_21-create-many", None).to_string(),
            "pthread_21-create-many"
        );
        assert_eq!(
            SeriesKey::new("pthread_31-switch-many", Some(11)).to_string(),
            "pthread_31-switch-many_11"
        );

        let file = SeriesFile::new(Path::new("graphs/data"), &SeriesKey::new("p", Some(1)));
        assert_eq!(file.path(), Path::new("graphs/data/p_1.dat"));
    }

    #[tokio::test]
    async fn appends_tab_delimited_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = SeriesFile::new(dir.path(), &SeriesKey::new("bench", None));
        file.reset().await.unwrap();
        file.append(&record(&["1", "0.25"])).await.unwrap();
        file.append(&record(&["2", "0.5"])).await.unwrap();

        let raw = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(raw, "1\t0.25\n2\t0.5\n");
        assert_eq!(
            file.read().await.unwrap(),
            vec![record(&["1", "0.25"]), record(&["2", "0.5"])]
        );
    }

    #[tokio::test]
    async fn reset_drops_stale_samples() {
        let dir = tempfile::tempdir().unwrap();
        let file = SeriesFile::new(dir.path(), &SeriesKey::new("bench", Some(3)));
        file.reset().await.unwrap();
        for value in ["1", "2", "3"] {
            file.append(&record(&[value])).await.unwrap();
        }

        file.reset().await.unwrap();
        assert!(!file.path().exists());
        file.append(&record(&["9"])).await.unwrap();
        assert_eq!(file.read().await.unwrap(), vec![record(&["9"])]);
    }

    #[tokio::test]
    async fn reset_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested/data");
        let file = SeriesFile::new(&data_dir, &SeriesKey::new("x", None));
        file.reset().await.unwrap();
        file.append(&record(&["1"])).await.unwrap();
        assert!(file.path().exists());
    }
}
