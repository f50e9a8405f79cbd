use eyre::{Context, Result};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    cache::SeriesFile,
    extract::{ColumnPattern, ExtractError, Record},
    range::SweepRange,
    runner::{RunError, SampleSource},
};

/// What to do with a sample whose benchmark failed or printed garbage
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePolicy {
    /// Log a warning and leave the point out of the series
    #[default]
    Skip,
    /// Fail the whole configuration
    Abort,
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Samples of one sweep; `params[i]` produced `values[i]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub secondary: Option<i64>,
    pub params: Vec<i64>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(secondary: Option<i64>) -> Self {
        Self {
            secondary,
            ..Default::default()
        }
    }

    pub fn push(&mut self, param: i64, value: f64) {
        self.params.push(param);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Runs a benchmark across a sweep and keeps one sample per parameter value
pub struct SeriesCollector<'a> {
    name: &'a str,
    source: &'a dyn SampleSource,
    pattern: &'a ColumnPattern,
    policy: SamplePolicy,
    progress: ProgressBar,
}

impl<'a> SeriesCollector<'a> {
    pub fn new(
        name: &'a str,
        source: &'a dyn SampleSource,
        pattern: &'a ColumnPattern,
        policy: SamplePolicy,
    ) -> Self {
        Self {
            name,
            source,
            pattern,
            policy,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// One invocation reduced to its first record and that record's value
    pub async fn sample(&self, args: &[i64]) -> Result<(Record, f64), SampleError> {
        let output = self.source.output(args).await?;
        let mut records = self.pattern.records(&output);
        let first = records.next().ok_or(ExtractError::NoOutput)??;
        let extra = records.count();
        if extra > 0 {
            debug!(
                "{} printed {extra} more lines, keeping the first",
                self.source.command_line(args)
            );
        }
        let value = first.value()?;
        Ok((first, value))
    }

    async fn sample_with_policy(&self, args: &[i64]) -> Result<Option<(Record, f64)>> {
        match self.sample(args).await {
            Ok(sample) => Ok(Some(sample)),
            Err(err) => {
                let cmd = self.source.command_line(args);
                match self.policy {
                    SamplePolicy::Skip => {
                        warn!("{}: skipping `{cmd}`: {err}", self.name);
                        Ok(None)
                    }
                    SamplePolicy::Abort => {
                        Err(err).wrap_err_with(|| format!("{}: `{cmd}` failed", self.name))
                    }
                }
            }
        }
    }

    /// Sweeps `primary`, passing `secondary` as the second argument when set.
    /// `file` is rebuilt from scratch.
    pub async fn collect(
        &self,
        primary: &SweepRange,
        secondary: Option<i64>,
        file: &SeriesFile,
    ) -> Result<Series> {
        file.reset().await?;
        let mut series = Series::new(secondary);
        for param in primary.values() {
            let args = std::iter::once(param).chain(secondary).collect::<Vec<_>>();
            if let Some((record, value)) = self.sample_with_policy(&args).await? {
                file.append(&record).await?;
                series.push(param, value);
            }
            self.progress.inc(1);
        }
        Ok(series)
    }

    /// One series per secondary value, in declared order
    pub async fn collect_nested<F>(
        &self,
        primary: &SweepRange,
        secondary: &SweepRange,
        file_for: F,
    ) -> Result<Vec<Series>>
    where
        F: Fn(i64) -> SeriesFile + Send + Sync,
    {
        let mut groups = Vec::with_capacity(secondary.len());
        for index in secondary.values() {
            groups.push(self.collect(primary, Some(index), &file_for(index)).await?);
        }
        Ok(groups)
    }

    /// Runs the same invocation `runs` times
    pub async fn repeat(&self, args: &[i64], runs: usize, file: &SeriesFile) -> Result<Vec<f64>> {
        file.reset().await?;
        let mut values = Vec::with_capacity(runs);
        for _ in 0..runs {
            if let Some((record, value)) = self.sample_with_policy(args).await? {
                file.append(&record).await?;
                values.push(value);
            }
            self.progress.inc(1);
        }
        Ok(values)
    }
}
