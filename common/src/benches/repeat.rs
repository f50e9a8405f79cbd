use console::style;
use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    bench::{Bench, Cmd, Session},
    cache::{SeriesFile, SeriesKey},
    config::Settings,
    extract::ColumnPattern,
    manifest::SummaryEntry,
    runner::{ProcessRunner, SampleSource},
    series::SeriesCollector,
    stats::Summary,
};

/// Runs one benchmark invocation many times and reports the spread of a
/// timing column
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Repeat {
    pub program: String,
    #[serde(default)]
    pub args: Vec<i64>,
    pub runs: usize,
    pub columns: ColumnPattern,
}

impl Repeat {
    fn runner(&self, settings: &Settings) -> ProcessRunner {
        ProcessRunner::new(settings.install_dir.join(&self.program))
    }

    fn series_file(&self, name: &str, settings: &Settings) -> SeriesFile {
        SeriesFile::new(&settings.data_dir, &SeriesKey::new(name, None))
    }
}

fn report(name: &str, summary: &Summary) {
    println!("{} : {summary}", style(name).bold());
}

#[async_trait::async_trait]
#[typetag::serde]
impl Bench for Repeat {
    fn kind(&self) -> &'static str {
        "repeat"
    }

    fn validate(&self, name: &str, _settings: &Settings) -> Result<()> {
        if self.program.is_empty() {
            bail!("{name} names no program");
        }
        if self.runs == 0 {
            bail!("{name} must run at least once");
        }
        Ok(())
    }

    fn cmds(&self, _name: &str, settings: &Settings) -> Result<Vec<Cmd>> {
        Ok(vec![Cmd {
            line: self.runner(settings).command_line(&self.args),
            times: self.runs,
        }])
    }

    async fn run(&self, name: &str, session: &mut Session) -> Result<()> {
        let runner = self.runner(&session.settings);
        let file = self.series_file(name, &session.settings);
        let bar = session.progress_bar(self.runs, name);
        let collector = SeriesCollector::new(
            name,
            &runner,
            &self.columns,
            session.settings.on_sample_error,
        )
        .with_progress(bar.clone());

        let values = collector.repeat(&self.args, self.runs, &file).await?;
        bar.finish_and_clear();
        if values.len() < self.runs {
            warn!("{name}: only {} of {} runs gave a sample", values.len(), self.runs);
        }

        let summary = Summary::from_values(&values)
            .wrap_err_with(|| format!("{name}: no run gave a sample"))?;
        report(name, &summary);

        session.manifest.clear_bench(name);
        session.manifest.record_summary(SummaryEntry {
            bench: name.to_owned(),
            file: file.path().to_path_buf(),
            summary,
        });
        Ok(())
    }

    async fn replot(&self, name: &str, session: &mut Session) -> Result<()> {
        let file = match session.manifest.summary_for(name) {
            Some(entry) => SeriesFile::at(entry.file.clone()),
            None => self.series_file(name, &session.settings),
        };
        let values = file
            .read()
            .await?
            .iter()
            .map(|record| record.value())
            .collect::<Result<Vec<_>, _>>()
            .wrap_err_with(|| format!("Parse {}", file.path().display()))?;

        let summary = Summary::from_values(&values)
            .wrap_err_with(|| format!("{name}: {} is empty", file.path().display()))?;
        report(name, &summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fibo(n: i64) -> Repeat {
        Repeat {
            program: "51-fibonacci".to_owned(),
            args: vec![n],
            runs: 100,
            columns: "$7; exit".parse().unwrap(),
        }
    }

    #[test]
    fn one_command_repeated() {
        let cmds = fibo(8).cmds("fibo-8", &Settings::default()).unwrap();
        assert_eq!(
            cmds,
            vec![Cmd {
                line: "install/bin/51-fibonacci 8".to_owned(),
                times: 100,
            }]
        );
    }

    #[test]
    fn zero_runs_is_rejected() {
        let repeat = Repeat {
            runs: 0,
            ..fibo(8)
        };
        assert!(repeat.validate("fibo-8", &Settings::default()).is_err());
        assert!(fibo(8).validate("fibo-8", &Settings::default()).is_ok());
    }
}
